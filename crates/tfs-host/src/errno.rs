//! Error-kind to host errno mapping, applied only at the `tfs-host`
//! boundary. `tfs-fs` itself never speaks in errno; `libc` stays confined
//! to the host-facing crates.

use tfs_fs::FsError;

/// Map an engine error to the `libc` errno a FUSE reply expects.
pub fn to_errno(err: &FsError) -> i32 {
    match err {
        FsError::NotFound(_) => libc::ENOENT,
        FsError::Exists(_) => libc::EEXIST,
        FsError::NoSpace(_) => libc::ENOSPC,
        FsError::Io(_) => libc::EIO,
        FsError::Corrupt(_) => libc::EIO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_enoent() {
        assert_eq!(to_errno(&FsError::NotFound("x".into())), libc::ENOENT);
    }

    #[test]
    fn exists_maps_to_eexist() {
        assert_eq!(to_errno(&FsError::Exists("x".into())), libc::EEXIST);
    }

    #[test]
    fn no_space_maps_to_enospc() {
        assert_eq!(to_errno(&FsError::NoSpace("x")), libc::ENOSPC);
    }
}
