//! Pathname resolution.

use crate::block::BlockDevice;
use crate::dirent::dir_find;
use crate::error::FsResult;
use crate::inode::{readi, Inode};
use crate::superblock::SuperBlock;

/// Split `path` on `/`, discarding empty components so leading, trailing,
/// and duplicated slashes are all tolerated.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// Walk `path` starting from `start_ino`, resolving one directory lookup per
/// component. The empty path resolves to `start_ino` itself. The path is
/// taken by shared reference and never mutated.
pub fn get_node_by_path(
    device: &mut impl BlockDevice,
    sb: &SuperBlock,
    path: &str,
    start_ino: u32,
) -> FsResult<Inode> {
    let mut current = start_ino;
    for component in components(path) {
        let entry = dir_find(device, sb, current, component)?;
        current = entry.ino;
    }
    readi(device, sb, current)
}

/// Resolve `path` to the inode number of its last component, without reading
/// the inode record itself. Useful when only the number is needed.
pub fn resolve_ino(
    device: &mut impl BlockDevice,
    sb: &SuperBlock,
    path: &str,
    start_ino: u32,
) -> FsResult<u32> {
    let mut current = start_ino;
    for component in components(path) {
        let entry = dir_find(device, sb, current, component)?;
        current = entry.ino;
    }
    Ok(current)
}

/// Split `path` into `(parent_path, basename)`, e.g. `/d/e/f` -> `("/d/e", "f")`.
/// Used by `mkdir`/`create` to resolve the parent before adding a new entry.
pub fn split_parent(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    let parent = &trimmed[..idx];
    let base = &trimmed[idx + 1..];
    if base.is_empty() {
        return None;
    }
    let parent = if parent.is_empty() { "/" } else { parent };
    Some((parent, base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::FileBlockDevice;
    use crate::dirent::dir_add;
    use crate::inode::{writei, FileType, VStat};
    use crate::{BLOCK_SIZE, DIRECT_PTR_SIZE, INDIRECT_PTR_SIZE, VALID};
    use tempfile::NamedTempFile;

    fn dev_with_sb() -> (FileBlockDevice, SuperBlock) {
        let f = NamedTempFile::new().unwrap();
        let sb = SuperBlock::canonical();
        let blocks = sb.d_start_blk + 32;
        (FileBlockDevice::init(f.path(), blocks).unwrap(), sb)
    }

    fn blank_dir_inode(ino: u32) -> Inode {
        Inode {
            ino,
            valid: VALID,
            file_type: FileType::Directory.as_u8(),
            size: 0,
            link: 2,
            direct_ptr: [0; DIRECT_PTR_SIZE],
            indirect_ptr: [0; INDIRECT_PTR_SIZE],
            vstat: VStat {
                st_mode: 0o040755,
                st_nlink: 2,
                st_uid: 0,
                st_gid: 0,
                st_size: 0,
                st_blocks: 0,
                st_blksize: BLOCK_SIZE as u32,
                st_mtime: 0,
                st_atime: 0,
                st_ctime: 0,
            },
        }
    }

    #[test]
    fn empty_path_resolves_to_start_inode() {
        let (mut device, sb) = dev_with_sb();
        let root = blank_dir_inode(0);
        writei(&mut device, &sb, &root).unwrap();

        let resolved = get_node_by_path(&mut device, &sb, "", 0).unwrap();
        assert_eq!(resolved.ino, 0);
    }

    #[test]
    fn tolerates_leading_trailing_and_duplicate_slashes() {
        let (mut device, sb) = dev_with_sb();
        let mut root = blank_dir_inode(0);
        writei(&mut device, &sb, &root).unwrap();
        let child = blank_dir_inode(1);
        writei(&mut device, &sb, &child).unwrap();
        dir_add(&mut device, &sb, &mut root, 1, "d").unwrap();

        for p in ["/d", "d/", "//d//", "d"] {
            let resolved = get_node_by_path(&mut device, &sb, p, 0).unwrap();
            assert_eq!(resolved.ino, 1, "path {p:?}");
        }
    }

    #[test]
    fn missing_component_is_not_found() {
        let (mut device, sb) = dev_with_sb();
        let root = blank_dir_inode(0);
        writei(&mut device, &sb, &root).unwrap();

        assert!(get_node_by_path(&mut device, &sb, "/nope", 0).is_err());
    }

    #[test]
    fn split_parent_handles_nested_and_root_level_paths() {
        assert_eq!(split_parent("/d/e/f"), Some(("/d/e", "f")));
        assert_eq!(split_parent("/a.txt"), Some(("/", "a.txt")));
        assert_eq!(split_parent("/"), None);
        assert_eq!(split_parent(""), None);
    }
}
