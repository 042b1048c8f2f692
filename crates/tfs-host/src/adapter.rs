//! The `fuser::Filesystem` adapter: translates kernel VFS operations into
//! calls on the `tfs-fs` operation surface. This module owns no on-disk
//! state of its own; every mutation and every lookup goes straight through
//! to `tfs_fs::Filesystem`.

use std::ffi::OsStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType as FuseFileType, Filesystem as FuseFilesystem, ReplyAttr, ReplyCreate,
    ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request,
};
use tfs_fs::{BlockDevice, Filesystem, VStat, BLOCK_SIZE, ROOT_INO};

use crate::errno::to_errno;

/// Attribute cache validity handed back to the kernel on every reply. This
/// engine has no write-back cache and no concurrent writers, so a short TTL
/// only limits how quickly external changes to the image would be noticed,
/// which never happens outside this process.
const TTL: Duration = Duration::from_secs(1);

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;

/// FUSE reserves inode 1 for the mount root; this engine's root inode is 0.
/// The adapter is the only place that ever does this translation;
/// `tfs_fs::Filesystem` always speaks in its own inode numbers.
fn fuse_ino(ino: u32) -> u64 {
    ino as u64 + 1
}

fn engine_ino(ino: u64) -> u32 {
    (ino - 1) as u32
}

fn unix_time(secs: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

fn file_attr(ino: u64, vstat: &VStat) -> FileAttr {
    let kind = if vstat.st_mode & S_IFMT == S_IFDIR {
        FuseFileType::Directory
    } else {
        FuseFileType::RegularFile
    };
    FileAttr {
        ino,
        size: vstat.st_size,
        blocks: vstat.st_blocks,
        atime: unix_time(vstat.st_atime),
        mtime: unix_time(vstat.st_mtime),
        ctime: unix_time(vstat.st_ctime),
        crtime: unix_time(vstat.st_ctime),
        kind,
        perm: (vstat.st_mode & 0o7777) as u16,
        nlink: vstat.st_nlink,
        uid: vstat.st_uid,
        gid: vstat.st_gid,
        rdev: 0,
        blksize: vstat.st_blksize,
        flags: 0,
    }
}

/// Decode a FUSE `&OsStr` name into UTF-8, the only encoding `tfs-fs`'s
/// directory entries understand.
fn decode_name(name: &OsStr) -> Option<&str> {
    name.to_str()
}

/// Adapts a mounted `tfs_fs::Filesystem` to the `fuser` low-level FUSE ABI.
pub struct TfsFuse<D: BlockDevice> {
    fs: Filesystem<D>,
}

impl<D: BlockDevice> TfsFuse<D> {
    pub fn new(fs: Filesystem<D>) -> Self {
        Self { fs }
    }
}

impl<D: BlockDevice> FuseFilesystem for TfsFuse<D> {
    fn init(
        &mut self,
        _req: &Request<'_>,
        _config: &mut fuser::KernelConfig,
    ) -> Result<(), libc::c_int> {
        log::info!("tfs mounted");
        Ok(())
    }

    fn destroy(&mut self) {
        log::info!("tfs unmounting");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = decode_name(name) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.fs.lookup_child(engine_ino(parent), name) {
            Ok(entry) => match self.fs.getattr_ino(entry.ino) {
                Ok(vstat) => reply.entry(&TTL, &file_attr(fuse_ino(entry.ino), &vstat), 0),
                Err(e) => reply.error(to_errno(&e)),
            },
            Err(e) => reply.error(to_errno(&e)),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        match self.fs.getattr_ino(engine_ino(ino)) {
            Ok(vstat) => reply.attr(&TTL, &file_attr(ino, &vstat)),
            Err(e) => reply.error(to_errno(&e)),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, _ino: u64, _flags: i32, reply: ReplyOpen) {
        // No per-handle state is retained: `readdir` always re-reads the
        // directory's data blocks from scratch.
        reply.opened(0, 0);
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let mut entries = Vec::new();
        if let Err(e) = self.fs.readdir_ino(engine_ino(ino), |name, child_ino| {
            entries.push((child_ino, name.to_string()));
        }) {
            reply.error(to_errno(&e));
            return;
        }

        for (i, (child_ino, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            let kind = match self.fs.getattr_ino(child_ino) {
                Ok(vstat) if vstat.st_mode & S_IFMT == S_IFDIR => FuseFileType::Directory,
                _ => FuseFileType::RegularFile,
            };
            // `add` returns true when the reply buffer is full; the kernel
            // will call `readdir` again with a later `offset` to continue.
            if reply.add(fuse_ino(child_ino), (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(0, 0);
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let mut buf = vec![0u8; size as usize];
        match self.fs.read_ino(engine_ino(ino), offset as u64, &mut buf) {
            Ok(n) => reply.data(&buf[..n]),
            Err(e) => reply.error(to_errno(&e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        match self.fs.write_ino(engine_ino(ino), offset as u64, data) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(to_errno(&e)),
        }
    }

    fn mkdir(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(name) = decode_name(name) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self
            .fs
            .mkdir_in(engine_ino(parent), name, req.uid(), req.gid())
        {
            Ok((new_ino, vstat)) => reply.entry(&TTL, &file_attr(fuse_ino(new_ino), &vstat), 0),
            Err(e) => reply.error(to_errno(&e)),
        }
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(name) = decode_name(name) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self
            .fs
            .create_in(engine_ino(parent), name, req.uid(), req.gid())
        {
            Ok((new_ino, vstat)) => {
                reply.created(&TTL, &file_attr(fuse_ino(new_ino), &vstat), 0, 0, 0)
            }
            Err(e) => reply.error(to_errno(&e)),
        }
    }

    /// File deletion is out of scope for this adapter: the library has a
    /// working `dirent::dir_remove`, but this callback stays a stub so a
    /// mounted filesystem never exposes a half-specified delete path.
    fn unlink(&mut self, _req: &Request<'_>, _parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.error(libc::ENOSYS);
    }

    fn rmdir(&mut self, _req: &Request<'_>, _parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.error(libc::ENOSYS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfs_test_support::MemBlockDevice;

    fn mounted() -> TfsFuse<MemBlockDevice> {
        let sb = tfs_fs::SuperBlock::canonical();
        let device = MemBlockDevice::new(sb.d_start_blk + 64);
        TfsFuse::new(Filesystem::format_new(device, 0, 0).unwrap())
    }

    #[test]
    fn root_maps_to_fuse_inode_one() {
        assert_eq!(fuse_ino(ROOT_INO), 1);
        assert_eq!(engine_ino(1), ROOT_INO);
    }

    #[test]
    fn file_attr_reports_directory_kind_for_dir_mode() {
        let vstat = VStat {
            st_mode: S_IFDIR | 0o755,
            st_nlink: 2,
            st_uid: 0,
            st_gid: 0,
            st_size: 0,
            st_blocks: 1,
            st_blksize: BLOCK_SIZE as u32,
            st_mtime: 0,
            st_atime: 0,
            st_ctime: 0,
        };
        let attr = file_attr(1, &vstat);
        assert_eq!(attr.kind, FuseFileType::Directory);
        assert_eq!(attr.perm, 0o755);
    }

    #[test]
    fn create_in_is_reachable_through_the_adapter_state() {
        let mut tfs = mounted();
        let (new_ino, vstat) = tfs.fs.create_in(ROOT_INO, "a.txt", 0, 0).unwrap();
        assert!(new_ino > ROOT_INO);
        assert_eq!(vstat.st_size, 0);

        let found = tfs.fs.lookup_child(ROOT_INO, "a.txt").unwrap();
        assert_eq!(found.ino, new_ino);
    }
}
