//! The operation surface: the callbacks a host invokes, plus the
//! `Filesystem` value that owns the block device and superblock. A
//! `Filesystem` is constructed at mount time and passed by reference to
//! every callback; there is no global state anywhere in this crate.

use crate::bitmap::{self, Bitmap};
use crate::block::BlockDevice;
use crate::dirent::{self, DirEntry};
use crate::error::{FsError, FsResult};
use crate::format;
use crate::inode::{self, FileType, Inode, VStat};
use crate::path;
use crate::superblock::{FsConfig, SuperBlock};
use crate::{BLOCK_SIZE, DIRECT_PTR_SIZE, INDIRECT_PTR_SIZE, ROOT_INO, VALID};

pub struct Filesystem<D: BlockDevice> {
    device: D,
    superblock: SuperBlock,
}

impl<D: BlockDevice> Filesystem<D> {
    /// Loads an already-formatted image. `format_new` builds one first; the
    /// host decides which to call based on whether the disk image already
    /// existed.
    pub fn mount(mut device: D) -> FsResult<Self> {
        let mut buf = [0u8; BLOCK_SIZE];
        device.read_block(0, &mut buf)?;
        let superblock = SuperBlock::from_bytes(&buf)?;
        log::info!(
            "mounted filesystem: {} inodes, {} data blocks, data region at block {}",
            superblock.max_inum,
            superblock.max_dnum,
            superblock.d_start_blk
        );
        Ok(Self { device, superblock })
    }

    pub fn format_new(device: D, uid: u32, gid: u32) -> FsResult<Self> {
        Self::format_new_with_config(device, FsConfig::default(), uid, gid)
    }

    /// Same as `format_new`, but with an explicit inode/data-block capacity
    /// instead of the crate's fixed canonical geometry.
    pub fn format_new_with_config(
        mut device: D,
        config: FsConfig,
        uid: u32,
        gid: u32,
    ) -> FsResult<Self> {
        let superblock = format::mkfs_with_config(&mut device, config, uid, gid)?;
        Ok(Self { device, superblock })
    }

    /// Drops the device, closing the disk image. No dirty state: every
    /// mutation was already write-through.
    pub fn unmount(self) {
        log::info!("unmounted filesystem");
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    /// Re-reads the inode bitmap from disk and counts clear bits. Always
    /// current: there is no in-memory copy to fall out of sync with an
    /// allocation made elsewhere.
    pub fn free_inodes(&mut self) -> FsResult<u32> {
        let bitmap = Bitmap::read(&mut self.device, self.superblock.i_bitmap_blk)?;
        let used = (0..self.superblock.max_inum).filter(|&i| bitmap.test(i)).count() as u32;
        Ok(self.superblock.max_inum - used)
    }

    /// Re-reads the data bitmap from disk and counts clear bits.
    pub fn free_blocks(&mut self) -> FsResult<u32> {
        let bitmap = Bitmap::read(&mut self.device, self.superblock.d_bitmap_blk)?;
        let used = (0..self.superblock.max_dnum).filter(|&b| bitmap.test(b)).count() as u32;
        Ok(self.superblock.max_dnum - used)
    }

    fn resolve(&mut self, path: &str) -> FsResult<Inode> {
        path::get_node_by_path(&mut self.device, &self.superblock, path, ROOT_INO)
    }

    fn resolve_directory(&mut self, path: &str) -> FsResult<Inode> {
        let inode = self.resolve(path)?;
        if inode.file_type()? != FileType::Directory {
            return Err(FsError::NotFound(format!("{path}: not a directory")));
        }
        Ok(inode)
    }

    pub fn getattr(&mut self, path: &str) -> FsResult<VStat> {
        Ok(self.resolve(path)?.vstat)
    }

    /// Resolve and confirm it is a directory. No per-handle state is
    /// retained, so this simply returns the inode number.
    pub fn opendir(&mut self, path: &str) -> FsResult<u32> {
        Ok(self.resolve_directory(path)?.ino)
    }

    /// Resolve, return the inode number.
    pub fn open(&mut self, path: &str) -> FsResult<u32> {
        Ok(self.resolve(path)?.ino)
    }

    pub fn readdir(&mut self, path: &str, mut filler: impl FnMut(&str, u32)) -> FsResult<()> {
        let dir = self.resolve_directory(path)?;
        for (name, ino) in dirent::dir_list(&mut self.device, &self.superblock, dir.ino)? {
            filler(&name, ino);
        }
        Ok(())
    }

    pub fn mkdir(&mut self, path: &str, uid: u32, gid: u32) -> FsResult<VStat> {
        let (parent_path, base) = path::split_parent(path)
            .ok_or_else(|| FsError::Exists("/".to_string()))?;
        let parent_ino = path::resolve_ino(&mut self.device, &self.superblock, parent_path, ROOT_INO)?;
        self.mkdir_in(parent_ino, base, uid, gid).map(|(_, vstat)| vstat)
    }

    /// Same as `mkdir`, but takes an already-resolved parent inode number
    /// instead of a path, and returns the new inode's number alongside its
    /// `vstat`. `tfs-host` calls this directly: the kernel's VFS hands FUSE a
    /// parent inode and a basename, never a path, and it needs the new
    /// inode number to answer the kernel's `lookup` reply.
    pub fn mkdir_in(&mut self, parent_ino: u32, name: &str, uid: u32, gid: u32) -> FsResult<(u32, VStat)> {
        if dirent::dir_find(&mut self.device, &self.superblock, parent_ino, name).is_ok() {
            return Err(FsError::Exists(name.to_string()));
        }
        let new_ino = bitmap::allocate_inode(&mut self.device, self.superblock.max_inum)?;
        let data_block = bitmap::allocate_block(&mut self.device, self.superblock.max_dnum)?;

        let mut direct_ptr = [0u32; DIRECT_PTR_SIZE];
        direct_ptr[0] = data_block;
        let vstat = format::new_directory_vstat(uid, gid);
        let new_inode = Inode {
            ino: new_ino,
            valid: VALID,
            file_type: FileType::Directory.as_u8(),
            size: vstat.st_size,
            link: 2,
            direct_ptr,
            indirect_ptr: [0; INDIRECT_PTR_SIZE],
            vstat,
        };
        inode::writei(&mut self.device, &self.superblock, &new_inode)?;
        format::write_dot_entries(&mut self.device, data_block, new_ino, parent_ino)?;

        let mut parent_inode = inode::readi(&mut self.device, &self.superblock, parent_ino)?;
        // A new subdirectory's ".." links back to its parent, so the
        // parent picks up one more hard link.
        parent_inode.vstat.st_nlink += 1;
        parent_inode.link += 1;
        dirent::dir_add(&mut self.device, &self.superblock, &mut parent_inode, new_ino, name)?;

        log::debug!("mkdir {name} in inode {parent_ino} -> inode {new_ino}");
        Ok((new_ino, new_inode.vstat))
    }

    pub fn create(&mut self, path: &str, uid: u32, gid: u32) -> FsResult<VStat> {
        let (parent_path, base) = path::split_parent(path)
            .ok_or_else(|| FsError::Exists("/".to_string()))?;
        let parent_ino = path::resolve_ino(&mut self.device, &self.superblock, parent_path, ROOT_INO)?;
        self.create_in(parent_ino, base, uid, gid).map(|(_, vstat)| vstat)
    }

    /// Same as `create`, but takes an already-resolved parent inode number
    /// and returns the new inode's number alongside its `vstat` (see
    /// `mkdir_in`).
    pub fn create_in(&mut self, parent_ino: u32, name: &str, uid: u32, gid: u32) -> FsResult<(u32, VStat)> {
        if dirent::dir_find(&mut self.device, &self.superblock, parent_ino, name).is_ok() {
            return Err(FsError::Exists(name.to_string()));
        }
        let new_ino = bitmap::allocate_inode(&mut self.device, self.superblock.max_inum)?;
        let data_block = bitmap::allocate_block(&mut self.device, self.superblock.max_dnum)?;
        let zeroed = [0u8; BLOCK_SIZE];
        self.device.write_block(data_block, &zeroed)?;

        let mut direct_ptr = [0u32; DIRECT_PTR_SIZE];
        direct_ptr[0] = data_block;
        let vstat = format::new_file_vstat(uid, gid);
        let new_inode = Inode {
            ino: new_ino,
            valid: VALID,
            file_type: FileType::File.as_u8(),
            size: 0,
            link: 1,
            direct_ptr,
            indirect_ptr: [0; INDIRECT_PTR_SIZE],
            vstat,
        };
        inode::writei(&mut self.device, &self.superblock, &new_inode)?;

        let mut parent_inode = inode::readi(&mut self.device, &self.superblock, parent_ino)?;
        dirent::dir_add(&mut self.device, &self.superblock, &mut parent_inode, new_ino, name)?;

        log::debug!("create {name} in inode {parent_ino} -> inode {new_ino}");
        Ok((new_ino, new_inode.vstat))
    }

    /// Read through a path instead of a bare inode number.
    pub fn read(&mut self, path: &str, offset: u64, out_buf: &mut [u8]) -> FsResult<usize> {
        let ino = self.open(path)?;
        crate::file_io::read(&mut self.device, &self.superblock, ino, offset, out_buf)
    }

    pub fn write(&mut self, path: &str, offset: u64, in_buf: &[u8]) -> FsResult<usize> {
        let ino = self.open(path)?;
        crate::file_io::write(&mut self.device, &self.superblock, ino, offset, in_buf)
    }

    pub fn read_ino(&mut self, ino: u32, offset: u64, out_buf: &mut [u8]) -> FsResult<usize> {
        crate::file_io::read(&mut self.device, &self.superblock, ino, offset, out_buf)
    }

    pub fn write_ino(&mut self, ino: u32, offset: u64, in_buf: &[u8]) -> FsResult<usize> {
        crate::file_io::write(&mut self.device, &self.superblock, ino, offset, in_buf)
    }

    pub fn getattr_ino(&mut self, ino: u32) -> FsResult<VStat> {
        Ok(inode::readi(&mut self.device, &self.superblock, ino)?.vstat)
    }

    pub fn lookup_child(&mut self, parent_ino: u32, name: &str) -> FsResult<DirEntry> {
        dirent::dir_find(&mut self.device, &self.superblock, parent_ino, name)
    }

    pub fn readdir_ino(&mut self, dir_ino: u32, mut filler: impl FnMut(&str, u32)) -> FsResult<()> {
        for (name, ino) in dirent::dir_list(&mut self.device, &self.superblock, dir_ino)? {
            filler(&name, ino);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::FileBlockDevice;
    use tempfile::NamedTempFile;

    fn fresh_fs() -> Filesystem<FileBlockDevice> {
        let f = NamedTempFile::new().unwrap();
        let sb = SuperBlock::canonical();
        let device = FileBlockDevice::init(f.path(), sb.d_start_blk + 128).unwrap();
        Filesystem::format_new(device, 1000, 1000).unwrap()
    }

    #[test]
    fn scenario_format_and_mount_root_attrs() {
        let mut fs = fresh_fs();
        let attrs = fs.getattr("/").unwrap();
        assert_eq!(attrs.st_mode, 0o040000 | 0o755);
        assert_eq!(attrs.st_nlink, 2);
    }

    #[test]
    fn scenario_create_and_stat() {
        let mut fs = fresh_fs();
        let created = fs.create("/a.txt", 1000, 1000).unwrap();
        assert_eq!(created.st_mode, 0o100000 | 0o666);
        assert_eq!(created.st_size, 0);

        let stat = fs.getattr("/a.txt").unwrap();
        assert_eq!(stat.st_size, 0);
    }

    #[test]
    fn scenario_write_then_read() {
        let mut fs = fresh_fs();
        fs.create("/a.txt", 0, 0).unwrap();
        let n = fs.write("/a.txt", 0, b"hello").unwrap();
        assert_eq!(n, 5);

        let mut buf = [0u8; 5];
        let read_n = fs.read("/a.txt", 0, &mut buf).unwrap();
        assert_eq!(read_n, 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn scenario_cross_block_write() {
        let mut fs = fresh_fs();
        fs.create("/a.txt", 0, 0).unwrap();
        let data = vec![0x42u8; 4096];
        let n = fs.write("/a.txt", 4000, &data).unwrap();
        assert_eq!(n, 4096);

        let mut buf = vec![0u8; 4096];
        let read_n = fs.read("/a.txt", 4000, &mut buf).unwrap();
        assert_eq!(read_n, 4096);
        assert_eq!(buf, data);

        let ino = fs.open("/a.txt").unwrap();
        let attrs = fs.getattr_ino(ino).unwrap();
        assert!(attrs.st_blocks >= 2);
    }

    #[test]
    fn scenario_mkdir_hierarchy_and_readdir() {
        let mut fs = fresh_fs();
        fs.mkdir("/d", 0, 0).unwrap();
        fs.mkdir("/d/e", 0, 0).unwrap();
        fs.create("/d/e/f", 0, 0).unwrap();

        let mut seen = Vec::new();
        fs.readdir("/d/e", |name, _ino| seen.push(name.to_string()))
            .unwrap();
        seen.sort();
        assert_eq!(seen, vec![".".to_string(), "..".to_string(), "f".to_string()]);
    }

    #[test]
    fn scenario_duplicate_create_is_rejected() {
        let mut fs = fresh_fs();
        fs.create("/a.txt", 0, 0).unwrap();
        let err = fs.create("/a.txt", 0, 0).unwrap_err();
        assert!(matches!(err, FsError::Exists(_)));
    }

    #[test]
    fn getattr_on_missing_path_is_not_found() {
        let mut fs = fresh_fs();
        let err = fs.getattr("/nope").unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[test]
    fn mkdir_grows_parent_nlink() {
        let mut fs = fresh_fs();
        fs.mkdir("/d", 0, 0).unwrap();
        let attrs = fs.getattr("/").unwrap();
        assert!(attrs.st_nlink >= 3);
    }
}
