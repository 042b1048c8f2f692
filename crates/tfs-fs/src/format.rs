//! `mkfs`: build a fresh filesystem image.

use crate::bitmap::{self, Bitmap};
use crate::block::BlockDevice;
use crate::dirent::DirEntry;
use crate::error::FsResult;
use crate::inode::{writei, FileType, Inode, VStat};
use crate::superblock::{FsConfig, SuperBlock};
use crate::{BLOCK_SIZE, DATA_BITMAP_BLOCK, DIRECT_PTR_SIZE, INDIRECT_PTR_SIZE, INODE_BITMAP_BLOCK,
            ROOT_INO, VALID};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock seconds, used for `mtime`/`atime`/`ctime`.
pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// `S_IFDIR`. Kept local rather than pulled from `libc` so `tfs-fs` has no
/// host dependency; `tfs-host` uses `libc`'s definition at its own boundary.
const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;

/// Format a freshly-initialized block device using the canonical geometry.
pub fn mkfs(device: &mut impl BlockDevice, uid: u32, gid: u32) -> FsResult<SuperBlock> {
    mkfs_with_config(device, FsConfig::default(), uid, gid)
}

/// Same as `mkfs`, but with an explicit inode/data-block capacity instead of
/// the crate's fixed canonical geometry. The one knob `tfs-mkfs --inodes`
/// and `--data-blocks` actually varies per image.
pub fn mkfs_with_config(
    device: &mut impl BlockDevice,
    config: FsConfig,
    uid: u32,
    gid: u32,
) -> FsResult<SuperBlock> {
    config.validate()?;
    let sb = config.layout();
    device.write_block(0, &sb.to_bytes()?)?;

    // Data bitmap: mark every block below d_start_blk (the metadata region)
    // as used, so block address 0 is never handed out.
    let mut data_bitmap = Bitmap::zeroed();
    for b in 0..sb.d_start_blk {
        data_bitmap.set(b);
    }
    data_bitmap.write(device, DATA_BITMAP_BLOCK)?;

    // Inode bitmap starts empty; allocate_inode() below claims bit 0.
    Bitmap::zeroed().write(device, INODE_BITMAP_BLOCK)?;

    let root_ino = bitmap::allocate_inode(device, sb.max_inum)?;
    debug_assert_eq!(root_ino, ROOT_INO);

    let root_data_block = bitmap::allocate_block(device, sb.max_dnum)?;

    let mut direct_ptr = [0u32; DIRECT_PTR_SIZE];
    direct_ptr[0] = root_data_block;

    let ts = now();
    let root_inode = Inode {
        ino: root_ino,
        valid: VALID,
        file_type: FileType::Directory.as_u8(),
        size: 2 * crate::DIRENT_SIZE as u64,
        link: 2,
        direct_ptr,
        indirect_ptr: [0; INDIRECT_PTR_SIZE],
        vstat: VStat {
            st_mode: S_IFDIR | 0o755,
            st_nlink: 2,
            st_uid: uid,
            st_gid: gid,
            st_size: 2 * crate::DIRENT_SIZE as u64,
            st_blocks: 1,
            st_blksize: BLOCK_SIZE as u32,
            st_mtime: ts,
            st_atime: ts,
            st_ctime: ts,
        },
    };
    writei(device, &sb, &root_inode)?;

    write_dot_entries(device, root_data_block, root_ino, root_ino)?;

    log::info!(
        "formatted image: {} inodes, {} data blocks, data region starts at block {}",
        sb.max_inum,
        sb.max_dnum,
        sb.d_start_blk
    );

    Ok(sb)
}

/// Initialize a directory's first data block with the two mandatory live
/// entries `.` -> self and `..` -> parent.
pub fn write_dot_entries(
    device: &mut impl BlockDevice,
    block_id: u32,
    self_ino: u32,
    parent_ino: u32,
) -> FsResult<()> {
    let mut buf = [0u8; BLOCK_SIZE];
    let dot = DirEntry::new(self_ino, ".")?;
    let dotdot = DirEntry::new(parent_ino, "..")?;
    let dot_bytes = encode_entry(&dot)?;
    let dotdot_bytes = encode_entry(&dotdot)?;
    buf[0..crate::DIRENT_SIZE].copy_from_slice(&dot_bytes);
    buf[crate::DIRENT_SIZE..2 * crate::DIRENT_SIZE].copy_from_slice(&dotdot_bytes);
    device.write_block(block_id, &buf)
}

fn encode_entry(entry: &DirEntry) -> FsResult<[u8; crate::DIRENT_SIZE]> {
    let mut buf = [0u8; crate::DIRENT_SIZE];
    let config = bincode::config::standard().with_fixed_int_encoding();
    bincode::serde::encode_into_slice(entry, &mut buf[..], config)
        .map_err(|_| crate::FsError::Corrupt("dirent encode failed"))?;
    Ok(buf)
}

/// Default `vstat` for a brand-new directory created via `mkdir`.
pub fn new_directory_vstat(uid: u32, gid: u32) -> VStat {
    let ts = now();
    VStat {
        st_mode: S_IFDIR | 0o755,
        st_nlink: 2,
        st_uid: uid,
        st_gid: gid,
        st_size: 2 * crate::DIRENT_SIZE as u64,
        st_blocks: 1,
        st_blksize: BLOCK_SIZE as u32,
        st_mtime: ts,
        st_atime: ts,
        st_ctime: ts,
    }
}

/// Default `vstat` for a brand-new regular file created via `create`.
pub fn new_file_vstat(uid: u32, gid: u32) -> VStat {
    let ts = now();
    VStat {
        st_mode: S_IFREG | 0o666,
        st_nlink: 1,
        st_uid: uid,
        st_gid: gid,
        st_size: 0,
        st_blocks: 1,
        st_blksize: BLOCK_SIZE as u32,
        st_mtime: ts,
        st_atime: ts,
        st_ctime: ts,
    }
}
