//! Fixed-size inode records and inode-table I/O.

use crate::block::BlockDevice;
use crate::error::{FsError, FsResult};
use crate::superblock::SuperBlock;
use crate::{BLOCK_SIZE, DIRECT_PTR_SIZE, INDIRECT_PTR_SIZE, INODES_PER_BLOCK, INODE_SIZE, VALID};
use serde::{Deserialize, Serialize};

/// 0 = regular file, 1 = directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
}

impl FileType {
    pub fn as_u8(self) -> u8 {
        match self {
            FileType::File => 0,
            FileType::Directory => 1,
        }
    }

    pub fn from_u8(v: u8) -> FsResult<FileType> {
        match v {
            0 => Ok(FileType::File),
            1 => Ok(FileType::Directory),
            _ => Err(FsError::Corrupt("invalid inode file_type")),
        }
    }
}

/// Cached attribute record mirroring standard file attributes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VStat {
    pub st_mode: u32,
    pub st_nlink: u32,
    pub st_uid: u32,
    pub st_gid: u32,
    pub st_size: u64,
    pub st_blocks: u64,
    pub st_blksize: u32,
    pub st_mtime: i64,
    pub st_atime: i64,
    pub st_ctime: i64,
}

/// Fixed-size on-disk inode record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Inode {
    pub ino: u32,
    pub valid: u8,
    pub file_type: u8,
    pub size: u64,
    pub link: u32,
    pub direct_ptr: [u32; DIRECT_PTR_SIZE],
    /// Reserved, always zero in this engine.
    pub indirect_ptr: [u32; INDIRECT_PTR_SIZE],
    pub vstat: VStat,
}

impl Inode {
    pub fn is_valid(&self) -> bool {
        self.valid == VALID
    }

    pub fn file_type(&self) -> FsResult<FileType> {
        FileType::from_u8(self.file_type)
    }

    /// Number of non-zero `direct_ptr` entries.
    pub fn block_count(&self) -> usize {
        self.direct_ptr.iter().filter(|&&p| p != 0).count()
    }

    fn to_bytes(&self) -> FsResult<[u8; INODE_SIZE]> {
        let mut buf = [0u8; INODE_SIZE];
        let config = bincode::config::standard().with_fixed_int_encoding();
        bincode::serde::encode_into_slice(self, &mut buf[..], config)
            .map_err(|_| FsError::Corrupt("inode encode failed"))?;
        Ok(buf)
    }

    fn from_bytes(buf: &[u8]) -> FsResult<Inode> {
        let config = bincode::config::standard().with_fixed_int_encoding();
        let (inode, _): (Inode, usize) = bincode::serde::decode_from_slice(buf, config)
            .map_err(|_| FsError::Corrupt("inode decode failed"))?;
        Ok(inode)
    }
}

/// Block and byte offset of `ino`'s record in the inode table. Reads the
/// block as an array of `INODE_SIZE`-byte records, indexed by
/// `ino mod INODES_PER_BLOCK`.
fn locate(sb: &SuperBlock, ino: u32) -> (u32, usize) {
    let block = sb.i_start_blk + ino / INODES_PER_BLOCK as u32;
    let slot = (ino % INODES_PER_BLOCK as u32) as usize;
    (block, slot * INODE_SIZE)
}

/// Read inode `ino` from the table.
pub fn readi(device: &mut impl BlockDevice, sb: &SuperBlock, ino: u32) -> FsResult<Inode> {
    if ino >= sb.max_inum {
        return Err(FsError::Corrupt("inode number out of range"));
    }
    let (block, offset) = locate(sb, ino);
    let mut buf = [0u8; BLOCK_SIZE];
    device.read_block(block, &mut buf)?;
    Inode::from_bytes(&buf[offset..offset + INODE_SIZE])
}

/// Persist `inode` at its slot in the table.
pub fn writei(device: &mut impl BlockDevice, sb: &SuperBlock, inode: &Inode) -> FsResult<()> {
    if inode.ino >= sb.max_inum {
        return Err(FsError::Corrupt("inode number out of range"));
    }
    let (block, offset) = locate(sb, inode.ino);
    let mut buf = [0u8; BLOCK_SIZE];
    device.read_block(block, &mut buf)?;
    let encoded = inode.to_bytes()?;
    buf[offset..offset + INODE_SIZE].copy_from_slice(&encoded);
    device.write_block(block, &buf)
}
