//! TFS: a tiny disk-image-backed userspace filesystem engine.
//!
//! This crate owns the on-disk layout, metadata, and block I/O: the
//! superblock, the inode and data-block bitmap allocators, the inode table,
//! the directory layer, the pathname resolver, and the read/write path
//! mapping byte ranges onto direct data blocks. It has no dependency on any
//! particular kernel-to-userspace host; `tfs-host` adapts it to `fuser`.

pub mod bitmap;
pub mod block;
pub mod dirent;
pub mod error;
pub mod file_io;
pub mod filesystem;
pub mod format;
pub mod inode;
pub mod path;
pub mod superblock;

pub use block::{BlockDevice, FileBlockDevice};
pub use error::{FsError, FsResult};
pub use filesystem::Filesystem;
pub use inode::{FileType, Inode, VStat};
pub use superblock::{FsConfig, SuperBlock};

/// Bytes per block.
pub const BLOCK_SIZE: usize = 4096;

/// Maximum number of inodes the table can hold.
/// `ceil(MAX_INUM / 8) = 128 <= BLOCK_SIZE`, so the inode bitmap fits one block.
pub const MAX_INUM: u32 = 1024;

/// Maximum number of data blocks the filesystem can address.
/// `ceil(MAX_DNUM / 8) = 2048 <= BLOCK_SIZE`, so the data bitmap fits one block.
pub const MAX_DNUM: u32 = 16384;

/// Direct pointers per inode.
pub const DIRECT_PTR_SIZE: usize = 16;

/// Reserved indirect pointer slots; always zero in this engine.
pub const INDIRECT_PTR_SIZE: usize = 8;

/// Maximum representable file length: `DIRECT_PTR_SIZE * BLOCK_SIZE`.
pub const MAX_FILE_SIZE: u64 = (DIRECT_PTR_SIZE * BLOCK_SIZE) as u64;

/// Sentinel identifying the on-disk format. ASCII "RFS1".
pub const MAGIC_NUM: u32 = 0x5246_5331;

/// Maximum directory-entry name length (not counting any terminator).
pub const MAX_NAME_LEN: usize = 250;

/// `valid` flag value meaning "this record is live".
pub const VALID: u8 = 1;
pub const INVALID: u8 = 0;

pub const INODE_BITMAP_BLOCK: u32 = 1;
pub const DATA_BITMAP_BLOCK: u32 = 2;
pub const INODE_TABLE_START: u32 = 3;

/// Encoded size in bytes of a fixed-size `Inode` record.
///
/// `4 (ino) + 1 (valid) + 1 (file_type) + 8 (size) + 4 (link)
///  + 16*4 (direct_ptr) + 8*4 (indirect_ptr) + 60 (vstat) = 174`
pub const INODE_SIZE: usize = 174;

/// Encoded size in bytes of a fixed-size `DirEntry` record.
///
/// `4 (ino) + 1 (valid) + 1 (len) + 250 (name) = 256`
pub const DIRENT_SIZE: usize = 256;

/// Inode records packed per inode-table block.
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

/// Directory entries packed per directory data block.
pub const NUM_DIR: usize = BLOCK_SIZE / DIRENT_SIZE;

/// Inode number of the root directory.
pub const ROOT_INO: u32 = 0;
