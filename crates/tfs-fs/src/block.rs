//! Block device abstraction: a fixed-capacity random-access store of
//! uniformly sized blocks. A small trait plus one production implementation
//! backed by a single disk-image file.

use crate::error::{FsError, FsResult};
use crate::BLOCK_SIZE;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// A fixed-capacity random-access store of `BLOCK_SIZE`-byte blocks.
pub trait BlockDevice {
    /// Read exactly one block into `buf`.
    fn read_block(&mut self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> FsResult<()>;

    /// Write exactly one block from `buf`.
    fn write_block(&mut self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> FsResult<()>;

    /// Total number of blocks the device can address.
    fn block_count(&self) -> u32;
}

/// A disk image: one regular file treated as a flat array of
/// `BLOCK_SIZE`-byte blocks.
pub struct FileBlockDevice {
    file: File,
    block_count: u32,
}

impl FileBlockDevice {
    /// Open an existing disk image.
    pub fn open(path: impl AsRef<Path>) -> FsResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        let block_count = (len / BLOCK_SIZE as u64) as u32;
        Ok(Self { file, block_count })
    }

    /// Create a fresh, zero-filled image of `block_count` blocks.
    pub fn init(path: impl AsRef<Path>, block_count: u32) -> FsResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let total_len = block_count as u64 * BLOCK_SIZE as u64;
        file.set_len(total_len)?;
        file.flush()?;
        Ok(Self { file, block_count })
    }
}

impl BlockDevice for FileBlockDevice {
    fn read_block(&mut self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> FsResult<()> {
        if block_id >= self.block_count {
            return Err(FsError::Corrupt("block id out of range"));
        }
        self.file
            .seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&mut self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> FsResult<()> {
        if block_id >= self.block_count {
            return Err(FsError::Corrupt("block id out of range"));
        }
        self.file
            .seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn block_count(&self) -> u32 {
        self.block_count
    }
}
