//! Test-only helpers shared across the workspace: an in-memory block device
//! and disk-image fixture builders.
//!
//! `tfs-fs` gives the block device abstraction one production
//! implementation, `FileBlockDevice`. This crate gives it a second,
//! test-friendly one backed by a `Vec`.

use std::path::PathBuf;
use tempfile::NamedTempFile;
use tfs_fs::{BlockDevice, FileBlockDevice, Filesystem, FsError, FsResult, SuperBlock, BLOCK_SIZE};

/// A block device backed by an in-memory buffer. Fast unit tests that never
/// need to inspect bytes on disk after the fact should prefer this over
/// `FileBlockDevice`.
pub struct MemBlockDevice {
    blocks: Vec<[u8; BLOCK_SIZE]>,
}

impl MemBlockDevice {
    pub fn new(block_count: u32) -> Self {
        Self {
            blocks: vec![[0u8; BLOCK_SIZE]; block_count as usize],
        }
    }
}

impl BlockDevice for MemBlockDevice {
    fn read_block(&mut self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> FsResult<()> {
        let block = self
            .blocks
            .get(block_id as usize)
            .ok_or(FsError::Corrupt("block id out of range"))?;
        buf.copy_from_slice(block);
        Ok(())
    }

    fn write_block(&mut self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> FsResult<()> {
        let block = self
            .blocks
            .get_mut(block_id as usize)
            .ok_or(FsError::Corrupt("block id out of range"))?;
        block.copy_from_slice(buf);
        Ok(())
    }

    fn block_count(&self) -> u32 {
        self.blocks.len() as u32
    }
}

/// A freshly formatted in-memory filesystem with room for `extra_blocks` data
/// blocks beyond the metadata region.
pub fn formatted_mem_fs(extra_blocks: u32) -> Filesystem<MemBlockDevice> {
    let sb = SuperBlock::canonical();
    let device = MemBlockDevice::new(sb.d_start_blk + extra_blocks);
    Filesystem::format_new(device, 0, 0).expect("format_new on a fresh in-memory device cannot fail")
}

/// A temporary disk-image file, already formatted. Keeps the `NamedTempFile`
/// alive so the path stays valid for the fixture's lifetime; `tfs-host`'s
/// integration tests reopen `path` to drive the `fuser::Filesystem` adapter
/// against a real file on disk.
pub struct DiskFixture {
    _file: NamedTempFile,
    pub path: PathBuf,
}

impl DiskFixture {
    pub fn formatted(extra_blocks: u32) -> FsResult<(Self, Filesystem<FileBlockDevice>)> {
        let file = NamedTempFile::new()?;
        let sb = SuperBlock::canonical();
        let device = FileBlockDevice::init(file.path(), sb.d_start_blk + extra_blocks)?;
        let fs = Filesystem::format_new(device, 0, 0)?;
        let path = file.path().to_path_buf();
        Ok((Self { _file: file, path }, fs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_block_device_round_trips_a_block() {
        let mut dev = MemBlockDevice::new(4);
        let written = [0xABu8; BLOCK_SIZE];
        dev.write_block(1, &written).unwrap();
        let mut readback = [0u8; BLOCK_SIZE];
        dev.read_block(1, &mut readback).unwrap();
        assert_eq!(readback, written);
    }

    #[test]
    fn out_of_range_block_is_rejected() {
        let mut dev = MemBlockDevice::new(2);
        let mut buf = [0u8; BLOCK_SIZE];
        assert!(dev.read_block(5, &mut buf).is_err());
    }

    #[test]
    fn formatted_mem_fs_has_a_live_root() {
        let mut fs = formatted_mem_fs(64);
        let attrs = fs.getattr("/").unwrap();
        assert_eq!(attrs.st_nlink, 2);
    }

    #[test]
    fn disk_fixture_produces_a_reopenable_image() {
        let (fixture, fs) = DiskFixture::formatted(64).unwrap();
        fs.unmount();
        let device = FileBlockDevice::open(&fixture.path).unwrap();
        Filesystem::mount(device).unwrap().unmount();
    }
}
