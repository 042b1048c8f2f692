//! Fixed-size single-bit-per-entry allocation bitmaps.

use crate::block::BlockDevice;
use crate::error::{FsError, FsResult};
use crate::{BLOCK_SIZE, DATA_BITMAP_BLOCK, INODE_BITMAP_BLOCK};

/// A block-sized buffer of packed allocation flags, indexed from 0.
#[derive(Clone)]
pub struct Bitmap {
    bytes: [u8; BLOCK_SIZE],
}

impl Bitmap {
    pub fn zeroed() -> Self {
        Self {
            bytes: [0u8; BLOCK_SIZE],
        }
    }

    pub fn from_block(bytes: [u8; BLOCK_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_block(&self) -> &[u8; BLOCK_SIZE] {
        &self.bytes
    }

    pub fn test(&self, i: u32) -> bool {
        let (byte, bit) = (i / 8, i % 8);
        self.bytes[byte as usize] & (1 << bit) != 0
    }

    pub fn set(&mut self, i: u32) {
        let (byte, bit) = (i / 8, i % 8);
        self.bytes[byte as usize] |= 1 << bit;
    }

    pub fn clear(&mut self, i: u32) {
        let (byte, bit) = (i / 8, i % 8);
        self.bytes[byte as usize] &= !(1 << bit);
    }

    /// First-fit scan for a clear bit below `limit`.
    pub fn first_clear(&self, limit: u32) -> Option<u32> {
        (0..limit).find(|&i| !self.test(i))
    }

    pub fn read(device: &mut impl BlockDevice, block_id: u32) -> FsResult<Self> {
        let mut buf = [0u8; BLOCK_SIZE];
        device.read_block(block_id, &mut buf)?;
        Ok(Self::from_block(buf))
    }

    pub fn write(&self, device: &mut impl BlockDevice, block_id: u32) -> FsResult<()> {
        device.write_block(block_id, &self.bytes)
    }
}

/// Read-scan-set-write first-fit allocation, shared by the inode and
/// data-block allocators. Always persists the bitmap back to disk.
pub fn allocate(
    device: &mut impl BlockDevice,
    bitmap_block: u32,
    limit: u32,
    no_space: &'static str,
) -> FsResult<u32> {
    let mut bitmap = Bitmap::read(device, bitmap_block)?;
    let idx = bitmap.first_clear(limit).ok_or(FsError::NoSpace(no_space))?;
    bitmap.set(idx);
    bitmap.write(device, bitmap_block)?;
    Ok(idx)
}

/// Allocate the next free inode number. `max_inum` comes from the mounted
/// superblock, not a compiled-in constant, so a custom `FsConfig` geometry
/// is honored.
pub fn allocate_inode(device: &mut impl BlockDevice, max_inum: u32) -> FsResult<u32> {
    allocate(device, INODE_BITMAP_BLOCK, max_inum, "inode table full")
}

/// Allocate the next free data block. See `allocate_inode` for why the
/// limit is a parameter rather than a compiled-in constant.
pub fn allocate_block(device: &mut impl BlockDevice, max_dnum: u32) -> FsResult<u32> {
    allocate(device, DATA_BITMAP_BLOCK, max_dnum, "data region full")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::FileBlockDevice;
    use tempfile::NamedTempFile;

    fn dev() -> FileBlockDevice {
        let f = NamedTempFile::new().unwrap();
        FileBlockDevice::init(f.path(), 8).unwrap()
    }

    #[test]
    fn set_test_clear_round_trip() {
        let mut bm = Bitmap::zeroed();
        assert!(!bm.test(5));
        bm.set(5);
        assert!(bm.test(5));
        bm.clear(5);
        assert!(!bm.test(5));
    }

    #[test]
    fn first_fit_allocation_is_monotonic_on_empty_map() {
        let mut device = dev();
        let first = allocate(&mut device, 1, 64, "no space").unwrap();
        let second = allocate(&mut device, 1, 64, "no space").unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 1);
    }

    #[test]
    fn allocation_persists_across_reads() {
        let mut device = dev();
        allocate(&mut device, 1, 64, "no space").unwrap();
        let bm = Bitmap::read(&mut device, 1).unwrap();
        assert!(bm.test(0));
        assert!(!bm.test(1));
    }

    #[test]
    fn allocation_fails_when_exhausted() {
        let mut device = dev();
        for _ in 0..4 {
            allocate(&mut device, 1, 4, "no space").unwrap();
        }
        let err = allocate(&mut device, 1, 4, "no space").unwrap_err();
        assert!(matches!(err, FsError::NoSpace(_)));
    }

    proptest::proptest! {
        #[test]
        fn first_clear_never_reports_a_set_bit(set_idx in 0u32..64) {
            let mut bm = Bitmap::zeroed();
            bm.set(set_idx);
            if let Some(found) = bm.first_clear(64) {
                prop_assert!(!bm.test(found));
            }
        }
    }
}
