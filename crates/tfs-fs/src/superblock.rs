use crate::error::{FsError, FsResult};
use crate::{BLOCK_SIZE, DATA_BITMAP_BLOCK, INODE_BITMAP_BLOCK, INODE_SIZE, INODE_TABLE_START,
            MAGIC_NUM, MAX_DNUM, MAX_INUM};
use serde::{Deserialize, Serialize};

/// Bundles the geometry knobs a handful of call sites (`mkfs`, `mount`) need
/// to vary without touching the rest of the engine: inode and data-block
/// capacity. `BLOCK_SIZE`, `DIRECT_PTR_SIZE`, and the other layout constants
/// stay fixed `const`s; only the two capacity limits are ever worth changing
/// per image.
#[derive(Debug, Clone, Copy)]
pub struct FsConfig {
    pub max_inum: u32,
    pub max_dnum: u32,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            max_inum: MAX_INUM,
            max_dnum: MAX_DNUM,
        }
    }
}

impl FsConfig {
    /// Each bitmap must fit in exactly one block.
    pub fn validate(&self) -> FsResult<()> {
        let inode_bitmap_bytes = (self.max_inum as u64).div_ceil(8);
        let data_bitmap_bytes = (self.max_dnum as u64).div_ceil(8);
        if inode_bitmap_bytes > BLOCK_SIZE as u64 || data_bitmap_bytes > BLOCK_SIZE as u64 {
            return Err(FsError::Corrupt(
                "max_inum/max_dnum too large for a one-block bitmap",
            ));
        }
        Ok(())
    }

    pub fn layout(&self) -> SuperBlock {
        SuperBlock::layout_for(self.max_inum, self.max_dnum)
    }
}

/// One-block header describing the on-disk geometry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SuperBlock {
    pub magic_num: u32,
    pub max_inum: u32,
    pub max_dnum: u32,
    pub i_bitmap_blk: u32,
    pub d_bitmap_blk: u32,
    pub i_start_blk: u32,
    pub d_start_blk: u32,
}

impl SuperBlock {
    /// Number of inode-table blocks needed to hold `max_inum` fixed-size
    /// inode records: `ceil(max_inum * sizeof(inode) / BLOCK_SIZE)`.
    pub fn inode_table_blocks(max_inum: u32) -> u32 {
        let total_bytes = max_inum as u64 * INODE_SIZE as u64;
        ((total_bytes + BLOCK_SIZE as u64 - 1) / BLOCK_SIZE as u64) as u32
    }

    /// `d_start = 3 + ceil(max_inum * sizeof(inode) / BLOCK_SIZE)`.
    pub fn layout_for(max_inum: u32, max_dnum: u32) -> SuperBlock {
        let d_start_blk = INODE_TABLE_START + Self::inode_table_blocks(max_inum);
        SuperBlock {
            magic_num: MAGIC_NUM,
            max_inum,
            max_dnum,
            i_bitmap_blk: INODE_BITMAP_BLOCK,
            d_bitmap_blk: DATA_BITMAP_BLOCK,
            i_start_blk: INODE_TABLE_START,
            d_start_blk,
        }
    }

    /// The canonical layout for the fixed capacity constants of this crate.
    pub fn canonical() -> SuperBlock {
        Self::layout_for(MAX_INUM, MAX_DNUM)
    }

    pub fn to_bytes(&self) -> FsResult<[u8; BLOCK_SIZE]> {
        let mut buf = [0u8; BLOCK_SIZE];
        let config = bincode::config::standard().with_fixed_int_encoding();
        bincode::serde::encode_into_slice(self, &mut buf[..], config)
            .map_err(|_| FsError::Corrupt("superblock encode failed"))?;
        Ok(buf)
    }

    pub fn from_bytes(buf: &[u8; BLOCK_SIZE]) -> FsResult<SuperBlock> {
        let config = bincode::config::standard().with_fixed_int_encoding();
        let (sb, _): (SuperBlock, usize) = bincode::serde::decode_from_slice(&buf[..], config)
            .map_err(|_| FsError::Corrupt("superblock decode failed"))?;
        if sb.magic_num != MAGIC_NUM {
            return Err(FsError::Corrupt("superblock magic mismatch"));
        }
        Ok(sb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_layout_matches_hand_computation() {
        let sb = SuperBlock::canonical();
        assert_eq!(sb.i_bitmap_blk, 1);
        assert_eq!(sb.d_bitmap_blk, 2);
        assert_eq!(sb.i_start_blk, 3);
        // ceil(1024 * INODE_SIZE / 4096)
        let expected = 3 + SuperBlock::inode_table_blocks(MAX_INUM);
        assert_eq!(sb.d_start_blk, expected);
    }

    #[test]
    fn round_trips_through_block_bytes() {
        let sb = SuperBlock::canonical();
        let bytes = sb.to_bytes().unwrap();
        let back = SuperBlock::from_bytes(&bytes).unwrap();
        assert_eq!(back.max_inum, sb.max_inum);
        assert_eq!(back.d_start_blk, sb.d_start_blk);
    }

    #[test]
    fn rejects_bad_magic() {
        let buf = [0u8; BLOCK_SIZE];
        assert!(SuperBlock::from_bytes(&buf).is_err());
    }

    #[test]
    fn default_config_matches_canonical_layout() {
        let config = FsConfig::default();
        config.validate().unwrap();
        let sb = config.layout();
        assert_eq!(sb.max_inum, SuperBlock::canonical().max_inum);
        assert_eq!(sb.d_start_blk, SuperBlock::canonical().d_start_blk);
    }

    #[test]
    fn oversized_capacity_fails_validation() {
        let config = FsConfig {
            max_inum: BLOCK_SIZE as u32 * 8 + 1,
            max_dnum: MAX_DNUM,
        };
        assert!(config.validate().is_err());
    }
}
