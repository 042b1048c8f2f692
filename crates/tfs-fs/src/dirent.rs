//! Directory entries and directory operations.

use crate::block::BlockDevice;
use crate::error::{FsError, FsResult};
use crate::inode::{readi, writei, Inode};
use crate::superblock::SuperBlock;
use crate::{bitmap, BLOCK_SIZE, DIRENT_SIZE, INVALID, MAX_NAME_LEN, NUM_DIR, VALID};
use serde::{Deserialize, Serialize};

/// Fixed-size name-to-inode binding stored in a directory's data blocks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DirEntry {
    pub ino: u32,
    pub valid: u8,
    pub len: u8,
    pub name: [u8; MAX_NAME_LEN],
}

impl DirEntry {
    pub fn new(ino: u32, name: &str) -> FsResult<DirEntry> {
        let bytes = name.as_bytes();
        if bytes.len() > MAX_NAME_LEN {
            return Err(FsError::Corrupt("name too long"));
        }
        let mut buf = [0u8; MAX_NAME_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(DirEntry {
            ino,
            valid: VALID,
            len: bytes.len() as u8,
            name: buf,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.valid == VALID
    }

    pub fn name_str(&self) -> &str {
        let end = self.len as usize;
        core::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    fn to_bytes(&self) -> FsResult<[u8; DIRENT_SIZE]> {
        let mut buf = [0u8; DIRENT_SIZE];
        let config = bincode::config::standard().with_fixed_int_encoding();
        bincode::serde::encode_into_slice(self, &mut buf[..], config)
            .map_err(|_| FsError::Corrupt("dirent encode failed"))?;
        Ok(buf)
    }

    fn from_bytes(buf: &[u8]) -> FsResult<DirEntry> {
        let config = bincode::config::standard().with_fixed_int_encoding();
        let (entry, _): (DirEntry, usize) = bincode::serde::decode_from_slice(buf, config)
            .map_err(|_| FsError::Corrupt("dirent decode failed"))?;
        Ok(entry)
    }
}

fn slot_range(j: usize) -> std::ops::Range<usize> {
    j * DIRENT_SIZE..(j + 1) * DIRENT_SIZE
}

/// Scan `dir_inode`'s allocated blocks in `direct_ptr` order for a live entry
/// matching `name`. Returns `(block_id, slot_index, entry)` on a hit.
fn scan(
    device: &mut impl BlockDevice,
    dir_inode: &Inode,
    name: &str,
) -> FsResult<Option<(u32, usize, DirEntry)>> {
    for &block_id in dir_inode.direct_ptr.iter() {
        if block_id == 0 {
            break;
        }
        let mut buf = [0u8; BLOCK_SIZE];
        device.read_block(block_id, &mut buf)?;
        for j in 0..NUM_DIR {
            let entry = DirEntry::from_bytes(&buf[slot_range(j)])?;
            if entry.is_valid() && entry.name_str() == name {
                return Ok(Some((block_id, j, entry)));
            }
        }
    }
    Ok(None)
}

/// Find a live entry by name, updating the directory inode's `atime` on a hit.
pub fn dir_find(
    device: &mut impl BlockDevice,
    sb: &SuperBlock,
    dir_ino: u32,
    name: &str,
) -> FsResult<DirEntry> {
    let mut dir_inode = readi(device, sb, dir_ino)?;
    match scan(device, &dir_inode, name)? {
        Some((_, _, entry)) => {
            dir_inode.vstat.st_atime = crate::format::now();
            writei(device, sb, &dir_inode)?;
            Ok(entry)
        }
        None => Err(FsError::NotFound(name.to_string())),
    }
}

/// Reject duplicates, find the first free slot (allocating a fresh block if
/// every existing block is full), write the new entry, and persist both the
/// data block and the directory inode.
pub fn dir_add(
    device: &mut impl BlockDevice,
    sb: &SuperBlock,
    dir_inode: &mut Inode,
    f_ino: u32,
    name: &str,
) -> FsResult<()> {
    if scan(device, dir_inode, name)?.is_some() {
        return Err(FsError::Exists(name.to_string()));
    }

    let new_entry = DirEntry::new(f_ino, name)?;

    for k in 0..dir_inode.direct_ptr.len() {
        let block_id = dir_inode.direct_ptr[k];

        if block_id == 0 {
            let new_block = bitmap::allocate_block(device, sb.max_dnum)?;
            let zeroed = [0u8; BLOCK_SIZE];
            device.write_block(new_block, &zeroed)?;
            dir_inode.direct_ptr[k] = new_block;
            dir_inode.vstat.st_blocks += 1;

            write_entry_at(device, new_block, 0, &new_entry)?;
            return persist_after_add(device, sb, dir_inode);
        }

        let mut buf = [0u8; BLOCK_SIZE];
        device.read_block(block_id, &mut buf)?;
        for j in 0..NUM_DIR {
            let entry = DirEntry::from_bytes(&buf[slot_range(j)])?;
            if !entry.is_valid() {
                write_entry_at(device, block_id, j, &new_entry)?;
                return persist_after_add(device, sb, dir_inode);
            }
        }
    }

    Err(FsError::NoSpace("directory direct pointers exhausted"))
}

fn write_entry_at(
    device: &mut impl BlockDevice,
    block_id: u32,
    slot: usize,
    entry: &DirEntry,
) -> FsResult<()> {
    let mut buf = [0u8; BLOCK_SIZE];
    device.read_block(block_id, &mut buf)?;
    buf[slot_range(slot)].copy_from_slice(&entry.to_bytes()?);
    device.write_block(block_id, &buf)
}

fn persist_after_add(
    device: &mut impl BlockDevice,
    sb: &SuperBlock,
    dir_inode: &mut Inode,
) -> FsResult<()> {
    dir_inode.size += DIRENT_SIZE as u64;
    dir_inode.vstat.st_size += DIRENT_SIZE as u64;
    dir_inode.vstat.st_mtime = crate::format::now();
    writei(device, sb, dir_inode)
}

/// List every live entry in `dir_ino`'s data blocks, in on-disk order.
pub fn dir_list(
    device: &mut impl BlockDevice,
    sb: &SuperBlock,
    dir_ino: u32,
) -> FsResult<Vec<(String, u32)>> {
    let dir_inode = readi(device, sb, dir_ino)?;
    let mut out = Vec::new();
    for &block_id in dir_inode.direct_ptr.iter() {
        if block_id == 0 {
            break;
        }
        let mut buf = [0u8; BLOCK_SIZE];
        device.read_block(block_id, &mut buf)?;
        for j in 0..NUM_DIR {
            let entry = DirEntry::from_bytes(&buf[slot_range(j)])?;
            if entry.is_valid() {
                out.push((entry.name_str().to_string(), entry.ino));
            }
        }
    }
    Ok(out)
}

/// Mark the entry dead, persist the block, and shrink the directory's
/// bookkeeping. The emptied data block is never freed and its `direct_ptr`
/// slot is never zeroed, so a concurrent scan never runs past the end of a
/// directory that just lost its last entry in that block.
pub fn dir_remove(
    device: &mut impl BlockDevice,
    sb: &SuperBlock,
    dir_ino: u32,
    name: &str,
) -> FsResult<()> {
    let mut dir_inode = readi(device, sb, dir_ino)?;
    let (block_id, slot, _) = scan(device, &dir_inode, name)?.ok_or_else(|| FsError::NotFound(name.to_string()))?;

    let mut buf = [0u8; BLOCK_SIZE];
    device.read_block(block_id, &mut buf)?;
    let mut entry = DirEntry::from_bytes(&buf[slot_range(slot)])?;
    entry.valid = INVALID;
    buf[slot_range(slot)].copy_from_slice(&entry.to_bytes()?);
    device.write_block(block_id, &buf)?;

    dir_inode.size = dir_inode.size.saturating_sub(DIRENT_SIZE as u64);
    dir_inode.vstat.st_size = dir_inode.vstat.st_size.saturating_sub(DIRENT_SIZE as u64);
    dir_inode.vstat.st_mtime = crate::format::now();
    writei(device, sb, &dir_inode)
}
