//! Mapping byte ranges onto an inode's direct pointers.

use crate::bitmap;
use crate::block::BlockDevice;
use crate::error::{FsError, FsResult};
use crate::inode::{readi, writei, Inode};
use crate::superblock::SuperBlock;
use crate::{BLOCK_SIZE, DIRECT_PTR_SIZE};

/// Read up to `out_buf.len()` bytes starting at `offset`.
///
/// Walks blocks starting at `floor(offset / BLOCK_SIZE)`. A zero
/// `direct_ptr` slot ends the read early (short read at end-of-data); the
/// walk also stops once `out_buf` is full or `DIRECT_PTR_SIZE` is exhausted.
/// Updates `atime` and persists the inode. Returns the number of bytes
/// copied.
pub fn read(
    device: &mut impl BlockDevice,
    sb: &SuperBlock,
    ino: u32,
    offset: u64,
    out_buf: &mut [u8],
) -> FsResult<usize> {
    let mut inode = readi(device, sb, ino)?;

    let mut k = (offset / BLOCK_SIZE as u64) as usize;
    let mut intra = (offset % BLOCK_SIZE as u64) as usize;
    let mut copied = 0usize;

    while copied < out_buf.len() && k < DIRECT_PTR_SIZE {
        let block_id = inode.direct_ptr[k];
        if block_id == 0 {
            break;
        }

        let mut block_buf = [0u8; BLOCK_SIZE];
        device.read_block(block_id, &mut block_buf)?;

        let take = (out_buf.len() - copied).min(BLOCK_SIZE - intra);
        out_buf[copied..copied + take].copy_from_slice(&block_buf[intra..intra + take]);

        copied += take;
        k += 1;
        intra = 0;
    }

    inode.vstat.st_atime = crate::format::now();
    writei(device, sb, &inode)?;

    Ok(copied)
}

/// Write `in_buf` starting at `offset`.
///
/// Allocates a fresh data block (treated as zero-filled before patching) for
/// any unallocated `direct_ptr` slot it touches; otherwise reads the
/// existing block before patching. Partial writes are permitted: if
/// allocation fails mid-write, the bytes already written are kept and the
/// count actually written is returned as a successful partial count, not an
/// error, so callers see how much landed.
pub fn write(
    device: &mut impl BlockDevice,
    sb: &SuperBlock,
    ino: u32,
    offset: u64,
    in_buf: &[u8],
) -> FsResult<usize> {
    if offset >= crate::MAX_FILE_SIZE {
        return Err(FsError::NoSpace("offset beyond maximum file size"));
    }
    let mut inode = readi(device, sb, ino)?;

    let mut k = (offset / BLOCK_SIZE as u64) as usize;
    let mut intra = (offset % BLOCK_SIZE as u64) as usize;
    let mut written = 0usize;

    while written < in_buf.len() && k < DIRECT_PTR_SIZE {
        let mut block_buf = [0u8; BLOCK_SIZE];

        if inode.direct_ptr[k] == 0 {
            let new_block = match bitmap::allocate_block(device, sb.max_dnum) {
                Ok(b) => b,
                Err(_) => break,
            };
            inode.direct_ptr[k] = new_block;
            inode.vstat.st_blocks += 1;
        } else {
            device.read_block(inode.direct_ptr[k], &mut block_buf)?;
        }

        let take = (in_buf.len() - written).min(BLOCK_SIZE - intra);
        block_buf[intra..intra + take].copy_from_slice(&in_buf[written..written + take]);
        device.write_block(inode.direct_ptr[k], &block_buf)?;

        written += take;
        k += 1;
        intra = 0;
    }

    let new_end = offset + written as u64;
    if new_end > inode.size {
        inode.size = new_end;
        inode.vstat.st_size = new_end;
    }
    inode.vstat.st_mtime = crate::format::now();
    writei(device, sb, &inode)?;

    Ok(written)
}

/// Reference to an already-resolved inode, kept for call sites that need to
/// touch several fields without re-reading the table.
pub fn stat(device: &mut impl BlockDevice, sb: &SuperBlock, ino: u32) -> FsResult<Inode> {
    readi(device, sb, ino)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::FileBlockDevice;
    use crate::format;
    use crate::inode::{FileType, VStat};
    use crate::{INDIRECT_PTR_SIZE, VALID};
    use tempfile::NamedTempFile;

    fn dev_with_file() -> (FileBlockDevice, SuperBlock, u32) {
        let f = NamedTempFile::new().unwrap();
        let sb = SuperBlock::canonical();
        let mut device = FileBlockDevice::init(f.path(), sb.d_start_blk + 64).unwrap();
        let sb = format::mkfs(&mut device, 0, 0).unwrap();

        let ino = crate::bitmap::allocate_inode(&mut device, sb.max_inum).unwrap();
        let file_inode = Inode {
            ino,
            valid: VALID,
            file_type: FileType::File.as_u8(),
            size: 0,
            link: 1,
            direct_ptr: [0; DIRECT_PTR_SIZE],
            indirect_ptr: [0; INDIRECT_PTR_SIZE],
            vstat: VStat {
                st_mode: 0o100666,
                st_nlink: 1,
                st_uid: 0,
                st_gid: 0,
                st_size: 0,
                st_blocks: 0,
                st_blksize: BLOCK_SIZE as u32,
                st_mtime: 0,
                st_atime: 0,
                st_ctime: 0,
            },
        };
        writei(&mut device, &sb, &file_inode).unwrap();
        (device, sb, ino)
    }

    #[test]
    fn write_then_read_back_same_bytes() {
        let (mut device, sb, ino) = dev_with_file();
        let n = write(&mut device, &sb, ino, 0, b"hello").unwrap();
        assert_eq!(n, 5);

        let mut out = [0u8; 5];
        let read_n = read(&mut device, &sb, ino, 0, &mut out).unwrap();
        assert_eq!(read_n, 5);
        assert_eq!(&out, b"hello");
    }

    #[test]
    fn cross_block_write_touches_two_direct_pointers() {
        let (mut device, sb, ino) = dev_with_file();
        let data = vec![0xABu8; 4096];
        let n = write(&mut device, &sb, ino, 4000, &data).unwrap();
        assert_eq!(n, 4096);

        let inode = readi(&mut device, &sb, ino).unwrap();
        assert_ne!(inode.direct_ptr[0], 0);
        assert_ne!(inode.direct_ptr[1], 0);

        let mut out = vec![0u8; 4096];
        let read_n = read(&mut device, &sb, ino, 4000, &mut out).unwrap();
        assert_eq!(read_n, 4096);
        assert_eq!(out, data);
    }

    #[test]
    fn reading_past_end_of_data_returns_a_short_read() {
        let (mut device, sb, ino) = dev_with_file();
        write(&mut device, &sb, ino, 0, b"hi").unwrap();

        let mut out = [0u8; 100];
        let n = read(&mut device, &sb, ino, 0, &mut out).unwrap();
        // Only one direct pointer was ever allocated, so the walk stops at
        // its end instead of reading 100 bytes.
        assert!(n <= BLOCK_SIZE);
        assert_eq!(&out[..2], b"hi");
    }

    #[test]
    fn write_updates_size_and_block_count() {
        let (mut device, sb, ino) = dev_with_file();
        write(&mut device, &sb, ino, 0, b"12345").unwrap();
        let inode = readi(&mut device, &sb, ino).unwrap();
        assert_eq!(inode.size, 5);
        assert_eq!(inode.vstat.st_size, 5);
        assert_eq!(inode.block_count(), 1);
    }

    #[test]
    fn write_beyond_max_file_size_is_rejected() {
        let (mut device, sb, ino) = dev_with_file();
        let err = write(&mut device, &sb, ino, crate::MAX_FILE_SIZE, b"x").unwrap_err();
        assert!(matches!(err, FsError::NoSpace(_)));
    }
}
