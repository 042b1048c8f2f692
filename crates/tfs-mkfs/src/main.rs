use clap::Parser;
use std::path::PathBuf;
use tfs_fs::block::FileBlockDevice;
use tfs_fs::{format, FsConfig, BLOCK_SIZE};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Path to the disk image to create
    #[arg(short, long)]
    disk: PathBuf,

    /// Total size of the image in blocks; defaults to the smallest image
    /// the resulting layout can address.
    #[arg(short, long)]
    blocks: Option<u32>,

    /// Inode table capacity. Defaults to the canonical 1024.
    #[arg(long)]
    inodes: Option<u32>,

    /// Data region capacity in blocks. Defaults to the canonical 16384.
    #[arg(long = "data-blocks")]
    data_blocks: Option<u32>,

    /// Overwrite the image if it already exists
    #[arg(short, long)]
    force: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.disk.exists() && !cli.force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            cli.disk.display()
        );
    }

    let mut config = FsConfig::default();
    if let Some(inodes) = cli.inodes {
        config.max_inum = inodes;
    }
    if let Some(data_blocks) = cli.data_blocks {
        config.max_dnum = data_blocks;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid geometry: {e}"))?;

    let sb = config.layout();
    let blocks = cli.blocks.unwrap_or(sb.d_start_blk + sb.max_dnum);
    if blocks < sb.d_start_blk + 1 {
        anyhow::bail!(
            "image too small: need at least {} blocks for the metadata region plus one data block",
            sb.d_start_blk + 1
        );
    }

    println!(
        "formatting {} ({} blocks, {} bytes)...",
        cli.disk.display(),
        blocks,
        blocks as u64 * BLOCK_SIZE as u64
    );

    let mut device = FileBlockDevice::init(&cli.disk, blocks)?;
    let uid = unsafe { libc::geteuid() };
    let gid = unsafe { libc::getegid() };
    let sb = format::mkfs_with_config(&mut device, config, uid, gid)?;

    println!(
        "done: {} inodes, {} data blocks, data region starts at block {}",
        sb.max_inum, sb.max_dnum, sb.d_start_blk
    );
    Ok(())
}
