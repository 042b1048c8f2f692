use std::path::PathBuf;

use clap::Parser;
use fuser::MountOption;
use tfs_fs::block::FileBlockDevice;
use tfs_fs::filesystem::Filesystem;
use tfs_fs::superblock::SuperBlock;
use tfs_host::TfsFuse;

/// Mount a TFS disk image as a FUSE filesystem.
///
/// If `--disk` already names a formatted image it is mounted as-is;
/// otherwise a fresh image is created and formatted before mounting,
/// exactly once.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Path to the disk image.
    #[arg(short, long)]
    disk: PathBuf,

    /// Directory to mount the filesystem at.
    mountpoint: PathBuf,

    /// Run in the foreground instead of forking into the background.
    #[arg(short, long)]
    foreground: bool,

    /// Allow other users to access the mount.
    #[arg(long)]
    allow_other: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let fs = if cli.disk.exists() {
        log::info!("opening existing image {}", cli.disk.display());
        let device = FileBlockDevice::open(&cli.disk)?;
        Filesystem::mount(device)?
    } else {
        log::info!("no image at {}, formatting a new one", cli.disk.display());
        let sb = SuperBlock::canonical();
        let device = FileBlockDevice::init(&cli.disk, sb.d_start_blk + sb.max_dnum)?;
        let uid = unsafe { libc::geteuid() };
        let gid = unsafe { libc::getegid() };
        Filesystem::format_new(device, uid, gid)?
    };

    let mut options = vec![MountOption::FSName("tfs".to_string())];
    if cli.allow_other {
        options.push(MountOption::AllowOther);
    }
    if !cli.foreground {
        // `fuser` has no built-in daemonize step. This engine's session is
        // single-threaded and write-through, so running it in the
        // foreground is always correct; callers that want a background
        // daemon wrap this binary the usual Unix way.
        log::warn!("--foreground not passed; running in the foreground anyway");
    }

    log::info!("mounting {} at {}", cli.disk.display(), cli.mountpoint.display());
    fuser::mount2(TfsFuse::new(fs), &cli.mountpoint, &options)?;
    Ok(())
}
