//! `bmfs-fuse` — mounts a BMFS disk image at a host directory via FUSE.

use std::path::PathBuf;

use bmfs_core::Fs;
use bmfs_disk::FileDisk;
use bmfs_fuse::BmfsFuse;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "bmfs-fuse", version, about = "Mount a BMFS disk image via FUSE")]
struct Args {
    /// Path to the BMFS disk image.
    disk: PathBuf,
    /// Host directory to mount onto.
    mountpoint: PathBuf,
    /// Enable trace-level logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose {
            log::LevelFilter::Trace
        } else {
            log::LevelFilter::Warn
        })
        .init();

    if let Err(err) = run(args) {
        eprintln!("bmfs-fuse: {err}");
        std::process::exit(err.to_errno().unsigned_abs() as i32);
    }
}

fn run(args: Args) -> bmfs_core::Result<()> {
    let disk = FileDisk::open(&args.disk)?;
    let mut fs = Fs::new(disk);
    fs.import()?;

    let options = [fuser::MountOption::FSName("bmfs".to_string())];
    fuser::mount2(BmfsFuse::new(fs), &args.mountpoint, &options).map_err(|err| {
        log::error!("bmfs-fuse: mount failed: {err}");
        bmfs_core::Error::Io
    })
}
