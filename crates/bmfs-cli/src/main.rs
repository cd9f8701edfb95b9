//! `bmfs` — a command-line front end over the facade in `bmfs-core`.
//!
//! Layers directly on [`bmfs_core::Fs`]; holds no on-disk knowledge of its
//! own. Exit code is 0 on success, the magnitude of the facade's errno on
//! failure.

use std::path::PathBuf;
use std::str::FromStr;

use bmfs_core::{EntryType, Fs};
use bmfs_disk::{FileDisk, Size};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bmfs", version, about = "BMFS disk image tool")]
struct Args {
    /// Path to the BMFS disk image.
    #[arg(short, long, global = true)]
    disk: PathBuf,

    /// Enable trace-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Formats the disk image, creating it first if necessary.
    Format {
        /// Disk size, e.g. "64MiB" or "1G". Defaults to 64MiB.
        #[arg(long)]
        size: Option<String>,
        /// Reformat even if the disk is already a valid BMFS image.
        #[arg(long)]
        force: bool,
    },
    /// Lists the entries of a directory.
    Ls {
        /// Directory to list; defaults to the root.
        path: Option<String>,
    },
    /// Creates a directory.
    Mkdir { path: String },
    /// Creates an empty file.
    Touch { path: String },
    /// Deletes a file.
    Rm { path: String },
    /// Deletes an empty directory.
    Rmdir { path: String },
}

const DEFAULT_DISK_SIZE: u64 = 64 * 1024 * 1024;

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
        eprintln!("bmfs: {err}");
        std::process::exit(err.to_errno().unsigned_abs() as i32);
    }
}

fn run(args: Args) -> bmfs_core::Result<()> {
    match args.command {
        Command::Format { size, force } => format(&args.disk, size, force),
        Command::Ls { path } => ls(&args.disk, path.as_deref().unwrap_or("/")),
        Command::Mkdir { path } => with_fs(&args.disk, |fs| fs.create_dir(&path)),
        Command::Touch { path } => with_fs(&args.disk, |fs| fs.create_file(&path)),
        Command::Rm { path } => with_fs(&args.disk, |fs| fs.delete_file(&path)),
        Command::Rmdir { path } => with_fs(&args.disk, |fs| fs.delete_dir(&path)),
    }
}

fn format(path: &PathBuf, size: Option<String>, force: bool) -> bmfs_core::Result<()> {
    let bytes = match size {
        Some(s) => Size::from_str(&s).map_err(|_| bmfs_core::Error::Invalid)?.bytes(),
        None => DEFAULT_DISK_SIZE,
    };

    if path.exists() && !force {
        let mut disk = FileDisk::open(path)?;
        if bmfs_core::Header::check_signature(&mut disk).is_ok() {
            eprintln!("bmfs: {} is already a BMFS disk; pass --force to reformat", path.display());
            return Err(bmfs_core::Error::Exists);
        }
    }

    let disk = FileDisk::create(path, bytes)?;
    let mut fs = Fs::new(disk);
    fs.format(bytes)?;
    println!("formatted {} ({bytes} bytes)", path.display());
    Ok(())
}

fn ls(path: &PathBuf, dir_path: &str) -> bmfs_core::Result<()> {
    with_fs(path, |fs| {
        let mut dir = fs.open_dir(dir_path)?;
        while let Some(entry) = dir.next()? {
            let marker = match entry.entry_type {
                EntryType::Directory => "/",
                _ => "",
            };
            println!("{}{marker}", entry.name_str());
        }
        Ok(())
    })
}

fn with_fs(path: &PathBuf, op: impl FnOnce(&mut Fs<FileDisk>) -> bmfs_core::Result<()>) -> bmfs_core::Result<()> {
    let disk = FileDisk::open(path)?;
    let mut fs = Fs::new(disk);
    fs.import()?;
    op(&mut fs)
}
