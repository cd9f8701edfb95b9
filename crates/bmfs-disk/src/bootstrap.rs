//! Stamps an optional master boot record and a combined boot loader/kernel
//! blob onto a disk image, the way `bmfs`'s `initialize` command lays out a
//! bootable image (`original_source/src/stdlib.c`'s `bmfs_initialize`).
//!
//! This has nothing to do with the file system proper: the MBR and boot
//! loader live in the 33 KiB the header, table, and root entry don't use
//! ([`BOOT_LOADER_OFFSET`] sits well past `Header::root_offset + ENTRY_SIZE`
//! only once the disk has been formatted with a large enough reservation,
//! or, more commonly, before `Fs::format` is ever called on that region).

use std::io::Read;

use bmfs_core::disk::{Disk, Whence};
use bmfs_core::error::Error;

/// A master boot record is always exactly one sector.
pub const MBR_SIZE: u64 = 512;

/// Where the boot loader (or combined boot loader + kernel system file)
/// is written, matching the original tool's fixed offset.
pub const BOOT_LOADER_OFFSET: u64 = 8192;

/// Writes `mbr` (if given) at offset 0, then `boot` immediately at
/// [`BOOT_LOADER_OFFSET`], then `kernel` (if given) immediately following
/// `boot` with no gap — the kernel is expected to pick up exactly where
/// the boot loader's bytes end, as the original tool's comment says.
pub fn write_bootloader_blobs(
    disk: &mut impl Disk,
    mbr: Option<&mut dyn Read>,
    boot: Option<&mut dyn Read>,
    kernel: Option<&mut dyn Read>,
) -> Result<(), Error> {
    if let Some(mbr) = mbr {
        let mut buf = [0u8; MBR_SIZE as usize];
        read_exact_host(mbr, &mut buf)?;
        disk.seek(0, Whence::Start)?;
        disk.write_all(&buf)?;
    }

    if let Some(boot) = boot {
        disk.seek(BOOT_LOADER_OFFSET, Whence::Start)?;
        copy_all(disk, boot)?;
        if let Some(kernel) = kernel {
            copy_all(disk, kernel)?;
        }
    }

    Ok(())
}

fn read_exact_host(reader: &mut dyn Read, buf: &mut [u8]) -> Result<(), Error> {
    reader.read_exact(buf).map_err(|_| Error::Io)
}

fn copy_all(disk: &mut impl Disk, reader: &mut dyn Read) -> Result<(), Error> {
    let mut chunk = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut chunk).map_err(|_| Error::Io)?;
        if n == 0 {
            break;
        }
        disk.write_all(&chunk[..n])?;
    }
    Ok(())
}
