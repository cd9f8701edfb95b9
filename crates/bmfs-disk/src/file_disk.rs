//! A `Disk` backed by a host file, grounded in
//! `original_source/lib/filedisk.c` (`BMFSFileDisk`).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use bmfs_core::disk::{Disk, Whence};
use bmfs_core::error::Error;

/// A `Disk` over a host file. Tracks its own logical cursor rather than
/// relying on the OS file position staying put between calls, so `tell`
/// can be answered without touching the file (`Disk::tell` takes `&self`).
pub struct FileDisk {
    file: File,
    /// Byte offset within the host file where the file system begins,
    /// letting it start past a reserved header area (e.g. a boot sector).
    offset: u64,
    pos: u64,
}

impl FileDisk {
    /// Opens an existing file for read-write access.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(map_io_error)?;
        Ok(Self { file, offset: 0, pos: 0 })
    }

    /// Creates (or truncates) a file of `len` bytes for read-write access.
    pub fn create(path: impl AsRef<Path>, len: u64) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(map_io_error)?;
        file.set_len(len).map_err(map_io_error)?;
        Ok(Self { file, offset: 0, pos: 0 })
    }

    /// Sets the byte offset at which the file system begins.
    pub fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    fn logical_len(&self) -> Result<u64, Error> {
        let len = self.file.metadata().map_err(map_io_error)?.len();
        Ok(len.saturating_sub(self.offset))
    }
}

impl Disk for FileDisk {
    fn seek(&mut self, offset: u64, whence: Whence) -> Result<(), Error> {
        self.pos = match whence {
            Whence::Start => offset,
            Whence::End => self
                .logical_len()?
                .checked_add(offset)
                .ok_or(Error::Invalid)?,
        };
        Ok(())
    }

    fn tell(&self) -> Result<u64, Error> {
        Ok(self.pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        self.file
            .seek(SeekFrom::Start(self.offset + self.pos))
            .map_err(map_io_error)?;
        let n = self.file.read(buf).map_err(map_io_error)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        self.file
            .seek(SeekFrom::Start(self.offset + self.pos))
            .map_err(map_io_error)?;
        let n = self.file.write(buf).map_err(map_io_error)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn done(&mut self) -> Result<(), Error> {
        self.file.sync_all().map_err(map_io_error)
    }
}

fn map_io_error(err: std::io::Error) -> Error {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::NotFound => Error::NotFound,
        ErrorKind::PermissionDenied => Error::Perm,
        ErrorKind::InvalidInput | ErrorKind::InvalidData => Error::Invalid,
        _ => {
            log::warn!("bmfs-disk: file I/O error: {err}");
            Error::Io
        }
    }
}
