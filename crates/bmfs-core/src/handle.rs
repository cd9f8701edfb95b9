//! Open file and directory handles, both borrowing their owning [`Fs`] for
//! the duration of their use.

use crate::disk::{Disk, Whence};
use crate::entry::Entry;
use crate::error::Error;
use crate::fs::{now_unix, EntryLocation, Fs};
use crate::host::HostLock;

/// The access mode a file was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
}

impl OpenMode {
    fn readable(self) -> bool {
        matches!(self, OpenMode::Read | OpenMode::ReadWrite)
    }

    pub(crate) fn writable(self) -> bool {
        matches!(self, OpenMode::Write | OpenMode::ReadWrite)
    }
}

/// An open file: a cursor over the bytes in its reserved region, plus the
/// bookkeeping to grow that region and flush its directory entry on close.
pub struct FileHandle<'a, D: Disk, H: HostLock> {
    fs: &'a mut Fs<D, H>,
    entry: Entry,
    location: EntryLocation,
    reserved: u64,
    mode: OpenMode,
    position: u64,
    dirty: bool,
    /// `true` if the caller (`Fs::open_file`) took the host lock for this
    /// handle's writable life. Released once, on drop.
    ///
    /// A `LockGuard` can't live here next to `fs: &'a mut Fs<D, H>`: it
    /// would borrow `fs.host` immutably for `'a` while `fs` itself holds
    /// the whole struct exclusively for `'a`. `Fs::open_file` takes the
    /// lock directly instead, and this flag just remembers to release it.
    locked: bool,
}

impl<'a, D: Disk, H: HostLock> FileHandle<'a, D, H> {
    pub(crate) fn new(
        fs: &'a mut Fs<D, H>,
        entry: Entry,
        location: EntryLocation,
        reserved: u64,
        mode: OpenMode,
    ) -> Self {
        let locked = mode.writable();
        Self {
            fs,
            entry,
            location,
            reserved,
            mode,
            position: 0,
            dirty: false,
            locked,
        }
    }

    /// Bytes valid in the file right now.
    pub fn size(&self) -> u64 {
        self.entry.size
    }

    /// `true` once the cursor has reached the end of the file.
    pub fn eof(&self) -> bool {
        self.position >= self.entry.size
    }

    /// Moves the cursor. `Whence::Start` seeks from the beginning,
    /// `Whence::End` from `size()`; either way the result must land within
    /// `0..=size()`.
    pub fn seek(&mut self, offset: u64, whence: Whence) -> Result<u64, Error> {
        let new_position = match whence {
            Whence::Start => offset,
            Whence::End => self.entry.size.checked_sub(offset).ok_or(Error::Invalid)?,
        };
        if new_position > self.entry.size {
            return Err(Error::Invalid);
        }
        self.position = new_position;
        Ok(self.position)
    }

    /// Reads up to `buf.len()` bytes starting at the cursor, stopping at
    /// the file's current size. Advances the cursor by the amount read.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if !self.mode.readable() {
            return Err(Error::Invalid);
        }
        let remaining = self.entry.size.saturating_sub(self.position);
        let want = (buf.len() as u64).min(remaining) as usize;
        if want == 0 {
            return Ok(0);
        }
        self.fs.disk.seek(self.entry.offset + self.position, Whence::Start)?;
        let n = self.fs.disk.read(&mut buf[..want])?;
        self.position += n as u64;
        Ok(n)
    }

    /// Writes `buf` at the cursor, growing the file (and, if needed,
    /// requesting a larger or relocated region from the allocator) when
    /// the write extends past the current size.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        if !self.mode.writable() {
            return Err(Error::Invalid);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let new_end = self.position + buf.len() as u64;
        if new_end > self.entry.size {
            let new_offset = self
                .fs
                .table
                .realloc(&mut self.fs.disk, &mut self.fs.header, self.entry.offset, new_end)?;
            if new_offset != self.entry.offset {
                self.entry.offset = new_offset;
            }
            self.reserved = self
                .fs
                .table
                .find(&mut self.fs.disk, &self.fs.header, self.entry.offset)?
                .reserved;
        }

        self.fs.disk.seek(self.entry.offset + self.position, Whence::Start)?;
        let n = self.fs.disk.write(buf)?;
        self.position += n as u64;
        if self.position > self.entry.size {
            self.entry.size = self.position;
        }
        self.fs
            .table
            .set_used(&mut self.fs.disk, &self.fs.header, self.entry.offset, self.entry.size)?;
        self.dirty = true;
        Ok(n)
    }

    /// Flushes the directory entry (size, offset, modification time) if
    /// the file was written to since it was opened. Handles are also
    /// flushed implicitly on drop; call this directly to observe I/O
    /// errors, since `Drop` cannot propagate them.
    pub fn close(mut self) -> Result<(), Error> {
        self.flush()
    }

    fn flush(&mut self) -> Result<(), Error> {
        if !self.dirty {
            return Ok(());
        }
        self.entry.modification_time = now_unix();
        self.fs
            .disk
            .seek(self.location.disk_offset(&self.fs.header), Whence::Start)?;
        self.entry.write(&mut self.fs.disk)?;
        self.dirty = false;
        Ok(())
    }
}

impl<'a, D: Disk, H: HostLock> Drop for FileHandle<'a, D, H> {
    fn drop(&mut self) {
        let _ = self.flush();
        if self.locked {
            let _ = self.fs.host.unlock();
        }
    }
}

/// An open directory: a lazy, forward-only cursor over its entries.
/// `spec.md` describes directory iteration as stopping by default at the
/// first empty (tombstoned) slot; see [`crate::dir::next`].
pub struct DirHandle<'a, D: Disk, H: HostLock> {
    fs: &'a mut Fs<D, H>,
    entry: Entry,
    index: u64,
}

impl<'a, D: Disk, H: HostLock> DirHandle<'a, D, H> {
    pub(crate) fn new(fs: &'a mut Fs<D, H>, entry: Entry) -> Self {
        Self { fs, entry, index: 0 }
    }

    /// Returns the next entry, or `None` once the cursor hits an empty
    /// slot or the directory's end.
    pub fn next(&mut self) -> Result<Option<Entry>, Error> {
        let next = crate::dir::next(&mut self.fs.disk, &self.entry, self.index)?;
        if next.is_some() {
            self.index += 1;
        }
        Ok(next)
    }

    /// Rewinds the cursor to the first entry.
    pub fn rewind(&mut self) {
        self.index = 0;
    }
}
