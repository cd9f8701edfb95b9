//! A directory is not an independent persistent structure: it is the
//! linear sequence of [`Entry`] records living inside the region reserved
//! for it. This module holds the free functions that read and mutate that
//! sequence; [`crate::fs::DirHandle`] wraps them into the lazy,
//! forward-only cursor `spec.md` describes.

use crate::entry::{Entry, EntryType};
use crate::error::Error;
use crate::header::ENTRY_SIZE;
use crate::disk::{Disk, Whence};
use crate::BLOCK_SIZE;

/// Reads the entry at `index` within `dir`, or `None` past the end.
///
/// `index * ENTRY_SIZE >= dir.size` means end-of-directory. Otherwise, if
/// the entry at that slot is empty, iteration stops there by default (the
/// directory's non-empty entries form a contiguous prefix once a delete is
/// followed by a compacting insert; see [`insert`]).
pub fn next(disk: &mut impl Disk, dir: &Entry, index: u64) -> Result<Option<Entry>, Error> {
    if index * ENTRY_SIZE >= dir.size {
        return Ok(None);
    }
    disk.seek(dir.offset + index * ENTRY_SIZE, Whence::Start)?;
    let entry = Entry::read(disk)?;
    if entry.is_empty() {
        return Ok(None);
    }
    Ok(Some(entry))
}

/// Scans `dir` for an entry named `name`, returning its slot index and a
/// copy of the entry. This scan does not stop at the first tombstone: it
/// walks every slot up to `dir.size` so that a later valid entry past a
/// deleted one is still found.
pub fn find_by_name(disk: &mut impl Disk, dir: &Entry, name: &str) -> Result<Option<(u64, Entry)>, Error> {
    let count = dir.size / ENTRY_SIZE;
    for index in 0..count {
        disk.seek(dir.offset + index * ENTRY_SIZE, Whence::Start)?;
        let entry = Entry::read(disk)?;
        if !entry.is_empty() && entry.name_str() == name {
            return Ok(Some((index, entry)));
        }
    }
    Ok(None)
}

/// Appends `entry` to `dir`, provided `(dir.size + ENTRY_SIZE) <= BLOCK_SIZE`.
///
/// Prefers reusing a tombstoned slot over growing the directory: this scan
/// walks every slot up to `dir.size`, unlike [`next`]'s cursor, so a hole
/// left by [`delete`] gets reused before the directory grows.
///
/// On success, `dir.size` is updated in place if the entry was appended
/// (not reused); the caller is responsible for rewriting `dir`'s own
/// record in its parent.
pub fn insert(disk: &mut impl Disk, dir: &mut Entry, entry: &Entry) -> Result<(), Error> {
    let count = dir.size / ENTRY_SIZE;
    for index in 0..count {
        disk.seek(dir.offset + index * ENTRY_SIZE, Whence::Start)?;
        let existing = Entry::read(disk)?;
        if existing.is_empty() {
            disk.seek(dir.offset + index * ENTRY_SIZE, Whence::Start)?;
            entry.write(disk)?;
            return Ok(());
        }
    }

    if dir.size + ENTRY_SIZE > BLOCK_SIZE {
        return Err(Error::NoSpace);
    }
    disk.seek(dir.offset + dir.size, Whence::Start)?;
    entry.write(disk)?;
    dir.size += ENTRY_SIZE;
    Ok(())
}

/// Tombstones the entry at `index` within `dir` by clearing its type and
/// name, then rewriting it. `dir.size` is left unchanged.
pub fn delete(disk: &mut impl Disk, dir: &Entry, index: u64) -> Result<(), Error> {
    let mut empty = Entry::default();
    empty.entry_type = EntryType::Empty;
    disk.seek(dir.offset + index * ENTRY_SIZE, Whence::Start)?;
    empty.write(disk)
}
