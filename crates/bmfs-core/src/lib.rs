#![cfg_attr(not(feature = "std"), no_std)]

//! The on-disk engine for BMFS, a flat-allocation file system for
//! bare-metal kernels: a fixed header, a bounded region-allocation table,
//! and directories stored as plain entry streams inside regions.
//!
//! This crate has no knowledge of any particular disk medium; callers
//! provide one through the [`disk::Disk`] trait. See [`bmfs_disk`] (the
//! sibling crate) for file- and memory-backed implementations.

#[cfg(feature = "alloc")]
extern crate alloc;

/// The size, in bytes, of one allocation unit. Every region the allocator
/// hands out is a multiple of this.
pub const BLOCK_SIZE: u64 = 2 * 1024 * 1024;

pub mod dir;
pub mod disk;
pub mod encoding;
pub mod entry;
pub mod error;
pub mod fs;
pub mod handle;
pub mod header;
pub mod host;
pub mod path;
pub mod table;

pub use disk::{Disk, SliceDisk, Whence};
pub use entry::{Entry, EntryType};
pub use error::{Error, Result};
pub use fs::{EntryLocation, Fs, Status};
pub use handle::{DirHandle, FileHandle, OpenMode};
pub use header::Header;
pub use host::HostLock;
pub use table::{Table, TableEntry};
