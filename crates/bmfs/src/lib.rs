//! BMFS is a unified package over the flat-allocation file system's engine
//! and its host disk back ends.
//!
//! The engine (`core`) is `no_std` + `alloc`; the `disk` feature pulls in
//! host-backed `Disk` implementations, the size grammar, and the
//! bootloader-blob helper, and is on by default.

#![no_std]

pub use bmfs_core as core;

#[cfg(feature = "disk")]
pub use bmfs_disk as disk;

pub use bmfs_core::{Disk, Entry, EntryType, Error, Fs, Result, Status, Whence};
