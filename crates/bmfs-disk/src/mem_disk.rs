//! The memory-backed `Disk`: a fixed buffer, cursor `0..=len`, reads and
//! writes past the end truncated to the boundary rather than erroring.
//! Grounded in `original_source/lib/ramdisk.c` (`BMFSRamDisk`).
//!
//! `bmfs-core` already implements exactly this for its own unit tests
//! (`SliceDisk`); this is that same type under the name the original
//! ramdisk API uses.
pub use bmfs_core::disk::SliceDisk as MemDisk;
