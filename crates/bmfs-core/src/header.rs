//! The file system header: signature, version, table offset, root offset,
//! total capacity. Fixed at disk offset 0, one block reserved.

use crate::disk::{Disk, Whence};
use crate::encoding::{decode_u64, encode_u64};
use crate::error::Error;
use crate::BLOCK_SIZE;

/// The 8-byte ASCII signature every formatted BMFS disk carries at offset 0.
pub const SIGNATURE: [u8; 8] = *b"BMFS\0\0\0\0";

/// The number of table entries a disk may hold (`spec.md` §3).
pub const TABLE_ENTRY_COUNT_MAX: u64 = 1024;

/// `sizeof(TableEntry)` on disk.
pub const TABLE_ENTRY_SIZE: u64 = 32;

/// `sizeof(Header)` on disk.
pub const HEADER_SIZE: u64 = 40;

/// The byte offset of the allocation table; always `sizeof(Header)`.
pub const TABLE_OFFSET: u64 = HEADER_SIZE;

/// The byte size of the allocation table region.
pub const TABLE_SIZE: u64 = TABLE_ENTRY_COUNT_MAX * TABLE_ENTRY_SIZE;

/// The byte offset of the root directory's self-entry.
pub const ROOT_OFFSET: u64 = TABLE_OFFSET + TABLE_SIZE;

/// `sizeof(Entry)` on disk (`spec.md` §3).
pub const ENTRY_SIZE: u64 = 256;

/// The minimum total size `Header::initialize` reserves: three blocks.
pub const MIN_TOTAL_SIZE: u64 = 3 * BLOCK_SIZE;

static_assertions::const_assert_eq!(ROOT_OFFSET, 32808);
static_assertions::const_assert_eq!(ROOT_OFFSET + ENTRY_SIZE, 33064);

/// The fixed, 40-byte file system header at disk offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Bytes the file system may occupy.
    pub total_size: u64,
    /// Always `sizeof(Header)`.
    pub table_offset: u64,
    /// Always `table_offset + TABLE_ENTRY_COUNT_MAX * sizeof(TableEntry)`.
    pub root_offset: u64,
    /// `0 <= table_entry_count <= TABLE_ENTRY_COUNT_MAX`.
    pub table_entry_count: u64,
}

impl Header {
    /// Builds a fresh header with the derived offsets recomputed from the
    /// constants, and `total_size` set to the minimum (3 blocks).
    pub fn initialize() -> Self {
        Self {
            total_size: MIN_TOTAL_SIZE,
            table_offset: TABLE_OFFSET,
            root_offset: ROOT_OFFSET,
            table_entry_count: 0,
        }
    }

    /// Builds a fresh header sized for `total_size` bytes.
    pub fn with_total_size(total_size: u64) -> Self {
        Self {
            total_size,
            ..Self::initialize()
        }
    }

    /// Serializes the header to its 40-byte on-disk form.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[0..8].copy_from_slice(&SIGNATURE);
        buf[8..16].copy_from_slice(&encode_u64(self.total_size));
        buf[16..24].copy_from_slice(&encode_u64(self.table_offset));
        buf[24..32].copy_from_slice(&encode_u64(self.root_offset));
        buf[32..40].copy_from_slice(&encode_u64(self.table_entry_count));
        buf
    }

    /// Parses a header from its 40-byte on-disk form, without checking the
    /// signature (see [`check_signature`](Self::check_signature)).
    pub fn from_bytes(buf: &[u8; HEADER_SIZE as usize]) -> Self {
        Self {
            total_size: decode_u64(buf[8..16].try_into().unwrap()),
            table_offset: decode_u64(buf[16..24].try_into().unwrap()),
            root_offset: decode_u64(buf[24..32].try_into().unwrap()),
            table_entry_count: decode_u64(buf[32..40].try_into().unwrap()),
        }
    }

    /// Reads `sizeof(Header)` bytes at the disk's current position.
    pub fn read(disk: &mut impl Disk) -> Result<Self, Error> {
        let mut buf = [0u8; HEADER_SIZE as usize];
        disk.read_exact(&mut buf)?;
        if buf[0..8] != SIGNATURE {
            log::warn!("bmfs: header signature mismatch, disk is not formatted");
            return Err(Error::Invalid);
        }
        Ok(Self::from_bytes(&buf))
    }

    /// Writes the header at the disk's current position.
    pub fn write(&self, disk: &mut impl Disk) -> Result<(), Error> {
        disk.write_all(&self.to_bytes())?;
        log::debug!(
            "bmfs: wrote header (total_size={}, table_entry_count={})",
            self.total_size,
            self.table_entry_count
        );
        Ok(())
    }

    /// Reads the first 8 bytes at offset 0 and checks them against
    /// [`SIGNATURE`], without disturbing the rest of the header.
    pub fn check_signature(disk: &mut impl Disk) -> Result<(), Error> {
        disk.seek(0, Whence::Start)?;
        let mut sig = [0u8; 8];
        disk.read_exact(&mut sig)?;
        if sig != SIGNATURE {
            log::warn!("bmfs: signature check failed");
            return Err(Error::Invalid);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::SliceDisk;

    #[test]
    fn initialize_derives_offsets_from_constants() {
        let header = Header::initialize();
        assert_eq!(header.table_offset, TABLE_OFFSET);
        assert_eq!(header.root_offset, ROOT_OFFSET);
        assert_eq!(header.total_size, MIN_TOTAL_SIZE);
        assert_eq!(header.table_entry_count, 0);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut disk = SliceDisk::new(MIN_TOTAL_SIZE as usize);
        let header = Header::with_total_size(12 * BLOCK_SIZE);
        disk.seek(0, Whence::Start).unwrap();
        header.write(&mut disk).unwrap();
        disk.seek(0, Whence::Start).unwrap();
        let read_back = Header::read(&mut disk).unwrap();
        assert_eq!(read_back, header);
    }

    #[test]
    fn check_signature_rejects_unformatted_disk() {
        let mut disk = SliceDisk::new(HEADER_SIZE as usize);
        assert_eq!(Header::check_signature(&mut disk), Err(Error::Invalid));
    }
}
