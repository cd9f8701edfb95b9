//! The region-allocation table: an append-only, bounded vector of occupied
//! regions, plus the allocator built on top of it.

use crate::disk::{Disk, Whence};
use crate::encoding::{decode_u64, encode_u64};
use crate::error::Error;
use crate::header::{Header, TABLE_ENTRY_COUNT_MAX, TABLE_ENTRY_SIZE, TABLE_OFFSET};
use crate::BLOCK_SIZE;

bitflags::bitflags! {
    /// Table entry flags. Bit 0 marks the region deleted (tombstoned).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TableEntryFlags: u32 {
        const DELETED = 0b0000_0001;
    }
}

/// One 32-byte slot in the allocation table, describing an occupied region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableEntry {
    /// Byte position of the region's first byte.
    pub offset: u64,
    /// Bytes actually used within the region.
    pub used: u64,
    /// Bytes reserved for the region; a multiple of [`BLOCK_SIZE`], `>= used`.
    pub reserved: u64,
    /// Flags; bit 0 is the deleted tombstone.
    pub flags: TableEntryFlags,
}

impl TableEntry {
    const SIZE: usize = TABLE_ENTRY_SIZE as usize;

    fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..8].copy_from_slice(&encode_u64(self.offset));
        buf[8..16].copy_from_slice(&encode_u64(self.used));
        buf[16..24].copy_from_slice(&encode_u64(self.reserved));
        buf[24..28].copy_from_slice(&self.flags.bits().to_le_bytes());
        // bytes 28..32 are the reserved checksum field; unused in validation.
        buf
    }

    fn from_bytes(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            offset: decode_u64(buf[0..8].try_into().unwrap()),
            used: decode_u64(buf[8..16].try_into().unwrap()),
            reserved: decode_u64(buf[16..24].try_into().unwrap()),
            flags: TableEntryFlags::from_bits_retain(u32::from_le_bytes(
                buf[24..28].try_into().unwrap(),
            )),
        }
    }

    /// `true` if this entry is tombstoned.
    pub fn is_deleted(&self) -> bool {
        self.flags.contains(TableEntryFlags::DELETED)
    }

    /// Reads a table entry from the current position on the disk.
    pub fn read(disk: &mut impl Disk) -> Result<Self, Error> {
        let mut buf = [0u8; Self::SIZE];
        disk.read_exact(&mut buf)?;
        Ok(Self::from_bytes(&buf))
    }

    /// Writes a table entry to disk at the current location.
    pub fn write(&self, disk: &mut impl Disk) -> Result<(), Error> {
        disk.write_all(&self.to_bytes())
    }
}

/// Usage summary of the allocation table, supplementing the distilled spec
/// with the status reporting `original_source/include/bmfs/status.h` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableStatus {
    /// Bytes currently reserved by non-deleted entries.
    pub reserved: u64,
    /// Bytes currently used by non-deleted entries.
    pub used: u64,
}

/// The region-allocation table: append-only within a session, bounded by
/// [`TABLE_ENTRY_COUNT_MAX`].
#[derive(Debug, Clone, Copy)]
pub struct Table {
    offset: u64,
}

impl Table {
    /// Points a table handle at `TableOffset`.
    pub fn new(offset: u64) -> Self {
        Self { offset }
    }

    fn slot_offset(&self, index: u64) -> u64 {
        self.offset + index * TableEntry::SIZE as u64
    }

    fn read_slot(&self, disk: &mut impl Disk, index: u64) -> Result<TableEntry, Error> {
        disk.seek(self.slot_offset(index), Whence::Start)?;
        TableEntry::read(disk)
    }

    fn write_slot(&self, disk: &mut impl Disk, index: u64, entry: &TableEntry) -> Result<(), Error> {
        disk.seek(self.slot_offset(index), Whence::Start)?;
        entry.write(disk)
    }

    /// Locates a region that can fit `bytes`, appending a new table entry
    /// and rewriting the header's `table_entry_count`. Returns the new
    /// region's byte offset.
    ///
    /// Rounds `bytes` up to a multiple of [`BLOCK_SIZE`]; places the first
    /// region immediately past the root directory's self-entry, and every
    /// subsequent region at the tail of the last reserved region
    /// (first-fit-at-end).
    pub fn allocate(&self, disk: &mut impl Disk, header: &mut Header, bytes: u64) -> Result<u64, Error> {
        let reserved = round_up_to_block(bytes);

        if header.table_entry_count >= TABLE_ENTRY_COUNT_MAX {
            return Err(Error::NoSpace);
        }

        let new_offset = if header.table_entry_count == 0 {
            header.root_offset + crate::header::ENTRY_SIZE
        } else {
            let last = self.read_slot(disk, header.table_entry_count - 1)?;
            last.offset + last.reserved
        };

        if new_offset.checked_add(reserved).ok_or(Error::Invalid)? > header.total_size {
            return Err(Error::NoSpace);
        }

        let entry = TableEntry {
            offset: new_offset,
            used: 0,
            reserved,
            flags: TableEntryFlags::empty(),
        };
        self.write_slot(disk, header.table_entry_count, &entry)?;

        header.table_entry_count += 1;
        disk.seek(0, Whence::Start)?;
        header.write(disk)?;

        log::trace!("bmfs: allocated region at offset {new_offset} ({reserved} bytes reserved)");
        Ok(new_offset)
    }

    /// Grows the region at `current_offset` to hold at least `new_bytes`.
    ///
    /// If the region is the last occupied one, it is expanded in place.
    /// Otherwise a fresh region is allocated and the offset changes; the
    /// contract guarantees `reserved >= new_bytes` on success. Returns the
    /// (possibly unchanged) offset of the region holding the data.
    pub fn realloc(
        &self,
        disk: &mut impl Disk,
        header: &mut Header,
        current_offset: u64,
        new_bytes: u64,
    ) -> Result<u64, Error> {
        let index = self.find_index(disk, header, current_offset)?;
        let mut entry = self.read_slot(disk, index)?;
        if new_bytes <= entry.reserved {
            return Ok(current_offset);
        }

        let is_last = index + 1 == header.table_entry_count;
        let reserved = round_up_to_block(new_bytes);

        if is_last {
            if current_offset.checked_add(reserved).ok_or(Error::Invalid)? > header.total_size {
                return Err(Error::NoSpace);
            }
            entry.reserved = reserved;
            self.write_slot(disk, index, &entry)?;
            log::trace!("bmfs: expanded region at offset {current_offset} to {reserved} bytes");
            Ok(current_offset)
        } else {
            let old_reserved = entry.reserved;
            let new_offset = self.allocate(disk, header, new_bytes)?;

            let mut buf = alloc::vec![0u8; old_reserved as usize];
            disk.seek(current_offset, Whence::Start)?;
            disk.read_exact(&mut buf)?;
            disk.seek(new_offset, Whence::Start)?;
            disk.write_all(&buf)?;
            self.set_used(disk, header, new_offset, entry.used)?;

            self.free(disk, header, current_offset)?;
            log::trace!(
                "bmfs: relocated region from {current_offset} to {new_offset} ({reserved} bytes reserved)"
            );
            Ok(new_offset)
        }
    }

    /// Tombstones the region at `offset`. Fails with [`Error::NotFound`] if
    /// no non-deleted entry has that offset.
    pub fn free(&self, disk: &mut impl Disk, header: &Header, offset: u64) -> Result<(), Error> {
        let index = self.find_index(disk, header, offset)?;
        let mut entry = self.read_slot(disk, index)?;
        entry.flags |= TableEntryFlags::DELETED;
        self.write_slot(disk, index, &entry)?;
        log::trace!("bmfs: freed region at offset {offset}");
        Ok(())
    }

    /// Looks up the table entry covering `offset`, skipping tombstones.
    pub fn find(&self, disk: &mut impl Disk, header: &Header, offset: u64) -> Result<TableEntry, Error> {
        let index = self.find_index(disk, header, offset)?;
        self.read_slot(disk, index)
    }

    /// Records how many of the region's reserved bytes actually hold data.
    pub fn set_used(&self, disk: &mut impl Disk, header: &Header, offset: u64, used: u64) -> Result<(), Error> {
        let index = self.find_index(disk, header, offset)?;
        let mut entry = self.read_slot(disk, index)?;
        entry.used = used;
        self.write_slot(disk, index, &entry)
    }

    fn find_index(&self, disk: &mut impl Disk, header: &Header, offset: u64) -> Result<u64, Error> {
        for index in 0..header.table_entry_count {
            let entry = self.read_slot(disk, index)?;
            if entry.offset == offset && !entry.is_deleted() {
                return Ok(index);
            }
        }
        Err(Error::NotFound)
    }

    /// Sums reserved/used bytes across all non-deleted entries.
    pub fn status(&self, disk: &mut impl Disk, header: &Header) -> Result<TableStatus, Error> {
        let mut status = TableStatus::default();
        for index in 0..header.table_entry_count {
            let entry = self.read_slot(disk, index)?;
            if entry.is_deleted() {
                continue;
            }
            status.reserved += entry.reserved;
            status.used += entry.used;
        }
        Ok(status)
    }
}

pub(crate) fn round_up_to_block(bytes: u64) -> u64 {
    if bytes == 0 {
        return BLOCK_SIZE;
    }
    bytes.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::SliceDisk;
    use crate::header::ROOT_OFFSET;

    fn fresh_disk(total_size: u64) -> (SliceDisk, Header) {
        let mut disk = SliceDisk::new(total_size as usize);
        let header = Header::with_total_size(total_size);
        disk.seek(0, Whence::Start).unwrap();
        header.write(&mut disk).unwrap();
        (disk, header)
    }

    #[test]
    fn allocation_packing_matches_spec_scenario_6() {
        let (mut disk, mut header) = fresh_disk(16 * BLOCK_SIZE);
        let table = Table::new(TABLE_OFFSET);

        let o1 = table.allocate(&mut disk, &mut header, BLOCK_SIZE / 2).unwrap();
        let o2 = table.allocate(&mut disk, &mut header, 2 * BLOCK_SIZE).unwrap();
        let o3 = table.allocate(&mut disk, &mut header, BLOCK_SIZE / 2).unwrap();

        assert_eq!(o1, ROOT_OFFSET + crate::header::ENTRY_SIZE);
        assert_eq!(o2, o1 + BLOCK_SIZE);
        assert_eq!(o3, o1 + 3 * BLOCK_SIZE);
    }

    #[test]
    fn allocate_fails_when_disk_is_full() {
        let (mut disk, mut header) = fresh_disk(3 * BLOCK_SIZE);
        let table = Table::new(TABLE_OFFSET);
        // Only room for the root directory's own block.
        let _ = table.allocate(&mut disk, &mut header, BLOCK_SIZE).unwrap();
        assert_eq!(
            table.allocate(&mut disk, &mut header, 10 * BLOCK_SIZE),
            Err(Error::NoSpace)
        );
    }

    #[test]
    fn free_then_lookup_fails_with_not_found() {
        let (mut disk, mut header) = fresh_disk(16 * BLOCK_SIZE);
        let table = Table::new(TABLE_OFFSET);
        let offset = table.allocate(&mut disk, &mut header, BLOCK_SIZE).unwrap();
        table.free(&mut disk, &header, offset).unwrap();
        assert_eq!(table.find(&mut disk, &header, offset), Err(Error::NotFound));
    }

    #[test]
    fn free_unknown_offset_is_not_found() {
        let (mut disk, header) = fresh_disk(16 * BLOCK_SIZE);
        let table = Table::new(TABLE_OFFSET);
        assert_eq!(table.free(&mut disk, &header, 999_999), Err(Error::NotFound));
    }

    #[test]
    fn realloc_expands_last_region_in_place() {
        let (mut disk, mut header) = fresh_disk(16 * BLOCK_SIZE);
        let table = Table::new(TABLE_OFFSET);
        let offset = table.allocate(&mut disk, &mut header, BLOCK_SIZE).unwrap();
        let new_offset = table
            .realloc(&mut disk, &mut header, offset, 3 * BLOCK_SIZE)
            .unwrap();
        assert_eq!(new_offset, offset);
        let entry = table.find(&mut disk, &header, offset).unwrap();
        assert_eq!(entry.reserved, 3 * BLOCK_SIZE);
    }

    #[test]
    fn realloc_of_non_last_region_frees_old_slot_and_preserves_data() {
        let (mut disk, mut header) = fresh_disk(64 * BLOCK_SIZE);
        let table = Table::new(TABLE_OFFSET);
        let a = table.allocate(&mut disk, &mut header, BLOCK_SIZE).unwrap();
        let _b = table.allocate(&mut disk, &mut header, BLOCK_SIZE).unwrap();

        disk.seek(a, Whence::Start).unwrap();
        disk.write_all(&[0xAB; BLOCK_SIZE as usize]).unwrap();
        table.set_used(&mut disk, &header, a, BLOCK_SIZE).unwrap();

        let new_offset = table.realloc(&mut disk, &mut header, a, 3 * BLOCK_SIZE).unwrap();
        assert_ne!(new_offset, a);

        assert_eq!(table.find(&mut disk, &header, a), Err(Error::NotFound));
        let relocated = table.find(&mut disk, &header, new_offset).unwrap();
        assert_eq!(relocated.used, BLOCK_SIZE);
        assert_eq!(relocated.reserved, 3 * BLOCK_SIZE);

        let mut buf = [0u8; BLOCK_SIZE as usize];
        disk.seek(new_offset, Whence::Start).unwrap();
        disk.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0xAB; BLOCK_SIZE as usize]);

        let status = table.status(&mut disk, &header).unwrap();
        assert_eq!(status.reserved, 3 * BLOCK_SIZE + BLOCK_SIZE);
    }

    #[test]
    fn invariants_hold_after_several_allocations() {
        let (mut disk, mut header) = fresh_disk(64 * BLOCK_SIZE);
        let table = Table::new(TABLE_OFFSET);
        let mut offsets = alloc::vec::Vec::new();
        for i in 1..10u64 {
            offsets.push(table.allocate(&mut disk, &mut header, i * BLOCK_SIZE / 3).unwrap());
        }
        let mut prev: Option<TableEntry> = None;
        for index in 0..header.table_entry_count {
            let entry = table.read_slot(&mut disk, index).unwrap();
            assert!(entry.offset + entry.reserved <= header.total_size);
            assert!(entry.used <= entry.reserved);
            assert_eq!(entry.reserved % BLOCK_SIZE, 0);
            if let Some(prev) = prev {
                assert!(entry.offset >= prev.offset + prev.reserved);
            }
            prev = Some(entry);
        }
    }
}
