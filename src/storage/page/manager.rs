use crate::storage::page::header::PageHeader;
use crate::storage::page::error::PageError;
use crate::storage::page::layout::{HEADER_SIZE, RECORD_OFFSET_SIZE, RecordLocation};

/// Slotted record layout over a raw page buffer.
///
/// Record data grows forward from just after the header; the slot array grows
/// backward from the end of the page. Slot numbers are stable: deleting a
/// record leaves a tombstone slot.
#[derive(Debug, Default, Clone, Copy)]
pub struct PageManager;

impl PageManager {
    pub fn new() -> Self {
        Self
    }

    pub fn init_page(&self, page: &mut [u8]) {
        page.fill(0);
        let header = PageHeader::new(page.len());
        page[0..HEADER_SIZE].copy_from_slice(&header.to_bytes());
    }

    /// Largest record an empty page of `page_size` bytes can hold
    pub fn max_record_size(page_size: usize) -> usize {
        page_size.saturating_sub(HEADER_SIZE + RECORD_OFFSET_SIZE)
    }

    /// Whether a record of `len` bytes fits in this page
    pub fn has_room(&self, page: &[u8], len: usize) -> bool {
        self.get_header(page).free_space_size as usize >= len + RECORD_OFFSET_SIZE
    }

    pub fn insert_record(&self, page: &mut [u8], data: &[u8]) -> Result<u32, PageError> {
        let mut header = self.get_header(page);

        // Record size plus the slot entry for the record
        let record_size = data.len() as u32;
        let total_space_needed = record_size + RECORD_OFFSET_SIZE as u32;
        if header.free_space_size < total_space_needed {
            return Err(PageError::InsufficientSpace);
        }

        let slot = header.record_count;
        let data_start = header.free_space_offset as usize;
        let slot_pos = Self::slot_position(page.len(), slot)
            .filter(|&pos| data_start >= HEADER_SIZE && data_start + data.len() <= pos)
            .ok_or(PageError::CorruptedPage)?;
        let record_loc = RecordLocation {
            offset: header.free_space_offset,
            length: record_size,
        };

        page[data_start..data_start + data.len()].copy_from_slice(data);
        page[slot_pos..slot_pos + RECORD_OFFSET_SIZE].copy_from_slice(&record_loc.to_bytes());

        header.free_space_offset += record_size;
        header.free_space_size -= total_space_needed;
        header.record_count += 1;
        page[0..HEADER_SIZE].copy_from_slice(&header.to_bytes());

        Ok(slot)
    }

    pub fn delete_record(&self, page: &mut [u8], slot: u32) -> Result<(), PageError> {
        let slot_pos = self.live_slot(page, slot)?.0;
        let tombstone = RecordLocation { offset: 0, length: 0 };
        page[slot_pos..slot_pos + RECORD_OFFSET_SIZE].copy_from_slice(&tombstone.to_bytes());
        Ok(())
    }

    pub fn get_record(&self, page: &[u8], slot: u32) -> Result<Vec<u8>, PageError> {
        let (_, record_loc) = self.live_slot(page, slot)?;
        let start = record_loc.offset as usize;
        Ok(page[start..start + record_loc.length as usize].to_vec())
    }

    /// All live records with their slot numbers, in slot order
    pub fn records(&self, page: &[u8]) -> Vec<(u32, Vec<u8>)> {
        let max_slots = (page.len().saturating_sub(HEADER_SIZE) / RECORD_OFFSET_SIZE) as u32;
        let header = self.get_header(page);
        (0..header.record_count.min(max_slots))
            .filter_map(|slot| self.get_record(page, slot).ok().map(|data| (slot, data)))
            .collect()
    }

    pub fn get_header(&self, page: &[u8]) -> PageHeader {
        PageHeader::from_bytes(&page[0..HEADER_SIZE])
    }

    fn live_slot(&self, page: &[u8], slot: u32) -> Result<(usize, RecordLocation), PageError> {
        if slot >= self.get_header(page).record_count {
            return Err(PageError::InvalidRecordId);
        }
        let slot_pos = Self::slot_position(page.len(), slot).ok_or(PageError::InvalidRecordId)?;
        let record_loc = RecordLocation::from_bytes(&page[slot_pos..slot_pos + RECORD_OFFSET_SIZE]);
        if record_loc.is_deleted() {
            return Err(PageError::RecordNotFound);
        }

        // Record bytes must sit between the header and the slot array
        let start = record_loc.offset as usize;
        let end = start + record_loc.length as usize;
        if start < HEADER_SIZE || end > slot_pos {
            return Err(PageError::InvalidRecordId);
        }
        Ok((slot_pos, record_loc))
    }

    /// Byte offset of a slot entry, if it lies past the header
    fn slot_position(page_size: usize, slot: u32) -> Option<usize> {
        let slot_bytes = RECORD_OFFSET_SIZE.checked_mul(slot as usize + 1)?;
        page_size.checked_sub(slot_bytes).filter(|&pos| pos >= HEADER_SIZE)
    }
}
