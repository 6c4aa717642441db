use byteorder::{ByteOrder, LittleEndian};

use crate::common::{PageId, Rid, PAGE_SIZE};
use crate::storage::tuple::Tuple;

// On-page layout. The header sits at offset 0, the slot directory grows
// upward from the header, and tuple payloads grow downward from the end of
// the page. free_space_ptr is the lowest occupied payload byte.
//
//   0       4     page_id         (i32)
//   4       4     prev_page_id    (i32)
//   8       4     next_page_id    (i32)
//   12      4     tuple_count     (u32)
//   16      4     free_space_ptr  (u32)
//   20..    8*N   slots {offset: u32, storage_size: u32}
//   ...
//   [fsp]..4096   tuple payloads

pub const HEADER_SIZE: usize = 20;
pub const SLOT_SIZE: usize = 8;

const PAGE_ID_OFFSET: usize = 0;
const PREV_PAGE_ID_OFFSET: usize = 4;
const NEXT_PAGE_ID_OFFSET: usize = 8;
const TUPLE_COUNT_OFFSET: usize = 12;
const FREE_SPACE_PTR_OFFSET: usize = 16;

/// Directory entry of one tuple. A storage size of zero marks a tombstone;
/// the slot index of a tombstone is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub offset: u32,
    pub storage_size: u32,
}

/// Slotted-page view over a frame's buffer. Generic over the borrow so the
/// same code serves `TablePage::new(&data[..])` for readers and
/// `TablePage::new(&mut data[..])` for writers; the view owns nothing.
pub struct TablePage<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> TablePage<B> {
    pub fn new(buf: B) -> Self {
        debug_assert_eq!(buf.as_ref().len(), PAGE_SIZE);
        TablePage { buf }
    }

    fn data(&self) -> &[u8] {
        self.buf.as_ref()
    }

    pub fn page_id(&self) -> PageId {
        LittleEndian::read_i32(&self.data()[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4])
    }

    pub fn prev_page_id(&self) -> PageId {
        LittleEndian::read_i32(&self.data()[PREV_PAGE_ID_OFFSET..PREV_PAGE_ID_OFFSET + 4])
    }

    pub fn next_page_id(&self) -> PageId {
        LittleEndian::read_i32(&self.data()[NEXT_PAGE_ID_OFFSET..NEXT_PAGE_ID_OFFSET + 4])
    }

    pub fn tuple_count(&self) -> u32 {
        LittleEndian::read_u32(&self.data()[TUPLE_COUNT_OFFSET..TUPLE_COUNT_OFFSET + 4])
    }

    pub fn free_space_ptr(&self) -> u32 {
        LittleEndian::read_u32(&self.data()[FREE_SPACE_PTR_OFFSET..FREE_SPACE_PTR_OFFSET + 4])
    }

    /// Bytes left between the slot directory and the payload area,
    /// saturated at zero should the page ever be corrupt.
    pub fn free_space_remaining(&self) -> u32 {
        let used = (HEADER_SIZE + self.tuple_count() as usize * SLOT_SIZE) as u32;
        self.free_space_ptr().saturating_sub(used)
    }

    pub fn slot(&self, slot_id: u32) -> Option<Slot> {
        if slot_id >= self.tuple_count() {
            return None;
        }
        let base = HEADER_SIZE + slot_id as usize * SLOT_SIZE;
        Some(Slot {
            offset: LittleEndian::read_u32(&self.data()[base..base + 4]),
            storage_size: LittleEndian::read_u32(&self.data()[base + 4..base + 8]),
        })
    }

    /// Copy the tuple at `rid` out of the page. The empty tuple stands for
    /// "no such slot" and "deleted" alike.
    pub fn get_tuple(&self, rid: Rid) -> Tuple {
        let Some(slot) = self.slot(rid.slot_id()) else {
            return Tuple::empty();
        };
        if slot.storage_size == 0 {
            return Tuple::empty();
        }

        let start = slot.offset as usize;
        Tuple::from_slice(rid, &self.data()[start..start + slot.storage_size as usize])
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> TablePage<B> {
    fn data_mut(&mut self) -> &mut [u8] {
        self.buf.as_mut()
    }

    fn write_u32(&mut self, at: usize, val: u32) {
        LittleEndian::write_u32(&mut self.data_mut()[at..at + 4], val);
    }

    fn write_i32(&mut self, at: usize, val: i32) {
        LittleEndian::write_i32(&mut self.data_mut()[at..at + 4], val);
    }

    pub fn init(&mut self, page_id: PageId, prev_page_id: PageId, next_page_id: PageId) {
        self.write_i32(PAGE_ID_OFFSET, page_id);
        self.write_i32(PREV_PAGE_ID_OFFSET, prev_page_id);
        self.write_i32(NEXT_PAGE_ID_OFFSET, next_page_id);
        self.write_u32(TUPLE_COUNT_OFFSET, 0);
        self.write_u32(FREE_SPACE_PTR_OFFSET, PAGE_SIZE as u32);
    }

    pub fn set_next_page_id(&mut self, next_page_id: PageId) {
        self.write_i32(NEXT_PAGE_ID_OFFSET, next_page_id);
    }

    fn set_slot(&mut self, slot_id: u32, slot: Slot) {
        let base = HEADER_SIZE + slot_id as usize * SLOT_SIZE;
        self.write_u32(base, slot.offset);
        self.write_u32(base + 4, slot.storage_size);
    }

    // Claim storage_size bytes at the bottom of the free region and copy the
    // payload in. None when the payload alone does not fit.
    fn move_insert(&mut self, tuple: &Tuple) -> Option<u32> {
        let storage_size = tuple.storage_size();
        if self.free_space_remaining() < storage_size {
            return None;
        }

        let offset = self.free_space_ptr() - storage_size;
        self.data_mut()[offset as usize..(offset + storage_size) as usize]
            .copy_from_slice(tuple.data());
        self.write_u32(FREE_SPACE_PTR_OFFSET, offset);
        Some(offset)
    }

    /// Append a tuple, claiming payload space and a fresh slot. Returns the
    /// default rid when the page cannot hold both.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> Rid {
        let storage_size = tuple.storage_size();
        if self.free_space_remaining() < storage_size + SLOT_SIZE as u32 {
            return Rid::default();
        }

        let offset = self.free_space_ptr() - storage_size;
        self.data_mut()[offset as usize..(offset + storage_size) as usize]
            .copy_from_slice(tuple.data());
        self.write_u32(FREE_SPACE_PTR_OFFSET, offset);

        let slot_id = self.tuple_count();
        self.set_slot(slot_id, Slot { offset, storage_size });
        self.write_u32(TUPLE_COUNT_OFFSET, slot_id + 1);

        Rid::new(self.page_id(), slot_id)
    }

    /// Turn the slot into a tombstone. The payload bytes stay where they
    /// are; nothing compacts them.
    pub fn mark_deleted(&mut self, rid: Rid) -> bool {
        let Some(slot) = self.slot(rid.slot_id()) else {
            return false;
        };

        self.set_slot(
            rid.slot_id(),
            Slot {
                offset: slot.offset,
                storage_size: 0,
            },
        );
        true
    }

    /// Replace the tuple behind `rid`. A tuple that shrank (or stayed put)
    /// is overwritten in place; a grown one moves to freshly claimed space
    /// and the slot is repointed. False when the grown copy does not fit,
    /// leaving the page unchanged.
    pub fn update_tuple(&mut self, new_tuple: &Tuple, rid: Rid) -> bool {
        let Some(slot) = self.slot(rid.slot_id()) else {
            return false;
        };

        let storage_size = new_tuple.storage_size();
        if storage_size <= slot.storage_size {
            let start = slot.offset as usize;
            self.data_mut()[start..start + storage_size as usize]
                .copy_from_slice(new_tuple.data());
            self.set_slot(
                rid.slot_id(),
                Slot {
                    offset: slot.offset,
                    storage_size,
                },
            );
            return true;
        }

        match self.move_insert(new_tuple) {
            Some(offset) => {
                self.set_slot(
                    rid.slot_id(),
                    Slot {
                        offset,
                        storage_size,
                    },
                );
                true
            }
            None => false,
        }
    }
}
