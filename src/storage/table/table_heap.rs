use std::sync::Arc;

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::common::{PageId, Rid, INVALID_PAGE_ID};
use crate::storage::table::table_page::TablePage;
use crate::storage::tuple::Tuple;

/// A table as a doubly linked chain of slotted pages. Inserts go to the tail
/// page and chain a fresh page when it is full; reads, updates and deletes
/// are addressed by rid. Pages are pinned only for the duration of a single
/// operation.
pub struct TableHeap {
    bpm: Arc<BufferPoolManager>,
    first_page_id: PageId,
    last_page_id: PageId,
}

impl TableHeap {
    /// A new table backed by one freshly allocated, empty page. None when
    /// the pool cannot supply a frame.
    pub fn create(bpm: Arc<BufferPoolManager>) -> Option<TableHeap> {
        let frame = bpm.new_page()?;
        let page_id = frame.page_id();

        TablePage::new(&mut frame.data_mut()[..]).init(page_id, INVALID_PAGE_ID, INVALID_PAGE_ID);
        bpm.unpin_page(page_id, true);

        Some(TableHeap {
            bpm,
            first_page_id: page_id,
            last_page_id: page_id,
        })
    }

    /// Attach to an existing chain. The tail is found by walking the next
    /// links from `first_page_id`; every visited page is unpinned clean.
    pub fn open(bpm: Arc<BufferPoolManager>, first_page_id: PageId) -> TableHeap {
        let mut last_page_id = first_page_id;
        let mut cursor = first_page_id;

        while cursor != INVALID_PAGE_ID {
            let Some(frame) = bpm.fetch_page(cursor) else {
                break;
            };
            let next_page_id = TablePage::new(&frame.data()[..]).next_page_id();
            bpm.unpin_page(cursor, false);

            last_page_id = cursor;
            cursor = next_page_id;
        }

        TableHeap {
            bpm,
            first_page_id,
            last_page_id,
        }
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    pub fn last_page_id(&self) -> PageId {
        self.last_page_id
    }

    /// Insert at the tail, chaining a new page when the tail is full.
    /// Returns the default rid when no page can take the tuple.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> Rid {
        let last_page_id = self.last_page_id;
        let Some(last_frame) = self.bpm.fetch_page(last_page_id) else {
            return Rid::default();
        };

        let rid = TablePage::new(&mut last_frame.data_mut()[..]).insert_tuple(tuple);
        if rid.is_valid() {
            self.bpm.unpin_page(last_page_id, true);
            return rid;
        }

        // Tail is full; chain a fresh page and insert there.
        let Some(new_frame) = self.bpm.new_page() else {
            self.bpm.unpin_page(last_page_id, false);
            return Rid::default();
        };
        let new_page_id = new_frame.page_id();

        let rid = {
            let mut data = new_frame.data_mut();
            let mut new_page = TablePage::new(&mut data[..]);
            new_page.init(new_page_id, last_page_id, INVALID_PAGE_ID);
            new_page.insert_tuple(tuple)
        };
        TablePage::new(&mut last_frame.data_mut()[..]).set_next_page_id(new_page_id);
        self.last_page_id = new_page_id;

        self.bpm.unpin_page(new_page_id, true);
        self.bpm.unpin_page(last_page_id, true);
        rid
    }

    /// Tombstone the record at `rid`. The page is only marked dirty when the
    /// delete took.
    pub fn mark_deleted(&mut self, rid: Rid) -> bool {
        let Some(frame) = self.bpm.fetch_page(rid.page_id()) else {
            return false;
        };

        let deleted = TablePage::new(&mut frame.data_mut()[..]).mark_deleted(rid);
        self.bpm.unpin_page(rid.page_id(), deleted);
        deleted
    }

    pub fn update_tuple(&mut self, new_tuple: &Tuple, rid: Rid) -> bool {
        let Some(frame) = self.bpm.fetch_page(rid.page_id()) else {
            return false;
        };

        let updated = TablePage::new(&mut frame.data_mut()[..]).update_tuple(new_tuple, rid);
        self.bpm.unpin_page(rid.page_id(), updated);
        updated
    }

    /// Read the record at `rid`; the empty tuple when the page cannot be
    /// fetched, the slot does not exist, or the record was deleted.
    pub fn get_tuple(&self, rid: Rid) -> Tuple {
        let Some(frame) = self.bpm.fetch_page(rid.page_id()) else {
            return Tuple::empty();
        };

        let tuple = TablePage::new(&frame.data()[..]).get_tuple(rid);
        self.bpm.unpin_page(rid.page_id(), false);
        tuple
    }

    /// Iterator positioned at the first live tuple, or at the end when the
    /// table holds none.
    pub fn iter(&self) -> TableIterator<'_> {
        let mut cursor = self.first_page_id;

        while cursor != INVALID_PAGE_ID {
            let Some(frame) = self.bpm.fetch_page(cursor) else {
                break;
            };

            let (found, next_page_id) = {
                let data = frame.data();
                let page = TablePage::new(&data[..]);
                let found = (0..page.tuple_count())
                    .find(|&slot_id| page.slot(slot_id).is_some_and(|s| s.storage_size != 0));
                (found, page.next_page_id())
            };
            self.bpm.unpin_page(cursor, false);

            if let Some(slot_id) = found {
                return TableIterator {
                    heap: self,
                    rid: Rid::new(cursor, slot_id),
                };
            }
            cursor = next_page_id;
        }

        self.end()
    }

    pub fn end(&self) -> TableIterator<'_> {
        TableIterator {
            heap: self,
            rid: Rid::default(),
        }
    }
}

/// Forward, single-pass cursor over the live tuples of a heap, in chain
/// order then slot order. Holds no pins between steps.
pub struct TableIterator<'a> {
    heap: &'a TableHeap,
    rid: Rid,
}

impl TableIterator<'_> {
    pub fn rid(&self) -> Rid {
        self.rid
    }

    // Move to the next live slot: the rest of the current page first, then
    // down the chain. The default rid marks exhaustion.
    fn advance(&mut self) {
        let mut page_id = self.rid.page_id();
        let mut slot_id = self.rid.slot_id() + 1;

        while page_id != INVALID_PAGE_ID {
            let Some(frame) = self.heap.bpm.fetch_page(page_id) else {
                break;
            };

            let (found, next_page_id) = {
                let data = frame.data();
                let page = TablePage::new(&data[..]);
                let found = (slot_id..page.tuple_count())
                    .find(|&id| page.slot(id).is_some_and(|s| s.storage_size != 0));
                (found, page.next_page_id())
            };
            self.heap.bpm.unpin_page(page_id, false);

            if let Some(id) = found {
                self.rid = Rid::new(page_id, id);
                return;
            }
            page_id = next_page_id;
            slot_id = 0;
        }

        self.rid = Rid::default();
    }
}

impl PartialEq for TableIterator<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.heap, other.heap) && self.rid == other.rid
    }
}

impl Eq for TableIterator<'_> {}

impl Iterator for TableIterator<'_> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        if !self.rid.is_valid() {
            return None;
        }

        let tuple = self.heap.get_tuple(self.rid);
        self.advance();
        Some(tuple)
    }
}
