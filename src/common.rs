use std::fmt;
use std::sync::atomic::AtomicI32;

// ID of a page on disk
pub type PageId = i32;
// ID of a frame in memory
pub type FrameId = i32;

pub type AtomicPageId = AtomicI32;

pub const INVALID_PAGE_ID: PageId = -1;
// Page 0 is reserved for a file header page
pub const HEADER_PAGE_ID: PageId = 0;

// Size of a page in bytes
pub const PAGE_SIZE: usize = 4096;

/// Record identifier: the page a tuple lives on and its slot within that page.
///
/// The default value `(INVALID_PAGE_ID, 0)` means "no record" and doubles as
/// the end marker of the table iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rid {
    page_id: PageId,
    slot_id: u32,
}

impl Rid {
    pub fn new(page_id: PageId, slot_id: u32) -> Self {
        Rid { page_id, slot_id }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn slot_id(&self) -> u32 {
        self.slot_id
    }

    pub fn is_valid(&self) -> bool {
        self.page_id != INVALID_PAGE_ID
    }
}

impl Default for Rid {
    fn default() -> Self {
        Rid {
            page_id: INVALID_PAGE_ID,
            slot_id: 0,
        }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid(page={}, slot={})", self.page_id, self.slot_id)
    }
}
