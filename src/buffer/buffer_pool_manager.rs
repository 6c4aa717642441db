use std::{
    collections::VecDeque,
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use hashlink::LinkedHashMap;

use crate::{
    common::{AtomicPageId, FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE},
    errors::StorageError,
    storage::disk::{
        manager::DiskManager,
        scheduler::{DiskData, DiskRequest, DiskScheduler},
    },
    utils::replacer::{LRUKReplacer, Replacer},
};

/// One slot of the in-memory page cache: a PAGE_SIZE buffer plus the
/// bookkeeping that ties it to a disk page.
///
/// The RwLock over the buffer is the frame's reader-writer latch; layers
/// above take it around tuple access. The pool itself only holds it across
/// the brief copy in or out of a disk buffer. Pinning, not latching, is what
/// keeps a frame resident.
pub struct FrameHeader {
    frame_id: FrameId,
    page_id: AtomicPageId,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
    data: RwLock<Box<[u8]>>,
}

pub type SharedFrame = Arc<FrameHeader>;

impl FrameHeader {
    fn new(frame_id: FrameId) -> Self {
        FrameHeader {
            frame_id,
            page_id: AtomicPageId::new(INVALID_PAGE_ID),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            data: RwLock::new(vec![0u8; PAGE_SIZE].into_boxed_slice()),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn page_id(&self) -> PageId {
        self.page_id.load(Ordering::Relaxed)
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Relaxed)
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Relaxed)
    }

    /// Take the frame's read latch.
    pub fn data(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.data.read().unwrap()
    }

    /// Take the frame's write latch.
    pub fn data_mut(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.data.write().unwrap()
    }

    // Dirty is sticky within a residency interval; only a completed
    // write-back or a reset clears it.
    fn set_dirty(&self, is_dirty: bool) {
        if is_dirty {
            self.is_dirty.store(true, Ordering::Relaxed);
        }
    }

    fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::Relaxed);
    }

    fn reset_memory(&self) {
        self.data_mut().fill(0);
        self.page_id.store(INVALID_PAGE_ID, Ordering::Relaxed);
        self.is_dirty.store(false, Ordering::Relaxed);
    }
}

// Page table and free list, guarded together by the pool latch.
struct PoolState {
    page_table: LinkedHashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
}

/// The buffer pool: a fixed set of frames fronting the database file.
///
/// Every public entry point serializes on one latch; the replacer has its
/// own lock and is only ever taken while the latch is held, so the nesting
/// order is latch, then replacer, then the scheduler channel. Disk waits
/// happen while the latch is held, which is a known scalability limit of
/// this layout.
pub struct BufferPoolManager {
    pool_size: usize,
    next_page_id: AtomicPageId,
    frames: Vec<SharedFrame>,
    latch: Mutex<PoolState>,
    replacer: Arc<Mutex<LRUKReplacer>>,
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Open the database file and build a pool of `pool_size` frames with an
    /// LRU-K replacer of the given k. Page id allocation continues from the
    /// number of pages already in the file.
    pub fn new<P: AsRef<Path>>(
        pool_size: usize,
        lru_k: usize,
        db_file: P,
    ) -> Result<Self, StorageError> {
        let manager = DiskManager::open(db_file)?;
        let next_page_id = manager.num_pages()? as PageId;

        let frames = (0..pool_size)
            .map(|i| Arc::new(FrameHeader::new(i as FrameId)))
            .collect();

        Ok(BufferPoolManager {
            pool_size,
            next_page_id: AtomicPageId::new(next_page_id),
            frames,
            latch: Mutex::new(PoolState {
                page_table: LinkedHashMap::new(),
                free_list: (0..pool_size as FrameId).collect(),
            }),
            replacer: Arc::new(Mutex::new(LRUKReplacer::new(pool_size, lru_k))),
            disk_scheduler: DiskScheduler::new(manager),
        })
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Pin count of a resident page, None when the page is not in memory.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.latch.lock().unwrap();
        let frame_id = *state.page_table.get(&page_id)?;
        Some(self.frames[frame_id as usize].pin_count())
    }

    /// Bring `page_id` into memory if needed and return its frame, pinned.
    /// None when the page cannot be given a frame or the disk read fails.
    pub fn fetch_page(&self, page_id: PageId) -> Option<SharedFrame> {
        if page_id == INVALID_PAGE_ID {
            return None;
        }

        let mut state = self.latch.lock().unwrap();

        // Already resident, no I/O needed.
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.pin_frame(frame_id);
            return Some(Arc::clone(&self.frames[frame_id as usize]));
        }

        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id as usize];

        frame.page_id.store(page_id, Ordering::Relaxed);
        state.page_table.insert(page_id, frame_id);

        // Read the page image through the scheduler, waiting on the worker.
        let buffer = Arc::new(Mutex::new(vec![0u8; PAGE_SIZE].into_boxed_slice()));
        let future = self.disk_scheduler.create_future();
        self.disk_scheduler.schedule(DiskRequest {
            is_write: false,
            data: DiskData::Read(Arc::clone(&buffer)),
            page_id,
            done_flag: Arc::clone(&future.flag),
            waker: Arc::clone(&future.waker),
        });

        if future.wait() {
            frame.data_mut().copy_from_slice(&buffer.lock().unwrap());
            self.pin_frame(frame_id);
            return Some(Arc::clone(frame));
        }

        // The read failed. Roll the mapping back so residency stays
        // consistent and hand the frame to the free list.
        log::debug!("read of page {} failed, rolling back frame {}", page_id, frame_id);
        state.page_table.remove(&page_id);
        frame.reset_memory();
        state.free_list.push_back(frame_id);
        None
    }

    /// Allocate a fresh page id, back it with a zeroed frame, and return the
    /// frame pinned. The page touches disk only when flushed or evicted.
    pub fn new_page(&self) -> Option<SharedFrame> {
        let mut state = self.latch.lock().unwrap();

        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id as usize];

        let page_id = self.next_page_id.fetch_add(1, Ordering::Relaxed);
        frame.page_id.store(page_id, Ordering::Relaxed);
        state.page_table.insert(page_id, frame_id);

        self.pin_frame(frame_id);
        Some(Arc::clone(frame))
    }

    /// Drop one pin on `page_id`, recording whether the caller wrote to it.
    /// Unpinning a page whose pin count is already zero is ignored.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) {
        let state = self.latch.lock().unwrap();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return;
        };
        let frame = &self.frames[frame_id as usize];

        if frame.pin_count() == 0 {
            return;
        }

        let remaining = frame.pin_count.fetch_sub(1, Ordering::Relaxed) - 1;
        frame.set_dirty(is_dirty);

        if remaining == 0 {
            self.replacer
                .lock()
                .unwrap()
                .set_evictable(frame_id, true)
                .expect("pinned frame is tracked by the replacer");
        }
    }

    /// Write a resident page back to disk and clear its dirty bit. A no-op
    /// for the invalid id or a page that is not in memory. Does not unpin.
    pub fn flush_page(&self, page_id: PageId) {
        if page_id == INVALID_PAGE_ID {
            return;
        }

        let state = self.latch.lock().unwrap();
        self.flush_page_internal(&state, page_id);
    }

    /// Write back every resident dirty page.
    pub fn flush_all_pages(&self) {
        let state = self.latch.lock().unwrap();

        for (_, &frame_id) in state.page_table.iter() {
            let frame = &self.frames[frame_id as usize];
            if frame.is_dirty() {
                self.flush_frame(frame);
            }
        }
    }

    /// Evict `page_id` from memory without writing it back. Trivially true
    /// when the page is not resident; false while anyone still pins it. The
    /// on-disk offset is not reclaimed.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.latch.lock().unwrap();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return true;
        };
        let frame = &self.frames[frame_id as usize];

        if frame.pin_count() > 0 {
            return false;
        }

        state.free_list.push_back(frame_id);
        self.replacer
            .lock()
            .unwrap()
            .remove(frame_id)
            .expect("frame id within the pool");
        state.page_table.remove(&page_id);
        frame.reset_memory();
        true
    }

    // Pin = one more claim plus an access in the replacer; a pinned frame is
    // never an eviction candidate.
    fn pin_frame(&self, frame_id: FrameId) {
        self.frames[frame_id as usize]
            .pin_count
            .fetch_add(1, Ordering::Relaxed);

        let mut replacer = self.replacer.lock().unwrap();
        replacer
            .record_access(frame_id)
            .expect("frame id within the pool");
        replacer
            .set_evictable(frame_id, false)
            .expect("frame id within the pool");
    }

    // Produce a frame ready to hold a new page: pop the free list, or evict
    // a victim, writing it back first when dirty.
    fn acquire_frame(&self, state: &mut PoolState) -> Option<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Some(frame_id);
        }

        let frame_id = self.replacer.lock().unwrap().evict()?;
        let frame = &self.frames[frame_id as usize];

        log::debug!("evicting page {} from frame {}", frame.page_id(), frame_id);

        if frame.is_dirty() {
            self.flush_frame(frame);
        }
        state.page_table.remove(&frame.page_id());
        frame.reset_memory();
        Some(frame_id)
    }

    fn flush_page_internal(&self, state: &PoolState, page_id: PageId) {
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.flush_frame(&self.frames[frame_id as usize]);
        }
    }

    // Synchronous write-back of one frame through the scheduler.
    fn flush_frame(&self, frame: &FrameHeader) -> bool {
        let page_id = frame.page_id();
        let page_data = (*frame.data()).clone();

        let future = self.disk_scheduler.create_future();
        self.disk_scheduler.schedule(DiskRequest {
            is_write: true,
            data: DiskData::Write(page_data),
            page_id,
            done_flag: Arc::clone(&future.flag),
            waker: Arc::clone(&future.waker),
        });

        if future.wait() {
            frame.clear_dirty();
            true
        } else {
            false
        }
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        // Persist whatever was unpinned dirty but never evicted. The
        // scheduler drains this before its own drop joins the worker.
        self.flush_all_pages();
    }
}
