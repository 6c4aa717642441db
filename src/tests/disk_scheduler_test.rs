#[cfg(test)]
pub mod test {
    use std::sync::{atomic::AtomicU8, Arc, Mutex};

    use byteorder::{ByteOrder, LittleEndian};
    use tempfile::tempdir;

    use crate::common::{PageId, PAGE_SIZE};
    use crate::storage::disk::{
        manager::DiskManager,
        scheduler::{DiskData, DiskRequest, DiskScheduler, IoFuture},
    };

    fn write_request(scheduler: &DiskScheduler, page_id: PageId, data: Box<[u8]>) -> IoFuture {
        let future = scheduler.create_future();
        scheduler.schedule(DiskRequest {
            is_write: true,
            data: DiskData::Write(data),
            page_id,
            done_flag: Arc::clone(&future.flag),
            waker: Arc::clone(&future.waker),
        });
        future
    }

    fn read_request(
        scheduler: &DiskScheduler,
        page_id: PageId,
        buffer: &Arc<Mutex<Box<[u8]>>>,
    ) -> IoFuture {
        let future = scheduler.create_future();
        scheduler.schedule(DiskRequest {
            is_write: false,
            data: DiskData::Read(Arc::clone(buffer)),
            page_id,
            done_flag: Arc::clone(&future.flag),
            waker: Arc::clone(&future.waker),
        });
        future
    }

    #[test]
    fn write_then_read() {
        let dir = tempdir().unwrap();
        let manager = DiskManager::open(dir.path().join("test.db")).unwrap();
        let scheduler = DiskScheduler::new(manager);

        let data: Box<[u8]> = vec![42u8; PAGE_SIZE].into_boxed_slice();
        assert!(write_request(&scheduler, 0, data.clone()).wait());

        let buffer = Arc::new(Mutex::new(vec![0u8; PAGE_SIZE].into_boxed_slice()));
        assert!(read_request(&scheduler, 0, &buffer).wait());

        assert_eq!(&**buffer.lock().unwrap(), &*data, "Page read mismatch!");
    }

    #[tokio::test]
    async fn futures_are_awaitable() {
        let dir = tempdir().unwrap();
        let manager = DiskManager::open(dir.path().join("test.db")).unwrap();
        let scheduler = DiskScheduler::new(manager);

        let data: Box<[u8]> = vec![7u8; PAGE_SIZE].into_boxed_slice();
        let write_future = write_request(&scheduler, 0, data);

        let buffer = Arc::new(Mutex::new(vec![0u8; PAGE_SIZE].into_boxed_slice()));
        let read_future = read_request(&scheduler, 0, &buffer);

        assert!(write_future.await);
        assert!(read_future.await);
        assert_eq!(buffer.lock().unwrap()[0], 7);
    }

    #[test]
    fn requests_run_in_submission_order() {
        let dir = tempdir().unwrap();
        let manager = DiskManager::open(dir.path().join("test.db")).unwrap();
        let scheduler = DiskScheduler::new(manager);

        // Ten writes against the same page; the last submitted must win.
        let mut futures = Vec::new();
        for marker in 0u32..10 {
            let mut data = vec![0u8; PAGE_SIZE].into_boxed_slice();
            LittleEndian::write_u32(&mut data[0..4], marker);
            futures.push(write_request(&scheduler, 0, data));
        }
        for future in futures {
            assert!(future.wait());
        }

        let buffer = Arc::new(Mutex::new(vec![0u8; PAGE_SIZE].into_boxed_slice()));
        assert!(read_request(&scheduler, 0, &buffer).wait());
        assert_eq!(LittleEndian::read_u32(&buffer.lock().unwrap()[0..4]), 9);
    }

    #[test]
    fn failed_read_completes_false() {
        let dir = tempdir().unwrap();
        let manager = DiskManager::open(dir.path().join("test.db")).unwrap();
        let scheduler = DiskScheduler::new(manager);

        // Nothing was ever written, so page 7 lies past the end of the file.
        let buffer = Arc::new(Mutex::new(vec![0u8; PAGE_SIZE].into_boxed_slice()));
        assert!(!read_request(&scheduler, 7, &buffer).wait());
    }

    #[test]
    fn drop_drains_submitted_requests() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let flags: Vec<Arc<AtomicU8>>;
        {
            let manager = DiskManager::open(&db_path).unwrap();
            let scheduler = DiskScheduler::new(manager);

            flags = (0..5)
                .map(|page_id| {
                    let data = vec![page_id as u8 + 1; PAGE_SIZE].into_boxed_slice();
                    Arc::clone(&write_request(&scheduler, page_id, data).flag)
                })
                .collect();
            // Scheduler drops here; the pill queues behind the writes.
        }

        for flag in &flags {
            assert_eq!(flag.load(std::sync::atomic::Ordering::Acquire), 1);
        }

        let mut manager = DiskManager::open(&db_path).unwrap();
        assert_eq!(manager.num_pages().unwrap(), 5);
        let mut page_buffer = vec![0u8; PAGE_SIZE];
        manager.read_page(4, &mut page_buffer).unwrap();
        assert_eq!(page_buffer[0], 5);
    }
}
