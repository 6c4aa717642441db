use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU8, Ordering},
        mpsc::{self, Receiver, Sender},
        Arc, Mutex,
    },
    task::{Context, Poll, Wake, Waker},
    thread::{self, JoinHandle, Thread},
};

use crate::common::{PageId, INVALID_PAGE_ID};
use crate::storage::disk::manager::DiskManager;

// States of an in-flight I/O operation.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoStatus {
    Pending = 0,
    Success = 1,
    WriteError = 2,
    ReadError = 3,
}

impl IoStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => IoStatus::Success,
            2 => IoStatus::WriteError,
            3 => IoStatus::ReadError,
            _ => IoStatus::Pending,
        }
    }

    fn is_done(self) -> bool {
        self != IoStatus::Pending
    }
}

/// Completion handle for a scheduled request. Resolves to `true` when the
/// worker finished the operation successfully.
pub struct IoFuture {
    pub flag: Arc<AtomicU8>,
    pub waker: Arc<Mutex<Option<Waker>>>,
}

impl Future for IoFuture {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let status = IoStatus::from_u8(self.flag.load(Ordering::Acquire));
        if status.is_done() {
            return Poll::Ready(status == IoStatus::Success);
        }

        {
            let mut waker_guard = self.waker.lock().unwrap();
            *waker_guard = Some(cx.waker().clone());
        }

        // The worker may have completed between the first load and the waker
        // store; check again so the wakeup cannot be lost.
        let status = IoStatus::from_u8(self.flag.load(Ordering::Acquire));
        if status.is_done() {
            Poll::Ready(status == IoStatus::Success)
        } else {
            Poll::Pending
        }
    }
}

struct Unparker(Thread);

impl Wake for Unparker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }
}

impl IoFuture {
    /// Block the calling thread until the request completes. Used by the
    /// buffer pool, which has no executor to await on.
    pub fn wait(mut self) -> bool {
        let waker = Waker::from(Arc::new(Unparker(thread::current())));
        let mut cx = Context::from_waker(&waker);

        loop {
            match Pin::new(&mut self).poll(&mut cx) {
                Poll::Ready(ok) => return ok,
                Poll::Pending => thread::park(),
            }
        }
    }
}

/// Payload of a request. Writes move their buffer into the request; reads
/// share a buffer the worker fills. Shutdown is the poison pill the
/// scheduler enqueues when it is dropped.
pub enum DiskData {
    Write(Box<[u8]>),
    Read(Arc<Mutex<Box<[u8]>>>),
    Shutdown,
}

/// A request to perform one page of disk I/O.
pub struct DiskRequest {
    // Flag indicating whether the request is a write or a read.
    pub is_write: bool,

    // Buffer being written out, or shared buffer being read into.
    pub data: DiskData,

    // ID of the page being read from / written to disk.
    pub page_id: PageId,

    // Completion pair shared with the issuer's IoFuture.
    pub done_flag: Arc<AtomicU8>,
    pub waker: Arc<Mutex<Option<Waker>>>,
}

/// Serializes page I/O onto one background worker that owns the DiskManager.
/// Requests run strictly in submission order, so two requests against the
/// same page can never be reordered.
pub struct DiskScheduler {
    request_queue: Sender<DiskRequest>,
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(manager: DiskManager) -> Self {
        let (tx, rx) = mpsc::channel::<DiskRequest>();

        let worker = thread::spawn(move || Self::run_worker(manager, rx));

        DiskScheduler {
            request_queue: tx,
            worker: Some(worker),
        }
    }

    fn run_worker(mut manager: DiskManager, queue: Receiver<DiskRequest>) {
        while let Ok(request) = queue.recv() {
            let DiskRequest {
                data,
                page_id,
                done_flag,
                waker,
                ..
            } = request;

            let status = match data {
                DiskData::Shutdown => break,
                DiskData::Write(buffer) => match manager.write_page(page_id, &buffer) {
                    Ok(()) => IoStatus::Success,
                    Err(err) => {
                        log::warn!("write of page {} failed: {}", page_id, err);
                        IoStatus::WriteError
                    }
                },
                DiskData::Read(buffer) => {
                    let mut buffer_guard = buffer.lock().unwrap();
                    match manager.read_page(page_id, &mut buffer_guard) {
                        Ok(()) => IoStatus::Success,
                        Err(err) => {
                            log::warn!("read of page {} failed: {}", page_id, err);
                            IoStatus::ReadError
                        }
                    }
                }
            };

            done_flag.store(status as u8, Ordering::Release);
            if let Some(waker) = waker.lock().unwrap().take() {
                waker.wake();
            };
        }
    }

    /// A fresh future whose completion pair gets attached to a request.
    pub fn create_future(&self) -> IoFuture {
        IoFuture {
            flag: Arc::new(AtomicU8::new(IoStatus::Pending as u8)),
            waker: Arc::new(Mutex::new(None)),
        }
    }

    /// Enqueue a request. Returns immediately; the caller tracks completion
    /// through the IoFuture it attached.
    pub fn schedule(&self, request: DiskRequest) {
        self.request_queue
            .send(request)
            .expect("disk scheduler worker has exited");
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Poison pill. Everything enqueued before it is drained first; the
        // worker exits without completing the pill's future.
        let pill = DiskRequest {
            is_write: false,
            data: DiskData::Shutdown,
            page_id: INVALID_PAGE_ID,
            done_flag: Arc::new(AtomicU8::new(IoStatus::Pending as u8)),
            waker: Arc::new(Mutex::new(None)),
        };

        if self.request_queue.send(pill).is_ok() {
            if let Some(worker) = self.worker.take() {
                let _ = worker.join();
            }
        }
    }
}
