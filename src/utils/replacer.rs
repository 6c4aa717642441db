use std::collections::{HashMap, VecDeque};

use crate::common::FrameId;
use crate::errors::StorageError;

/// Eviction policy seam. The buffer pool talks to its replacer through this
/// trait; frames with a positive pin count are kept non-evictable by the
/// pool, so the replacer only ever sees eviction candidates it may take.
pub trait Replacer {
    fn record_access(&mut self, frame_id: FrameId) -> Result<(), StorageError>;
    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) -> Result<(), StorageError>;
    fn evict(&mut self) -> Option<FrameId>;
    fn remove(&mut self, frame_id: FrameId) -> Result<(), StorageError>;
    fn size(&self) -> usize;
}

// Access history of a single frame: the most recent k timestamps, oldest at
// the front.
pub struct LRUKNode {
    history: VecDeque<u64>,
    k: usize,
    is_evictable: bool,
}

impl LRUKNode {
    fn new(k: usize) -> Self {
        LRUKNode {
            history: VecDeque::with_capacity(k),
            k,
            is_evictable: false,
        }
    }

    fn push_timestamp(&mut self, timestamp: u64) {
        self.history.push_back(timestamp);
        if self.history.len() > self.k {
            self.history.pop_front();
        }
    }

    // u64::MAX stands in for +inf while the node has fewer than k accesses.
    fn backward_k_distance(&self, now: u64) -> u64 {
        if self.history.len() < self.k {
            return u64::MAX;
        }
        now - self.history.front().unwrap()
    }

    fn earliest_timestamp(&self) -> u64 {
        *self.history.front().unwrap()
    }
}

/// LRU-K replacement: the victim is the evictable frame with the largest
/// backward k-distance. Frames with fewer than k recorded accesses count as
/// infinitely distant; ties fall to the frame whose oldest known access is
/// earliest, which also orders the infinite group among themselves.
pub struct LRUKReplacer {
    node_store: HashMap<FrameId, LRUKNode>,
    current_timestamp: u64,
    current_size: usize,
    num_frames: usize,
    k: usize,
}

impl LRUKReplacer {
    pub fn new(num_frames: usize, k: usize) -> Self {
        LRUKReplacer {
            node_store: HashMap::with_capacity(num_frames),
            current_timestamp: 0,
            current_size: 0,
            num_frames,
            k,
        }
    }

    fn check_bounds(&self, frame_id: FrameId) -> Result<(), StorageError> {
        if frame_id < 0 || frame_id as usize >= self.num_frames {
            return Err(StorageError::OutOfRange(frame_id));
        }
        Ok(())
    }
}

impl Replacer for LRUKReplacer {
    fn record_access(&mut self, frame_id: FrameId) -> Result<(), StorageError> {
        self.check_bounds(frame_id)?;

        let k = self.k;
        let node = self
            .node_store
            .entry(frame_id)
            .or_insert_with(|| LRUKNode::new(k));

        node.push_timestamp(self.current_timestamp);
        self.current_timestamp += 1;
        Ok(())
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) -> Result<(), StorageError> {
        self.check_bounds(frame_id)?;

        let node = self
            .node_store
            .get_mut(&frame_id)
            .ok_or(StorageError::OutOfRange(frame_id))?;

        // Only a state change moves the size.
        if node.is_evictable != evictable {
            node.is_evictable = evictable;
            if evictable {
                self.current_size += 1;
            } else {
                self.current_size -= 1;
            }
        }
        Ok(())
    }

    fn evict(&mut self) -> Option<FrameId> {
        let now = self.current_timestamp;
        let mut victim: Option<(FrameId, u64, u64)> = None;

        for (&frame_id, node) in self.node_store.iter() {
            if !node.is_evictable {
                continue;
            }

            let distance = node.backward_k_distance(now);
            let earliest = node.earliest_timestamp();

            let better = match victim {
                None => true,
                Some((_, best_distance, best_earliest)) => {
                    distance > best_distance
                        || (distance == best_distance && earliest < best_earliest)
                }
            };
            if better {
                victim = Some((frame_id, distance, earliest));
            }
        }

        let (frame_id, _, _) = victim?;

        // The victim's history dies with it; a later access starts fresh.
        self.node_store.remove(&frame_id);
        self.current_size -= 1;
        Some(frame_id)
    }

    fn remove(&mut self, frame_id: FrameId) -> Result<(), StorageError> {
        self.check_bounds(frame_id)?;

        if let Some(node) = self.node_store.remove(&frame_id) {
            if node.is_evictable {
                self.current_size -= 1;
            }
        }
        Ok(())
    }

    fn size(&self) -> usize {
        self.current_size
    }
}
