//! LRU replacement policy.
//!
//! Frames enter the eviction queue when they become unpinned and leave it
//! when pinned again or evicted. The front of the queue is always the frame
//! that has been unpinned the longest.

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::Replacer;
use crate::storage::buffer_pool::FrameId;

#[derive(Debug)]
struct LruState {
    /// Unpinned frames, oldest first.
    queue: VecDeque<FrameId>,
    /// Frames currently pinned.
    pinned: Vec<FrameId>,
}

/// Strict LRU replacer guarded by an internal mutex.
#[derive(Debug)]
pub struct LruReplacer {
    state: Mutex<LruState>,
    /// Number of frames tracked. Larger frame ids are ignored.
    capacity: usize,
}

impl LruReplacer {
    /// Creates a replacer for `capacity` frames with nothing eligible.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(LruState {
                queue: VecDeque::with_capacity(capacity),
                pinned: Vec::with_capacity(capacity),
            }),
            capacity,
        }
    }

    /// Returns the capacity this replacer was created with.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the eligible frames in eviction order (oldest first).
    #[must_use]
    pub fn eviction_order(&self) -> Vec<FrameId> {
        self.state.lock().queue.iter().copied().collect()
    }
}

impl Replacer for LruReplacer {
    fn mark_evictable(&self, frame_id: FrameId) {
        if frame_id >= self.capacity {
            return;
        }
        let mut state = self.state.lock();
        if state.queue.contains(&frame_id) {
            return;
        }
        state.pinned.retain(|&idx| idx != frame_id);
        state.queue.push_back(frame_id);
    }

    fn mark_pinned(&self, frame_id: FrameId) {
        if frame_id >= self.capacity {
            return;
        }
        let mut state = self.state.lock();
        // not only the front: the frame may sit anywhere in the queue
        state.queue.retain(|&idx| idx != frame_id);
        if !state.pinned.contains(&frame_id) {
            state.pinned.push(frame_id);
        }
    }

    fn remove(&self, frame_id: FrameId) {
        if frame_id >= self.capacity {
            return;
        }
        let mut state = self.state.lock();
        state.queue.retain(|&idx| idx != frame_id);
        state.pinned.retain(|&idx| idx != frame_id);
    }

    fn choose_victim(&self) -> Option<FrameId> {
        self.state.lock().queue.pop_front()
    }

    fn size(&self) -> usize {
        self.state.lock().queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_victims_in_unpin_order() {
        let replacer = LruReplacer::new(10);

        replacer.mark_evictable(0);
        replacer.mark_evictable(1);
        replacer.mark_evictable(2);

        assert_eq!(replacer.size(), 3);
        assert_eq!(replacer.choose_victim(), Some(0)); // Oldest first
        assert_eq!(replacer.choose_victim(), Some(1));
        assert_eq!(replacer.choose_victim(), Some(2));
        assert_eq!(replacer.choose_victim(), None);
    }

    #[test]
    fn test_repin_moves_to_back() {
        let replacer = LruReplacer::new(10);

        replacer.mark_evictable(0);
        replacer.mark_evictable(1);
        replacer.mark_evictable(2);
        replacer.mark_pinned(0);
        replacer.mark_evictable(0); // 0 is now the most recently unpinned

        assert_eq!(replacer.eviction_order(), vec![1, 2, 0]);
        assert_eq!(replacer.choose_victim(), Some(1));
        assert_eq!(replacer.choose_victim(), Some(2));
        assert_eq!(replacer.choose_victim(), Some(0));
    }

    #[test]
    fn test_pin_from_middle_of_queue() {
        let replacer = LruReplacer::new(10);

        replacer.mark_evictable(0);
        replacer.mark_evictable(1);
        replacer.mark_evictable(2);
        replacer.mark_pinned(1);

        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.choose_victim(), Some(0));
        assert_eq!(replacer.choose_victim(), Some(2));
        assert_eq!(replacer.choose_victim(), None);
    }

    #[test]
    fn test_duplicate_evictable_keeps_position() {
        let replacer = LruReplacer::new(10);

        replacer.mark_evictable(0);
        replacer.mark_evictable(1);
        replacer.mark_evictable(0);

        assert_eq!(replacer.eviction_order(), vec![0, 1]);
    }

    #[test]
    fn test_remove() {
        let replacer = LruReplacer::new(10);

        replacer.mark_evictable(0);
        replacer.mark_evictable(1);
        replacer.mark_pinned(2);

        replacer.remove(1);
        replacer.remove(2);

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.choose_victim(), Some(0));
        assert!(replacer.state.lock().pinned.is_empty());
    }

    #[test]
    fn test_out_of_range_frame_is_ignored() {
        let replacer = LruReplacer::new(2);

        replacer.mark_evictable(1);
        replacer.mark_evictable(2);
        replacer.mark_pinned(5);
        replacer.remove(7);

        assert_eq!(replacer.size(), 1);
        assert!(replacer.state.lock().pinned.is_empty());
        assert_eq!(replacer.choose_victim(), Some(1));
        assert_eq!(replacer.choose_victim(), None);
    }

    #[test]
    fn test_concurrent_transitions() {
        use std::sync::Arc;

        let replacer = Arc::new(LruReplacer::new(64));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let replacer = Arc::clone(&replacer);
                std::thread::spawn(move || {
                    for i in 0..16 {
                        let frame = t * 16 + i;
                        replacer.mark_pinned(frame);
                        replacer.mark_evictable(frame);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(replacer.size(), 64);
        assert_eq!(replacer.capacity(), 64);
    }
}
