//! Clock (second-chance) replacement policy.

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::Replacer;
use crate::storage::buffer_pool::FrameId;

#[derive(Debug)]
struct ClockState {
    /// Every frame, in clock order. The hand always points at the front.
    ring: VecDeque<FrameId>,
    /// Whether the frame is currently an eviction candidate.
    in_ring: Vec<bool>,
    /// Set when the frame is unpinned, cleared when the hand passes it.
    ref_bit: Vec<bool>,
    /// Number of frames with `in_ring` set.
    size: usize,
}

impl ClockState {
    /// Advances the hand by one slot.
    fn advance(&mut self) {
        self.ring.rotate_left(1);
    }

    fn untrack(&mut self, frame_id: FrameId) {
        if self.in_ring[frame_id] {
            self.in_ring[frame_id] = false;
            self.size -= 1;
        }
    }
}

/// Clock replacer over a fixed ring of `num_frames` slots.
///
/// A frame that becomes evictable is placed directly behind the hand with its
/// reference bit set, so it survives at least one full sweep before it can be
/// chosen.
#[derive(Debug)]
pub struct ClockReplacer {
    state: Mutex<ClockState>,
    num_frames: usize,
}

impl ClockReplacer {
    /// Creates a clock with `num_frames` slots and nothing eligible.
    #[must_use]
    pub fn new(num_frames: usize) -> Self {
        Self {
            state: Mutex::new(ClockState {
                ring: (0..num_frames).collect(),
                in_ring: vec![false; num_frames],
                ref_bit: vec![false; num_frames],
                size: 0,
            }),
            num_frames,
        }
    }

    /// Returns the frame the hand currently points at.
    #[must_use]
    pub fn hand(&self) -> Option<FrameId> {
        self.state.lock().ring.front().copied()
    }
}

impl Replacer for ClockReplacer {
    fn mark_evictable(&self, frame_id: FrameId) {
        if frame_id >= self.num_frames {
            return;
        }
        let mut state = self.state.lock();
        if state.in_ring[frame_id] {
            return;
        }
        state.in_ring[frame_id] = true;
        state.ref_bit[frame_id] = true;
        state.size += 1;

        // Re-seat the frame just behind the hand
        if let Some(pos) = state.ring.iter().position(|&f| f == frame_id) {
            state.ring.remove(pos);
        }
        state.ring.push_back(frame_id);
    }

    fn mark_pinned(&self, frame_id: FrameId) {
        if frame_id >= self.num_frames {
            return;
        }
        self.state.lock().untrack(frame_id);
    }

    fn remove(&self, frame_id: FrameId) {
        if frame_id >= self.num_frames {
            return;
        }
        let mut state = self.state.lock();
        state.untrack(frame_id);
        state.ref_bit[frame_id] = false;
    }

    fn choose_victim(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        if state.size == 0 {
            return None;
        }

        // One sweep clears every reference bit, so a second sweep must
        // find a victim.
        for _ in 0..2 * self.num_frames {
            let frame_id = *state.ring.front()?;
            if !state.in_ring[frame_id] {
                state.advance();
            } else if state.ref_bit[frame_id] {
                state.ref_bit[frame_id] = false;
                state.advance();
            } else {
                state.in_ring[frame_id] = false;
                state.size -= 1;
                return Some(frame_id);
            }
        }

        None
    }

    fn size(&self) -> usize {
        self.state.lock().size
    }
}
