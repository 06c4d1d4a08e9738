//! Replacement policies for the buffer pool.
//!
//! A replacer tracks which frames are eligible for eviction and picks a
//! victim among them. The buffer pool drives it with pin-count transitions:
//! `mark_evictable` when a frame's pin count drops to zero, `mark_pinned`
//! when it rises from zero, and `remove` when a page is deleted.

mod clock;
mod lru;

pub use clock::ClockReplacer;
pub use lru::LruReplacer;

use serde::{Deserialize, Serialize};

use crate::storage::buffer_pool::FrameId;

/// Eviction-candidate tracker over frame indices.
///
/// Implementations synchronize internally so a replacer can be shared
/// behind `&self`.
pub trait Replacer: Send + Sync {
    /// Adds `frame_id` to the eligible set. No-op if it is already there.
    fn mark_evictable(&self, frame_id: FrameId);

    /// Removes `frame_id` from the eligible set. No-op if it is not there.
    fn mark_pinned(&self, frame_id: FrameId);

    /// Stops tracking `frame_id` entirely.
    fn remove(&self, frame_id: FrameId);

    /// Picks and removes one eligible frame according to the policy.
    ///
    /// Returns `None` if no frame is eligible.
    fn choose_victim(&self) -> Option<FrameId>;

    /// Number of eligible frames.
    fn size(&self) -> usize;
}

/// Replacement policy selected at pool construction time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplacerKind {
    /// Clock / second-chance.
    Clock,
    /// Strict least-recently-unpinned.
    #[default]
    Lru,
}

impl ReplacerKind {
    /// Builds a replacer of this kind for a pool of `num_frames` frames.
    #[must_use]
    pub fn build(self, num_frames: usize) -> Box<dyn Replacer> {
        match self {
            ReplacerKind::Clock => Box::new(ClockReplacer::new(num_frames)),
            ReplacerKind::Lru => Box::new(LruReplacer::new(num_frames)),
        }
    }
}

impl std::fmt::Display for ReplacerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplacerKind::Clock => write!(f, "clock"),
            ReplacerKind::Lru => write!(f, "lru"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Behaviour both policies must share.
    fn check_common_contract(replacer: &dyn Replacer) {
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.choose_victim(), None);

        replacer.mark_evictable(1);
        replacer.mark_evictable(1);
        assert_eq!(replacer.size(), 1);

        replacer.mark_pinned(1);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.choose_victim(), None);

        replacer.mark_evictable(2);
        replacer.mark_evictable(3);
        replacer.remove(2);
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.choose_victim(), Some(3));
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.choose_victim(), None);
    }

    #[test]
    fn test_clock_common_contract() {
        check_common_contract(ReplacerKind::Clock.build(4).as_ref());
    }

    #[test]
    fn test_lru_common_contract() {
        check_common_contract(ReplacerKind::Lru.build(4).as_ref());
    }

    #[test]
    fn test_default_kind_is_lru() {
        assert_eq!(ReplacerKind::default(), ReplacerKind::Lru);
        assert_eq!(ReplacerKind::Clock.to_string(), "clock");
    }
}
