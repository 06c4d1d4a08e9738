//! Buffer frames: the fixed slots of the pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::storage::page::{PageData, PageId, PAGE_SIZE};

/// Content latch of one frame, shareable with guards that outlive a borrow
/// of the pool's frame table.
pub type FrameLatch = Arc<RwLock<Box<PageData>>>;

/// Bookkeeping for one frame.
///
/// Lives inside the pool latch; every field changes only while that latch is
/// held. Tracks:
/// - The page currently loaded (if any)
/// - How many callers are currently using the page (pin count)
/// - Whether the page has been modified since it was last written out
#[derive(Debug, Clone, Default)]
pub struct FrameHeader {
    /// The page currently loaded in this frame, if any.
    pub page_id: Option<PageId>,
    /// Number of active pins on this page.
    pub pin_count: u32,
    /// Whether the page has been modified since last write-back.
    pub dirty: bool,
}

impl FrameHeader {
    /// Increments the pin count and returns the new value.
    pub fn pin(&mut self) -> u32 {
        self.pin_count = self.pin_count.saturating_add(1);
        self.pin_count
    }

    /// Decrements the pin count and returns the new value.
    ///
    /// Returns `None` if the frame was not pinned.
    pub fn unpin(&mut self) -> Option<u32> {
        self.pin_count = self.pin_count.checked_sub(1)?;
        Some(self.pin_count)
    }

    /// Returns whether this frame can be evicted.
    ///
    /// A frame can be evicted if:
    /// - It has a page loaded
    /// - Its pin count is 0
    #[must_use]
    pub fn is_evictable(&self) -> bool {
        self.page_id.is_some() && self.pin_count == 0
    }

    /// Returns whether this frame is empty (no page loaded).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.page_id.is_none()
    }

    /// Resets the header to the free state.
    pub fn reset(&mut self) {
        self.page_id = None;
        self.pin_count = 0;
        self.dirty = false;
    }
}

/// Occupant tag of a frame holding no page.
const NO_PAGE: u64 = u64::MAX;

/// A frame in the buffer pool that holds a single page's bytes.
///
/// The byte buffer is allocated once at pool construction and reused for the
/// life of the pool.
#[derive(Debug)]
pub struct BufferFrame {
    /// Index of this frame in the buffer pool.
    pub frame_id: usize,
    /// Page bytes behind the frame's reader/writer latch.
    data: FrameLatch,
    /// Page whose bytes are in `data`. Changed only while the write latch is
    /// held, so a reader holding the latch sees a stable value.
    occupant: AtomicU64,
}

impl BufferFrame {
    /// Creates a new zeroed buffer frame.
    #[must_use]
    pub fn new(frame_id: usize) -> Self {
        Self {
            frame_id,
            data: Arc::new(RwLock::new(Box::new([0u8; PAGE_SIZE]))),
            occupant: AtomicU64::new(NO_PAGE),
        }
    }

    /// Returns the page whose bytes the frame holds.
    #[must_use]
    pub fn occupant(&self) -> Option<PageId> {
        match self.occupant.load(Ordering::Relaxed) {
            NO_PAGE => None,
            idx => u32::try_from(idx).ok().map(PageId::new),
        }
    }

    /// Retags the frame. The caller must hold the write latch.
    pub(crate) fn set_occupant(&self, page_id: Option<PageId>) {
        let tag = page_id.map_or(NO_PAGE, |id| u64::from(id.as_u32()));
        self.occupant.store(tag, Ordering::Relaxed);
    }

    /// Returns a handle to the frame's content latch.
    #[must_use]
    pub fn latch(&self) -> FrameLatch {
        Arc::clone(&self.data)
    }

    /// Direct access to the latch for the pool's own I/O.
    pub(crate) fn data(&self) -> &RwLock<Box<PageData>> {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_header() {
        let header = FrameHeader::default();
        assert!(header.is_empty());
        assert!(!header.is_evictable());
        assert_eq!(header.pin_count, 0);
        assert!(!header.dirty);
    }

    #[test]
    fn test_pin_unpin() {
        let mut header = FrameHeader {
            page_id: Some(PageId::new(0)),
            ..FrameHeader::default()
        };

        assert_eq!(header.pin(), 1);
        assert!(!header.is_evictable());

        assert_eq!(header.pin(), 2);

        assert_eq!(header.unpin(), Some(1));
        assert!(!header.is_evictable());

        assert_eq!(header.unpin(), Some(0));
        assert!(header.is_evictable());

        // Below zero is refused and leaves the count alone
        assert_eq!(header.unpin(), None);
        assert_eq!(header.pin_count, 0);
    }

    #[test]
    fn test_reset() {
        let mut header = FrameHeader {
            page_id: Some(PageId::new(1)),
            pin_count: 5,
            dirty: true,
        };

        header.reset();

        assert!(header.is_empty());
        assert_eq!(header.pin_count, 0);
        assert!(!header.dirty);
    }

    #[test]
    fn test_frame_starts_zeroed() {
        let frame = BufferFrame::new(3);
        assert_eq!(frame.frame_id, 3);
        assert!(frame.data().read().iter().all(|&b| b == 0));

        frame.latch().write()[0] = 9;
        assert_eq!(frame.data().read()[0], 9);
    }

    #[test]
    fn test_occupant_tag() {
        let frame = BufferFrame::new(0);
        assert_eq!(frame.occupant(), None);

        frame.set_occupant(Some(PageId::new(u32::MAX)));
        assert_eq!(frame.occupant(), Some(PageId::new(u32::MAX)));

        frame.set_occupant(None);
        assert_eq!(frame.occupant(), None);
    }
}
