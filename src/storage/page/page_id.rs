//! Page identifier type and allocator.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, Result};

/// Unique identifier for a page of persistent storage.
///
/// Page ids are handed out by [`PageIdAllocator`] in strictly increasing
/// order and are never reused while the allocator lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId(pub u32);

impl PageId {
    /// Creates a new page ID.
    #[must_use]
    pub const fn new(page_idx: u32) -> Self {
        Self(page_idx)
    }

    /// Returns the raw page index.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns the byte offset of this page within the backing file.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.0 as u64) * (super::PAGE_SIZE as u64)
    }

    /// Returns the next page ID, or `None` past `u32::MAX`.
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(idx) => Some(Self(idx)),
            None => None,
        }
    }
}

impl From<u32> for PageId {
    fn from(page_idx: u32) -> Self {
        Self(page_idx)
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Page({})", self.0)
    }
}

/// Forward-only page id allocator.
///
/// Owned by the buffer pool; the counter lives exactly as long as the pool
/// and restarts only when a new pool is constructed. Deallocated ids are
/// not handed out again.
#[derive(Debug)]
pub struct PageIdAllocator {
    next_page_idx: AtomicU32,
}

impl PageIdAllocator {
    /// Creates an allocator whose first id is `first`.
    #[must_use]
    pub fn starting_at(first: u32) -> Self {
        Self {
            next_page_idx: AtomicU32::new(first),
        }
    }

    /// Mints a new page id.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PageIdsExhausted`] once the counter can no longer
    /// advance. The counter never wraps, so an id is never minted twice.
    pub fn allocate(&self) -> Result<PageId> {
        self.next_page_idx
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |idx| idx.checked_add(1))
            .map(PageId)
            .map_err(|_| PoolError::PageIdsExhausted)
    }

    /// Returns the id the next call to [`allocate`](Self::allocate) will return.
    #[must_use]
    pub fn peek(&self) -> PageId {
        PageId(self.next_page_idx.load(Ordering::Relaxed))
    }
}

impl Default for PageIdAllocator {
    fn default() -> Self {
        Self::starting_at(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::PAGE_SIZE;

    #[test]
    fn test_page_id_offset() {
        assert_eq!(PageId::new(0).offset(), 0);
        assert_eq!(PageId::new(1).offset(), PAGE_SIZE as u64);
        assert_eq!(PageId::new(10).offset(), 10 * PAGE_SIZE as u64);
    }

    #[test]
    fn test_page_id_next() {
        assert_eq!(PageId::new(5).next(), Some(PageId::new(6)));
        assert_eq!(PageId::new(u32::MAX).next(), None);
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(PageId::new(42).to_string(), "Page(42)");
    }

    #[test]
    fn test_allocator_is_monotonic() {
        let allocator = PageIdAllocator::default();
        assert_eq!(allocator.allocate().unwrap(), PageId(0));
        assert_eq!(allocator.allocate().unwrap(), PageId(1));
        assert_eq!(allocator.peek(), PageId(2));
        assert_eq!(allocator.allocate().unwrap(), PageId(2));
    }

    #[test]
    fn test_allocator_starting_at() {
        let allocator = PageIdAllocator::starting_at(7);
        assert_eq!(allocator.allocate().unwrap(), PageId(7));
        assert_eq!(allocator.allocate().unwrap(), PageId(8));
    }

    #[test]
    fn test_allocator_stops_at_end_of_id_space() {
        let allocator = PageIdAllocator::starting_at(u32::MAX - 1);
        assert_eq!(allocator.allocate().unwrap(), PageId(u32::MAX - 1));

        // No wrap back to Page(0)
        assert!(matches!(
            allocator.allocate(),
            Err(PoolError::PageIdsExhausted)
        ));
        assert!(matches!(
            allocator.allocate(),
            Err(PoolError::PageIdsExhausted)
        ));
        assert_eq!(allocator.peek(), PageId(u32::MAX));
    }

    #[test]
    fn test_allocator_concurrent_ids_are_unique() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let allocator = Arc::new(PageIdAllocator::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                std::thread::spawn(move || {
                    (0..250)
                        .map(|_| allocator.allocate().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 1000);
        assert_eq!(allocator.peek(), PageId(1000));
    }
}
