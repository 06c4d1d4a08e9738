//! In-memory page store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{PoolError, Result};
use crate::storage::page::{DiskStorage, PageData, PageId, PAGE_SIZE};

/// A [`DiskStorage`] that keeps pages in memory and counts every I/O.
///
/// Useful for exercising the buffer pool (and anything built on it) without
/// touching the filesystem, and for asserting exactly when write-back
/// happens.
#[derive(Default)]
pub struct MemoryDisk {
    pages: Mutex<HashMap<PageId, Box<PageData>>>,
    write_log: Mutex<Vec<PageId>>,
    deallocated: Mutex<Vec<PageId>>,
    reads: AtomicU64,
}

impl MemoryDisk {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of `read_page` calls.
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Total number of `write_page` calls.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.write_log.lock().len()
    }

    /// Number of `write_page` calls for a single page.
    #[must_use]
    pub fn write_count_for(&self, page_id: PageId) -> usize {
        self.write_log.lock().iter().filter(|&&id| id == page_id).count()
    }

    /// Page ids in the order they were written.
    #[must_use]
    pub fn write_log(&self) -> Vec<PageId> {
        self.write_log.lock().clone()
    }

    /// Returns a copy of the persisted bytes of a page, if it was ever written.
    #[must_use]
    pub fn page_bytes(&self, page_id: PageId) -> Option<Vec<u8>> {
        self.pages.lock().get(&page_id).map(|data| data.to_vec())
    }

    /// Page ids released through `deallocate_page`, in order.
    #[must_use]
    pub fn deallocated(&self) -> Vec<PageId> {
        self.deallocated.lock().clone()
    }
}

impl DiskStorage for MemoryDisk {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        if buf.len() != PAGE_SIZE {
            return Err(PoolError::StorageError(format!(
                "Page buffer must be {PAGE_SIZE} bytes, got {}",
                buf.len()
            )));
        }
        self.reads.fetch_add(1, Ordering::Relaxed);
        match self.pages.lock().get(&page_id) {
            Some(data) => buf.copy_from_slice(&data[..]),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<()> {
        let data: PageData = buf.try_into().map_err(|_| {
            PoolError::StorageError(format!(
                "Page buffer must be {PAGE_SIZE} bytes, got {}",
                buf.len()
            ))
        })?;
        self.pages.lock().insert(page_id, Box::new(data));
        self.write_log.lock().push(page_id);
        Ok(())
    }

    fn deallocate_page(&self, page_id: PageId) {
        self.pages.lock().remove(&page_id);
        self.deallocated.lock().push(page_id);
    }

    fn num_pages(&self) -> u32 {
        self.pages
            .lock()
            .keys()
            .map(|id| id.0.saturating_add(1))
            .max()
            .unwrap_or(0)
    }
}
