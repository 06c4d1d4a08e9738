//! Page-level storage primitives.
//!
//! This module defines the pieces shared by the buffer pool and the
//! persistent store:
//! - `PageId` / `PageIdAllocator`: page identity and id minting
//! - `PAGE_SIZE` / `PageData`: the fixed page layout in memory
//! - `DiskStorage`: the disk collaborator contract
//! - `DiskManager`: file-backed `DiskStorage`
//! - `MemoryDisk`: in-memory `DiskStorage` with I/O accounting

mod disk_manager;
mod memory_disk;
mod page_id;

pub use disk_manager::DiskManager;
pub use memory_disk::MemoryDisk;
pub use page_id::{PageId, PageIdAllocator};

use crate::error::Result;

/// Page size in bytes (4KB).
pub const PAGE_SIZE: usize = 4096;

/// Raw contents of one page.
pub type PageData = [u8; PAGE_SIZE];

/// Persistent page store used by the buffer pool.
///
/// Both I/O methods are synchronous. `buf` is always exactly `PAGE_SIZE`
/// bytes long. An error from either is treated as unrecoverable by the pool
/// and handed back to the caller unchanged.
pub trait DiskStorage: Send + Sync {
    /// Fills `buf` with the persisted content of `page_id`.
    ///
    /// Pages that were never written read back as zeroes.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()>;

    /// Persists `buf` as the content of `page_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<()>;

    /// Notifies the store that `page_id` is no longer in use.
    fn deallocate_page(&self, _page_id: PageId) {}

    /// Number of pages the store already holds. The buffer pool starts
    /// allocating ids after this many so it never hands out an id that
    /// already has content on disk.
    fn num_pages(&self) -> u32 {
        0
    }
}
