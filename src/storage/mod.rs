//! Storage module for page caching.
//!
//! This module provides the storage layer for pagepool:
//! - Buffer pool management ([`buffer_pool`])
//! - Page-level I/O ([`page`])

pub mod buffer_pool;
pub mod page;

// Re-export commonly used types
pub use buffer_pool::{
    BasicPageGuard, BufferPool, BufferPoolConfig, BufferPoolStats, FrameId, PageRef, PageView,
    PageViewMut, ReadPageGuard, ReplacerKind, WritePageGuard,
};
pub use page::{DiskManager, DiskStorage, MemoryDisk, PageId, PageIdAllocator, PAGE_SIZE};
