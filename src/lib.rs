//! pagepool - buffer pool manager for disk-oriented storage engines.
//!
//! Caches fixed-size pages from a [`DiskStorage`](storage::page::DiskStorage)
//! in a fixed set of frames, tracks pins and dirtiness, and evicts unpinned
//! pages with a pluggable replacement policy. Index structures build on
//! [`BufferPool`] and its page guards.

pub mod error;
pub mod storage;

pub use error::{PoolError, Result};
pub use storage::{
    BasicPageGuard, BufferPool, BufferPoolConfig, BufferPoolStats, DiskManager, DiskStorage,
    FrameId, MemoryDisk, PageId, PageRef, PageView, PageViewMut, ReadPageGuard, ReplacerKind,
    WritePageGuard, PAGE_SIZE,
};
