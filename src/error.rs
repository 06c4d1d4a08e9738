//! Error types for buffer pool operations.

use thiserror::Error;

use crate::storage::page::PageId;

/// Result type alias using [`PoolError`].
pub type Result<T> = std::result::Result<T, PoolError>;

/// Error types for buffer pool operations.
///
/// Everything except [`PoolError::StorageError`] is a local, recoverable
/// condition: the pool state is left unchanged and the caller decides whether
/// to retry, release pages, or give up.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No free frame and no eviction candidate.
    #[error("Buffer pool exhausted: all {pool_size} frames are pinned")]
    PoolExhausted { pool_size: usize },

    /// The page is not currently resident in the buffer pool.
    #[error("Page not resident: {0}")]
    PageNotResident(PageId),

    /// The page is pinned and cannot be deleted.
    #[error("Page is pinned: {page_id} (pin count {pin_count})")]
    PagePinned { page_id: PageId, pin_count: u32 },

    /// Unpin requested for a page whose pin count is already zero.
    #[error("Page is not pinned: {0}")]
    PageNotPinned(PageId),

    /// Page view access outside the frame.
    #[error("Page access out of bounds: offset {offset}, len {len}, page size {size}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    /// Failure reported by the disk storage collaborator.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Every page id has been handed out.
    #[error("Page id space exhausted")]
    PageIdsExhausted,

    /// Invalid buffer pool configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl PoolError {
    /// Returns whether the caller can recover from this error without
    /// intervention on the storage layer.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            PoolError::StorageError(_) | PoolError::PageIdsExhausted
        )
    }
}
