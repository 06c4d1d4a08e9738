//! Buffer pool management for page caching.
//!
//! This module implements a buffer pool that caches fixed-size pages from a
//! [`DiskStorage`] in a fixed set of in-memory frames. It provides:
//! - Page pinning and unpinning with reference counting
//! - Pluggable eviction policies (LRU and clock) via [`Replacer`]
//! - Write-back of dirty pages on eviction and flush
//! - RAII guards ([`BasicPageGuard`], [`ReadPageGuard`], [`WritePageGuard`])
//!
//! # Architecture
//!
//! Two lock levels compose:
//! - One pool latch (a `Mutex`) over the page table, free list, frame
//!   headers and replacer. Every operation does its bookkeeping under it as
//!   a single step.
//! - One reader/writer latch per frame over the page bytes, taken by callers
//!   through guards independently of the pool latch.
//!
//! The pool latch is always taken before a frame latch, never the other way
//! around.
//!
//! # Example
//!
//! ```ignore
//! let pool = BufferPool::new(64, Arc::new(MemoryDisk::new()))?;
//! let page_id = {
//!     let mut guard = pool.new_page_write()?;
//!     guard.view_mut().write_u32(0, 42)?;
//!     guard.page_id()
//! }; // unpinned as dirty here
//! let guard = pool.fetch_page_read(page_id)?;
//! assert_eq!(guard.view().read_u32(0)?, 42);
//! ```

mod buffer_frame;
mod page_guard;
mod page_view;
pub mod replacer;

pub use buffer_frame::{BufferFrame, FrameHeader, FrameLatch};
pub use page_guard::{BasicPageGuard, PageRef, ReadPageGuard, WritePageGuard};
pub use page_view::{PageView, PageViewMut};
pub use replacer::{ClockReplacer, LruReplacer, Replacer, ReplacerKind};

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, error, trace, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{PoolError, Result};
use crate::storage::page::{DiskStorage, PageId, PageIdAllocator};

/// Index of a frame in the pool, `0..pool_size`.
pub type FrameId = usize;

/// Default number of frames.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Configuration for a [`BufferPool`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferPoolConfig {
    /// Number of frames.
    pub pool_size: usize,
    /// Replacement policy.
    pub replacer: ReplacerKind,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            replacer: ReplacerKind::default(),
        }
    }
}

impl BufferPoolConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of frames.
    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Sets the replacement policy.
    #[must_use]
    pub fn with_replacer(mut self, replacer: ReplacerKind) -> Self {
        self.replacer = replacer;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ConfigError`] if `pool_size` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(PoolError::ConfigError(
                "Buffer pool size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// State protected by the pool latch.
#[derive(Debug)]
struct PoolState {
    /// Per-frame bookkeeping, indexed by frame id.
    headers: Vec<FrameHeader>,
    /// Resident pages.
    page_table: HashMap<PageId, FrameId>,
    /// Frames with no page, used oldest-first.
    free_list: VecDeque<FrameId>,
    /// Flushes writing each frame with the pool latch released. Kept apart
    /// from the headers so eviction does not reset it.
    flushes_in_flight: Vec<u32>,
}

/// Buffer pool over a fixed set of frames.
pub struct BufferPool {
    /// Buffer frames holding cached pages.
    frames: Vec<BufferFrame>,
    /// Page table, free list and frame headers.
    state: Mutex<PoolState>,
    /// Eviction candidate tracker; only driven while `state` is locked.
    replacer: Box<dyn Replacer>,
    replacer_kind: ReplacerKind,
    /// Persistent page store.
    disk: Arc<dyn DiskStorage>,
    /// Forward-only page id counter.
    allocator: PageIdAllocator,
    /// Number of frames.
    pool_size: usize,
    /// Counter for cache hits (page found in buffer pool).
    cache_hits: AtomicU64,
    /// Counter for cache misses (page had to be loaded from disk).
    cache_misses: AtomicU64,
    /// Counter for number of pages evicted.
    evictions: AtomicU64,
    /// Counter for dirty pages written back on eviction.
    write_backs: AtomicU64,
}

impl BufferPool {
    /// Creates a buffer pool with `pool_size` frames and LRU replacement.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ConfigError`] if `pool_size` is zero.
    pub fn new(pool_size: usize, disk: Arc<dyn DiskStorage>) -> Result<Self> {
        Self::with_config(BufferPoolConfig::new().with_pool_size(pool_size), disk)
    }

    /// Creates a buffer pool from a configuration.
    ///
    /// Page ids are allocated after the pages `disk` already holds.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ConfigError`] if the configuration is invalid.
    pub fn with_config(config: BufferPoolConfig, disk: Arc<dyn DiskStorage>) -> Result<Self> {
        config.validate()?;
        let pool_size = config.pool_size;

        let frames = (0..pool_size).map(BufferFrame::new).collect();
        let state = PoolState {
            headers: vec![FrameHeader::default(); pool_size],
            page_table: HashMap::with_capacity(pool_size),
            free_list: (0..pool_size).collect(),
            flushes_in_flight: vec![0; pool_size],
        };
        let allocator = PageIdAllocator::starting_at(disk.num_pages());

        debug!(
            "Buffer pool created: {pool_size} frames, {} replacer, first page id {}",
            config.replacer,
            allocator.peek()
        );

        Ok(Self {
            frames,
            state: Mutex::new(state),
            replacer: config.replacer.build(pool_size),
            replacer_kind: config.replacer,
            disk,
            allocator,
            pool_size,
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            write_backs: AtomicU64::new(0),
        })
    }

    /// Returns the number of frames.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the replacement policy in use.
    #[must_use]
    pub fn replacer_kind(&self) -> ReplacerKind {
        self.replacer_kind
    }

    /// Returns the number of pages currently resident.
    #[must_use]
    pub fn size(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Mints a new page id without touching any frame.
    ///
    /// Ids are strictly increasing and never reused, including ids released
    /// by [`delete_page`](Self::delete_page).
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PageIdsExhausted`] once every `u32` id has been
    /// handed out.
    pub fn allocate_page(&self) -> Result<PageId> {
        self.allocator.allocate()
    }

    /// Allocates a new zeroed page and pins it.
    ///
    /// The page id is only minted once a frame is secured, so an exhausted
    /// pool consumes no id.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PoolExhausted`] if every frame is pinned, a
    /// storage error if writing back the evicted page fails, or
    /// [`PoolError::PageIdsExhausted`] if no page id is left. In the last case
    /// the frame goes back to the free list.
    pub fn new_page(&self) -> Result<PageRef> {
        let mut state = self.state.lock();
        let frame_id = self.acquire_frame(&mut state)?;
        let page_id = match self.allocate_page() {
            Ok(page_id) => page_id,
            Err(err) => {
                warn!("No page id left for frame {frame_id}");
                state.free_list.push_back(frame_id);
                return Err(err);
            }
        };

        {
            let frame = &self.frames[frame_id];
            let mut data = frame.data().write();
            data.fill(0);
            frame.set_occupant(Some(page_id));
        }
        self.install(&mut state, page_id, frame_id);

        debug!("New {page_id} in frame {frame_id}");
        Ok(self.page_ref(page_id, frame_id))
    }

    /// Pins a page, loading it from disk if it is not resident.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PoolExhausted`] if the page is not resident and
    /// every frame is pinned, or a storage error if disk I/O fails.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PageRef> {
        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.pin_frame(&mut state, frame_id);
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            trace!(
                "Hit {page_id} in frame {frame_id} (pin count {})",
                state.headers[frame_id].pin_count
            );
            return Ok(self.page_ref(page_id, frame_id));
        }

        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        let frame_id = self.acquire_frame(&mut state)?;

        let loaded = {
            let frame = &self.frames[frame_id];
            let mut data = frame.data().write();
            let loaded = self.disk.read_page(page_id, data.as_mut_slice());
            if loaded.is_ok() {
                frame.set_occupant(Some(page_id));
            }
            loaded
        };
        if let Err(err) = loaded {
            error!("Failed to read {page_id} into frame {frame_id}: {err}");
            state.free_list.push_back(frame_id);
            return Err(err);
        }

        self.install(&mut state, page_id, frame_id);
        debug!("Miss {page_id}, loaded into frame {frame_id}");
        Ok(self.page_ref(page_id, frame_id))
    }

    /// Releases one pin on a page.
    ///
    /// `is_dirty` is OR'ed into the frame's dirty flag, so a clean unpin never
    /// hides an earlier dirty one. When the pin count reaches zero the frame
    /// becomes an eviction candidate.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PageNotResident`] if the page is not in the pool
    /// and [`PoolError::PageNotPinned`] if its pin count is already zero.
    /// Neither changes any state.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let mut state = self.state.lock();
        let frame_id = *state
            .page_table
            .get(&page_id)
            .ok_or(PoolError::PageNotResident(page_id))?;

        let remaining = self
            .release_pin(&mut state, frame_id)
            .ok_or(PoolError::PageNotPinned(page_id))?;
        state.headers[frame_id].dirty |= is_dirty;

        trace!("Unpinned {page_id} (pin count {remaining}, dirty {is_dirty})");
        Ok(())
    }

    /// Writes a resident page to disk and clears its dirty flag.
    ///
    /// The page is written even if clean. Residency, pin count and the
    /// replacement order are left as they were. The write happens under the
    /// page's shared latch with the pool latch released, so it deadlocks if
    /// the calling thread holds a [`WritePageGuard`] on the page.
    ///
    /// A page evicted while its flush is waiting for the latch is written
    /// back by the eviction, and the flush then writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PageNotResident`] if the page is not in the pool,
    /// or a storage error if the write fails. A failed write leaves the page
    /// dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let (frame_id, was_dirty) = {
            let mut state = self.state.lock();
            let frame_id = *state
                .page_table
                .get(&page_id)
                .ok_or(PoolError::PageNotResident(page_id))?;
            state.flushes_in_flight[frame_id] += 1;
            // Cleared before the write so a concurrent writer re-dirties it
            let was_dirty = std::mem::replace(&mut state.headers[frame_id].dirty, false);
            (frame_id, was_dirty)
        };

        let written = {
            let frame = &self.frames[frame_id];
            let data = frame.data().read();
            if frame.occupant() == Some(page_id) {
                self.disk.write_page(page_id, data.as_slice()).map(|()| true)
            } else {
                Ok(false)
            }
        };

        let mut state = self.state.lock();
        state.flushes_in_flight[frame_id] -= 1;
        match written {
            Ok(true) => {
                debug!("Flushed {page_id} from frame {frame_id}");
                Ok(())
            }
            Ok(false) => {
                debug!("{page_id} left frame {frame_id} before its flush");
                Ok(())
            }
            Err(err) => {
                error!("Failed to flush {page_id}: {err}");
                let header = &mut state.headers[frame_id];
                if header.page_id == Some(page_id) {
                    header.dirty |= was_dirty;
                }
                Err(err)
            }
        }
    }

    /// Flushes every resident page.
    ///
    /// Pages evicted or deleted while the flush is in progress are skipped.
    /// Like [`flush_page`](Self::flush_page) this leaves pins and the
    /// replacement order alone, and it deadlocks if the calling thread holds
    /// a [`WritePageGuard`] on any resident page.
    ///
    /// # Errors
    ///
    /// Returns the first storage error encountered.
    pub fn flush_all_pages(&self) -> Result<()> {
        let page_ids: Vec<PageId> = self.state.lock().page_table.keys().copied().collect();

        for page_id in page_ids {
            match self.flush_page(page_id) {
                Ok(()) | Err(PoolError::PageNotResident(_)) => {}
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    /// Drops a page from the pool and releases its id to the disk store.
    ///
    /// A non-resident page is a no-op. Dirty content is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PagePinned`] if the page is pinned; the pool is
    /// left unchanged.
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(());
        };

        let pin_count = state.headers[frame_id].pin_count;
        if pin_count > 0 {
            return Err(PoolError::PagePinned { page_id, pin_count });
        }

        self.replacer.remove(frame_id);
        state.page_table.remove(&page_id);
        state.headers[frame_id].reset();
        {
            let frame = &self.frames[frame_id];
            let mut data = frame.data().write();
            data.fill(0);
            frame.set_occupant(None);
        }
        state.free_list.push_back(frame_id);
        self.disk.deallocate_page(page_id);

        debug!("Deleted {page_id}, frame {frame_id} returned to free list");
        Ok(())
    }

    /// Pins a page behind a guard that unpins it on drop.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_page`](Self::fetch_page).
    pub fn fetch_page_basic(&self, page_id: PageId) -> Result<BasicPageGuard<'_>> {
        let page = self.fetch_page(page_id)?;
        Ok(BasicPageGuard::new(self, page))
    }

    /// Pins a page and holds its shared latch until the guard drops.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_page`](Self::fetch_page).
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<ReadPageGuard<'_>> {
        Ok(self.fetch_page_basic(page_id)?.upgrade_read())
    }

    /// Pins a page and holds its exclusive latch until the guard drops.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_page`](Self::fetch_page).
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<WritePageGuard<'_>> {
        Ok(self.fetch_page_basic(page_id)?.upgrade_write())
    }

    /// Allocates a new page behind a guard that unpins it on drop.
    ///
    /// # Errors
    ///
    /// Same as [`new_page`](Self::new_page).
    pub fn new_page_guarded(&self) -> Result<BasicPageGuard<'_>> {
        let page = self.new_page()?;
        Ok(BasicPageGuard::new(self, page))
    }

    /// Allocates a new page and holds its exclusive latch.
    ///
    /// # Errors
    ///
    /// Same as [`new_page`](Self::new_page).
    pub fn new_page_write(&self) -> Result<WritePageGuard<'_>> {
        Ok(self.new_page_guarded()?.upgrade_write())
    }

    /// Returns the pin count of a resident page.
    #[must_use]
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        let &frame_id = state.page_table.get(&page_id)?;
        Some(state.headers[frame_id].pin_count)
    }

    /// Returns the dirty flag of a resident page.
    #[must_use]
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        let state = self.state.lock();
        let &frame_id = state.page_table.get(&page_id)?;
        Some(state.headers[frame_id].dirty)
    }

    /// Returns the frame holding a resident page.
    #[must_use]
    pub fn frame_of(&self, page_id: PageId) -> Option<FrameId> {
        self.state.lock().page_table.get(&page_id).copied()
    }

    /// Returns whether a page is resident.
    #[must_use]
    pub fn contains(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Returns buffer pool statistics.
    #[must_use]
    pub fn stats(&self) -> BufferPoolStats {
        let state = self.state.lock();
        let mut dirty_pages = 0;
        let mut pinned_pages = 0;

        for header in state.headers.iter().filter(|h| !h.is_empty()) {
            if header.dirty {
                dirty_pages += 1;
            }
            if header.pin_count > 0 {
                pinned_pages += 1;
            }
        }

        BufferPoolStats {
            pool_size: self.pool_size,
            resident_pages: state.page_table.len(),
            free_frames: state.free_list.len(),
            evictable_frames: self.replacer.size(),
            pinned_pages,
            dirty_pages,
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            write_backs: self.write_backs.load(Ordering::Relaxed),
        }
    }

    /// Resets the cache statistics counters.
    ///
    /// This is useful for benchmarking or monitoring specific workloads.
    pub fn reset_stats(&self) {
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.write_backs.store(0, Ordering::Relaxed);
    }

    fn page_ref(&self, page_id: PageId, frame_id: FrameId) -> PageRef {
        PageRef::new(page_id, frame_id, self.frames[frame_id].latch())
    }

    /// Maps `page_id` to a freshly acquired frame with one pin.
    fn install(&self, state: &mut PoolState, page_id: PageId, frame_id: FrameId) {
        let header = &mut state.headers[frame_id];
        header.page_id = Some(page_id);
        header.pin_count = 1;
        header.dirty = false;
        state.page_table.insert(page_id, frame_id);
        self.replacer.mark_pinned(frame_id);
    }

    fn pin_frame(&self, state: &mut PoolState, frame_id: FrameId) {
        if state.headers[frame_id].pin() == 1 {
            self.replacer.mark_pinned(frame_id);
        }
    }

    /// Drops one pin. Returns the remaining count, or `None` if the frame
    /// was not pinned.
    fn release_pin(&self, state: &mut PoolState, frame_id: FrameId) -> Option<u32> {
        let remaining = state.headers[frame_id].unpin()?;
        if remaining == 0 {
            self.replacer.mark_evictable(frame_id);
        }
        Some(remaining)
    }

    /// Finds a frame for a new resident page: the free list first, then a
    /// replacer victim. A dirty victim, or one with a flush in flight, is
    /// written back and its page-table entry removed. The returned frame is
    /// unmapped with a reset header.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = self.replacer.choose_victim() else {
            warn!(
                "Buffer pool exhausted: all {} frames are pinned",
                self.pool_size
            );
            return Err(PoolError::PoolExhausted {
                pool_size: self.pool_size,
            });
        };

        let (resident, dirty) = {
            let header = &state.headers[frame_id];
            // A flush clears the flag before its write lands
            let flushing = state.flushes_in_flight[frame_id] > 0;
            (header.page_id, header.dirty || flushing)
        };
        if let Some(victim) = resident {
            debug!("Evicting {victim} from frame {frame_id} (dirty {dirty})");

            // Blocks on a flush or a caller still latching an unpinned frame
            let frame = &self.frames[frame_id];
            let data = frame.data().write();
            if dirty {
                if let Err(err) = self.disk.write_page(victim, data.as_slice()) {
                    error!("Failed to write back {victim}: {err}");
                    drop(data);
                    self.replacer.mark_evictable(frame_id);
                    return Err(err);
                }
                self.write_backs.fetch_add(1, Ordering::Relaxed);
            }
            frame.set_occupant(None);
            drop(data);

            state.page_table.remove(&victim);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        state.headers[frame_id].reset();
        Ok(frame_id)
    }
}

/// Statistics about the buffer pool state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferPoolStats {
    /// Number of frames.
    pub pool_size: usize,
    /// Pages currently mapped to a frame.
    pub resident_pages: usize,
    /// Frames on the free list.
    pub free_frames: usize,
    /// Frames the replacer may evict.
    pub evictable_frames: usize,
    /// Number of pinned pages.
    pub pinned_pages: usize,
    /// Number of dirty pages.
    pub dirty_pages: usize,
    /// Number of cache hits (page found in buffer pool).
    pub cache_hits: u64,
    /// Number of cache misses (page had to be loaded from disk).
    pub cache_misses: u64,
    /// Number of pages evicted.
    pub evictions: u64,
    /// Number of dirty pages written back on eviction.
    pub write_backs: u64,
}

impl BufferPoolStats {
    /// Calculates the cache hit rate as a fraction (0.0 to 1.0).
    ///
    /// Returns `None` if there have been no cache accesses.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.total_accesses();
        if total == 0 {
            None
        } else {
            Some(self.cache_hits as f64 / total as f64)
        }
    }

    /// Returns the total number of cache accesses (hits + misses).
    #[must_use]
    pub fn total_accesses(&self) -> u64 {
        self.cache_hits + self.cache_misses
    }
}
