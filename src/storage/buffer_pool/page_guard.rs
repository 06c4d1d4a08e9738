//! Page handles and RAII page guards.
//!
//! [`PageRef`] is the raw handle returned by [`BufferPool::new_page`] and
//! [`BufferPool::fetch_page`]: it names a pinned page but leaves unpinning to
//! the caller. The guards wrap that handle and release the pin exactly once
//! when they go out of scope, on every exit path.
//!
//! | Guard              | Latch held for the guard's lifetime |
//! |--------------------|-------------------------------------|
//! | [`BasicPageGuard`] | none (latched per access)           |
//! | [`ReadPageGuard`]  | shared                              |
//! | [`WritePageGuard`] | exclusive                           |

use log::warn;
use parking_lot::{
    ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock, RwLockReadGuard, RwLockWriteGuard,
};

use super::buffer_frame::FrameLatch;
use super::page_view::{PageView, PageViewMut};
use super::{BufferPool, FrameId};
use crate::storage::page::{PageData, PageId};

/// Handle to a pinned page.
///
/// Dropping a `PageRef` does not unpin the page; pair every handle with one
/// [`BufferPool::unpin_page`] call. Content latches taken through
/// [`PageRef::read`] / [`PageRef::write`] must be released before that call.
pub struct PageRef {
    page_id: PageId,
    frame_id: FrameId,
    latch: FrameLatch,
}

impl PageRef {
    pub(crate) fn new(page_id: PageId, frame_id: FrameId, latch: FrameLatch) -> Self {
        Self {
            page_id,
            frame_id,
            latch,
        }
    }

    /// Returns the page ID.
    #[must_use]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the frame the page occupies.
    #[must_use]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Takes the frame's shared latch.
    pub fn read(&self) -> RwLockReadGuard<'_, Box<PageData>> {
        self.latch.read()
    }

    /// Takes the frame's exclusive latch.
    ///
    /// Writing through the returned guard does not mark the page dirty;
    /// report it with `unpin_page(id, true)`.
    pub fn write(&self) -> RwLockWriteGuard<'_, Box<PageData>> {
        self.latch.write()
    }
}

impl std::fmt::Debug for PageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRef")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame_id)
            .finish_non_exhaustive()
    }
}

/// One pin on a page, released on drop.
struct PinnedPage<'a> {
    pool: &'a BufferPool,
    page: PageRef,
    dirty: bool,
}

impl Drop for PinnedPage<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.pool.unpin_page(self.page.page_id, self.dirty) {
            warn!("Guard for {} failed to unpin: {err}", self.page.page_id);
        }
    }
}

/// Guard holding a pin but no latch.
///
/// Each [`read`](Self::read) / [`write`](Self::write) call latches the frame
/// only for the lifetime of the returned lock guard.
pub struct BasicPageGuard<'a> {
    pin: PinnedPage<'a>,
}

impl<'a> BasicPageGuard<'a> {
    pub(crate) fn new(pool: &'a BufferPool, page: PageRef) -> Self {
        Self {
            pin: PinnedPage {
                pool,
                page,
                dirty: false,
            },
        }
    }

    /// Returns the page ID.
    #[must_use]
    pub fn page_id(&self) -> PageId {
        self.pin.page.page_id
    }

    /// Returns the frame the page occupies.
    #[must_use]
    pub fn frame_id(&self) -> FrameId {
        self.pin.page.frame_id
    }

    /// Returns whether this guard will unpin the page as dirty.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.pin.dirty
    }

    /// Latches the page for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Box<PageData>> {
        self.pin.page.read()
    }

    /// Latches the page for writing and marks it dirty.
    pub fn write(&mut self) -> RwLockWriteGuard<'_, Box<PageData>> {
        self.pin.dirty = true;
        self.pin.page.write()
    }

    /// Marks the page dirty without touching it.
    pub fn mark_dirty(&mut self) {
        self.pin.dirty = true;
    }

    /// Converts into a read guard, keeping the pin.
    #[must_use]
    pub fn upgrade_read(self) -> ReadPageGuard<'a> {
        ReadPageGuard::new(self.pin)
    }

    /// Converts into a write guard, keeping the pin.
    #[must_use]
    pub fn upgrade_write(self) -> WritePageGuard<'a> {
        WritePageGuard::new(self.pin)
    }
}

/// Guard holding a pin and the frame's shared latch.
pub struct ReadPageGuard<'a> {
    // Declared first so the latch is released before the pin.
    latch: ArcRwLockReadGuard<RawRwLock, Box<PageData>>,
    pin: PinnedPage<'a>,
}

impl<'a> ReadPageGuard<'a> {
    fn new(pin: PinnedPage<'a>) -> Self {
        Self {
            latch: pin.page.latch.read_arc(),
            pin,
        }
    }

    /// Returns the page ID.
    #[must_use]
    pub fn page_id(&self) -> PageId {
        self.pin.page.page_id
    }

    /// Returns the page bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.latch.as_slice()
    }

    /// Returns a bounds-checked view of the page.
    #[must_use]
    pub fn view(&self) -> PageView<'_> {
        PageView::new(self.latch.as_slice())
    }
}

/// Guard holding a pin and the frame's exclusive latch.
///
/// Any mutable access marks the page dirty, and the guard reports that when
/// it unpins.
pub struct WritePageGuard<'a> {
    // Declared first so the latch is released before the pin.
    latch: ArcRwLockWriteGuard<RawRwLock, Box<PageData>>,
    pin: PinnedPage<'a>,
}

impl<'a> WritePageGuard<'a> {
    fn new(pin: PinnedPage<'a>) -> Self {
        Self {
            latch: pin.page.latch.write_arc(),
            pin,
        }
    }

    /// Returns the page ID.
    #[must_use]
    pub fn page_id(&self) -> PageId {
        self.pin.page.page_id
    }

    /// Returns whether this guard will unpin the page as dirty.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.pin.dirty
    }

    /// Returns the page bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.latch.as_slice()
    }

    /// Returns the page bytes for writing and marks the page dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.pin.dirty = true;
        self.latch.as_mut_slice()
    }

    /// Returns a read-only view of the page.
    #[must_use]
    pub fn view(&self) -> PageView<'_> {
        PageView::new(self.latch.as_slice())
    }

    /// Returns a mutable view of the page and marks the page dirty.
    pub fn view_mut(&mut self) -> PageViewMut<'_> {
        self.pin.dirty = true;
        PageViewMut::new(self.latch.as_mut_slice())
    }

    /// Marks the page dirty without touching it.
    pub fn mark_dirty(&mut self) {
        self.pin.dirty = true;
    }
}
