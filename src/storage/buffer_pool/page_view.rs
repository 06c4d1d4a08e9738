//! Bounds-checked views over a frame's bytes.
//!
//! Index structures lay typed records out inside pages. Instead of handing
//! them raw pointers, guards expose a `PageView` / `PageViewMut` whose
//! accessors check every offset against the page size. A view borrows its
//! guard and therefore cannot outlive it.

use crate::error::{PoolError, Result};

fn check_range(offset: usize, len: usize, size: usize) -> Result<std::ops::Range<usize>> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(offset..end),
        _ => Err(PoolError::OutOfBounds { offset, len, size }),
    }
}

macro_rules! read_le {
    ($name:ident, $ty:ty) => {
        /// Reads a little-endian value at `offset`.
        ///
        /// # Errors
        ///
        /// Returns [`PoolError::OutOfBounds`] if the value does not fit in the page.
        pub fn $name(&self, offset: usize) -> Result<$ty> {
            let range = check_range(offset, std::mem::size_of::<$ty>(), self.data.len())?;
            let mut raw = [0u8; std::mem::size_of::<$ty>()];
            raw.copy_from_slice(&self.data[range]);
            Ok(<$ty>::from_le_bytes(raw))
        }
    };
}

macro_rules! write_le {
    ($name:ident, $ty:ty) => {
        /// Writes a little-endian value at `offset`.
        ///
        /// # Errors
        ///
        /// Returns [`PoolError::OutOfBounds`] if the value does not fit in the page.
        pub fn $name(&mut self, offset: usize, value: $ty) -> Result<()> {
            let range = check_range(offset, std::mem::size_of::<$ty>(), self.data.len())?;
            self.data[range].copy_from_slice(&value.to_le_bytes());
            Ok(())
        }
    };
}

/// Read-only view of one page.
#[derive(Debug, Clone, Copy)]
pub struct PageView<'a> {
    data: &'a [u8],
}

impl<'a> PageView<'a> {
    /// Wraps a page buffer.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Page size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns whether the view covers zero bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the whole page.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Borrows `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::OutOfBounds`] if the range leaves the page.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let range = check_range(offset, len, self.data.len())?;
        Ok(&self.data[range])
    }

    /// Reads one byte at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::OutOfBounds`] if `offset` is past the end of the page.
    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        self.data.get(offset).copied().ok_or(PoolError::OutOfBounds {
            offset,
            len: 1,
            size: self.data.len(),
        })
    }

    read_le!(read_u16, u16);
    read_le!(read_u32, u32);
    read_le!(read_u64, u64);

    /// CRC32 checksum of the whole page.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        crc32fast::hash(self.data)
    }
}

/// Mutable view of one page.
#[derive(Debug)]
pub struct PageViewMut<'a> {
    data: &'a mut [u8],
}

impl<'a> PageViewMut<'a> {
    /// Wraps a page buffer.
    #[must_use]
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }

    /// Reborrows as a read-only view.
    #[must_use]
    pub fn as_view(&self) -> PageView<'_> {
        PageView::new(self.data)
    }

    /// Page size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns whether the view covers zero bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copies `bytes` into the page at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::OutOfBounds`] if the range leaves the page.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let range = check_range(offset, bytes.len(), self.data.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Writes one byte at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::OutOfBounds`] if `offset` is past the end of the page.
    pub fn write_u8(&mut self, offset: usize, value: u8) -> Result<()> {
        let size = self.data.len();
        let slot = self
            .data
            .get_mut(offset)
            .ok_or(PoolError::OutOfBounds { offset, len: 1, size })?;
        *slot = value;
        Ok(())
    }

    write_le!(write_u16, u16);
    write_le!(write_u32, u32);
    write_le!(write_u64, u64);

    /// Sets every byte of the page to `value`.
    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }
}
