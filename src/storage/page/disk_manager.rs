//! Disk manager for page-level I/O.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, error};
use parking_lot::Mutex;

use crate::error::{PoolError, Result};
use crate::storage::page::{DiskStorage, PageId, PAGE_SIZE};

/// File-backed page store.
///
/// Page `p` lives at byte offset `p * PAGE_SIZE`. The file grows on demand
/// when a page past the current end is written.
pub struct DiskManager {
    /// Path to the database file.
    path: PathBuf,
    /// File handle, serialized so seek + read/write pairs stay atomic.
    file: Mutex<File>,
    /// Number of pages covered by the file.
    num_pages: AtomicU32,
}

impl DiskManager {
    /// Opens or creates a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| PoolError::StorageError(format!("Failed to open database file: {e}")))?;

        let file_len = file
            .metadata()
            .map_err(|e| PoolError::StorageError(format!("Failed to get file metadata: {e}")))?
            .len();

        let num_pages = file_len.div_ceil(PAGE_SIZE as u64) as u32;
        debug!("opened {} with {num_pages} pages", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            num_pages: AtomicU32::new(num_pages),
        })
    }

    /// Returns the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes all buffered writes to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&self) -> Result<()> {
        self.file
            .lock()
            .sync_all()
            .map_err(|e| PoolError::StorageError(format!("Failed to sync file: {e}")))
    }

    /// Returns the size of the database file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read.
    pub fn file_size(&self) -> Result<u64> {
        self.file
            .lock()
            .metadata()
            .map(|m| m.len())
            .map_err(|e| PoolError::StorageError(format!("Failed to get file size: {e}")))
    }

    fn check_len(len: usize) -> Result<()> {
        if len == PAGE_SIZE {
            Ok(())
        } else {
            Err(PoolError::StorageError(format!(
                "Page buffer must be {PAGE_SIZE} bytes, got {len}"
            )))
        }
    }
}

impl DiskStorage for DiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        Self::check_len(buf.len())?;
        let mut file = self.file.lock();

        file.seek(SeekFrom::Start(page_id.offset()))
            .map_err(|e| PoolError::StorageError(format!("Failed to seek to {page_id}: {e}")))?;

        match file.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // Never written - reads as an empty page
                buf.fill(0);
                Ok(())
            }
            Err(e) => {
                error!("read of {page_id} failed: {e}");
                Err(PoolError::StorageError(format!(
                    "Failed to read {page_id}: {e}"
                )))
            }
        }
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<()> {
        Self::check_len(buf.len())?;
        let mut file = self.file.lock();

        file.seek(SeekFrom::Start(page_id.offset()))
            .map_err(|e| PoolError::StorageError(format!("Failed to seek to {page_id}: {e}")))?;

        file.write_all(buf).map_err(|e| {
            error!("write of {page_id} failed: {e}");
            PoolError::StorageError(format!("Failed to write {page_id}: {e}"))
        })?;

        self.num_pages.fetch_max(page_id.0.saturating_add(1), Ordering::Relaxed);
        Ok(())
    }

    fn deallocate_page(&self, page_id: PageId) {
        // Space is not reclaimed; the id is simply never handed out again.
        debug!("deallocated {page_id}");
    }

    fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::Relaxed)
    }
}
