//! Loading the persisted collection.

use crate::error::{StoreError, StoreResult};
use crate::record::BookingRecord;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Reads the full collection from the store file.
///
/// Reads take no lock. Because writers only ever replace the file with a
/// rename, a read sees either the previous or the next complete collection.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    path: PathBuf,
}

impl SnapshotReader {
    /// Creates a reader for the given store file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the store file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every record.
    ///
    /// A missing file is the empty collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the file exists but cannot be read and
    /// [`StoreError::Decode`] if it does not hold a valid collection. No
    /// partial result is ever returned.
    pub fn read_all(&self) -> StoreResult<Vec<BookingRecord>> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// Loads every record, or `None` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Same as [`read_all`](Self::read_all).
    pub fn load(&self) -> StoreResult<Option<Vec<BookingRecord>>> {
        let Some(data) = self.read_raw()? else {
            return Ok(None);
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| StoreError::decode(&self.path, e))
    }

    /// Returns the raw file contents, or `None` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] for any I/O failure other than absence.
    pub fn read_raw(&self) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::read(&self.path, e)),
        }
    }
}
