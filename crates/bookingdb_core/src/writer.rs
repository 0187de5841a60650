//! Atomic replacement of the store file.
//!
//! A write goes through two steps:
//! 1. Serialize the whole collection into `<path>.tmp` in the same directory
//!    and sync it to disk.
//! 2. Rename the staging file over `<path>` and sync the directory.
//!
//! The rename is the only change a reader can observe, so the store file
//! always holds one complete collection. A staged write that is dropped
//! before [`StagedWrite::commit`] removes its staging file.

use crate::config::{sibling_with_suffix, StoreConfig, TEMP_SUFFIX};
use crate::error::{StoreError, StoreResult};
use crate::record::BookingRecord;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Writes the full collection with write-temp-then-rename.
#[derive(Debug, Clone)]
pub struct AtomicWriter {
    path: PathBuf,
    temp_path: PathBuf,
    sync: bool,
    pretty: bool,
}

impl AtomicWriter {
    /// Creates a writer for the given store file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let temp_path = sibling_with_suffix(&path, TEMP_SUFFIX);
        Self {
            path,
            temp_path,
            sync: true,
            pretty: true,
        }
    }

    /// Creates a writer using the path and write settings of `config`.
    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(&config.path)
            .sync(config.sync_on_write)
            .pretty(config.pretty)
    }

    /// Sets whether to fsync the staging file and the directory.
    #[must_use]
    pub fn sync(mut self, value: bool) -> Self {
        self.sync = value;
        self
    }

    /// Sets whether to write indented JSON.
    #[must_use]
    pub fn pretty(mut self, value: bool) -> Self {
        self.pretty = value;
        self
    }

    /// Returns the destination path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the staging file path.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Replaces the store file with `records`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Encode`] or [`StoreError::Write`]. On error the
    /// previous store file is untouched and the staging file is removed on a
    /// best-effort basis.
    pub fn write(&self, records: &[BookingRecord]) -> StoreResult<()> {
        self.stage(records)?.commit()
    }

    /// Performs the first step of a write: the staging file is complete and
    /// synced, but the store file has not changed yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Encode`] if serialization fails and
    /// [`StoreError::Write`] if the staging file cannot be written.
    pub fn stage(&self, records: &[BookingRecord]) -> StoreResult<StagedWrite> {
        let data = if self.pretty {
            serde_json::to_vec_pretty(records)
        } else {
            serde_json::to_vec(records)
        }
        .map_err(|e| StoreError::encode(&self.path, e))?;

        if let Some(parent) = non_empty_parent(&self.path) {
            fs::create_dir_all(parent).map_err(|e| StoreError::write(parent, e))?;
        }

        // From here on the guard removes the staging file on any early return.
        let staged = StagedWrite {
            path: self.path.clone(),
            temp_path: self.temp_path.clone(),
            sync: self.sync,
            len: data.len(),
            records: records.len(),
            committed: false,
        };
        staged
            .write_temp(&data)
            .map_err(|e| StoreError::write(&self.temp_path, e))?;

        Ok(staged)
    }
}

/// A staging file waiting to be renamed into place.
#[derive(Debug)]
#[must_use = "dropping a staged write discards it"]
pub struct StagedWrite {
    path: PathBuf,
    temp_path: PathBuf,
    sync: bool,
    len: usize,
    records: usize,
    committed: bool,
}

impl StagedWrite {
    /// Returns the staging file path.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Renames the staging file over the store file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the rename fails, in which case the
    /// store file still holds the previous collection. Once the rename has
    /// succeeded the new collection is visible and the commit reports
    /// success; a failed directory sync after that point is only logged.
    pub fn commit(mut self) -> StoreResult<()> {
        fs::rename(&self.temp_path, &self.path).map_err(|e| StoreError::write(&self.path, e))?;
        self.committed = true;

        if self.sync {
            sync_parent_or_warn(&self.path);
        }

        debug!(
            path = %self.path.display(),
            records = self.records,
            bytes = self.len,
            "collection written"
        );
        Ok(())
    }

    fn write_temp(&self, data: &[u8]) -> io::Result<()> {
        let mut file = File::create(&self.temp_path)?;
        file.write_all(data)?;
        if self.sync {
            file.sync_all()?;
        } else {
            file.flush()?;
        }
        Ok(())
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match fs::remove_file(&self.temp_path) {
            Ok(()) => debug!(path = %self.temp_path.display(), "discarded staging file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.temp_path.display(),
                error = %e,
                "failed to remove staging file"
            ),
        }
    }
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

/// Syncs the directory holding `path` so the rename itself is durable.
#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    let dir = non_empty_parent(path).unwrap_or_else(|| Path::new("."));
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    // NTFS journals metadata; directory handles cannot be fsynced on Windows.
    Ok(())
}

fn sync_parent_or_warn(path: &Path) {
    if let Err(e) = sync_parent(path) {
        warn!(
            path = %path.display(),
            error = %e,
            "collection renamed into place but directory sync failed"
        );
    }
}
