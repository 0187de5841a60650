//! Store configuration.

use crate::lock::RetryPolicy;
use std::path::{Path, PathBuf};

/// Suffix appended to the store path for the staging file.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Suffix appended to the store path for the advisory lock file.
pub const LOCK_SUFFIX: &str = ".lock";

/// Configuration for opening a booking store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path of the JSON file holding the collection.
    pub path: PathBuf,

    /// Retry policy for acquiring the advisory lock.
    pub retry: RetryPolicy,

    /// Whether to fsync the staging file and the parent directory on every write.
    pub sync_on_write: bool,

    /// Whether to write indented JSON.
    pub pretty: bool,
}

impl StoreConfig {
    /// Creates a configuration for the given file with default settings.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            retry: RetryPolicy::default(),
            sync_on_write: true,
            pretty: true,
        }
    }

    /// Sets the lock retry policy.
    #[must_use]
    pub const fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets whether to fsync on every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets whether to write indented JSON.
    #[must_use]
    pub const fn pretty(mut self, value: bool) -> Self {
        self.pretty = value;
        self
    }

    /// Returns the path of the staging file (`<path>.tmp`).
    #[must_use]
    pub fn temp_path(&self) -> PathBuf {
        sibling_with_suffix(&self.path, TEMP_SUFFIX)
    }

    /// Returns the path of the lock file (`<path>.lock`).
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        sibling_with_suffix(&self.path, LOCK_SUFFIX)
    }
}

/// Appends `suffix` to the final component of `path`, keeping it in the same directory.
pub(crate) fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
