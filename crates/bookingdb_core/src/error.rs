//! Error types for the booking store.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
///
/// A missing record is never an error: lookups return `Option` and updates
/// return [`UpdateOutcome::NotFound`](crate::UpdateOutcome::NotFound).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The advisory lock could not be taken within the retry budget.
    #[error("could not acquire lock on {} after {attempts} attempts", path.display())]
    LockAcquisition {
        /// Path of the lock file.
        path: PathBuf,
        /// Total number of attempts made.
        attempts: u32,
    },

    /// The store file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Path of the store file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The store file exists but does not hold a valid collection.
    #[error("failed to parse {}: {source}", path.display())]
    Decode {
        /// Path of the store file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Writing the temporary file or renaming it into place failed.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Path of the file being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The collection could not be serialized.
    #[error("failed to encode collection for {}: {source}", path.display())]
    Encode {
        /// Path of the store file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The write would leave two records with the same id.
    #[error("booking id {id:?} already exists in {}", path.display())]
    DuplicateId {
        /// Path of the store file.
        path: PathBuf,
        /// The colliding id.
        id: String,
    },
}

/// Coarse classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Lock retry budget exhausted.
    Lock,
    /// Store file present but unreadable or unparsable.
    Read,
    /// Serialization, temp-file write or rename failed.
    Write,
    /// The write was refused because it would break id uniqueness.
    Conflict,
}

impl StoreError {
    /// Creates a lock acquisition error.
    pub fn lock_acquisition(path: impl AsRef<Path>, attempts: u32) -> Self {
        Self::LockAcquisition {
            path: path.as_ref().to_path_buf(),
            attempts,
        }
    }

    /// Creates a read error.
    pub fn read(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Read {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a decode error.
    pub fn decode(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Self::Decode {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a write error.
    pub fn write(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Write {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates an encode error.
    pub fn encode(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Self::Encode {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a duplicate id error.
    pub fn duplicate_id(path: impl AsRef<Path>, id: impl Into<String>) -> Self {
        Self::DuplicateId {
            path: path.as_ref().to_path_buf(),
            id: id.into(),
        }
    }

    /// Returns the class of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LockAcquisition { .. } => ErrorKind::Lock,
            Self::Read { .. } | Self::Decode { .. } => ErrorKind::Read,
            Self::Write { .. } | Self::Encode { .. } => ErrorKind::Write,
            Self::DuplicateId { .. } => ErrorKind::Conflict,
        }
    }

    /// Returns the path the failing operation was working on.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::LockAcquisition { path, .. }
            | Self::Read { path, .. }
            | Self::Decode { path, .. }
            | Self::Write { path, .. }
            | Self::Encode { path, .. }
            | Self::DuplicateId { path, .. } => path,
        }
    }
}
