//! Advisory cross-process locking.
//!
//! The lock lives on a sibling file (`<store>.lock`) and is taken with
//! `fs2`'s exclusive file lock. Every acquisition opens its own handle, so
//! two threads of one process exclude each other exactly like two processes
//! do. The lock is advisory: it only binds callers that go through a
//! [`LockManager`] for the same path.
//!
//! The OS drops the lock when the holding handle is closed, including when
//! the holding process dies, so a crashed writer never leaves a stale lock.

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded exponential backoff for lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt.
    pub retries: u32,
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            factor: 2,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the default growth factor.
    #[must_use]
    pub const fn new(retries: u32, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            retries,
            min_delay,
            max_delay,
            factor: 2,
        }
    }

    /// A policy that tries exactly once.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Total number of attempts this policy allows.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay to wait before retry number `retry` (zero-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let growth = self.factor.max(1).saturating_pow(retry);
        self.min_delay
            .checked_mul(growth)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Takes the advisory lock for one store file.
#[derive(Debug, Clone)]
pub struct LockManager {
    lock_path: PathBuf,
    policy: RetryPolicy,
}

impl LockManager {
    /// Creates a lock manager for the given lock file.
    #[must_use]
    pub fn new(lock_path: impl Into<PathBuf>, policy: RetryPolicy) -> Self {
        Self {
            lock_path: lock_path.into(),
            policy,
        }
    }

    /// Returns the path of the lock file.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Acquires the exclusive lock, retrying with backoff.
    ///
    /// The returned guard releases the lock when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LockAcquisition`] once every attempt allowed by
    /// the policy has failed. Failing to open the lock file counts as a
    /// failed attempt.
    pub fn acquire(&self) -> StoreResult<LockGuard> {
        let attempts = self.policy.max_attempts();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.policy.delay_for(attempt - 1);
                debug!(path = %self.lock_path.display(), attempt, ?delay, "lock busy, backing off");
                thread::sleep(delay);
            }

            match self.try_acquire() {
                Ok(Some(guard)) => {
                    debug!(path = %self.lock_path.display(), attempt, "lock acquired");
                    return Ok(guard);
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(
                        path = %self.lock_path.display(),
                        attempt,
                        error = %err,
                        "lock file unavailable"
                    );
                }
            }
        }

        Err(StoreError::lock_acquisition(&self.lock_path, attempts))
    }

    /// Makes a single non-blocking attempt.
    ///
    /// Returns `Ok(None)` if another holder has the lock.
    fn try_acquire(&self) -> std::io::Result<Option<LockGuard>> {
        if let Some(parent) = self.lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;

        if file.try_lock_exclusive().is_err() {
            return Ok(None);
        }

        Ok(Some(LockGuard {
            file,
            path: self.lock_path.clone(),
        }))
    }
}

/// Proof that the store's advisory lock is held.
///
/// Only [`LockManager::acquire`] produces a guard. The lock is released
/// exactly once, when the guard is dropped; a failing release is logged and
/// otherwise ignored.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Returns the path of the held lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match self.file.unlock() {
            Ok(()) => debug!(path = %self.path.display(), "lock released"),
            Err(err) => warn!(path = %self.path.display(), error = %err, "failed to release lock"),
        }
    }
}
