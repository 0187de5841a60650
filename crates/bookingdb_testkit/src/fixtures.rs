//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores
//! and common test scenarios.

use bookingdb_core::{BookingStore, RetryPolicy, StoreConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Name of the store file inside a fixture directory.
pub const STORE_FILE: &str = "bookings.json";

/// A retry policy patient enough for heavily contended tests.
///
/// Many short waits instead of the production 100 ms - 1 s schedule keep
/// contended tests fast without spurious lock failures.
#[must_use]
pub fn contended_retry() -> RetryPolicy {
    RetryPolicy::new(500, Duration::from_millis(1), Duration::from_millis(20))
}

/// A test store backed by a temporary directory.
pub struct TestStore {
    /// The store instance.
    pub store: BookingStore,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl TestStore {
    /// Creates a store with a contention-friendly retry policy and no fsync.
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    /// Creates a store, letting the caller adjust the configuration.
    pub fn with_config(adjust: impl FnOnce(StoreConfig) -> StoreConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = StoreConfig::new(temp_dir.path().join(STORE_FILE))
            .retry(contended_retry())
            .sync_on_write(false);

        Self {
            store: BookingStore::new(adjust(config)),
            temp_dir,
        }
    }

    /// Returns the store file path.
    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Returns the temporary directory.
    pub fn dir(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    /// Opens an independent store over the same file, as another process would.
    pub fn open_another(&self) -> BookingStore {
        BookingStore::new(self.store.config().clone())
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = BookingStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary store.
///
/// # Example
///
/// ```rust,ignore
/// use bookingdb_testkit::with_temp_store;
///
/// #[test]
/// fn my_test() {
///     with_temp_store(|store| {
///         assert!(store.get_all().unwrap().is_empty());
///     });
/// }
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&BookingStore) -> R,
{
    let test_store = TestStore::new();
    f(&test_store.store)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use bookingdb_core::NewBooking;

    /// Creates a store holding `count` bookings spread over `users` users.
    ///
    /// Booking `i` has id `booking-{i}` and belongs to user `u{i % users}`.
    pub fn populated_store(count: usize, users: usize) -> TestStore {
        let test_store = TestStore::new();
        let users = users.max(1);

        test_store
            .create_many((0..count).map(|i| {
                NewBooking::new()
                    .with_id(format!("booking-{i}"))
                    .field("userId", format!("u{}", i % users))
                    .field("seq", i)
            }))
            .expect("Failed to populate store");

        test_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookingdb_core::NewBooking;

    #[test]
    fn fixture_starts_empty() {
        let store = TestStore::new();
        assert!(store.get_all().unwrap().is_empty());
        assert!(!store.path().exists());
        assert!(store.path().starts_with(store.dir()));
    }

    #[test]
    fn another_handle_sees_writes() {
        let store = TestStore::new();
        store.create(NewBooking::new().with_id("a")).unwrap();

        let other = store.open_another();
        assert!(other.get_by_id("a").unwrap().is_some());
    }

    #[test]
    fn populated_scenario() {
        let store = scenarios::populated_store(10, 3);
        assert_eq!(store.get_all().unwrap().len(), 10);
        assert_eq!(store.get_by_user("u0").unwrap().len(), 4);
        assert_eq!(store.get_by_user("u2").unwrap().len(), 3);
    }

    #[test]
    fn with_temp_store_runs_closure() {
        let count = with_temp_store(|store| {
            store.create(NewBooking::new()).unwrap();
            store.get_all().unwrap().len()
        });
        assert_eq!(count, 1);
    }
}
