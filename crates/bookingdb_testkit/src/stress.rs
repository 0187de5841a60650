//! Stress tests for BookingDB.
//!
//! These harnesses hammer one store file from many threads, each with its
//! own [`BookingStore`] handle and therefore its own lock file handle, the
//! same way separate processes would.

use bookingdb_core::{BookingPatch, BookingRecord, BookingStore, NewBooking, StoreConfig};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations performed by each thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 25,
            threads: 4,
        }
    }
}

/// Outcome of [`stress_concurrent_creates`].
#[derive(Debug, Clone)]
pub struct CreateStressOutcome {
    /// Timing and success counts.
    pub result: StressTestResult,
    /// Ids returned by every successful create.
    pub created_ids: Vec<String>,
}

impl CreateStressOutcome {
    /// Checks the store against the ids the writers were told they created.
    ///
    /// Fails if a record is missing, an id appears twice, or the store holds
    /// records nobody created.
    pub fn check(&self, records: &[BookingRecord]) -> Result<(), String> {
        let mut seen = HashSet::new();
        for record in records {
            if !seen.insert(record.id.as_str()) {
                return Err(format!("duplicate id {}", record.id));
            }
        }
        if let Some(missing) = self.created_ids.iter().find(|id| !seen.contains(id.as_str())) {
            return Err(format!("lost update: {missing} not in store"));
        }
        if records.len() != self.created_ids.len() {
            return Err(format!(
                "store holds {} records, {} were created",
                records.len(),
                self.created_ids.len()
            ));
        }
        Ok(())
    }
}

/// Runs concurrent creators, each through its own store handle.
pub fn stress_concurrent_creates(
    config: &StoreConfig,
    stress: &StressConfig,
) -> CreateStressOutcome {
    let created_ids = Arc::new(Mutex::new(Vec::new()));
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();

    let handles: Vec<_> = (0..stress.threads)
        .map(|thread_id| {
            let store = BookingStore::new(config.clone());
            let created_ids = Arc::clone(&created_ids);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let operations = stress.operations;

            thread::spawn(move || {
                for i in 0..operations {
                    let input = NewBooking::new()
                        .field("userId", format!("u{thread_id}"))
                        .field("seq", i);
                    match store.create(input) {
                        Ok(record) => {
                            created_ids.lock().push(record.id);
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let result = StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    );
    let created_ids = std::mem::take(&mut *created_ids.lock());

    CreateStressOutcome {
        result,
        created_ids,
    }
}

/// Id of the record shared by [`stress_concurrent_updates`].
pub const SHARED_BOOKING: &str = "shared";

/// Runs concurrent updates against one shared record.
///
/// Seeds [`SHARED_BOOKING`], then thread `t` patches its own field `w{t}`
/// with `0..operations`. Each update merges into a fresh read taken under
/// the lock, so when no update was lost the final record carries every
/// `w{t}` at `operations - 1`. Returns the result and the final record.
pub fn stress_concurrent_updates(
    config: &StoreConfig,
    stress: &StressConfig,
) -> (StressTestResult, Option<BookingRecord>) {
    let seed = BookingStore::new(config.clone());
    seed.create(NewBooking::new().with_id(SHARED_BOOKING))
        .expect("Failed to seed shared booking");

    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..stress.threads)
        .map(|thread_id| {
            let store = BookingStore::new(config.clone());
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let operations = stress.operations;

            thread::spawn(move || {
                for i in 0..operations {
                    let patch = BookingPatch::new(SHARED_BOOKING).field(format!("w{thread_id}"), i);
                    match store.update(patch) {
                        Ok(outcome) if outcome.is_updated() => {
                            successful.fetch_add(1, Ordering::Relaxed)
                        }
                        _ => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let result = StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    );
    let record = seed.get_by_id(SHARED_BOOKING).ok().flatten();

    (result, record)
}

/// Runs lock-free readers alongside writers.
///
/// Every read must succeed and must see a record count that never goes
/// down, since writers only append. Returns the reader result; any failed
/// read means a reader observed a torn or unparsable file.
pub fn stress_reads_during_writes(config: &StoreConfig, stress: &StressConfig) -> StressTestResult {
    let writing = Arc::new(AtomicBool::new(true));
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let readers: Vec<_> = (0..stress.threads)
        .map(|_| {
            let store = BookingStore::new(config.clone());
            let writing = Arc::clone(&writing);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);

            thread::spawn(move || {
                let mut last_len = 0;
                while writing.load(Ordering::Acquire) {
                    match store.get_all() {
                        Ok(records) if records.len() >= last_len => {
                            last_len = records.len();
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        _ => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    let writer = BookingStore::new(config.clone());
    for i in 0..stress.operations * stress.threads {
        if writer.create(NewBooking::new().field("seq", i)).is_err() {
            failed.fetch_add(1, Ordering::Relaxed);
        }
    }
    writing.store(false, Ordering::Release);

    for reader in readers {
        reader.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestStore;

    #[test]
    fn test_concurrent_creates() {
        let store = TestStore::new();
        let stress = StressConfig {
            operations: 20,
            threads: 6,
        };

        let outcome = stress_concurrent_creates(store.config(), &stress);
        assert_eq!(outcome.result.failed_ops, 0);
        assert_eq!(outcome.result.successful_ops, 120);

        let records = store.get_all().unwrap();
        outcome.check(&records).unwrap();
    }

    #[test]
    fn test_concurrent_updates() {
        let store = TestStore::new();
        let stress = StressConfig {
            operations: 15,
            threads: 4,
        };

        let (result, record) = stress_concurrent_updates(store.config(), &stress);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 60);

        let record = record.unwrap();
        assert!(record.updated_at.is_some());
        assert_eq!(record.fields.len(), 4);
        for thread_id in 0..4 {
            let value = record.get(&format!("w{thread_id}"));
            assert_eq!(value, Some(&serde_json::Value::from(14u64)));
        }
    }

    #[test]
    fn test_reads_during_writes() {
        let store = TestStore::new();
        let stress = StressConfig {
            operations: 10,
            threads: 3,
        };

        let result = stress_reads_during_writes(store.config(), &stress);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(store.get_all().unwrap().len(), 30);
    }

    #[test]
    fn check_detects_lost_update() {
        let store = TestStore::new();
        let kept = store.create(NewBooking::new()).unwrap();

        let outcome = CreateStressOutcome {
            result: StressTestResult::new(2, 0, Duration::ZERO),
            created_ids: vec![kept.id, "booking_lost".to_string()],
        };

        let err = outcome.check(&store.get_all().unwrap()).unwrap_err();
        assert!(err.contains("booking_lost"));
    }
}
