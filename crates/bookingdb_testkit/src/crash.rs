//! Crash simulation for BookingDB writes.
//!
//! A write stages the full collection in `<path>.tmp` and then renames it
//! over the store file. This module stops a write at each interesting point,
//! abandons it the way a killed process would, and checks what a fresh
//! store handle sees afterwards.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bookingdb_testkit::crash::{CrashPoint, CrashRecoveryHarness};
//!
//! let mut harness = CrashRecoveryHarness::new().unwrap();
//! let result = harness.simulate(CrashPoint::AfterStageBeforeRename);
//! assert!(result.passed);
//! ```

use bookingdb_core::{AtomicWriter, BookingStore, NewBooking, RecordFactory, StoreConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Records present before every simulated crash.
pub const SEED_RECORDS: usize = 5;

/// Records the interrupted write tries to add.
pub const ATTEMPTED_RECORDS: usize = 3;

/// Points at which a write can be interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashPoint {
    /// Nothing was written yet.
    BeforeStage,
    /// The staging file is complete and synced; the rename never happened.
    AfterStageBeforeRename,
    /// The rename completed.
    AfterRename,
}

impl CrashPoint {
    /// All crash points, in write order.
    pub const ALL: [CrashPoint; 3] = [
        CrashPoint::BeforeStage,
        CrashPoint::AfterStageBeforeRename,
        CrashPoint::AfterRename,
    ];

    /// Whether a write interrupted here must be visible afterwards.
    pub fn is_committed(self) -> bool {
        matches!(self, CrashPoint::AfterRename)
    }
}

/// Result of a crash recovery test.
#[derive(Debug, Clone)]
pub struct CrashRecoveryResult {
    /// Whether the test passed.
    pub passed: bool,
    /// Description of what was tested.
    pub description: String,
    /// Expected records after recovery.
    pub expected_records: usize,
    /// Actual records after recovery.
    pub actual_records: usize,
    /// Any error message.
    pub error: Option<String>,
}

impl CrashRecoveryResult {
    /// Creates a passing result.
    pub fn pass(description: &str, records: usize) -> Self {
        Self {
            passed: true,
            description: description.to_string(),
            expected_records: records,
            actual_records: records,
            error: None,
        }
    }

    /// Creates a failing result.
    pub fn fail(description: &str, expected: usize, actual: usize, error: &str) -> Self {
        Self {
            passed: false,
            description: description.to_string(),
            expected_records: expected,
            actual_records: actual,
            error: Some(error.to_string()),
        }
    }
}

/// Test harness for crash recovery scenarios.
pub struct CrashRecoveryHarness {
    /// Path to the store file.
    pub store_path: PathBuf,
    /// Results of crash recovery tests.
    pub results: Vec<CrashRecoveryResult>,
    _temp_dir: TempDir,
}

impl CrashRecoveryHarness {
    /// Creates a harness over a fresh temporary directory.
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = TempDir::new()?;
        Ok(Self {
            store_path: temp_dir.path().join("bookings.json"),
            results: Vec::new(),
            _temp_dir: temp_dir,
        })
    }

    fn config(&self) -> StoreConfig {
        StoreConfig::new(&self.store_path)
    }

    /// Returns the store file path.
    pub fn path(&self) -> &Path {
        &self.store_path
    }

    /// Interrupts a write at `point` and checks recovery.
    ///
    /// The store is reset to [`SEED_RECORDS`] records, a write adding
    /// [`ATTEMPTED_RECORDS`] more is abandoned at `point`, and a new store
    /// handle must then read either the old or the new collection intact
    /// and accept further writes.
    pub fn simulate(&mut self, point: CrashPoint) -> CrashRecoveryResult {
        let description = format!("Crash {point:?}");
        let expected = if point.is_committed() {
            SEED_RECORDS + ATTEMPTED_RECORDS
        } else {
            SEED_RECORDS
        };

        let result = self
            .run_scenario(point, expected)
            .unwrap_or_else(|e| CrashRecoveryResult::fail(&description, expected, 0, &e));

        self.results.push(result.clone());
        result
    }

    /// Runs every crash point.
    pub fn simulate_all(&mut self) -> Vec<CrashRecoveryResult> {
        CrashPoint::ALL
            .iter()
            .map(|&point| self.simulate(point))
            .collect()
    }

    /// Whether every recorded result passed.
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    fn run_scenario(
        &self,
        point: CrashPoint,
        expected: usize,
    ) -> Result<CrashRecoveryResult, String> {
        let description = format!("Crash {point:?}");
        let config = self.config();

        // Start from a clean file holding the seed records.
        let _ = fs::remove_file(&self.store_path);
        let _ = fs::remove_file(config.temp_path());
        let store = BookingStore::new(config.clone());
        store
            .create_many((0..SEED_RECORDS).map(|i| NewBooking::new().field("seq", i)))
            .map_err(|e| e.to_string())?;
        let before = fs::read(&self.store_path).map_err(|e| e.to_string())?;

        let mut next = store.get_all().map_err(|e| e.to_string())?;
        next.extend(
            (0..ATTEMPTED_RECORDS)
                .map(|i| RecordFactory.complete(NewBooking::new().field("attempt", i))),
        );

        let writer = AtomicWriter::from_config(&config);
        match point {
            CrashPoint::BeforeStage => {}
            CrashPoint::AfterStageBeforeRename => {
                let staged = writer.stage(&next).map_err(|e| e.to_string())?;
                // A killed process runs no destructors.
                std::mem::forget(staged);
                if !config.temp_path().exists() {
                    return Err("staging file missing after stage".to_string());
                }
            }
            CrashPoint::AfterRename => writer.write(&next).map_err(|e| e.to_string())?,
        }

        // Recover with a brand new handle.
        let recovered = BookingStore::new(config.clone());
        let records = recovered.get_all().map_err(|e| e.to_string())?;
        if records.len() != expected {
            return Ok(CrashRecoveryResult::fail(
                &description,
                expected,
                records.len(),
                "unexpected record count after recovery",
            ));
        }
        let current = fs::read(&self.store_path).map_err(|e| e.to_string())?;
        if !point.is_committed() && current != before {
            return Ok(CrashRecoveryResult::fail(
                &description,
                expected,
                records.len(),
                "store file changed by an uncommitted write",
            ));
        }

        // A leftover staging file must not get in the way of the next write.
        recovered
            .create(NewBooking::new().field("afterCrash", true))
            .map_err(|e| e.to_string())?;
        let after = recovered.get_all().map_err(|e| e.to_string())?.len();
        if after != expected + 1 {
            return Ok(CrashRecoveryResult::fail(
                &description,
                expected + 1,
                after,
                "write after recovery was not persisted",
            ));
        }
        if config.temp_path().exists() {
            return Ok(CrashRecoveryResult::fail(
                &description,
                expected + 1,
                after,
                "staging file left behind after a successful write",
            ));
        }

        Ok(CrashRecoveryResult::pass(&description, expected))
    }
}
