//! # BookingDB Core
//!
//! A single-file JSON document store for booking records that several
//! processes can share safely.
//!
//! This crate provides:
//! - An advisory, cross-process lock with bounded retry and backoff
//! - Atomic write-temp-then-rename persistence of the whole collection
//! - Lock-free snapshot reads that treat a missing file as empty
//! - A record factory that assigns ids, timestamps and default status
//! - The CRUD surface: read all, filter, find by id, create, bulk create, update
//!
//! ## Example
//!
//! ```rust,no_run
//! use bookingdb_core::{BookingPatch, BookingStore, NewBooking, StoreConfig};
//!
//! # fn main() -> bookingdb_core::StoreResult<()> {
//! let store = BookingStore::new(StoreConfig::new("data/bookings.json"));
//!
//! let booking = store.create(NewBooking::new().field("userId", "u1"))?;
//! assert_eq!(booking.status, "pending");
//!
//! store.update(BookingPatch::new(&booking.id).with_status("confirmed"))?;
//! let mine = store.get_by_user("u1")?;
//! # let _ = mine;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod lock;
pub mod record;
pub mod snapshot;
pub mod store;
pub mod writer;

pub use config::StoreConfig;
pub use error::{ErrorKind, StoreError, StoreResult};
pub use lock::{LockGuard, LockManager, RetryPolicy};
pub use record::{BookingPatch, BookingRecord, NewBooking, RecordFactory};
pub use snapshot::SnapshotReader;
pub use store::{BookingStore, UpdateOutcome, VerifyReport};
pub use writer::{AtomicWriter, StagedWrite};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
