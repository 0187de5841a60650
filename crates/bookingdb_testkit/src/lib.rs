//! # BookingDB Testkit
//!
//! Test utilities for BookingDB.
//!
//! This crate provides:
//! - Temporary store fixtures
//! - Property-based test generators using proptest
//! - Multi-threaded stress harnesses checking for lost updates and torn reads
//! - Crash simulation around the write-temp-then-rename step
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bookingdb_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     with_temp_store(|store| {
//!         store.create(NewBooking::new().field("userId", "u1")).unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use bookingdb_core::{BookingPatch, BookingStore, NewBooking, StoreConfig};
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
