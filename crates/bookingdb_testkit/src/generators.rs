//! Property-based test generators using proptest.
//!
//! Provides strategies for generating booking inputs and patches
//! that exercise the store's merge and defaulting rules.

use bookingdb_core::{BookingPatch, NewBooking};
use proptest::prelude::*;
use serde_json::Value;

/// Strategy for generating user ids.
pub fn user_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("u[0-9]{1,3}").expect("Invalid regex")
}

/// Strategy for generating status strings, mostly the common ones.
pub fn status_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => Just("pending".to_string()),
        3 => Just("confirmed".to_string()),
        2 => Just("cancelled".to_string()),
        1 => prop::string::string_regex("[a-z]{1,12}").expect("Invalid regex"),
    ]
}

/// Strategy for generating caller-defined field names.
///
/// Never yields a name the store manages itself.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("x[a-zA-Z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating simple JSON field values.
pub fn field_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        prop::string::string_regex("[ -~]{0,24}")
            .expect("Invalid regex")
            .prop_map(Value::from),
        Just(Value::Null),
    ]
}

/// Strategy for generating creation inputs.
///
/// `id`, `createdAt` and `status` are each present about half of the time.
pub fn new_booking_strategy() -> impl Strategy<Value = NewBooking> {
    (
        prop::option::of(prop::string::string_regex("b[0-9a-f]{8}").expect("Invalid regex")),
        prop::option::of(Just("2020-01-01T00:00:00Z".to_string())),
        prop::option::of(status_strategy()),
        user_id_strategy(),
        prop::collection::btree_map(field_name_strategy(), field_value_strategy(), 0..4),
    )
        .prop_map(|(id, created_at, status, user_id, extra)| {
            let mut input = NewBooking::new().field("userId", user_id);
            input.id = id;
            input.created_at = created_at;
            input.status = status;
            for (key, value) in extra {
                input.fields.insert(key, value);
            }
            input
        })
}

/// Strategy for generating patches against the given id.
pub fn patch_strategy(id: String) -> impl Strategy<Value = BookingPatch> {
    (
        prop::option::of(status_strategy()),
        prop::collection::btree_map(field_name_strategy(), field_value_strategy(), 0..4),
    )
        .prop_map(move |(status, fields)| {
            let mut patch = BookingPatch::new(id.clone());
            patch.status = status;
            patch.fields.extend(fields);
            patch
        })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
