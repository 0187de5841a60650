//! Booking records, creation input, partial updates and the record factory.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Prefix of every generated record id.
pub const ID_PREFIX: &str = "booking_";

/// Status given to records created without one.
pub const DEFAULT_STATUS: &str = "pending";

/// Field names managed by the store; never taken from a free-form field map.
pub const RESERVED_FIELDS: [&str; 4] = ["id", "createdAt", "updatedAt", "status"];

/// A persisted booking.
///
/// Only `id`, `createdAt`, `updatedAt` and `status` are interpreted by the
/// store. Every other field a caller supplies is kept verbatim in `fields`
/// and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    /// Unique id within the store.
    pub id: String,
    /// ISO-8601 creation time; never changed by an update.
    pub created_at: String,
    /// ISO-8601 time of the last update, absent until the first one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Open-ended status string.
    pub status: String,
    /// Caller-defined fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl BookingRecord {
    /// Returns a caller-defined field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns the owning user, if the record carries a string `userId`.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.fields.get("userId").and_then(Value::as_str)
    }
}

/// Input for [`BookingStore::create`](crate::BookingStore::create).
///
/// Any of `id`, `createdAt` and `status` may be left out; the
/// [`RecordFactory`] fills in whatever is missing and keeps the rest. A new
/// record never carries `updatedAt`; one supplied here is dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    /// Caller-chosen id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Caller-chosen creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Caller-chosen status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Caller-defined fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl NewBooking {
    /// Creates an empty input.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the creation time.
    #[must_use]
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets a caller-defined field.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// A partial update addressed by id.
///
/// Present fields override the stored ones, absent fields are left alone.
/// `id`, `createdAt` and `updatedAt` are not mergeable: the id only selects
/// the record, and the timestamps belong to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingPatch {
    /// Id of the record to update.
    pub id: String,
    /// New status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Caller-defined fields to set.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl BookingPatch {
    /// Creates an empty patch for the given record.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: None,
            fields: Map::new(),
        }
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets a caller-defined field.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Merges this patch into `record` and stamps `updated_at`.
    pub fn apply_to(self, record: &mut BookingRecord, updated_at: String) {
        if let Some(status) = self.status {
            record.status = status;
        }
        for (key, value) in self.fields {
            if !is_reserved(&key) {
                record.fields.insert(key, value);
            }
        }
        record.updated_at = Some(updated_at);
    }
}

/// Assigns ids, timestamps and default status.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFactory;

impl RecordFactory {
    /// Generates a fresh `booking_<uuid>` id.
    #[must_use]
    pub fn new_id(&self) -> String {
        format!("{ID_PREFIX}{}", Uuid::new_v4())
    }

    /// Current UTC time as ISO-8601 with millisecond precision.
    #[must_use]
    pub fn now(&self) -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Turns creation input into a complete record.
    ///
    /// Only missing `id`, `createdAt` and `status` are generated; supplied
    /// values are kept as they are.
    #[must_use]
    pub fn complete(&self, input: NewBooking) -> BookingRecord {
        let NewBooking {
            id,
            created_at,
            status,
            mut fields,
        } = input;
        fields.retain(|key, _| !is_reserved(key));

        BookingRecord {
            id: id.unwrap_or_else(|| self.new_id()),
            created_at: created_at.unwrap_or_else(|| self.now()),
            updated_at: None,
            status: status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            fields,
        }
    }
}

fn is_reserved(key: &str) -> bool {
    RESERVED_FIELDS.contains(&key)
}
