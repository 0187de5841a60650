//! Update command implementation.

use bookingdb_core::{BookingPatch, BookingStore, UpdateOutcome};
use tracing::info;

/// Runs the update command.
pub fn run(store: &BookingStore, json: &str) -> Result<(), Box<dyn std::error::Error>> {
    let patch: BookingPatch = serde_json::from_str(json)?;
    let id = patch.id.clone();

    match store.update(patch)? {
        UpdateOutcome::Updated(record) => {
            info!(id = %record.id, status = %record.status, "updated booking");
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        UpdateOutcome::NotFound => Err(format!("Booking not found: {id}").into()),
    }
}
