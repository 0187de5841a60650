//! Create command implementation.

use bookingdb_core::{BookingStore, NewBooking};
use serde::Deserialize;
use tracing::info;

/// Parsed input of the create command.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CreateInput {
    /// A batch, created under one lock and one write.
    Many(Vec<NewBooking>),
    /// A single booking.
    One(NewBooking),
}

/// Parses a JSON object or array of objects.
pub fn parse(json: &str) -> Result<CreateInput, serde_json::Error> {
    serde_json::from_str(json)
}

/// Runs the create command.
pub fn run(store: &BookingStore, json: &str) -> Result<(), Box<dyn std::error::Error>> {
    match parse(json)? {
        CreateInput::One(input) => {
            let record = store.create(input)?;
            info!(id = %record.id, "created booking");
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        CreateInput::Many(inputs) => {
            let records = store.create_many(inputs)?;
            info!(count = records.len(), "created bookings");
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }

    Ok(())
}
