//! Get command implementation.

use bookingdb_core::BookingStore;

/// Runs the get command.
pub fn run(store: &BookingStore, id: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let record = store
        .get_by_id(id)?
        .ok_or_else(|| format!("Booking not found: {id}"))?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&record)?),
        _ => {
            println!("Booking {}", record.id);
            println!("  Status:     {}", record.status);
            println!("  Created at: {}", record.created_at);
            if let Some(updated) = &record.updated_at {
                println!("  Updated at: {updated}");
            }
            for (key, value) in &record.fields {
                println!("  {key}: {value}");
            }
        }
    }

    Ok(())
}
