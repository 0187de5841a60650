//! List command implementation.

use super::print_record_line;
use bookingdb_core::BookingStore;

/// Runs the list command.
pub fn run(
    store: &BookingStore,
    user: Option<&str>,
    status: Option<&str>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = store.get_where(|record| {
        user.is_none_or(|u| record.user_id() == Some(u))
            && status.is_none_or(|s| record.status == s)
    })?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&records)?),
        _ => {
            for record in &records {
                print_record_line(record);
            }
            println!();
            println!("{} booking(s)", records.len());
        }
    }

    Ok(())
}
