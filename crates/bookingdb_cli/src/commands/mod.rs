//! CLI command implementations.

pub mod create;
pub mod get;
pub mod list;
pub mod update;
pub mod verify;

use bookingdb_core::BookingRecord;

/// Prints one booking as a single text line.
pub(crate) fn print_record_line(record: &BookingRecord) {
    let user = record.user_id().unwrap_or("-");
    match &record.updated_at {
        Some(updated) => println!(
            "{}  {:<10}  user={}  created={}  updated={}",
            record.id, record.status, user, record.created_at, updated
        ),
        None => println!(
            "{}  {:<10}  user={}  created={}",
            record.id, record.status, user, record.created_at
        ),
    }
}
