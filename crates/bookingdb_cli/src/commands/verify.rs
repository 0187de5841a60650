//! Verify command implementation.

use bookingdb_core::{BookingStore, VerifyReport};

/// Runs the verify command.
pub fn run(store: &BookingStore, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = store.verify()?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_report(store, &report),
    }

    if report.is_consistent() {
        Ok(())
    } else {
        Err("Store verification failed".into())
    }
}

fn print_report(store: &BookingStore, report: &VerifyReport) {
    println!("Verifying store at {:?}", store.path());
    println!();

    if !report.exists {
        println!("Store file not found (empty store)");
        return;
    }

    println!("Records:       {}", report.record_count);
    println!("Empty ids:     {}", report.empty_ids);
    println!("Duplicate ids: {}", report.duplicate_ids.len());
    for id in &report.duplicate_ids {
        println!("  - {id}");
    }

    if !report.statuses.is_empty() {
        println!();
        println!("Statuses:");
        for (status, count) in &report.statuses {
            println!("  {status:<12} {count}");
        }
    }

    println!();
    if report.is_consistent() {
        println!("✓ Store is consistent");
    } else {
        println!("✗ Store has inconsistencies");
    }
}
