//! BookingDB CLI
//!
//! Command-line tools for a BookingDB store file.
//!
//! # Commands
//!
//! - `list` - List bookings, optionally filtered by user or status
//! - `get` - Show a single booking
//! - `create` - Create one booking (JSON object) or a batch (JSON array)
//! - `update` - Merge a partial booking (JSON object with `id`)
//! - `verify` - Check the store file for duplicate or empty ids

mod commands;

use bookingdb_core::{BookingStore, StoreConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// BookingDB command-line store tools.
#[derive(Parser)]
#[command(name = "bookingdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List bookings
    List {
        /// Only bookings owned by this user
        #[arg(short, long)]
        user: Option<String>,

        /// Only bookings with this status
        #[arg(short, long)]
        status: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show a single booking
    Get {
        /// Booking id
        id: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Create bookings from a JSON object or array
    Create {
        /// Booking JSON
        json: String,
    },

    /// Update a booking from a partial JSON object carrying its id
    Update {
        /// Partial booking JSON
        json: String,
    },

    /// Check the store file for duplicate or empty ids
    Verify {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let open = |command: &str| -> Result<BookingStore, String> {
        let path = cli
            .path
            .clone()
            .ok_or_else(|| format!("Store path required for {command}"))?;
        Ok(BookingStore::new(StoreConfig::new(path)))
    };

    match &cli.command {
        Commands::List {
            user,
            status,
            format,
        } => {
            let store = open("list")?;
            commands::list::run(&store, user.as_deref(), status.as_deref(), format)?;
        }
        Commands::Get { id, format } => {
            let store = open("get")?;
            commands::get::run(&store, id, format)?;
        }
        Commands::Create { json } => {
            let store = open("create")?;
            commands::create::run(&store, json)?;
        }
        Commands::Update { json } => {
            let store = open("update")?;
            commands::update::run(&store, json)?;
        }
        Commands::Verify { format } => {
            let store = open("verify")?;
            commands::verify::run(&store, format)?;
        }
        Commands::Version => {
            println!("BookingDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("BookingDB Core v{}", bookingdb_core::VERSION);
        }
    }

    Ok(())
}
