use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "skyfuel")]
#[command(version, about = "Battery registry with scannable QR identity codes")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the skyfuel home directory, configuration and database
    Init,

    /// Register a new battery and write its QR code
    Add {
        /// Number of cells in series
        #[arg(long, allow_negative_numbers = true)]
        cells: i64,

        /// Capacity in mAh
        #[arg(long, allow_negative_numbers = true)]
        capacity: i64,

        /// Initial charge state (low, storage, full)
        #[arg(long, default_value = "storage")]
        state: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List all batteries
    List {
        /// Only show batteries in this charge state (low, storage, full)
        #[arg(long)]
        state: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a single battery
    Get {
        /// Battery id (full UUID or a unique prefix of at least 4 characters)
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the most recently registered battery
    Latest {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change the charge state of a battery
    SetState {
        /// Battery id (full UUID or unique prefix)
        id: String,

        /// New charge state (low, storage, full)
        state: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a battery and its QR code image
    Delete {
        /// Battery id (full UUID or unique prefix)
        id: String,
    },

    /// Re-render the QR code image of a battery
    Qr {
        /// Battery id (full UUID or unique prefix)
        id: String,
    },

    /// Look up a battery from scanned QR code text
    Scan {
        /// Text decoded by the scanner
        #[arg(required_unless_present = "stdin")]
        text: Option<String>,

        /// Read the scanned text from stdin
        #[arg(long, conflicts_with = "text")]
        stdin: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write every battery to a JSON backup
    Export {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Add the batteries of a JSON backup, skipping ids already registered
    Import {
        /// Backup file to read
        #[arg(required_unless_present = "stdin")]
        file: Option<PathBuf>,

        /// Read the backup from stdin
        #[arg(long, conflicts_with = "file")]
        stdin: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show fleet statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
