//! Command-line interface for ua-solver.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **match**: Identify the device profiles for User-Agents or HTTP headers
//! - **dataset**: Inspect, compile or export a signature data set
//!
//! ## Usage
//!
//! ```text
//! # Match a User-Agent against the embedded data set
//! ua-solver match "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36"
//!
//! # Match every line of a log extract, JSON output for scripting
//! ua-solver match --input agents.txt --format json
//!
//! # Combine several headers
//! ua-solver match --header "User-Agent: ..." --header "Device-Stock-UA: ..."
//!
//! # Compile a data set source to the binary format
//! ua-solver dataset compile signatures.bin --dataset signatures.json
//! ```

use std::path::Path;

use clap::{Parser, Subcommand};

use crate::dataset::store::DataSet;

pub mod dataset;
pub mod identify;

#[derive(Parser)]
#[command(name = "ua-solver")]
#[command(version)]
#[command(about = "Identify device profiles from User-Agent strings")]
#[command(
    long_about = "ua-solver identifies the hardware, software and browser behind a User-Agent string.\n\nIt decomposes the string into known substrings and matches them against a data set of device signatures:\n- Exact and numeric-tolerant signature lookups\n- Nearest and closest scoring when no signature matches exactly\n- Default profiles when nothing can be identified"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Match User-Agent strings or HTTP headers
    Match(identify::MatchArgs),

    /// Inspect and convert data sets
    Dataset(dataset::DatasetArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}

/// Load a data set from a file, or the embedded one when no path is given.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid data set.
pub fn load_dataset(path: Option<&Path>, verbose: bool) -> anyhow::Result<DataSet> {
    let dataset = match path {
        Some(path) => DataSet::load_from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load {}: {e}", path.display()))?,
        None => DataSet::load_embedded()?,
    };

    if verbose {
        eprintln!(
            "Loaded data set '{}' v{} with {} signatures",
            dataset.name,
            dataset.version,
            dataset.len()
        );
    }

    Ok(dataset)
}
