//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tally - turn receipts and invoices into reviewable transactions.
#[derive(Debug, Parser)]
#[command(name = "tally")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.tally/config.toml)
    #[arg(short, long, global = true, env = "TALLY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Debug-level logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch a directory and process documents as they arrive
    Watch(WatchArgs),

    /// Process a single document and print its review record
    Process(ProcessArgs),

    /// Validate the configuration and print the effective values
    CheckConfig,
}

/// Arguments for the watch command.
#[derive(Debug, Parser)]
pub struct WatchArgs {
    /// Append review records as JSON lines to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override the configured watch directory
    #[arg(long)]
    pub watch_dir: Option<PathBuf>,

    /// Override the configured archive directory
    #[arg(long)]
    pub archive_dir: Option<PathBuf>,

    /// Override the configured number of workers
    #[arg(short, long)]
    pub workers: Option<usize>,
}

/// Arguments for the process command.
#[derive(Debug, Parser)]
pub struct ProcessArgs {
    /// Document to process (PDF, PNG or JPEG)
    pub file: PathBuf,

    /// Print the record on one line
    #[arg(long)]
    pub compact: bool,
}
