//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub mod process;
pub mod status;
pub mod sweep;

/// Autonomous repair agent for failed CI runs.
#[derive(Parser)]
#[command(name = "nightwatch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one workflow-run event through the healing pipeline
    Process(ProcessArgs),
    /// Sweep stale sandboxes and workspaces once
    Sweep(SweepArgs),
    /// Show recent failures and their outcomes
    Status(StatusArgs),
}

#[derive(Args)]
pub struct ProcessArgs {
    /// Path to a workflow-run event JSON file
    pub event: PathBuf,
}

#[derive(Args)]
pub struct SweepArgs {
    /// Age threshold in hours
    #[arg(long, default_value_t = 24)]
    pub max_age_hours: u64,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Maximum number of failures to show
    #[arg(long, default_value_t = 20)]
    pub limit: i64,
}
