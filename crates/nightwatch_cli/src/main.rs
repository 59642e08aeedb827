//! Nightwatch CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Configuration error
//! - 4: Container runtime error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CONFIG_ERROR: u8 = 3;
    pub const RUNTIME_ERROR: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging; a second init attempt is harmless
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::from_default_env()
                .add_directive("nightwatch=info".parse().unwrap())
                .add_directive("warn".parse().unwrap()),
        )
        .try_init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Process(args) => commands::process::execute(args).await,
        Commands::Sweep(args) => commands::sweep::execute(args).await,
        Commands::Status(args) => commands::status::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let msg = e.to_string().to_lowercase();

    if msg.contains("not configured") || msg.contains("api key") || msg.contains("token") {
        ExitCodes::CONFIG_ERROR
    } else if msg.contains("docker") || msg.contains("container") {
        ExitCodes::RUNTIME_ERROR
    } else if msg.contains("argument") || msg.contains("no such file") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
