// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Causeway - AI-driven root cause analysis for operational incidents.
//!
//! Binary entry point: `serve` runs the API with an embedded worker pool,
//! `work` runs workers only, `doctor` checks the local configuration.

use clap::{Parser, Subcommand};

mod doctor;
mod serve;

/// Causeway - AI-driven root cause analysis for operational incidents.
#[derive(Parser, Debug)]
#[command(name = "causeway", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the API server with an embedded worker pool.
    Serve,
    /// Run the worker pool only (no API).
    Work,
    /// Check configuration and local connectivity.
    Doctor,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve => serve::run(serve::Mode::ApiAndWorkers).await,
        Commands::Work => serve::run(serve::Mode::WorkersOnly).await,
        Commands::Doctor => doctor::run().await,
    };

    if let Err(e) = result {
        eprintln!("causeway: {e}");
        std::process::exit(1);
    }
}
