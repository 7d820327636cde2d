//! # warden
//!
//! Reconciles a Databricks workspace against the YAML documents in the
//! configuration directory.
//!
//! ## Exit codes
//!
//! - `0`: every pass ran, even if individual items failed
//! - `1`: a document failed to load, or a pass aborted on a structural error

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use std::process::ExitCode;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use warden::{Cli, execute_command};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    init_tracing(cli.global.debug);

    let outcome = execute_command(cli.global, cli.command).await;

    info!(elapsed = ?start_time.elapsed(), "Execution time");
    outcome
}

/// `RUST_LOG` wins when set; otherwise `--debug` picks debug over info.
fn init_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
