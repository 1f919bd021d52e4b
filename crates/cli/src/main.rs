//! `delivery` command-line entry point.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

mod cli;
mod error;

use std::process::ExitCode;

use clap::Parser;
use domain::DeliveryConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let config = DeliveryConfig::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.run(&config).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: failed to encode output: {e}");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
