//! squid-db-log - Squid logfile daemon writing access logs to a database
//!
//! Started by Squid with the connection string as its only argument; reads
//! log commands from stdin until Squid closes the pipe.

mod cli;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use squid_db_log::{serve, ConnectionConfig, Settings};
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use cli::CliArguments;

/// Logging goes to stderr: Squid owns our stdout.
fn init_tracing(settings: &Settings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(settings.log_level.to_lowercase()))?;

    // Use log_format = "gcp" for structured GCP Cloud Logging
    if settings.log_format == "gcp" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_stackdriver::layer().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    let cli_args = CliArguments::parse();

    let settings = Settings::load(&cli_args.settings);
    let logging = init_tracing(settings.as_ref().unwrap_or(&Settings::default()));
    if let Err(e) = logging {
        eprintln!("squid-db-log: cannot initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            error!(fatal = true, error = %e, "Failed to load settings");
            return ExitCode::FAILURE;
        }
    };

    info!(driver = %settings.driver, "Starting squid-db-log");

    let config = match ConnectionConfig::resolve(&cli_args.connection) {
        Ok(config) => config,
        Err(e) => {
            error!(fatal = true, error = %e, "Invalid connection string");
            return ExitCode::FAILURE;
        }
    };

    let stdin = BufReader::new(tokio::io::stdin());
    match serve(&config, &settings, stdin).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(fatal = true, error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}
