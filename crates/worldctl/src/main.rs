//! worldctl - operator CLI for the worlds of a Paper server
//!
//! Prints command results as JSON on stdout. Failures are printed as a JSON
//! object on stderr; the exit status is 1 when nothing was changed and 2 when
//! the worlds directory may need inspection.

mod cli;
mod commands;
mod config;
mod logging;

use anyhow::anyhow;
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

use cli::Args;
use commands::{App, ErrorReport};
use config::AppConfig;

/// Loads the configuration file, applies CLI overrides and validates.
async fn load_config(args: &Args) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load_from_file(&args.config).await?;
    config.apply_overrides(args);
    config
        .validate()
        .map_err(|e| anyhow!("Configuration validation failed: {e}"))?;
    Ok(config)
}

fn report(report: ErrorReport) -> ExitCode {
    match serde_json::to_string_pretty(&report) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!("{}: {}", report.kind, report.message),
    }
    ExitCode::from(report.exit_code())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args).await {
        Ok(config) => config,
        Err(e) => return report(ErrorReport::other("config", format!("{e:#}"))),
    };

    if let Err(e) = logging::setup_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
    }
    info!("Worlds root: {}", config.worlds_root().display());

    let app = App::from_config(&config);
    match app.execute(args.command).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => report(ErrorReport {
                state_untouched: false,
                ..ErrorReport::other("output", e)
            }),
        },
        Err(e) => {
            error!("Command failed: {}", e);
            report(ErrorReport::from(&e))
        }
    }
}
