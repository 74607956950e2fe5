//! Logging system setup
//!
//! Log lines go to stderr so that command output on stdout stays valid JSON.

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingSettings;

/// Builds the filter: `RUST_LOG` when set, otherwise the configured level.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the global tracing subscriber.
///
/// # Environment Variables
/// * `RUST_LOG` - Override the configured filter (e.g., "debug", "world_manager=trace")
pub fn setup_logging(settings: &LoggingSettings) -> Result<()> {
    let filter = build_filter(&settings.level);

    if settings.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    Ok(())
}
