//! Process-wide `tracing` subscriber.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, LogFormat};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Source locations
/// are included when `add_source` is set.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(config.add_source)
        .with_line_number(config.add_source)
        .with_writer(std::io::stderr);

    match config.format {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}
