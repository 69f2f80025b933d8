//! Logging setup for the CLI.

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber.
///
/// `-v`, `-vv` and `-vvv` select info, debug and trace. Without a flag the
/// configured level applies.
pub fn init(verbose: u8, config: &LoggingConfig) -> anyhow::Result<()> {
    let level = match verbose {
        0 => config.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_new(level).map_err(|e| anyhow!("invalid log level '{level}': {e}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let installed = match config.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install logger: {e}"))
}

/// [`init`] with the default logging configuration.
pub fn init_default(verbose: u8) -> anyhow::Result<()> {
    init(verbose, &LoggingConfig::default())
}
