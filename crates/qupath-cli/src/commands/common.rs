//! Shared helpers for CLI commands.

use anyhow::{Context, Result};
use clap::Args;
use qupath_tree::Spst;
use std::path::PathBuf;

use crate::config::Config;
use crate::logging;

/// Where the path comes from.
#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// YAML configuration file
    #[arg(short, long, env = "QUPATH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Link fidelities for a path 0-1-2-..., replacing the configured path
    #[arg(long, value_delimiter = ',')]
    pub fids: Vec<f64>,
}

/// Load and validate the configuration, then install the logger.
pub fn load_config(args: &PathArgs, verbose: u8) -> Result<Config> {
    let mut config = Config::load(args.config.as_deref())?;
    if !args.fids.is_empty() {
        config.set_fidelities(&args.fids);
    }
    config.validate()?;
    logging::init(verbose, &config.logging)?;
    Ok(config)
}

/// An unbuilt scheme tree over the configured path.
pub fn new_spst(config: &Config) -> Result<Spst> {
    let gate = config.gate()?;
    Spst::new(config.links(), gate).context("invalid path")
}
