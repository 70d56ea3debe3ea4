//! Tracing setup for the bannerctl CLI
//!
//! Usage:
//!   bannerctl --debug ...               # Debug logging to console
//!   RUST_LOG=bannerctl_core=debug ...   # Fine-grained log control
//!
//! Filter precedence: RUST_LOG, then `--debug`, then `[logging] level` from
//! the config file, then `info`.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Tracing configuration options
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Enable debug logging (used when RUST_LOG is not set)
    pub debug: bool,
    /// Default level from the config file
    pub level: Option<String>,
}

impl TracingConfig {
    fn default_directive(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            self.level.as_deref().unwrap_or("info")
        }
    }
}

/// Initialize console tracing
pub fn init(config: &TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.debug) // Show targets in debug mode
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}
