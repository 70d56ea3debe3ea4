//! bannerctl configuration
//!
//! Sources, highest priority first:
//! 1. Environment (`DATABASE_URL`), including values loaded from `.env`
//! 2. `~/.bannerctl/config.toml`, or the file passed with `--config`
//! 3. Built-in defaults

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bannerctl_store::DEFAULT_MAX_CONNECTIONS;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/bannerctl";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BannerctlConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub url: Option<String>,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Default tracing filter, e.g. "info" or "bannerctl_core=debug"
    pub level: Option<String>,
}

impl BannerctlConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist; the default path is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    bail!("Config not found at {:?}", path);
                }
                Self::from_path(path)
            }
            None => {
                let Some(path) = Self::config_path() else {
                    return Ok(Self::default());
                };
                if path.exists() {
                    Self::from_path(&path)
                } else {
                    debug!("No config file at {:?}, using defaults", path);
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content).context(format!("Invalid config file: {:?}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file (invalid TOML)")
    }

    /// Default config file path: ~/.bannerctl/config.toml
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Connection string: `DATABASE_URL`, then the file, then the default.
    pub fn database_url(&self) -> String {
        self.database_url_with(std::env::var("DATABASE_URL").ok())
    }

    fn database_url_with(&self, env_url: Option<String>) -> String {
        env_url
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.database.url.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
    }

    pub fn max_connections(&self) -> u32 {
        self.database
            .max_connections
            .unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }
}

/// Get the bannerctl config directory path (~/.bannerctl)
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".bannerctl"))
}

/// Load `.env` from the current directory, then `~/.bannerctl/.env`.
///
/// dotenvy never overwrites variables that are already set, so earlier
/// sources win.
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded .env from current directory: {}", path.display());
    }

    if let Some(env_file) = config_dir().map(|dir| dir.join(".env")) {
        if env_file.exists() {
            match dotenvy::from_path(&env_file) {
                Ok(()) => debug!("Loaded .env from {}", env_file.display()),
                Err(e) => debug!("Failed to load {}: {}", env_file.display(), e),
            }
        }
    }
}
