//! bannerctl CLI - banner records and their slider assignments
//!
//! Entry point for the `bannerctl` command-line tool:
//! - Schema setup (`migrate`)
//! - Banner create/update/show/delete with slider reconciliation
//!
//! Slider assignments are reconciled with the minimal set of deletes and
//! inserts; each change is logged as a `relation_changed` event.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod tracing_setup;

use config::BannerctlConfig;
use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "bannerctl",
    author,
    version,
    about = "Manage banners and their slider assignments in PostgreSQL",
    long_about = "Create and update banners and keep their slider assignments in sync. \
                  Slider changes are applied as the minimal set of inserts and deletes \
                  in the same transaction as the banner write."
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: ~/.bannerctl/config.toml)
    #[arg(long, global = true, value_name = "PATH", env = "BANNERCTL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create banner tables and indexes
    Migrate,
    /// Create a banner, optionally assigning sliders
    Create(commands::banner::CreateArgs),
    /// Update a banner; slider assignments change only when given
    Update(commands::banner::UpdateArgs),
    /// Show a banner and its slider positions as JSON
    Show(commands::banner::IdArgs),
    /// Delete a banner and its slider assignments
    Delete(commands::banner::IdArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    config::load_dotenv();
    let config = BannerctlConfig::load(cli.config.as_deref())?;

    tracing_setup::init(&TracingConfig {
        debug: cli.debug,
        level: config.logging.level.clone(),
    })?;

    match cli.command {
        Commands::Migrate => commands::migrate::run_migrate(&config).await,
        Commands::Create(args) => commands::banner::run_create(&config, args).await,
        Commands::Update(args) => commands::banner::run_update(&config, args).await,
        Commands::Show(args) => commands::banner::run_show(&config, args).await,
        Commands::Delete(args) => commands::banner::run_delete(&config, args).await,
    }
}
