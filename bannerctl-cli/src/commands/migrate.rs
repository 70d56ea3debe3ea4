use anyhow::{Context, Result};
use tracing::info;

use crate::config::BannerctlConfig;

/// Create the banner tables if they do not exist
pub async fn run_migrate(config: &BannerctlConfig) -> Result<()> {
    let store = super::connect(config).await?;
    bannerctl_store::migrations::run(store.pool())
        .await
        .context("Failed to run banner migrations")?;
    info!("Schema is up to date");
    Ok(())
}
