//! Subcommand implementations

pub mod banner;
pub mod migrate;

use std::sync::Arc;

use anyhow::{Context, Result};
use bannerctl_core::{BannerService, EventDispatcher, LogListener, SystemClock};
use bannerctl_store::PgBannerStore;

use crate::config::BannerctlConfig;

/// Open the store using the configured connection string
pub async fn connect(config: &BannerctlConfig) -> Result<PgBannerStore> {
    PgBannerStore::connect(&config.database_url(), config.max_connections())
        .await
        .context("Failed to connect to PostgreSQL (check DATABASE_URL)")
}

/// Banner service over PostgreSQL with change events logged
pub fn banner_service(store: PgBannerStore) -> BannerService<PgBannerStore> {
    let dispatcher = EventDispatcher::new().with_listener(Arc::new(LogListener));
    BannerService::new(store, dispatcher, Arc::new(SystemClock))
}
