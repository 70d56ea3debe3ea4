//! Storage ports for banners and the banner/slider join table
//!
//! Implementations:
//! - `MemoryStore`: in-process tables, used by tests and embedding callers
//! - `PgBannerStore` (bannerctl-store): PostgreSQL through sqlx

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{BannerId, BannerRow, RelationRow, SliderId, StoredBanner, Timestamps};

/// Handle that opens transactions against a banner store
#[async_trait]
pub trait BannerStore: Send + Sync {
    type Tx: StoreTx;

    /// Begin a transaction. Dropping it without `commit` rolls back.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// Statements available inside one transaction.
///
/// Every failure from the backend surfaces as `BannerError::Storage`.
#[async_trait]
pub trait StoreTx: Send {
    /// Insert a banner row, returning the generated id.
    async fn insert_banner(&mut self, row: &BannerRow) -> Result<BannerId>;

    /// Overwrite a banner's columns except `created_at`.
    ///
    /// `updated_at` is clamped to be no earlier than the stored `created_at`.
    /// Returns `NotFound` for an unknown id.
    async fn update_banner(&mut self, id: BannerId, row: &BannerRow) -> Result<Timestamps>;

    /// Lock the banner row for the rest of the transaction.
    ///
    /// Returns `NotFound` when the banner does not exist.
    async fn lock_banner(&mut self, id: BannerId) -> Result<()>;

    async fn fetch_banner(&mut self, id: BannerId) -> Result<Option<StoredBanner>>;

    async fn banner_name(&mut self, id: BannerId) -> Result<Option<String>>;

    /// Delete the banner row. Returns whether a row was removed.
    async fn delete_banner(&mut self, id: BannerId) -> Result<bool>;

    /// `slider_id -> position` for every relation row of the banner
    async fn slider_positions(&mut self, id: BannerId) -> Result<BTreeMap<SliderId, i32>>;

    async fn slider_ids(&mut self, id: BannerId) -> Result<BTreeSet<SliderId>>;

    /// Delete the banner's rows for the given sliders in one statement.
    async fn delete_relations(
        &mut self,
        id: BannerId,
        sliders: &BTreeSet<SliderId>,
    ) -> Result<u64>;

    /// Insert all rows in batched statements on the open transaction.
    ///
    /// SQL stores split batches that would exceed the driver's bind limit.
    /// A row whose `(banner_id, slider_id)` already exists fails the call.
    async fn insert_relations(&mut self, rows: &[RelationRow]) -> Result<u64>;

    async fn commit(self) -> Result<()>;
}
