//! Banner save path and read-side lookups
//!
//! A save is one transaction: the banner row write and the relation
//! reconciliation commit together or not at all. Listeners hear about
//! relation changes only after the commit succeeds.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{info, instrument};

use crate::clock::Clock;
use crate::error::{BannerError, Result};
use crate::events::{BannerEvent, EventDispatcher};
use crate::model::{Banner, BannerId, SaveMode, SliderId, SliderSelection, Timestamps};
use crate::reconcile::RelationReconciler;
use crate::store::{BannerStore, StoreTx};
use crate::url::normalize_url;

/// Result of a committed save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub banner_id: BannerId,
    /// Relation change published to listeners, if any
    pub event: Option<BannerEvent>,
}

/// Persists banners and their slider relations through a `BannerStore`
pub struct BannerService<S> {
    store: S,
    reconciler: RelationReconciler,
    clock: Arc<dyn Clock>,
}

impl<S: BannerStore> BannerService<S> {
    pub fn new(store: S, dispatcher: EventDispatcher, clock: Arc<dyn Clock>) -> Self {
        let reconciler = RelationReconciler::new(dispatcher, Arc::clone(&clock));
        Self {
            store,
            reconciler,
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn reconciler(&self) -> &RelationReconciler {
        &self.reconciler
    }

    /// Write the banner and reconcile its relations in one transaction.
    ///
    /// On success the banner carries its id, timestamps, normalized URL and
    /// reconciliation outputs. On failure it is left exactly as passed in.
    #[instrument(skip_all, fields(mode = ?mode, banner_id = ?banner.id()))]
    pub async fn save(&self, banner: &mut Banner, mode: SaveMode) -> Result<SaveOutcome> {
        match (mode, banner.id()) {
            (SaveMode::Create, Some(id)) => {
                return Err(BannerError::invalid_state(format!(
                    "banner {id} already exists; save it as an update"
                )));
            }
            (SaveMode::Update, None) => {
                return Err(BannerError::invalid_state(
                    "banner has no id; save it as a create",
                ));
            }
            _ => {}
        }

        let mut staged = banner.clone();
        staged.url = staged
            .url
            .as_deref()
            .map(normalize_url)
            .filter(|url| !url.is_empty());

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        match mode {
            SaveMode::Create => {
                let stamps = Timestamps {
                    created_at: now,
                    updated_at: now,
                };
                let id = tx.insert_banner(&staged.to_row(stamps)).await?;
                staged.assign_id(id)?;
                staged.set_timestamps(stamps);
            }
            SaveMode::Update => {
                let id = staged
                    .id()
                    .ok_or_else(|| BannerError::invalid_state("banner has no id"))?;
                // created_at in the row is ignored by the store.
                let proposed = Timestamps {
                    created_at: now,
                    updated_at: now,
                };
                let stamps = tx.update_banner(id, &staged.to_row(proposed)).await?;
                staged.set_timestamps(stamps);
            }
        }

        let event = self.reconciler.reconcile(&mut tx, &mut staged).await?;
        tx.commit().await?;

        let banner_id = staged
            .id()
            .ok_or_else(|| BannerError::invalid_state("saved banner lost its id"))?;
        *banner = staged;

        if let Some(event) = &event {
            info!(
                banner_id = %banner_id,
                sliders = ?event.slider_ids(),
                "Banner relations updated"
            );
            self.reconciler.publish(event);
        }

        Ok(SaveOutcome { banner_id, event })
    }

    /// Load a banner and its persisted slider set.
    ///
    /// The returned banner's desired selection is unspecified, so saving it
    /// without changes leaves relations alone.
    pub async fn load(&self, banner_id: BannerId) -> Result<Banner> {
        let mut tx = self.store.begin().await?;
        let stored = tx
            .fetch_banner(banner_id)
            .await?
            .ok_or_else(|| BannerError::not_found(banner_id))?;
        let previous = tx.slider_ids(banner_id).await?;
        tx.commit().await?;

        let mut banner = Banner::from_stored(stored);
        banner.set_previous_sliders(previous);
        Ok(banner)
    }

    pub async fn banner_name(&self, banner_id: BannerId) -> Result<Option<String>> {
        let mut tx = self.store.begin().await?;
        let name = tx.banner_name(banner_id).await?;
        tx.commit().await?;
        Ok(name)
    }

    /// `slider_id -> position` for the banner
    pub async fn sliders_for_banner(&self, banner_id: BannerId) -> Result<BTreeMap<SliderId, i32>> {
        let mut tx = self.store.begin().await?;
        let positions = self.reconciler.sliders_for_banner(&mut tx, banner_id).await?;
        tx.commit().await?;
        Ok(positions)
    }

    pub async fn slider_ids(&self, banner_id: BannerId) -> Result<BTreeSet<SliderId>> {
        let mut tx = self.store.begin().await?;
        let ids = self.reconciler.slider_ids(&mut tx, banner_id).await?;
        tx.commit().await?;
        Ok(ids)
    }

    /// Detach every slider and delete the banner in one transaction.
    #[instrument(skip(self))]
    pub async fn delete(&self, banner_id: BannerId) -> Result<Option<BannerEvent>> {
        let mut tx = self.store.begin().await?;
        let stored = tx
            .fetch_banner(banner_id)
            .await?
            .ok_or_else(|| BannerError::not_found(banner_id))?;

        let mut banner = Banner::from_stored(stored).with_sliders(SliderSelection::none());
        let event = self.reconciler.reconcile(&mut tx, &mut banner).await?;
        tx.delete_banner(banner_id).await?;
        tx.commit().await?;

        info!(banner_id = %banner_id, "Banner deleted");
        if let Some(event) = &event {
            self.reconciler.publish(event);
        }
        Ok(event)
    }
}
