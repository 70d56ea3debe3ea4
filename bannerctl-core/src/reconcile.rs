//! Banner/slider relation reconciliation
//!
//! Brings the join table rows of one banner into agreement with the
//! banner's desired slider set using the minimal delete and insert:
//! - rows only in the store are deleted in one statement
//! - sliders only in the desired set are inserted in one batch at
//!   `DEFAULT_POSITION`
//! - rows present on both sides are left alone, positions included
//!
//! The reconciler runs inside the caller's transaction and returns the
//! pending event; `publish` is called once that transaction commits.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::clock::Clock;
use crate::error::{BannerError, Result};
use crate::events::{BannerEvent, EventDispatcher};
use crate::model::{Banner, BannerId, RelationRow, SliderId, DEFAULT_POSITION};
use crate::store::StoreTx;

/// Inserts and deletes needed to move from one slider set to another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationPlan {
    pub to_insert: BTreeSet<SliderId>,
    pub to_delete: BTreeSet<SliderId>,
}

impl RelationPlan {
    pub fn compute(previous: &BTreeSet<SliderId>, desired: &BTreeSet<SliderId>) -> Self {
        Self {
            to_insert: desired.difference(previous).copied().collect(),
            to_delete: previous.difference(desired).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_delete.is_empty()
    }

    /// Every slider the plan touches
    pub fn affected(&self) -> BTreeSet<SliderId> {
        self.to_insert.union(&self.to_delete).copied().collect()
    }

    fn insert_rows(&self, banner_id: BannerId) -> Vec<RelationRow> {
        self.to_insert
            .iter()
            .map(|&slider_id| RelationRow {
                banner_id,
                slider_id,
                position: DEFAULT_POSITION,
            })
            .collect()
    }
}

/// Sole writer of the banner/slider join table
#[derive(Clone)]
pub struct RelationReconciler {
    dispatcher: EventDispatcher,
    clock: Arc<dyn Clock>,
}

impl RelationReconciler {
    pub fn new(dispatcher: EventDispatcher, clock: Arc<dyn Clock>) -> Self {
        Self { dispatcher, clock }
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Apply the banner's desired slider set.
    ///
    /// Sets the banner's `changed` and `affected_sliders` outputs and returns
    /// the `relation_changed` event to publish after commit, if anything
    /// changed. An unspecified selection returns without touching the store.
    #[instrument(skip_all, fields(banner_id = ?banner.id()))]
    pub async fn reconcile<T: StoreTx>(
        &self,
        tx: &mut T,
        banner: &mut Banner,
    ) -> Result<Option<BannerEvent>> {
        let banner_id = banner.id().ok_or_else(|| {
            BannerError::invalid_state("banner must be written before its relations")
        })?;

        let Some(desired) = banner.desired_sliders.as_set().cloned() else {
            banner.record_outcome(BTreeSet::new());
            return Ok(None);
        };

        // Serializes reconciliations of the same banner.
        tx.lock_banner(banner_id).await.map_err(|err| match err {
            BannerError::NotFound { id } => {
                BannerError::invalid_state(format!("banner {id} has not been written"))
            }
            other => other,
        })?;

        let previous = tx.slider_ids(banner_id).await?;
        let plan = RelationPlan::compute(&previous, &desired);
        banner.set_previous_sliders(previous);
        debug!(
            insert = plan.to_insert.len(),
            delete = plan.to_delete.len(),
            "Computed relation plan"
        );

        if !plan.to_delete.is_empty() {
            tx.delete_relations(banner_id, &plan.to_delete).await?;
        }
        if !plan.to_insert.is_empty() {
            tx.insert_relations(&plan.insert_rows(banner_id)).await?;
        }

        banner.record_outcome(plan.affected());
        if plan.is_empty() {
            return Ok(None);
        }

        let RelationPlan {
            to_insert,
            to_delete,
        } = plan;
        Ok(Some(BannerEvent::relation_changed(
            self.clock.now(),
            banner_id,
            banner.name.clone(),
            to_insert,
            to_delete,
        )))
    }

    /// `slider_id -> position` for the banner; empty when it has none.
    pub async fn sliders_for_banner<T: StoreTx>(
        &self,
        tx: &mut T,
        banner_id: BannerId,
    ) -> Result<BTreeMap<SliderId, i32>> {
        tx.slider_positions(banner_id).await
    }

    pub async fn slider_ids<T: StoreTx>(
        &self,
        tx: &mut T,
        banner_id: BannerId,
    ) -> Result<BTreeSet<SliderId>> {
        tx.slider_ids(banner_id).await
    }

    /// Hand a committed change to the listeners.
    pub fn publish(&self, event: &BannerEvent) -> usize {
        self.dispatcher.dispatch(event)
    }
}

impl std::fmt::Debug for RelationReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationReconciler")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
