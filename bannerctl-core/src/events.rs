//! Relation change events and the listeners that receive them

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{BannerId, SliderId};

/// Domain events published after a banner save commits.
///
/// Serialized as single-line JSON tagged with `"event"`, so subscribers that
/// forward events (cache invalidation, audit logs) can parse them back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BannerEvent {
    /// A banner's slider relations were inserted or deleted
    RelationChanged {
        timestamp: DateTime<Utc>,
        banner_id: BannerId,
        banner_name: String,
        /// Union of inserted and deleted sliders
        slider_ids: BTreeSet<SliderId>,
        inserted: BTreeSet<SliderId>,
        deleted: BTreeSet<SliderId>,
    },
}

impl BannerEvent {
    /// Build a relation change event; `slider_ids` is derived from the two sets.
    pub fn relation_changed(
        timestamp: DateTime<Utc>,
        banner_id: BannerId,
        banner_name: impl Into<String>,
        inserted: BTreeSet<SliderId>,
        deleted: BTreeSet<SliderId>,
    ) -> Self {
        let slider_ids = inserted.union(&deleted).copied().collect();
        Self::RelationChanged {
            timestamp,
            banner_id,
            banner_name: banner_name.into(),
            slider_ids,
            inserted,
            deleted,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BannerEvent::RelationChanged { .. } => "relation_changed",
        }
    }

    pub fn banner_id(&self) -> BannerId {
        match self {
            BannerEvent::RelationChanged { banner_id, .. } => *banner_id,
        }
    }

    /// Sliders whose membership changed
    pub fn slider_ids(&self) -> &BTreeSet<SliderId> {
        match self {
            BannerEvent::RelationChanged { slider_ids, .. } => slider_ids,
        }
    }
}

/// Error returned by a listener; logged, never propagated
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type ListenerResult = std::result::Result<(), ListenerError>;

/// Subscriber to banner events
pub trait BannerListener: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    fn handle(&self, event: &BannerEvent) -> ListenerResult;
}

/// Explicit list of listeners, handed to the reconciler at construction
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Vec<Arc<dyn BannerListener>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: Arc<dyn BannerListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn subscribe(&mut self, listener: Arc<dyn BannerListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver to every listener. Returns how many handled it without error.
    pub fn dispatch(&self, event: &BannerEvent) -> usize {
        let mut delivered = 0;
        for listener in &self.listeners {
            match listener.handle(event) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    tracing::warn!(
                        listener = listener.name(),
                        event = event.name(),
                        banner_id = %event.banner_id(),
                        error = %err,
                        "Banner listener failed"
                    );
                }
            }
        }
        delivered
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field(
                "listeners",
                &self.listeners.iter().map(|l| l.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Writes every event as a structured tracing record
#[derive(Debug, Clone, Copy, Default)]
pub struct LogListener;

impl BannerListener for LogListener {
    fn name(&self) -> &str {
        "log"
    }

    fn handle(&self, event: &BannerEvent) -> ListenerResult {
        let payload = serde_json::to_string(event)?;
        tracing::info!(
            event = event.name(),
            banner_id = %event.banner_id(),
            payload = %payload,
            "Banner relations changed"
        );
        Ok(())
    }
}
