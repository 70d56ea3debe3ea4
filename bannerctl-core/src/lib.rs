//! bannerctl-core: banner persistence and slider relation reconciliation
//!
//! A banner owns a set of slider associations stored in a join table keyed
//! by `(banner_id, slider_id)`. `BannerService::save` writes the banner row
//! and hands the banner's desired slider set to `RelationReconciler`, which
//! applies the minimal delete and insert inside the same transaction.

pub mod clock;
pub mod error;
pub mod events;
pub mod memory;
pub mod model;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod url;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BannerError, Result};
pub use events::{BannerEvent, BannerListener, EventDispatcher, ListenerResult, LogListener};
pub use memory::MemoryStore;
pub use model::{
    Banner, BannerId, BannerRow, RelationRow, SaveMode, SliderId, SliderSelection, StoredBanner,
    Timestamps, DEFAULT_POSITION,
};
pub use reconcile::{RelationPlan, RelationReconciler};
pub use service::{BannerService, SaveOutcome};
pub use store::{BannerStore, StoreTx};
pub use url::normalize_url;
