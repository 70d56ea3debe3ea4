//! In-process banner store
//!
//! Mirrors the PostgreSQL schema's guarantees: generated ids, a composite
//! `(banner_id, slider_id)` key, a cascading foreign key to the banner, and
//! all-or-nothing transactions. Transactions are serialized by an async mutex
//! and work on a snapshot that replaces the tables only on commit.
//!
//! Every statement is appended to a journal, and failures can be injected at
//! named points, so callers can assert exactly what was executed.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{BannerError, Result};
use crate::model::{BannerId, BannerRow, RelationRow, SliderId, StoredBanner, Timestamps};
use crate::store::{BannerStore, StoreTx};

/// A statement executed against the memory store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    InsertBanner,
    UpdateBanner(BannerId),
    LockBanner(BannerId),
    FetchBanner(BannerId),
    BannerName(BannerId),
    DeleteBanner(BannerId),
    SliderPositions(BannerId),
    SliderIds(BannerId),
    DeleteRelations {
        banner_id: BannerId,
        sliders: BTreeSet<SliderId>,
    },
    InsertRelations(Vec<RelationRow>),
    Commit,
}

impl StoreOp {
    /// True for statements that modify the join table
    pub fn writes_relations(&self) -> bool {
        matches!(self, Self::DeleteRelations { .. } | Self::InsertRelations(_))
    }

    /// True for statements that read or write the join table
    pub fn touches_relations(&self) -> bool {
        self.writes_relations()
            || matches!(self, Self::SliderIds(_) | Self::SliderPositions(_))
    }
}

/// Where an injected failure fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    InsertBanner,
    UpdateBanner,
    DeleteRelations,
    InsertRelations,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    last_id: i64,
    banners: BTreeMap<BannerId, BannerRow>,
    relations: BTreeMap<(BannerId, SliderId), i32>,
}

#[derive(Debug, Default)]
struct Shared {
    journal: Mutex<Vec<StoreOp>>,
    faults: Mutex<HashSet<FaultPoint>>,
}

impl Shared {
    fn record(&self, op: StoreOp) {
        self.journal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(op);
    }

    fn check(&self, point: FaultPoint, operation: &'static str) -> Result<()> {
        let armed = self
            .faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&point);
        if armed {
            return Err(BannerError::storage(operation, "injected failure"));
        }
        Ok(())
    }
}

/// Banner store held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<AsyncMutex<Tables>>,
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next statement at `point`. One-shot.
    pub fn fail_next(&self, point: FaultPoint) {
        self.shared
            .faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(point);
    }

    /// Statements executed so far, including ones from rolled back transactions
    pub fn journal(&self) -> Vec<StoreOp> {
        self.shared
            .journal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn clear_journal(&self) {
        self.shared
            .journal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Committed join-table rows, ordered by key
    pub async fn relation_rows(&self) -> Vec<RelationRow> {
        let tables = self.tables.lock().await;
        tables
            .relations
            .iter()
            .map(|(&(banner_id, slider_id), &position)| RelationRow {
                banner_id,
                slider_id,
                position,
            })
            .collect()
    }

    /// Number of committed banner rows
    pub async fn banner_count(&self) -> usize {
        self.tables.lock().await.banners.len()
    }
}

#[async_trait]
impl BannerStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx {
            guard,
            working,
            shared: Arc::clone(&self.shared),
        })
    }
}

/// Open memory transaction. Holds the store lock until dropped.
pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    shared: Arc<Shared>,
}

impl MemoryTx {
    fn require_banner(&self, id: BannerId) -> Result<&BannerRow> {
        self.working
            .banners
            .get(&id)
            .ok_or_else(|| BannerError::not_found(id))
    }

    fn relation_keys(&self, id: BannerId) -> impl Iterator<Item = (SliderId, i32)> + '_ {
        self.working
            .relations
            .range((id, SliderId::MIN)..=(id, SliderId::MAX))
            .map(|(&(_, slider), &position)| (slider, position))
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_banner(&mut self, row: &BannerRow) -> Result<BannerId> {
        self.shared.record(StoreOp::InsertBanner);
        self.shared.check(FaultPoint::InsertBanner, "insert_banner")?;

        self.working.last_id += 1;
        let id = BannerId::new(self.working.last_id);
        self.working.banners.insert(id, row.clone());
        Ok(id)
    }

    async fn update_banner(&mut self, id: BannerId, row: &BannerRow) -> Result<Timestamps> {
        self.shared.record(StoreOp::UpdateBanner(id));
        self.shared.check(FaultPoint::UpdateBanner, "update_banner")?;

        let stored = self
            .working
            .banners
            .get_mut(&id)
            .ok_or_else(|| BannerError::not_found(id))?;
        let created_at = stored.created_at;
        *stored = BannerRow {
            created_at,
            updated_at: row.updated_at.max(created_at),
            ..row.clone()
        };
        Ok(Timestamps {
            created_at,
            updated_at: stored.updated_at,
        })
    }

    async fn lock_banner(&mut self, id: BannerId) -> Result<()> {
        self.shared.record(StoreOp::LockBanner(id));
        self.require_banner(id).map(|_| ())
    }

    async fn fetch_banner(&mut self, id: BannerId) -> Result<Option<StoredBanner>> {
        self.shared.record(StoreOp::FetchBanner(id));
        Ok(self
            .working
            .banners
            .get(&id)
            .map(|row| StoredBanner { id, row: row.clone() }))
    }

    async fn banner_name(&mut self, id: BannerId) -> Result<Option<String>> {
        self.shared.record(StoreOp::BannerName(id));
        Ok(self.working.banners.get(&id).map(|row| row.name.clone()))
    }

    async fn delete_banner(&mut self, id: BannerId) -> Result<bool> {
        self.shared.record(StoreOp::DeleteBanner(id));
        let removed = self.working.banners.remove(&id).is_some();
        self.working.relations.retain(|(banner, _), _| *banner != id);
        Ok(removed)
    }

    async fn slider_positions(&mut self, id: BannerId) -> Result<BTreeMap<SliderId, i32>> {
        self.shared.record(StoreOp::SliderPositions(id));
        Ok(self.relation_keys(id).collect())
    }

    async fn slider_ids(&mut self, id: BannerId) -> Result<BTreeSet<SliderId>> {
        self.shared.record(StoreOp::SliderIds(id));
        Ok(self.relation_keys(id).map(|(slider, _)| slider).collect())
    }

    async fn delete_relations(
        &mut self,
        id: BannerId,
        sliders: &BTreeSet<SliderId>,
    ) -> Result<u64> {
        self.shared.record(StoreOp::DeleteRelations {
            banner_id: id,
            sliders: sliders.clone(),
        });
        self.shared.check(FaultPoint::DeleteRelations, "delete_relations")?;

        let removed = sliders
            .iter()
            .filter(|slider| self.working.relations.remove(&(id, **slider)).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn insert_relations(&mut self, rows: &[RelationRow]) -> Result<u64> {
        self.shared.record(StoreOp::InsertRelations(rows.to_vec()));
        self.shared.check(FaultPoint::InsertRelations, "insert_relations")?;

        // Validate the whole batch before applying any of it.
        let mut batch = HashSet::with_capacity(rows.len());
        for row in rows {
            if !self.working.banners.contains_key(&row.banner_id) {
                return Err(BannerError::storage(
                    "insert_relations",
                    format!("foreign key violation: banner {} does not exist", row.banner_id),
                ));
            }
            let key = (row.banner_id, row.slider_id);
            if self.working.relations.contains_key(&key) || !batch.insert(key) {
                return Err(BannerError::storage(
                    "insert_relations",
                    format!(
                        "duplicate key (banner_id, slider_id) = ({}, {})",
                        row.banner_id, row.slider_id
                    ),
                ));
            }
        }

        for row in rows {
            self.working
                .relations
                .insert((row.banner_id, row.slider_id), row.position);
        }
        Ok(rows.len() as u64)
    }

    async fn commit(self) -> Result<()> {
        self.shared.record(StoreOp::Commit);
        self.shared.check(FaultPoint::Commit, "commit")?;

        let Self {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }
}
