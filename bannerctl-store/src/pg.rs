//! PostgreSQL implementation of the banner store
//!
//! Every method runs on the open transaction; nothing is visible to other
//! connections until `commit`. Dropping a `PgStoreTx` rolls back.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use bannerctl_core::{
    BannerError, BannerId, BannerRow, BannerStore, RelationRow, Result, SliderId, StoreTx,
    StoredBanner, Timestamps,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};

/// Pool size when none is configured; each save holds one connection until commit.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const RELATION_BINDS_PER_ROW: usize = 3;

/// Rows per INSERT so one statement stays under the protocol's 65535 bind limit
const RELATION_INSERT_CHUNK: usize = u16::MAX as usize / RELATION_BINDS_PER_ROW;

fn storage(operation: &'static str) -> impl FnOnce(sqlx::Error) -> BannerError {
    move |err| BannerError::storage(operation, err)
}

fn slider_from_db(operation: &'static str, raw: i64) -> Result<SliderId> {
    SliderId::new(raw).map_err(|_| {
        BannerError::storage(operation, format!("invalid slider_id {raw} in store"))
    })
}

/// Banner row as selected from the database
#[derive(Debug, Clone, FromRow)]
struct BannerRecord {
    banner_id: i64,
    name: String,
    url: Option<String>,
    image: Option<String>,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BannerRecord> for StoredBanner {
    fn from(record: BannerRecord) -> Self {
        StoredBanner {
            id: BannerId::new(record.banner_id),
            row: BannerRow {
                name: record.name,
                url: record.url,
                image: record.image,
                enabled: record.enabled,
                created_at: record.created_at,
                updated_at: record.updated_at,
            },
        }
    }
}

/// Banner store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgBannerStore {
    pool: PgPool,
}

impl PgBannerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool of at most `max_connections` (minimum one) and wrap it.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        tracing::debug!(max_connections, "Connecting to PostgreSQL");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .map_err(storage("connect"))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BannerStore for PgBannerStore {
    type Tx = PgStoreTx;

    async fn begin(&self) -> Result<PgStoreTx> {
        let tx = self.pool.begin().await.map_err(storage("begin"))?;
        Ok(PgStoreTx { tx })
    }
}

/// Open PostgreSQL transaction
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn insert_banner(&mut self, row: &BannerRow) -> Result<BannerId> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO banner (name, url, image, enabled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING banner_id
            "#,
        )
        .bind(&row.name)
        .bind(row.url.as_deref())
        .bind(row.image.as_deref())
        .bind(row.enabled)
        .bind(row.created_at)
        .bind(row.updated_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(storage("insert_banner"))?;

        tracing::debug!(banner_id = id, "Inserted banner");
        Ok(BannerId::new(id))
    }

    async fn update_banner(&mut self, id: BannerId, row: &BannerRow) -> Result<Timestamps> {
        let stamps: Option<(DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            UPDATE banner
            SET name = $2,
                url = $3,
                image = $4,
                enabled = $5,
                updated_at = GREATEST($6, created_at)
            WHERE banner_id = $1
            RETURNING created_at, updated_at
            "#,
        )
        .bind(id.get())
        .bind(&row.name)
        .bind(row.url.as_deref())
        .bind(row.image.as_deref())
        .bind(row.enabled)
        .bind(row.updated_at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage("update_banner"))?;

        let (created_at, updated_at) = stamps.ok_or_else(|| BannerError::not_found(id))?;
        Ok(Timestamps {
            created_at,
            updated_at,
        })
    }

    async fn lock_banner(&mut self, id: BannerId) -> Result<()> {
        let locked: Option<i64> =
            sqlx::query_scalar("SELECT banner_id FROM banner WHERE banner_id = $1 FOR UPDATE")
                .bind(id.get())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(storage("lock_banner"))?;

        locked.map(|_| ()).ok_or_else(|| BannerError::not_found(id))
    }

    async fn fetch_banner(&mut self, id: BannerId) -> Result<Option<StoredBanner>> {
        let record: Option<BannerRecord> = sqlx::query_as(
            r#"
            SELECT banner_id, name, url, image, enabled, created_at, updated_at
            FROM banner
            WHERE banner_id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage("fetch_banner"))?;

        Ok(record.map(StoredBanner::from))
    }

    async fn banner_name(&mut self, id: BannerId) -> Result<Option<String>> {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM banner WHERE banner_id = $1")
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage("banner_name"))?;

        Ok(name)
    }

    async fn delete_banner(&mut self, id: BannerId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM banner WHERE banner_id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await
            .map_err(storage("delete_banner"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn slider_positions(&mut self, id: BannerId) -> Result<BTreeMap<SliderId, i32>> {
        let rows: Vec<(i64, i32)> = sqlx::query_as(
            "SELECT slider_id, position FROM banner_slider_relation WHERE banner_id = $1",
        )
        .bind(id.get())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage("slider_positions"))?;

        rows.into_iter()
            .map(|(slider, position)| {
                slider_from_db("slider_positions", slider).map(|slider| (slider, position))
            })
            .collect()
    }

    async fn slider_ids(&mut self, id: BannerId) -> Result<BTreeSet<SliderId>> {
        let rows: Vec<i64> =
            sqlx::query_scalar("SELECT slider_id FROM banner_slider_relation WHERE banner_id = $1")
                .bind(id.get())
                .fetch_all(&mut *self.tx)
                .await
                .map_err(storage("slider_ids"))?;

        rows.into_iter()
            .map(|slider| slider_from_db("slider_ids", slider))
            .collect()
    }

    async fn delete_relations(
        &mut self,
        id: BannerId,
        sliders: &BTreeSet<SliderId>,
    ) -> Result<u64> {
        if sliders.is_empty() {
            return Ok(0);
        }
        let raw: Vec<i64> = sliders.iter().map(|s| s.get()).collect();

        let result = sqlx::query(
            "DELETE FROM banner_slider_relation WHERE banner_id = $1 AND slider_id = ANY($2)",
        )
        .bind(id.get())
        .bind(&raw)
        .execute(&mut *self.tx)
        .await
        .map_err(storage("delete_relations"))?;

        tracing::debug!(banner_id = %id, deleted = result.rows_affected(), "Deleted relations");
        Ok(result.rows_affected())
    }

    async fn insert_relations(&mut self, rows: &[RelationRow]) -> Result<u64> {
        let mut inserted = 0;
        for chunk in rows.chunks(RELATION_INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO banner_slider_relation (banner_id, slider_id, position) ",
            );
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(row.banner_id.get())
                    .push_bind(row.slider_id.get())
                    .push_bind(row.position);
            });

            let result = builder
                .build()
                .execute(&mut *self.tx)
                .await
                .map_err(storage("insert_relations"))?;
            inserted += result.rows_affected();
        }

        tracing::debug!(inserted, "Inserted relations");
        Ok(inserted)
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(storage("commit"))
    }
}
