//! Schema for banners and the banner/slider join table
//!
//! Statements are idempotent (`IF NOT EXISTS`) and safe to run on every start.

use sqlx::PgPool;

/// Create tables and indexes
pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running banner migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS banner (
            banner_id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
            name TEXT NOT NULL,
            url TEXT,
            image TEXT,
            enabled BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CHECK (updated_at >= created_at)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // slider_id references a table owned elsewhere, so only the banner side
    // carries a foreign key here.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS banner_slider_relation (
            banner_id BIGINT NOT NULL REFERENCES banner(banner_id) ON DELETE CASCADE,
            slider_id BIGINT NOT NULL CHECK (slider_id > 0),
            position INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (banner_id, slider_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_banner_slider_relation_slider ON banner_slider_relation(slider_id)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Banner migrations complete");
    Ok(())
}
