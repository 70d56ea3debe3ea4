//! bannerctl-store: PostgreSQL persistence for banners
//!
//! # Design Principles
//!
//! - Pooled connections with an explicit limit, no shared connection handles
//! - One statement per join-table delete; inserts batched up to the bind limit
//! - Rely on the composite primary key; never check-then-insert
//! - Banner row lock (`FOR UPDATE`) serializes reconciliation per banner

pub mod migrations;
pub mod pg;

pub use pg::{PgBannerStore, PgStoreTx, DEFAULT_MAX_CONNECTIONS};
pub use sqlx::PgPool;
