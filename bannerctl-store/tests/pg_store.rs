//! PostgreSQL integration tests
//!
//! Run with: DATABASE_URL=postgres://... cargo test -p bannerctl-store -- --ignored

use std::collections::BTreeSet;
use std::sync::Arc;

use bannerctl_core::{
    Banner, BannerError, BannerService, BannerStore, EventDispatcher, SaveMode, SliderId,
    SliderSelection, StoreTx, SystemClock,
};
use bannerctl_store::{migrations, PgBannerStore, DEFAULT_MAX_CONNECTIONS};

async fn service() -> BannerService<PgBannerStore> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let store = PgBannerStore::connect(&url, DEFAULT_MAX_CONNECTIONS)
        .await
        .expect("connect failed");
    migrations::run(store.pool()).await.expect("migrations failed");
    BannerService::new(
        store,
        EventDispatcher::new(),
        Arc::new(SystemClock),
    )
}

fn ids(raw: &[i64]) -> BTreeSet<SliderId> {
    raw.iter().map(|&id| SliderId::new(id).unwrap()).collect()
}

#[tokio::test]
#[ignore = "requires database"]
async fn migrations_are_idempotent() {
    let service = service().await;
    migrations::run(service.store().pool())
        .await
        .expect("second migration run failed");
}

#[tokio::test]
#[ignore = "requires database"]
async fn reconcile_swaps_changed_sliders() {
    let service = service().await;
    let mut banner = Banner::new("pg scenario")
        .with_url("example.com/x")
        .with_sliders(SliderSelection::ids(ids(&[10, 11])));
    service.save(&mut banner, SaveMode::Create).await.unwrap();
    assert_eq!(banner.url.as_deref(), Some("https://example.com/x"));
    assert_eq!(banner.created_at(), banner.updated_at());

    banner.desired_sliders = SliderSelection::ids(ids(&[11, 12]));
    let outcome = service.save(&mut banner, SaveMode::Update).await.unwrap();

    assert_eq!(outcome.event.unwrap().slider_ids(), &ids(&[10, 12]));
    let positions = service.sliders_for_banner(outcome.banner_id).await.unwrap();
    assert_eq!(positions.keys().copied().collect::<BTreeSet<_>>(), ids(&[11, 12]));
    assert!(positions.values().all(|&p| p == 1));
}

#[tokio::test]
#[ignore = "requires database"]
async fn failed_transaction_leaves_no_banner() {
    let service = service().await;
    let mut tx = service.store().begin().await.unwrap();
    let row = bannerctl_core::BannerRow {
        name: "rolled back".to_string(),
        url: None,
        image: None,
        enabled: true,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };
    let id = tx.insert_banner(&row).await.unwrap();
    let rows = [
        bannerctl_core::RelationRow {
            banner_id: id,
            slider_id: SliderId::new(1).unwrap(),
            position: 1,
        };
        2
    ];
    let err = tx.insert_relations(&rows).await.unwrap_err();
    assert!(err.is_storage());
    drop(tx);

    assert_eq!(service.banner_name(id).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires database"]
async fn concurrent_saves_of_one_banner_are_serialized() {
    let service = Arc::new(service().await);
    let mut banner = Banner::new("contended");
    service.save(&mut banner, SaveMode::Create).await.unwrap();

    let handles: Vec<_> = (0..8i64)
        .map(|i| {
            let service = Arc::clone(&service);
            let mut copy = banner.clone();
            copy.desired_sliders = SliderSelection::ids(ids(&[1 + i % 3, 4 + i % 2]));
            tokio::spawn(async move { service.save(&mut copy, SaveMode::Update).await })
        })
        .collect();

    for handle in handles {
        handle.await.expect("task panicked").expect("save failed");
    }

    let final_ids = service.slider_ids(banner.id().unwrap()).await.unwrap();
    assert_eq!(final_ids.len(), 2);
}

#[tokio::test]
#[ignore = "requires database"]
async fn delete_removes_banner_and_relations() {
    let service = service().await;
    let mut banner =
        Banner::new("short lived").with_sliders(SliderSelection::ids(ids(&[5, 6])));
    service.save(&mut banner, SaveMode::Create).await.unwrap();
    let id = banner.id().unwrap();

    let event = service.delete(id).await.unwrap().unwrap();

    assert_eq!(event.slider_ids(), &ids(&[5, 6]));
    assert!(service.slider_ids(id).await.unwrap().is_empty());
    assert!(matches!(
        service.load(id).await.unwrap_err(),
        BannerError::NotFound { .. }
    ));
}

#[tokio::test]
#[ignore = "requires database"]
async fn selection_larger_than_bind_limit_is_saved() {
    let service = service().await;
    let many = SliderSelection::from_raw_ids(1..=30_000).unwrap();
    let mut banner = Banner::new("wide").with_sliders(many);
    let outcome = service.save(&mut banner, SaveMode::Create).await.unwrap();

    let stored = service.slider_ids(outcome.banner_id).await.unwrap();
    assert_eq!(stored.len(), 30_000);
    assert_eq!(outcome.event.unwrap().slider_ids().len(), 30_000);
}
