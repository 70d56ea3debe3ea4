use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use bannerctl_core::memory::StoreOp;
use bannerctl_core::{
    Banner, BannerEvent, BannerListener, BannerService, BannerStore, EventDispatcher,
    ListenerResult, MemoryStore, RelationRow, SaveMode, SliderId, SliderSelection, StoreTx,
    SystemClock, DEFAULT_POSITION,
};
use proptest::prelude::*;

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<BannerEvent>>,
}

impl BannerListener for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn handle(&self, event: &BannerEvent) -> ListenerResult {
        self.seen.lock().unwrap().push(event.clone());
        Ok(())
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn service() -> (BannerService<MemoryStore>, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let dispatcher = EventDispatcher::new().with_listener(recorder.clone());
    let service = BannerService::new(MemoryStore::new(), dispatcher, Arc::new(SystemClock));
    (service, recorder)
}

// Small id range so generated sets overlap often
fn arb_slider_set() -> impl Strategy<Value = BTreeSet<SliderId>> {
    prop::collection::btree_set(1i64..16, 0..8).prop_map(|ids| {
        ids.into_iter()
            .map(|id| SliderId::new(id).unwrap())
            .collect()
    })
}

fn inserted(journal: &[StoreOp]) -> BTreeSet<SliderId> {
    journal
        .iter()
        .filter_map(|op| match op {
            StoreOp::InsertRelations(rows) => Some(rows.iter().map(|r| r.slider_id)),
            _ => None,
        })
        .flatten()
        .collect()
}

fn deleted(journal: &[StoreOp]) -> BTreeSet<SliderId> {
    journal
        .iter()
        .filter_map(|op| match op {
            StoreOp::DeleteRelations { sliders, .. } => Some(sliders.iter().copied()),
            _ => None,
        })
        .flatten()
        .collect()
}

proptest! {
    /// Property: rows inserted are exactly D - P and rows deleted exactly P - D
    #[test]
    fn prop_reconcile_is_minimal(previous in arb_slider_set(), desired in arb_slider_set()) {
        runtime().block_on(async {
            let (service, recorder) = service();
            let mut banner = Banner::new("prop")
                .with_sliders(SliderSelection::ids(previous.iter().copied()));
            service.save(&mut banner, SaveMode::Create).await.unwrap();
            recorder.seen.lock().unwrap().clear();
            service.store().clear_journal();

            banner.desired_sliders = SliderSelection::ids(desired.iter().copied());
            let outcome = service.save(&mut banner, SaveMode::Update).await.unwrap();

            let journal = service.store().journal();
            let expect_insert: BTreeSet<_> = desired.difference(&previous).copied().collect();
            let expect_delete: BTreeSet<_> = previous.difference(&desired).copied().collect();
            prop_assert_eq!(&inserted(&journal), &expect_insert);
            prop_assert_eq!(&deleted(&journal), &expect_delete);

            // At most one statement of each kind
            prop_assert!(journal.iter().filter(|op| matches!(op, StoreOp::InsertRelations(_))).count() <= 1);
            let delete_count = journal.iter().filter(|op| matches!(op, StoreOp::DeleteRelations { .. })).count();
            prop_assert!(delete_count <= 1);

            // Event fires iff something changed, carrying the union by value
            let union: BTreeSet<_> = expect_insert.union(&expect_delete).copied().collect();
            let seen = recorder.seen.lock().unwrap().clone();
            if union.is_empty() {
                prop_assert!(outcome.event.is_none());
                prop_assert!(seen.is_empty());
                prop_assert!(!banner.changed());
            } else {
                prop_assert_eq!(seen.len(), 1);
                prop_assert_eq!(seen[0].slider_ids(), &union);
                prop_assert!(banner.changed());
                prop_assert_eq!(banner.affected_sliders(), &union);
            }

            let stored = service.slider_ids(banner.id().unwrap()).await.unwrap();
            prop_assert_eq!(stored, desired);
            Ok(())
        })?;
    }

    /// Property: reconciling to the persisted set performs no writes
    #[test]
    fn prop_reconcile_is_idempotent(desired in arb_slider_set()) {
        runtime().block_on(async {
            let (service, _) = service();
            let mut banner = Banner::new("prop")
                .with_sliders(SliderSelection::ids(desired.iter().copied()));
            service.save(&mut banner, SaveMode::Create).await.unwrap();
            service.store().clear_journal();

            let outcome = service.save(&mut banner, SaveMode::Update).await.unwrap();

            prop_assert!(outcome.event.is_none());
            prop_assert!(!banner.changed());
            prop_assert!(!service.store().journal().iter().any(StoreOp::writes_relations));
            Ok(())
        })?;
    }

    /// Property: no sequence of reconciliations leaves duplicate keys or
    /// disturbs another banner's rows
    #[test]
    fn prop_sequences_keep_keys_unique(steps in prop::collection::vec(arb_slider_set(), 1..6)) {
        runtime().block_on(async {
            let (service, _) = service();
            let mut neighbour = Banner::new("neighbour")
                .with_sliders(SliderSelection::from_raw_ids([1, 2, 3]).unwrap());
            service.save(&mut neighbour, SaveMode::Create).await.unwrap();

            let mut banner = Banner::new("prop");
            service.save(&mut banner, SaveMode::Create).await.unwrap();

            for desired in &steps {
                banner.desired_sliders = SliderSelection::ids(desired.iter().copied());
                service.save(&mut banner, SaveMode::Update).await.unwrap();
            }

            let rows = service.store().relation_rows().await;
            let keys: BTreeSet<_> = rows.iter().map(|r| (r.banner_id, r.slider_id)).collect();
            prop_assert_eq!(keys.len(), rows.len());
            prop_assert!(rows.iter().all(|r| r.position == 1));

            let own = service.slider_ids(banner.id().unwrap()).await.unwrap();
            prop_assert_eq!(&own, steps.last().unwrap());
            let theirs = service.slider_ids(neighbour.id().unwrap()).await.unwrap();
            prop_assert_eq!(theirs.len(), 3);
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn unspecified_selection_issues_no_relation_statements() {
    let (service, recorder) = service();
    let mut banner = Banner::new("plain")
        .with_sliders(SliderSelection::from_raw_ids([5]).unwrap());
    service.save(&mut banner, SaveMode::Create).await.unwrap();
    service.store().clear_journal();

    banner.desired_sliders = SliderSelection::Unspecified;
    banner.url = Some("example.com".to_string());
    service.save(&mut banner, SaveMode::Update).await.unwrap();

    assert!(!service
        .store()
        .journal()
        .iter()
        .any(StoreOp::touches_relations));
    assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    assert_eq!(banner.url.as_deref(), Some("https://example.com"));
}

#[tokio::test]
async fn untouched_row_keeps_its_position() {
    let (service, _) = service();
    let mut banner = Banner::new("scenario");
    service.save(&mut banner, SaveMode::Create).await.unwrap();
    let banner_id = banner.id().unwrap();

    let ten = SliderId::new(10).unwrap();
    let eleven = SliderId::new(11).unwrap();
    let twelve = SliderId::new(12).unwrap();
    let mut tx = service.store().begin().await.unwrap();
    tx.insert_relations(&[
        RelationRow { banner_id, slider_id: ten, position: 3 },
        RelationRow { banner_id, slider_id: eleven, position: 7 },
    ])
    .await
    .unwrap();
    tx.commit().await.unwrap();
    service.store().clear_journal();

    banner.desired_sliders = SliderSelection::from_raw_ids([11, 12]).unwrap();
    service.save(&mut banner, SaveMode::Update).await.unwrap();

    assert!(!service.store().journal().iter().any(|op| match op {
        StoreOp::DeleteRelations { sliders, .. } => sliders.contains(&eleven),
        StoreOp::InsertRelations(rows) => rows.iter().any(|r| r.slider_id == eleven),
        _ => false,
    }));

    let positions = service.sliders_for_banner(banner_id).await.unwrap();
    assert_eq!(positions.len(), 2);
    assert_eq!(positions.get(&eleven), Some(&7));
    assert_eq!(positions.get(&twelve), Some(&DEFAULT_POSITION));
    assert!(!positions.contains_key(&ten));
}

#[tokio::test]
async fn repeated_ids_collapse_to_a_noop() {
    let (service, recorder) = service();
    let mut banner = Banner::new("dupes")
        .with_sliders(SliderSelection::from_raw_ids([11, 12]).unwrap());
    service.save(&mut banner, SaveMode::Create).await.unwrap();
    recorder.seen.lock().unwrap().clear();
    service.store().clear_journal();

    banner.desired_sliders = SliderSelection::from_raw_ids([12, 12, 11]).unwrap();
    let outcome = service.save(&mut banner, SaveMode::Update).await.unwrap();

    assert!(outcome.event.is_none());
    assert!(!banner.changed());
    assert!(!service
        .store()
        .journal()
        .iter()
        .any(StoreOp::writes_relations));
    assert!(recorder.seen.lock().unwrap().is_empty());
}
