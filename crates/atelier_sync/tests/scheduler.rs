//! Sync rounds against scripted catalog sources and jobs.

use async_trait::async_trait;
use atelier_core::{Clock, MockClock};
use atelier_jobs::{JobStatus, JobTracker};
use atelier_models::testing::MockAdapter;
use atelier_models::{
    Dispatcher, GenerationRequest, GenerationResult, ModelDefinition, ModelKind, ModelProvider,
    ModelRegistry, StatusUpdate, default_catalog,
};
use atelier_sync::{CatalogSource, StaticSource, SyncConfig, SyncError, SyncScheduler};
use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;
use std::sync::Arc;

/// Fails the first `failures` fetches, then serves `models`.
struct FlakySource {
    failures: u32,
    calls: AtomicU32,
    models: Vec<ModelDefinition>,
}

impl FlakySource {
    fn new(failures: u32, models: Vec<ModelDefinition>) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
            models,
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for FlakySource {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn fetch(&self) -> Result<Vec<ModelDefinition>, SyncError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(SyncError::fetch("flaky", "HTTP 503: Service Unavailable"))
        } else {
            Ok(self.models.clone())
        }
    }
}

fn model(id: &str) -> ModelDefinition {
    ModelDefinition::new(id, id, ModelKind::Image, ModelProvider::Local).with_capability("txt2img")
}

fn fast_config() -> SyncConfig {
    SyncConfig::default()
        .with_retry_delay(Duration::ZERO)
        .with_max_retries(2)
}

fn seeded_registry() -> Arc<ModelRegistry> {
    Arc::new(ModelRegistry::seeded(default_catalog()).unwrap())
}

#[tokio::test]
async fn round_installs_merged_snapshot() {
    let registry = seeded_registry();
    let scheduler = SyncScheduler::new(registry.clone(), fast_config())
        .with_source(Arc::new(StaticSource::new("image", vec![model("a"), model("b")])))
        .with_source(Arc::new(StaticSource::new(
            "override",
            vec![model("b").with_tag("updated"), model("c")],
        )));

    let report = scheduler.run_round().await;

    assert!(report.catalog_ok());
    assert_eq!(report.refreshed_models, Some(3));
    let ids: Vec<_> = registry.list().into_iter().map(|m| m.id).collect();
    assert_eq!(ids, ["a", "b", "c"]);
    assert_eq!(registry.get("b").unwrap().tags, ["updated"]);
    assert!(scheduler.status().last_success.is_some());
}

#[tokio::test]
async fn failed_source_keeps_existing_catalog() {
    let registry = seeded_registry();
    let before = registry.snapshot();
    let flaky = Arc::new(FlakySource::new(u32::MAX, vec![model("never")]));
    let scheduler = SyncScheduler::new(registry.clone(), fast_config())
        .with_source(Arc::new(StaticSource::new("ok", vec![model("fresh")])))
        .with_source(flaky.clone());

    let report = scheduler.run_round().await;

    assert!(!report.catalog_ok());
    assert_eq!(report.failed_sources, ["flaky"]);
    assert_eq!(report.refreshed_models, None);
    assert_eq!(flaky.calls(), 3);
    assert!(Arc::ptr_eq(&before, &registry.snapshot()));

    let status = scheduler.status();
    assert_eq!(status.consecutive_failures, 1);
    assert!(status.last_error.unwrap().contains("flaky"));
}

#[tokio::test]
async fn source_recovering_within_retries_refreshes() {
    let registry = seeded_registry();
    let flaky = Arc::new(FlakySource::new(2, vec![model("late")]));
    let scheduler = SyncScheduler::new(registry.clone(), fast_config()).with_source(flaky.clone());

    let report = scheduler.run_round().await;

    assert!(report.catalog_ok());
    assert_eq!(flaky.calls(), 3);
    assert!(registry.contains("late"));
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn duplicate_ids_in_one_source_are_rejected() {
    let registry = seeded_registry();
    let before = registry.len();
    let scheduler = SyncScheduler::new(registry.clone(), fast_config())
        .with_source(Arc::new(StaticSource::new("dupes", vec![model("x"), model("x")])));

    let report = scheduler.run_round().await;

    assert!(report.rejected.is_some());
    assert_eq!(registry.len(), before);
    assert_eq!(scheduler.status().consecutive_failures, 1);
}

#[tokio::test]
async fn round_polls_stale_jobs() {
    let mock = Arc::new(MockClock::starting_now());
    let clock = Clock::with_provider(mock.clone());
    let registry = seeded_registry();
    let adapter = Arc::new(MockAdapter::pending("w").with_updates([StatusUpdate::Completed(
        GenerationResult::VideoGen {
            video_url: "v.mp4".into(),
            thumbnail_url: None,
        },
    )]));
    let mut dispatcher = Dispatcher::new(registry.clone());
    dispatcher.register_adapter("runway-gen2", adapter.clone());
    let tracker = JobTracker::builder(Arc::new(dispatcher))
        .with_clock(clock.clone())
        .build();

    let job_id = tracker
        .submit(GenerationRequest::video("comet"), Some("runway-gen2"))
        .unwrap();
    let mut receiver = tracker.subscribe(&job_id).unwrap();
    receiver
        .wait_for(|job| job.status() == JobStatus::Processing)
        .await
        .unwrap();
    drop(receiver);

    let scheduler = SyncScheduler::new(registry, fast_config()).with_tracker(tracker.clone());

    let report = scheduler.run_round().await;
    assert_eq!(report.polled_jobs, 0);
    assert_eq!(adapter.polls(), 0);

    mock.advance(Duration::from_secs(31));
    let report = scheduler.run_round().await;
    assert_eq!(report.polled_jobs, 1);
    assert_eq!(report.finished_jobs, 1);
    assert_eq!(tracker.get(&job_id).unwrap().status(), JobStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn spawned_task_runs_after_initial_delay() {
    let registry = seeded_registry();
    let handle = SyncScheduler::new(
        registry.clone(),
        fast_config()
            .with_initial_delay(Duration::from_secs(2))
            .with_interval(Duration::from_secs(3600)),
    )
    .with_source(Arc::new(StaticSource::new("one", vec![model("only")])))
    .spawn();

    assert!(handle.status().running);
    assert_eq!(handle.status().rounds, 0);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(handle.status().rounds, 1);
    assert!(registry.contains("only"));

    let report = handle.sync_now().await.unwrap();
    assert!(report.catalog_ok());
    assert_eq!(handle.status().rounds, 2);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stopped_task_rejects_sync_now() {
    let handle = SyncScheduler::new(seeded_registry(), fast_config()).spawn();
    handle.stop();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(!handle.is_running());
    assert!(!handle.status().running);
    assert!(matches!(handle.sync_now().await, Err(SyncError::Stopped)));
}
