//! The background synchronization task.

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::source::CatalogSource;
use atelier_core::{Clock, Timestamp};
use atelier_jobs::{JobStatus, JobTracker};
use atelier_models::{ModelDefinition, ModelRegistry};
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Snapshot of the scheduler's health.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// Whether the background task is alive.
    pub running: bool,
    /// Rounds completed so far.
    pub rounds: u64,
    /// When the catalog was last refreshed successfully.
    pub last_success: Option<Timestamp>,
    /// Rounds in a row that kept the stale catalog.
    pub consecutive_failures: u32,
    /// The most recent catalog failure.
    pub last_error: Option<String>,
}

/// What one round did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundReport {
    /// Models installed, if the catalog was refreshed.
    pub refreshed_models: Option<usize>,
    /// Sources that failed after all retries.
    pub failed_sources: Vec<String>,
    /// Why the registry refused the merged snapshot, if it did.
    pub rejected: Option<String>,
    /// Stale jobs polled.
    pub polled_jobs: usize,
    /// Polled jobs that reached a terminal state.
    pub finished_jobs: usize,
}

impl RoundReport {
    /// Returns `true` if the catalog step succeeded or had nothing to do.
    #[must_use]
    pub fn catalog_ok(&self) -> bool {
        self.failed_sources.is_empty() && self.rejected.is_none()
    }
}

/// Refreshes the model registry from [`CatalogSource`]s and polls stale jobs.
///
/// The scheduler only goes through [`ModelRegistry::refresh`] and
/// [`JobTracker::poll`], so it can be stopped and restarted at any time
/// without affecting the rest of the system. When any source fails the
/// existing catalog stays in place.
pub struct SyncScheduler {
    registry: Arc<ModelRegistry>,
    tracker: Option<JobTracker>,
    sources: Vec<Arc<dyn CatalogSource>>,
    config: SyncConfig,
    clock: Clock,
    status: Arc<Mutex<SyncStatus>>,
}

impl core::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("sources", &self.sources.iter().map(|s| s.name().to_string()).collect::<Vec<_>>())
            .field("polls_jobs", &self.tracker.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SyncScheduler {
    /// Creates a scheduler for `registry` with no sources.
    #[must_use]
    pub fn new(registry: Arc<ModelRegistry>, config: SyncConfig) -> Self {
        Self {
            registry,
            tracker: None,
            sources: Vec::new(),
            config,
            clock: Clock::default(),
            status: Arc::new(Mutex::new(SyncStatus::default())),
        }
    }

    /// Adds a catalog source. Sources are merged in the order added; a later
    /// source's model replaces an earlier one with the same id.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn CatalogSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Polls stale processing jobs of `tracker` each round.
    #[must_use]
    pub fn with_tracker(mut self, tracker: JobTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Sets the clock used for status timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.status.lock().clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rounds
    // ─────────────────────────────────────────────────────────────────────────

    async fn fetch_with_retry(&self, source: &dyn CatalogSource) -> Result<Vec<ModelDefinition>, SyncError> {
        let mut attempt = 0;
        loop {
            match source.fetch().await {
                Ok(models) => {
                    tracing::debug!(source = source.name(), models = models.len(), "fetched catalog source");
                    return Ok(models);
                }
                Err(error) if attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        source = source.name(),
                        attempt,
                        max_retries = self.config.max_retries,
                        %error,
                        "catalog fetch failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn merge(batches: Vec<Vec<ModelDefinition>>) -> Vec<ModelDefinition> {
        let mut merged: Vec<ModelDefinition> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for model in batches.into_iter().flatten() {
            match positions.get(&model.id) {
                Some(&index) => {
                    tracing::debug!(model = %model.id, "later catalog source overrides model");
                    merged[index] = model;
                }
                None => {
                    positions.insert(model.id.clone(), merged.len());
                    merged.push(model);
                }
            }
        }
        merged
    }

    async fn refresh_catalog(&self, report: &mut RoundReport) {
        if self.sources.is_empty() {
            return;
        }
        let results = join_all(self.sources.iter().map(|source| self.fetch_with_retry(source.as_ref()))).await;

        let mut batches = Vec::with_capacity(results.len());
        for (source, result) in self.sources.iter().zip(results) {
            match result {
                Ok(models) => batches.push(models),
                Err(error) => {
                    tracing::warn!(source = source.name(), %error, "catalog source failed, keeping current catalog");
                    report.failed_sources.push(source.name().to_string());
                }
            }
        }
        if !report.failed_sources.is_empty() {
            return;
        }

        let merged = Self::merge(batches);
        let count = merged.len();
        match self.registry.refresh(merged) {
            Ok(()) => report.refreshed_models = Some(count),
            Err(error) => report.rejected = Some(error.to_string()),
        }
    }

    async fn poll_stale_jobs(&self, report: &mut RoundReport) {
        let Some(tracker) = &self.tracker else {
            return;
        };
        let stale = tracker.stale_jobs(self.config.stale_after);
        report.polled_jobs = stale.len();

        let polls = stale
            .iter()
            .map(|job_id| tracker.poll(job_id, self.config.poll_timeout));
        for (job_id, outcome) in stale.iter().zip(join_all(polls).await) {
            match outcome {
                Ok(job) if job.status() != JobStatus::Processing => report.finished_jobs += 1,
                Ok(_) => {}
                Err(error) => tracing::debug!(job_id = %job_id, %error, "stale job poll failed"),
            }
        }
    }

    /// Runs one round: refresh the catalog, then poll stale jobs.
    pub async fn run_round(&self) -> RoundReport {
        let mut report = RoundReport::default();
        self.refresh_catalog(&mut report).await;
        self.poll_stale_jobs(&mut report).await;

        let mut status = self.status.lock();
        status.rounds += 1;
        if report.catalog_ok() {
            if report.refreshed_models.is_some() {
                status.last_success = Some(self.clock.now());
            }
            status.consecutive_failures = 0;
        } else {
            status.consecutive_failures += 1;
            status.last_error = Some(match &report.rejected {
                Some(reason) => reason.clone(),
                None => format!("sources failed: {}", report.failed_sources.join(", ")),
            });
        }
        tracing::info!(
            round = status.rounds,
            refreshed = ?report.refreshed_models,
            failed_sources = report.failed_sources.len(),
            polled_jobs = report.polled_jobs,
            "sync round finished"
        );
        drop(status);
        report
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Background task
    // ─────────────────────────────────────────────────────────────────────────

    /// Starts the scheduler on the Tokio runtime.
    ///
    /// The first round runs after `initial_delay`, later rounds after
    /// [`SyncConfig::next_interval`]. Dropping the returned handle stops the
    /// task once any running round finishes.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(self) -> SyncHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (trigger_tx, trigger_rx) = mpsc::channel(8);
        let status = Arc::clone(&self.status);
        status.lock().running = true;
        tracing::info!(sources = self.sources.len(), "sync task started");

        let task = tokio::spawn(self.run(stop_rx, trigger_rx));
        SyncHandle {
            stop: stop_tx,
            trigger: trigger_tx,
            status,
            task,
        }
    }

    async fn run(self, mut stop: watch::Receiver<bool>, mut trigger: mpsc::Receiver<oneshot::Sender<RoundReport>>) {
        let mut delay = self.config.initial_delay;
        loop {
            let reply = tokio::select! {
                biased;
                _ = stop.changed() => break,
                request = trigger.recv() => match request {
                    Some(reply) => Some(reply),
                    None => break,
                },
                () = tokio::time::sleep(delay) => None,
            };

            let report = self.run_round().await;
            if let Some(reply) = reply {
                reply.send(report).ok();
            }
            delay = self.config.next_interval();
            tracing::debug!(?delay, "next sync round scheduled");
        }
        self.status.lock().running = false;
        tracing::info!("sync task stopped");
    }
}

/// Control handle for a spawned [`SyncScheduler`].
#[derive(Debug)]
pub struct SyncHandle {
    stop: watch::Sender<bool>,
    trigger: mpsc::Sender<oneshot::Sender<RoundReport>>,
    status: Arc<Mutex<SyncStatus>>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Asks the task to stop after any running round.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Stops the task and waits for it to exit.
    pub async fn shutdown(self) {
        self.stop();
        if let Err(error) = self.task.await {
            tracing::warn!(%error, "sync task ended abnormally");
        }
    }

    /// Runs a round now and returns its report.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Stopped`] if the task is no longer running.
    pub async fn sync_now(&self) -> Result<RoundReport, SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.trigger
            .send(reply_tx)
            .await
            .map_err(|_| SyncError::Stopped)?;
        reply_rx.await.map_err(|_| SyncError::Stopped)
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.status.lock().clone()
    }

    /// Returns `true` while the task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
