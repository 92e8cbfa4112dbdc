//! The [`JobTracker`]: submission, status transitions and lookup of jobs.

use crate::auth::{AccessRequest, AuthDecision, AuthGate, OpenGate, RateLimitProfile, Rejection};
use crate::error::JobError;
use crate::job::{Job, JobId, JobStatus};
use atelier_core::{Clock, Timestamp};
use atelier_models::{Dispatcher, GenerationRequest, Invocation, Selection, StatusUpdate};
use atelier_persistence::{Store, StoreExt};
use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::watch;

/// Error message given to cancelled jobs.
pub const CANCELLED: &str = "cancelled";

/// Tuning for a [`JobTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Consecutive failed polls after which a job is marked failed.
    pub max_poll_failures: u32,
    /// Wait estimate contributed by each queued job when the provider gives none.
    pub wait_per_queued_job: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_poll_failures: 3,
            wait_per_queued_job: Duration::from_secs(5),
        }
    }
}

impl TrackerConfig {
    /// Sets the consecutive poll failure limit.
    #[must_use]
    pub fn with_max_poll_failures(mut self, max: u32) -> Self {
        self.max_poll_failures = max.max(1);
        self
    }

    /// Sets the per-queued-job wait estimate.
    #[must_use]
    pub fn with_wait_per_queued_job(mut self, wait: Duration) -> Self {
        self.wait_per_queued_job = wait;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Job slots
// ─────────────────────────────────────────────────────────────────────────────

/// Live state of one job.
///
/// The watch channel holds the authoritative snapshot; every transition runs
/// inside one `send_if_modified` call so readers never see a partial update.
struct JobSlot {
    state: watch::Sender<Job>,
    /// Resolved lazily for jobs loaded from storage.
    selection: Mutex<Option<Selection>>,
    poll_failures: AtomicU32,
}

impl JobSlot {
    fn new(job: Job, selection: Option<Selection>) -> Self {
        Self {
            state: watch::Sender::new(job),
            selection: Mutex::new(selection),
            poll_failures: AtomicU32::new(0),
        }
    }

    fn snapshot(&self) -> Job {
        self.state.borrow().clone()
    }
}

struct Inner {
    dispatcher: Arc<Dispatcher>,
    gate: Arc<dyn AuthGate>,
    jobs: RwLock<HashMap<JobId, Arc<JobSlot>>>,
    store: Option<Arc<dyn Store>>,
    clock: Clock,
    config: TrackerConfig,
}

impl Inner {
    fn slot(&self, job_id: &JobId) -> Result<Arc<JobSlot>, JobError> {
        self.jobs
            .read()
            .get(job_id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(job_id.clone()))
    }

    fn persist(&self, job: &Job) {
        if let Some(store) = &self.store
            && let Err(error) = store.save(job.id().as_str(), job)
        {
            tracing::warn!(job_id = %job.id(), %error, "failed to persist job");
        }
    }

    /// Applies `f` to the job atomically, persisting the new snapshot if it changed.
    fn transition(&self, slot: &JobSlot, f: impl FnOnce(&mut Job, Timestamp) -> bool) -> bool {
        let now = self.clock.now();
        slot.state.send_if_modified(|job| {
            let before = job.status();
            let changed = f(job, now);
            if changed {
                if before != job.status() {
                    tracing::debug!(
                        job_id = %job.id(),
                        from = %before,
                        to = %job.status(),
                        "job transition"
                    );
                }
                self.persist(job);
            }
            changed
        })
    }

    fn selection(&self, slot: &JobSlot) -> Result<Selection, JobError> {
        let mut cached = slot.selection.lock();
        if let Some(selection) = cached.as_ref() {
            return Ok(selection.clone());
        }
        let selection = {
            let job = slot.state.borrow();
            self.dispatcher
                .resume(job.backend(), job.model_id(), job.request_type())?
        };
        *cached = Some(selection.clone());
        Ok(selection)
    }

    fn queued_count(&self) -> usize {
        self.jobs
            .read()
            .values()
            .filter(|slot| slot.state.borrow().status() == JobStatus::Queued)
            .count()
    }

    async fn run_invocation(self: Arc<Self>, slot: Arc<JobSlot>, selection: Selection, request: GenerationRequest) {
        let job_id = slot.state.borrow().id().clone();
        match self.dispatcher.invoke(&selection, &request).await {
            Ok(Invocation::Immediate(result)) => {
                self.transition(&slot, |job, now| job.complete(result, now));
            }
            Ok(Invocation::Pending(handle)) => {
                let accepted = self.transition(&slot, |job, now| match job.status() {
                    JobStatus::Queued => job.start(Some(handle.clone()), now),
                    _ => job.attach_handle(handle.clone(), now),
                });
                if !accepted && slot.state.borrow().is_terminal() {
                    // Finished or cancelled while the provider was accepting it.
                    if let Err(error) = self.dispatcher.cancel(&selection, &handle).await {
                        tracing::debug!(job_id = %job_id, %error, "provider cancel after local cancel failed");
                    }
                }
            }
            Err(error) => {
                tracing::warn!(job_id = %job_id, backend = selection.backend(), %error, "invocation failed");
                self.transition(&slot, |job, now| job.fail(error.to_string(), now));
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tracker
// ─────────────────────────────────────────────────────────────────────────────

/// Tracks generation jobs from submission to a terminal state.
///
/// Cloning is cheap and shares all state. [`submit`](Self::submit) returns as
/// soon as the job is queued; the provider call runs on the Tokio runtime.
/// Jobs advance through [`poll`](Self::poll) for pending providers, through
/// [`ingest`](Self::ingest) for providers that push updates, or are ended by
/// [`cancel`](Self::cancel).
///
/// # Example
///
/// ```no_run
/// # async fn demo(dispatcher: std::sync::Arc<atelier_models::Dispatcher>) -> Result<(), atelier_jobs::JobError> {
/// use atelier_jobs::JobTracker;
/// use atelier_models::GenerationRequest;
/// use core::time::Duration;
///
/// let tracker = JobTracker::builder(dispatcher).build();
/// let job_id = tracker.submit(GenerationRequest::speech("Hello"), None)?;
/// let job = tracker.wait(&job_id, Duration::from_secs(30)).await?;
/// println!("{} -> {:?}", job.status(), job.result());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct JobTracker {
    inner: Arc<Inner>,
}

impl core::fmt::Debug for JobTracker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JobTracker")
            .field("jobs", &self.inner.jobs.read().len())
            .field("persistent", &self.inner.store.is_some())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`JobTracker`].
pub struct JobTrackerBuilder {
    dispatcher: Arc<Dispatcher>,
    gate: Arc<dyn AuthGate>,
    store: Option<Arc<dyn Store>>,
    clock: Clock,
    config: TrackerConfig,
}

impl core::fmt::Debug for JobTrackerBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JobTrackerBuilder")
            .field("persistent", &self.store.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JobTrackerBuilder {
    /// Sets the gate consulted by [`JobTracker::submit_as`]. Defaults to [`OpenGate`].
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<dyn AuthGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Writes every job snapshot through to `store`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the clock used for timestamps and staleness.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the tuning.
    #[must_use]
    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the tracker.
    #[must_use]
    pub fn build(self) -> JobTracker {
        JobTracker {
            inner: Arc::new(Inner {
                dispatcher: self.dispatcher,
                gate: self.gate,
                jobs: RwLock::new(HashMap::new()),
                store: self.store,
                clock: self.clock,
                config: self.config,
            }),
        }
    }
}

impl JobTracker {
    /// Starts building a tracker over `dispatcher`.
    #[must_use]
    pub fn builder(dispatcher: Arc<Dispatcher>) -> JobTrackerBuilder {
        JobTrackerBuilder {
            dispatcher,
            gate: Arc::new(OpenGate),
            store: None,
            clock: Clock::default(),
            config: TrackerConfig::default(),
        }
    }

    /// The dispatcher jobs are routed through.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.inner.dispatcher
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Submission
    // ─────────────────────────────────────────────────────────────────────────

    /// Validates `request`, selects a model and queues a job.
    ///
    /// With `model_id` the named model is used; otherwise the first enabled
    /// model with the request type's capability and a registered adapter.
    /// The provider is invoked on a spawned task and the job id is returned
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidRequest`] or [`JobError::Dispatch`]; no job
    /// is created in either case.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn submit(&self, request: GenerationRequest, model_id: Option<&str>) -> Result<JobId, JobError> {
        self.submit_for(request, model_id, None)
    }

    /// Asks the auth gate, then [`submit`](Self::submit)s on behalf of the caller.
    ///
    /// The route key is `generate/<request-type>` under
    /// [`RateLimitProfile::GENERATION`].
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Unauthorized`] or [`JobError::RateLimited`] when
    /// the gate refuses, plus every error of [`submit`](Self::submit). No job
    /// is created on error.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub async fn submit_as(
        &self,
        access: &AccessRequest,
        request: GenerationRequest,
        model_id: Option<&str>,
    ) -> Result<JobId, JobError> {
        let route_key = format!("generate/{}", request.request_type());
        let decision = self
            .inner
            .gate
            .check_and_authorize(access, &route_key, RateLimitProfile::GENERATION)
            .await;
        match decision {
            AuthDecision::Allowed { user_id } => self.submit_for(request, model_id, Some(user_id)),
            AuthDecision::Rejected(Rejection::Unauthorized { message }) => {
                tracing::debug!(route = %route_key, "submission unauthorized");
                Err(JobError::Unauthorized(message))
            }
            AuthDecision::Rejected(Rejection::RateLimited { retry_after }) => {
                tracing::debug!(route = %route_key, ?retry_after, "submission rate limited");
                Err(JobError::RateLimited { retry_after })
            }
        }
    }

    fn submit_for(&self, request: GenerationRequest, model_id: Option<&str>, owner: Option<String>) -> Result<JobId, JobError> {
        request.validate()?;
        let selection = self.inner.dispatcher.select(request.request_type(), model_id)?;

        let job = Job::new(
            request.clone(),
            selection.model().id.clone(),
            selection.backend(),
            owner,
            self.inner.clock.now(),
        );
        let job_id = job.id().clone();
        let slot = Arc::new(JobSlot::new(job, Some(selection.clone())));
        self.inner
            .jobs
            .write()
            .insert(job_id.clone(), Arc::clone(&slot));

        let queued = u32::try_from(self.inner.queued_count()).unwrap_or(u32::MAX);
        let wait = self.inner.config.wait_per_queued_job.saturating_mul(queued);
        self.inner
            .transition(&slot, |job, _| job.set_estimated_wait(wait));

        tracing::info!(
            job_id = %job_id,
            model = %selection.model().id,
            backend = selection.backend(),
            request_type = %request.request_type(),
            "job submitted"
        );
        tokio::spawn(Arc::clone(&self.inner).run_invocation(slot, selection, request));
        Ok(job_id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Status updates
    // ─────────────────────────────────────────────────────────────────────────

    /// Queries the provider once for a processing job and applies the answer.
    ///
    /// Terminal jobs, queued jobs and jobs without a provider handle are
    /// returned unchanged without contacting the provider. A failed poll
    /// leaves the job processing until `max_poll_failures` consecutive
    /// failures, at which point the job fails.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for unknown jobs, or
    /// [`JobError::ProviderTimeout`] if the provider does not answer within
    /// `timeout`; the job is left unchanged.
    pub async fn poll(&self, job_id: &JobId, timeout: Duration) -> Result<Job, JobError> {
        let slot = self.inner.slot(job_id)?;
        let (status, handle) = {
            let job = slot.state.borrow();
            (job.status(), job.handle().cloned())
        };
        let Some(handle) = handle.filter(|_| status == JobStatus::Processing) else {
            return Ok(slot.snapshot());
        };

        let outcome = match self.inner.selection(&slot) {
            Ok(selection) => {
                match tokio::time::timeout(timeout, self.inner.dispatcher.poll(&selection, &handle)).await {
                    Ok(outcome) => outcome.map_err(JobError::from),
                    Err(_) => {
                        tracing::warn!(job_id = %job_id, ?timeout, "provider poll timed out");
                        return Err(JobError::ProviderTimeout {
                            job_id: job_id.clone(),
                            timeout,
                        });
                    }
                }
            }
            Err(error) => Err(error),
        };

        match outcome {
            Ok(update) => {
                slot.poll_failures.store(0, Ordering::SeqCst);
                self.inner.transition(&slot, |job, now| job.apply(update, now));
            }
            Err(error) => {
                let failures = slot.poll_failures.fetch_add(1, Ordering::SeqCst) + 1;
                let limit = self.inner.config.max_poll_failures;
                if failures >= limit {
                    tracing::warn!(job_id = %job_id, failures, %error, "giving up on job after repeated poll failures");
                    let message = format!("polling failed {failures} times: {error}");
                    self.inner.transition(&slot, |job, now| job.fail(message, now));
                } else {
                    tracing::warn!(job_id = %job_id, failures, limit, %error, "poll failed");
                }
            }
        }
        Ok(slot.snapshot())
    }

    /// Applies a status update pushed by a provider (for example from a webhook).
    ///
    /// Follows the same transition rules as [`poll`](Self::poll): updates to
    /// terminal jobs are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for unknown jobs.
    pub fn ingest(&self, job_id: &JobId, update: StatusUpdate) -> Result<Job, JobError> {
        let slot = self.inner.slot(job_id)?;
        slot.poll_failures.store(0, Ordering::SeqCst);
        let changed = self.inner.transition(&slot, |job, now| job.apply(update, now));
        tracing::debug!(job_id = %job_id, changed, "ingested status update");
        Ok(slot.snapshot())
    }

    /// Cancels a job.
    ///
    /// The provider is told to stop on a best-effort basis, then the job is
    /// marked failed with [`CANCELLED`]. Terminal jobs are returned unchanged.
    /// Remote work may still finish; its result is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for unknown jobs.
    pub async fn cancel(&self, job_id: &JobId) -> Result<Job, JobError> {
        let slot = self.inner.slot(job_id)?;
        let (terminal, handle) = {
            let job = slot.state.borrow();
            (job.is_terminal(), job.handle().cloned())
        };
        if terminal {
            return Ok(slot.snapshot());
        }

        if let Some(handle) = handle {
            let notified = match self.inner.selection(&slot) {
                Ok(selection) => self
                    .inner
                    .dispatcher
                    .cancel(&selection, &handle)
                    .await
                    .map_err(JobError::from),
                Err(error) => Err(error),
            };
            if let Err(error) = notified {
                tracing::debug!(job_id = %job_id, %error, "provider was not notified of cancellation");
            }
        }

        if self.inner.transition(&slot, |job, now| job.fail(CANCELLED, now)) {
            tracing::info!(job_id = %job_id, "job cancelled");
        }
        Ok(slot.snapshot())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns a snapshot of a job.
    #[must_use]
    pub fn get(&self, job_id: &JobId) -> Option<Job> {
        self.inner.slot(job_id).ok().map(|slot| slot.snapshot())
    }

    /// Returns snapshots of every job, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .inner
            .jobs
            .read()
            .values()
            .map(|slot| slot.snapshot())
            .collect();
        jobs.sort_by(|a, b| a.created_at().cmp(&b.created_at()).then_with(|| a.id().cmp(b.id())));
        jobs
    }

    /// Number of tracked jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.jobs.read().len()
    }

    /// Returns `true` if no jobs are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribes to snapshots of a job. The receiver sees the latest
    /// snapshot immediately and is notified on every change.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for unknown jobs.
    pub fn subscribe(&self, job_id: &JobId) -> Result<watch::Receiver<Job>, JobError> {
        Ok(self.inner.slot(job_id)?.state.subscribe())
    }

    /// Waits until a job is terminal and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for unknown jobs, or
    /// [`JobError::WaitTimeout`] if the job is still running after `timeout`.
    pub async fn wait(&self, job_id: &JobId, timeout: Duration) -> Result<Job, JobError> {
        let mut receiver = self.subscribe(job_id)?;
        let finished = tokio::time::timeout(timeout, receiver.wait_for(Job::is_terminal))
            .await
            .map(|waited| waited.map(|job| job.clone()));
        match finished {
            Ok(Ok(job)) => Ok(job),
            Ok(Err(_)) => Ok(receiver.borrow().clone()),
            Err(_) => Err(JobError::WaitTimeout {
                job_id: job_id.clone(),
                timeout,
            }),
        }
    }

    /// Ids of processing jobs not updated for at least `older_than`.
    #[must_use]
    pub fn stale_jobs(&self, older_than: Duration) -> Vec<JobId> {
        let clock = &self.inner.clock;
        self.inner
            .jobs
            .read()
            .values()
            .filter_map(|slot| {
                let job = slot.state.borrow();
                (job.status() == JobStatus::Processing && clock.elapsed_since(job.updated_at()) >= older_than)
                    .then(|| job.id().clone())
            })
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    /// Loads persisted jobs that are not already tracked, returning how many
    /// were loaded.
    ///
    /// Records that break job invariants are skipped. Jobs persisted while
    /// still queued never reached their provider and are failed as
    /// interrupted.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Persistence`] if the store cannot be read.
    pub fn load(&self) -> Result<usize, JobError> {
        let Some(store) = &self.inner.store else {
            return Ok(0);
        };
        let records: Vec<Job> = store.load_all()?;

        let mut loaded = Vec::new();
        {
            let mut jobs = self.inner.jobs.write();
            for job in records {
                if let Err(reason) = job.check() {
                    tracing::warn!(job_id = %job.id(), %reason, "skipping inconsistent persisted job");
                    continue;
                }
                if jobs.contains_key(job.id()) {
                    continue;
                }
                let slot = Arc::new(JobSlot::new(job, None));
                jobs.insert(slot.state.borrow().id().clone(), Arc::clone(&slot));
                loaded.push(slot);
            }
        }

        for slot in &loaded {
            self.inner.transition(slot, |job, now| {
                job.status() == JobStatus::Queued && job.fail("interrupted before dispatch", now)
            });
        }
        tracing::info!(count = loaded.len(), "jobs loaded");
        Ok(loaded.len())
    }
}
