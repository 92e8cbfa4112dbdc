//! The [`Job`] record and its state machine.

use atelier_core::{Timestamp, define_id};
use atelier_models::{GenerationRequest, GenerationResult, PendingHandle, RequestType, StatusUpdate};
use atelier_persistence::Storable;
use core::time::Duration;
use serde::{Deserialize, Serialize};

define_id! {
    /// Identifier of a [`Job`].
    pub struct JobId("job");
}

/// Lifecycle state of a [`Job`].
///
/// Transitions only move forward: `Queued → Processing → Completed | Failed`,
/// or straight from `Queued` to a terminal state for synchronous providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, not yet running on a provider.
    Queued,
    /// Running on a provider.
    Processing,
    /// Finished with a result.
    Completed,
    /// Finished with an error.
    Failed,
}

impl JobStatus {
    /// Returns `true` for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns `true` if `next` is a legal successor of `self`.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Processing | Self::Completed | Self::Failed)
                | (Self::Processing, Self::Completed | Self::Failed)
        )
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generation request tracked to a terminal outcome.
///
/// Fields are read through accessors; only the tracker moves a job between
/// states, so a `Job` value always satisfies:
///
/// - `Completed` has a result matching the request type and no error
/// - `Failed` has an error and no result
/// - `Queued` and `Processing` have neither
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    id: JobId,
    request_type: RequestType,
    status: JobStatus,
    request: GenerationRequest,
    model_id: String,
    backend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<GenerationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    estimated_wait_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    handle: Option<PendingHandle>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl Storable for Job {
    fn collection() -> &'static str {
        "jobs"
    }
}

impl Job {
    pub(crate) fn new(
        request: GenerationRequest,
        model_id: impl Into<String>,
        backend: impl Into<String>,
        owner: Option<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: JobId::generate(),
            request_type: request.request_type(),
            status: JobStatus::Queued,
            request,
            model_id: model_id.into(),
            backend: backend.into(),
            owner,
            result: None,
            error: None,
            estimated_wait_ms: None,
            progress: None,
            handle: None,
            created_at: now,
            updated_at: now,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Unique identifier.
    #[must_use]
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// The request type.
    #[must_use]
    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    /// Current state.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Returns `true` once the job has completed or failed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The submitted payload.
    #[must_use]
    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    /// Model serving the job.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Adapter backend serving the job.
    #[must_use]
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// The user who submitted the job through an auth gate.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// The result, present only when completed.
    #[must_use]
    pub fn result(&self) -> Option<&GenerationResult> {
        self.result.as_ref()
    }

    /// The error message, present only when failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Hint of how long until the job finishes.
    #[must_use]
    pub fn estimated_wait(&self) -> Option<Duration> {
        self.estimated_wait_ms.map(Duration::from_millis)
    }

    /// Last reported completion percentage.
    #[must_use]
    pub fn progress(&self) -> Option<u8> {
        self.progress
    }

    /// Provider handle for pending work.
    #[must_use]
    pub fn handle(&self) -> Option<&PendingHandle> {
        self.handle.as_ref()
    }

    /// When the job was submitted.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// When the job last changed.
    #[must_use]
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Checks the status/result/error invariants, returning a description of
    /// the first one broken.
    ///
    /// # Errors
    ///
    /// Returns the broken invariant. Used on records loaded from storage.
    pub fn check(&self) -> Result<(), String> {
        match (self.status, &self.result, &self.error) {
            (JobStatus::Completed, Some(result), None) if result.request_type() == self.request_type => Ok(()),
            (JobStatus::Completed, Some(result), None) => Err(format!(
                "completed {} job holds a {} result",
                self.request_type,
                result.request_type()
            )),
            (JobStatus::Failed, None, Some(_)) => Ok(()),
            (JobStatus::Queued | JobStatus::Processing, None, None) => Ok(()),
            (status, result, error) => Err(format!(
                "{status} job with result present: {}, error present: {}",
                result.is_some(),
                error.is_some()
            )),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transitions
    //
    // Each returns `true` if the job changed. Terminal jobs never change.
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn set_estimated_wait(&mut self, wait: Duration) -> bool {
        if self.is_terminal() {
            return false;
        }
        let ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        if self.estimated_wait_ms == Some(ms) {
            return false;
        }
        self.estimated_wait_ms = Some(ms);
        true
    }

    pub(crate) fn start(&mut self, handle: Option<PendingHandle>, now: Timestamp) -> bool {
        if !self.status.can_advance_to(JobStatus::Processing) {
            return false;
        }
        if let Some(wait) = handle.as_ref().and_then(|h| h.estimated_wait) {
            self.set_estimated_wait(wait);
        }
        self.status = JobStatus::Processing;
        self.handle = handle;
        self.updated_at = now;
        true
    }

    /// Records the provider handle on a job that is already processing
    /// without one, as when a status update overtakes the invocation.
    pub(crate) fn attach_handle(&mut self, handle: PendingHandle, now: Timestamp) -> bool {
        if self.status != JobStatus::Processing || self.handle.is_some() {
            return false;
        }
        if let Some(wait) = handle.estimated_wait {
            self.set_estimated_wait(wait);
        }
        self.handle = Some(handle);
        self.updated_at = now;
        true
    }

    pub(crate) fn report_progress(&mut self, progress: Option<u8>, now: Timestamp) -> bool {
        if self.status == JobStatus::Queued {
            self.start(None, now);
            self.progress = progress.map(|p| p.min(100));
            return true;
        }
        let progress = progress.map(|p| p.min(100));
        if self.status != JobStatus::Processing || progress.is_none() || self.progress == progress {
            return false;
        }
        self.progress = progress;
        self.updated_at = now;
        true
    }

    /// Completes the job, or fails it if `result` belongs to another request type.
    pub(crate) fn complete(&mut self, result: GenerationResult, now: Timestamp) -> bool {
        if self.is_terminal() {
            return false;
        }
        if result.request_type() != self.request_type {
            let message = format!(
                "provider returned a {} result for a {} job",
                result.request_type(),
                self.request_type
            );
            return self.fail(message, now);
        }
        self.status = JobStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.progress = Some(100);
        self.estimated_wait_ms = None;
        self.handle = None;
        self.updated_at = now;
        true
    }

    pub(crate) fn fail(&mut self, error: impl Into<String>, now: Timestamp) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.result = None;
        self.estimated_wait_ms = None;
        self.handle = None;
        self.updated_at = now;
        true
    }

    /// Applies a provider status update.
    pub(crate) fn apply(&mut self, update: StatusUpdate, now: Timestamp) -> bool {
        match update {
            StatusUpdate::Queued => false,
            StatusUpdate::Processing { progress } => self.report_progress(progress, now),
            StatusUpdate::Completed(result) => self.complete(result, now),
            StatusUpdate::Failed(message) => self.fail(message, now),
        }
    }
}
