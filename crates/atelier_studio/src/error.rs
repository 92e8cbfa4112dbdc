//! Error type for studio operations.

use atelier_jobs::{JobError, JobId};
use atelier_tree::ConversationError;
use core::time::Duration;

/// Errors returned by [`Studio`](crate::Studio) operations.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    /// A conversation or tree operation failed.
    #[error(transparent)]
    Conversation(#[from] ConversationError),

    /// Submitting or tracking the job failed.
    #[error(transparent)]
    Job(#[from] JobError),

    /// The job was still running when the watcher gave up.
    #[error("job {job_id} still running after {timeout:?}")]
    WatchTimeout {
        /// The job being watched.
        job_id: JobId,
        /// How long the watcher waited.
        timeout: Duration,
    },

    /// The watcher task ended without reporting.
    #[error("generation watcher failed: {0}")]
    Watcher(String),
}
