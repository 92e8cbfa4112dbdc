//! Error types for job tracking.

use crate::job::JobId;
use atelier_models::{DispatchError, ValidationError};
use atelier_persistence::PersistenceError;
use core::time::Duration;

/// Errors returned by the [`JobTracker`](crate::JobTracker).
///
/// Submission errors are returned before any job exists. Provider failures
/// after submission are captured into the job's `failed` state instead.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// No job has this id.
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// Model or adapter selection failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The request payload is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    /// The provider did not answer a poll in time. The job is left unchanged.
    #[error("provider did not answer within {timeout:?} while polling job {job_id}")]
    ProviderTimeout {
        /// The polled job.
        job_id: JobId,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The job did not reach a terminal state in time.
    #[error("job {job_id} did not finish within {timeout:?}")]
    WaitTimeout {
        /// The awaited job.
        job_id: JobId,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The auth gate rejected the caller.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The auth gate rate-limited the caller.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// When the caller may try again.
        retry_after: Duration,
    },

    /// Loading persisted jobs failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}
