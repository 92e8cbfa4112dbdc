//! Worker wire types.

use atelier_models::{GenerationRequest, GenerationResult};
use serde::{Deserialize, Serialize};

/// Body of `POST /jobs`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SubmitJobRequest<'a> {
    pub model_id: &'a str,
    pub request: &'a GenerationRequest,
}

/// Job state as the worker reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(super) enum WorkerStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// Response of `POST /jobs`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SubmitJobResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    pub status: WorkerStatus,
    #[serde(default)]
    pub estimated_wait_ms: Option<u64>,
    #[serde(default)]
    pub result: Option<GenerationResult>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response of `GET /jobs/{jobId}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct JobStatusResponse {
    pub status: WorkerStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub result: Option<GenerationResult>,
    #[serde(default)]
    pub error: Option<String>,
}
