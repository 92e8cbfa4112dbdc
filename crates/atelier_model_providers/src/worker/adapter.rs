//! Worker [`GenerationAdapter`] implementation.

use super::client::WorkerClient;
use super::config::WorkerConfig;
use super::types::{JobStatusResponse, SubmitJobRequest, SubmitJobResponse, WorkerStatus};
use async_trait::async_trait;
use atelier_models::{
    AdapterError, Credentials, GenerationAdapter, GenerationRequest, Invocation, ModelDefinition,
    PendingHandle, StatusUpdate,
};
use core::time::Duration;

/// Message used when the worker fails a job without saying why.
const UNKNOWN_FAILURE: &str = "worker reported failure";

/// Worker [`GenerationAdapter`] implementation.
///
/// One adapter can serve several backends; register the same `Arc` under
/// each backend name the worker hosts.
#[derive(Debug, Clone)]
pub struct WorkerAdapter {
    client: WorkerClient,
}

impl WorkerAdapter {
    /// Creates an adapter for the worker described by `config`.
    #[must_use]
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            client: WorkerClient::new(&config),
        }
    }
}

#[async_trait]
impl GenerationAdapter for WorkerAdapter {
    async fn invoke(
        &self,
        model: &ModelDefinition,
        request: &GenerationRequest,
        credentials: Option<&Credentials>,
    ) -> Result<Invocation, AdapterError> {
        let body = SubmitJobRequest {
            model_id: &model.id,
            request,
        };
        let response = self.client.with_credentials(credentials).submit(&body).await?;
        tracing::debug!(model = %model.id, status = ?response.status, "worker accepted job");
        convert_submit(response)
    }

    async fn poll_status(
        &self,
        handle: &PendingHandle,
        credentials: Option<&Credentials>,
    ) -> Result<StatusUpdate, AdapterError> {
        let response = self.client.with_credentials(credentials).status(&handle.token).await?;
        convert_status(response)
    }

    async fn cancel(&self, handle: &PendingHandle, credentials: Option<&Credentials>) -> Result<(), AdapterError> {
        self.client.with_credentials(credentials).cancel(&handle.token).await
    }
}

fn convert_submit(response: SubmitJobResponse) -> Result<Invocation, AdapterError> {
    match response.status {
        WorkerStatus::Completed => response
            .result
            .map(Invocation::Immediate)
            .ok_or_else(|| AdapterError::InvalidResponse("completed job without a result".to_string())),
        WorkerStatus::Failed => Err(AdapterError::Provider {
            status: None,
            message: response.error.unwrap_or_else(|| UNKNOWN_FAILURE.to_string()),
        }),
        WorkerStatus::Queued | WorkerStatus::Processing => {
            let Some(job_id) = response.job_id else {
                return Err(AdapterError::InvalidResponse(
                    "pending job without a jobId".to_string(),
                ));
            };
            let handle = PendingHandle::new(job_id);
            Ok(Invocation::Pending(match response.estimated_wait_ms {
                Some(ms) => handle.with_estimated_wait(Duration::from_millis(ms)),
                None => handle,
            }))
        }
    }
}

fn convert_status(response: JobStatusResponse) -> Result<StatusUpdate, AdapterError> {
    match response.status {
        WorkerStatus::Queued => Ok(StatusUpdate::Queued),
        WorkerStatus::Processing => Ok(StatusUpdate::Processing {
            progress: response.progress.map(convert_progress),
        }),
        WorkerStatus::Completed => response
            .result
            .map(StatusUpdate::Completed)
            .ok_or_else(|| AdapterError::InvalidResponse("completed job without a result".to_string())),
        WorkerStatus::Failed => Ok(StatusUpdate::Failed(
            response.error.unwrap_or_else(|| UNKNOWN_FAILURE.to_string()),
        )),
    }
}

/// Workers report fractional percentages; jobs track whole ones.
fn convert_progress(progress: f64) -> u8 {
    if progress.is_nan() {
        return 0;
    }
    progress.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_models::GenerationResult;

    fn submit_response(json: &str) -> SubmitJobResponse {
        serde_json::from_str(json).unwrap()
    }

    fn status_response(json: &str) -> JobStatusResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn request_body_is_camel_case_with_typed_request() {
        let request = GenerationRequest::speech("hello");
        let body = serde_json::to_value(SubmitJobRequest {
            model_id: "eleven-adam",
            request: &request,
        })
        .unwrap();

        assert_eq!(body["modelId"], "eleven-adam");
        assert_eq!(body["request"]["type"], "audio-tts");
        assert_eq!(body["request"]["text"], "hello");
    }

    #[test]
    fn completed_submit_is_immediate() {
        let invocation = convert_submit(submit_response(
            r#"{ "status": "completed", "result": { "type": "audio-tts", "audioUrl": "a.mp3" } }"#,
        ))
        .unwrap();

        assert_eq!(
            invocation,
            Invocation::Immediate(GenerationResult::AudioTts {
                audio_url: "a.mp3".into()
            })
        );
    }

    #[test]
    fn queued_submit_is_pending_with_wait() {
        let invocation = convert_submit(submit_response(
            r#"{ "jobId": "w-17", "status": "queued", "estimatedWaitMs": 12000 }"#,
        ))
        .unwrap();

        let Invocation::Pending(handle) = invocation else {
            panic!("expected pending, got {invocation:?}");
        };
        assert_eq!(handle.token, "w-17");
        assert_eq!(handle.estimated_wait, Some(Duration::from_secs(12)));
    }

    #[test]
    fn malformed_submit_responses_are_rejected() {
        let missing_id = convert_submit(submit_response(r#"{ "status": "processing" }"#));
        assert!(matches!(missing_id, Err(AdapterError::InvalidResponse(_))));

        let missing_result = convert_submit(submit_response(r#"{ "status": "completed" }"#));
        assert!(matches!(missing_result, Err(AdapterError::InvalidResponse(_))));

        let failed = convert_submit(submit_response(r#"{ "status": "failed", "error": "CUDA out of memory" }"#));
        assert!(matches!(
            failed,
            Err(AdapterError::Provider { status: None, message }) if message == "CUDA out of memory"
        ));
    }

    #[test]
    fn status_responses_map_to_updates() {
        assert_eq!(
            convert_status(status_response(r#"{ "status": "queued" }"#)).unwrap(),
            StatusUpdate::Queued
        );
        assert_eq!(
            convert_status(status_response(r#"{ "status": "processing", "progress": 41.6 }"#)).unwrap(),
            StatusUpdate::Processing { progress: Some(42) }
        );
        assert_eq!(
            convert_status(status_response(r#"{ "status": "failed" }"#)).unwrap(),
            StatusUpdate::Failed(UNKNOWN_FAILURE.to_string())
        );
        assert_eq!(
            convert_status(status_response(
                r#"{ "status": "completed", "result": { "type": "video-gen", "videoUrl": "v.mp4" } }"#
            ))
            .unwrap(),
            StatusUpdate::Completed(GenerationResult::VideoGen {
                video_url: "v.mp4".into(),
                thumbnail_url: None,
            })
        );
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(convert_progress(-3.0), 0);
        assert_eq!(convert_progress(250.0), 100);
        assert_eq!(convert_progress(f64::NAN), 0);
    }
}
