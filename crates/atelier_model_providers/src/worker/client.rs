//! Worker HTTP client.

use super::config::WorkerConfig;
use super::types::{JobStatusResponse, SubmitJobRequest, SubmitJobResponse};
use atelier_models::{AdapterError, Credentials};
use core::time::Duration;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

/// HTTP client for the worker `/jobs` API.
#[derive(Clone)]
pub(super) struct WorkerClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl WorkerClient {
    /// Creates a new client.
    pub(super) fn new(config: &WorkerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url().to_string(),
            api_key: config.api_key().map(str::to_string),
        }
    }

    /// Applies per-backend credentials configured on the dispatcher.
    ///
    /// The underlying connection pool is shared.
    pub(super) fn with_credentials(&self, credentials: Option<&Credentials>) -> Self {
        let mut client = self.clone();
        if let Some(credentials) = credentials {
            if let Some(endpoint) = credentials.endpoint() {
                client.base_url = endpoint.trim_end_matches('/').to_string();
            }
            if let Some(key) = credentials.key() {
                client.api_key = Some(key.to_string());
            }
        }
        client
    }

    /// Starts a job.
    pub(super) async fn submit(&self, request: &SubmitJobRequest<'_>) -> Result<SubmitJobResponse, AdapterError> {
        let url = format!("{}/jobs", self.base_url);
        let body = self.send(self.client.post(&url).json(request)).await?;
        parse(&body)
    }

    /// Fetches the status of a job.
    pub(super) async fn status(&self, job_id: &str) -> Result<JobStatusResponse, AdapterError> {
        let url = format!("{}/jobs/{job_id}", self.base_url);
        let body = self.send(self.client.get(&url)).await?;
        parse(&body)
    }

    /// Asks the worker to stop a job. The response body is ignored.
    pub(super) async fn cancel(&self, job_id: &str) -> Result<(), AdapterError> {
        let url = format!("{}/jobs/{job_id}/cancel", self.base_url);
        self.send(self.client.post(&url)).await.map(drop)
    }

    fn headers(&self) -> Result<HeaderMap, AdapterError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}"))
                    .map_err(|err| AdapterError::InvalidResponse(format!("Invalid API key header: {err}")))?,
            );
        }
        Ok(headers)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<String, AdapterError> {
        let response = builder
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|err| AdapterError::Http(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(AdapterError::RateLimited { retry_after });
        }

        let body = response
            .text()
            .await
            .map_err(|err| AdapterError::Http(err.to_string()))?;

        if !status.is_success() {
            return Err(AdapterError::Provider {
                status: Some(status.as_u16()),
                message: body,
            });
        }
        Ok(body)
    }
}

fn parse<T: DeserializeOwned>(body: &str) -> Result<T, AdapterError> {
    serde_json::from_str(body).map_err(|err| {
        AdapterError::InvalidResponse(format!("Failed to parse response: {err}\nBody: {body}"))
    })
}

impl core::fmt::Debug for WorkerClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkerClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
