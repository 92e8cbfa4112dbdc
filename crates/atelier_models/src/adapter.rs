//! The [`GenerationAdapter`] trait implemented once per backend.

use crate::error::AdapterError;
use crate::model::ModelDefinition;
use crate::request::GenerationRequest;
use crate::result::GenerationResult;
use async_trait::async_trait;
use core::time::Duration;
use serde::{Deserialize, Serialize};

/// Opaque secrets handed to an adapter on every call.
///
/// `Debug` output never includes the key.
#[derive(Clone, Default)]
pub struct Credentials {
    api_key: Option<String>,
    endpoint: Option<String>,
}

impl Credentials {
    /// Creates credentials holding an API key.
    #[must_use]
    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            endpoint: None,
        }
    }

    /// Sets a backend-specific endpoint override.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Returns the API key, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Returns the endpoint override, if any.
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Reference to work still running on a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingHandle {
    /// Provider-side job token.
    pub token: String,
    /// Provider's estimate of the remaining wait.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_wait: Option<Duration>,
}

impl PendingHandle {
    /// Creates a handle without a wait estimate.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            estimated_wait: None,
        }
    }

    /// Sets the wait estimate.
    #[must_use]
    pub fn with_estimated_wait(mut self, wait: Duration) -> Self {
        self.estimated_wait = Some(wait);
        self
    }
}

/// Outcome of [`GenerationAdapter::invoke`].
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// The provider answered synchronously.
    Immediate(GenerationResult),
    /// The provider accepted the work and will finish later.
    Pending(PendingHandle),
}

/// Provider-reported status of pending work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum StatusUpdate {
    /// Waiting for a worker.
    Queued,
    /// Running, optionally with a completion percentage.
    Processing {
        /// Percentage in `0..=100`.
        progress: Option<u8>,
    },
    /// Finished successfully.
    Completed(GenerationResult),
    /// Finished with an error.
    Failed(String),
}

/// Trait implemented by provider adapters.
///
/// An adapter serves every model whose [`ModelDefinition::backend`] names it.
/// Only [`invoke`](Self::invoke) is required; adapters that hand back
/// [`Invocation::Pending`] should also implement
/// [`poll_status`](Self::poll_status), and may implement
/// [`cancel`](Self::cancel).
#[async_trait]
pub trait GenerationAdapter: Send + Sync + 'static {
    /// Starts a generation.
    ///
    /// # Arguments
    ///
    /// * `model` - The selected model definition
    /// * `request` - The validated request
    /// * `credentials` - Credentials configured for this backend, if any
    async fn invoke(
        &self,
        model: &ModelDefinition,
        request: &GenerationRequest,
        credentials: Option<&Credentials>,
    ) -> Result<Invocation, AdapterError>;

    /// Queries the status of pending work.
    async fn poll_status(
        &self,
        _handle: &PendingHandle,
        _credentials: Option<&Credentials>,
    ) -> Result<StatusUpdate, AdapterError> {
        Err(AdapterError::Unsupported("poll_status"))
    }

    /// Asks the provider to stop pending work.
    async fn cancel(
        &self,
        _handle: &PendingHandle,
        _credentials: Option<&Credentials>,
    ) -> Result<(), AdapterError> {
        Err(AdapterError::Unsupported("cancel"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::api_key("sk-secret").with_endpoint("http://localhost");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("REDACTED"));
        assert_eq!(creds.key(), Some("sk-secret"));
    }

    #[test]
    fn status_update_wire_format() {
        let update: StatusUpdate = serde_json::from_str(
            r#"{ "status": "processing", "data": { "progress": 40 } }"#,
        )
        .unwrap();
        assert_eq!(update, StatusUpdate::Processing { progress: Some(40) });

        let update: StatusUpdate = serde_json::from_str(r#"{ "status": "queued" }"#).unwrap();
        assert_eq!(update, StatusUpdate::Queued);
    }
}
