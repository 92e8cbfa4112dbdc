//! Error types for the registry, dispatcher and adapters.

use crate::request::RequestType;
use core::time::Duration;

/// Errors returned by [`ModelRegistry`](crate::ModelRegistry) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No model with this id is registered.
    #[error("model not found: {0}")]
    NotFound(String),

    /// The operation would break a catalog invariant.
    #[error("invalid registry state: {0}")]
    InvalidState(String),
}

/// Errors returned by adapter implementations.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The adapter requires credentials that were not configured.
    #[error("missing credentials for backend '{0}'")]
    MissingCredentials(String),

    /// Transport failure (connection refused, DNS, TLS, ...).
    #[error("http error: {0}")]
    Http(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider answered with an error status.
    #[error("provider error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Provider {
        /// HTTP status code if available.
        status: Option<u16>,
        /// Error message.
        message: String,
    },

    /// Rate limited by the provider.
    #[error("rate limited{}", .retry_after.map(|d| format!(", retry after {d:?}")).unwrap_or_default())]
    RateLimited {
        /// Suggested time to wait before retrying.
        retry_after: Option<Duration>,
    },

    /// The provider response could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The adapter does not implement this operation.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

/// A request payload failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// The offending payload field.
    pub field: &'static str,
    /// Why the value was rejected.
    pub reason: String,
}

impl ValidationError {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors returned by the [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The requested model id is not in the registry.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The requested model exists but is disabled.
    #[error("model is disabled: {0}")]
    ModelDisabled(String),

    /// No enabled model with a registered adapter serves this request type.
    #[error("no provider available for {request_type} (capability '{capability}')")]
    NoProviderAvailable {
        /// The request type being routed.
        request_type: RequestType,
        /// The capability that was looked up.
        capability: &'static str,
    },

    /// The model's backend has no adapter registered.
    #[error("no adapter registered for backend '{backend}' (model '{model}')")]
    AdapterNotRegistered {
        /// The model that was selected.
        model: String,
        /// The backend it names.
        backend: String,
    },

    /// The request payload is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    /// The adapter failed.
    #[error("provider '{backend}' failed: {message}")]
    Provider {
        /// Backend that failed.
        backend: String,
        /// Failure description.
        message: String,
    },

    /// The adapter does not implement this operation.
    #[error("backend '{backend}' does not support {operation}")]
    Unsupported {
        /// Backend that was asked.
        backend: String,
        /// The missing operation.
        operation: &'static str,
    },
}

impl DispatchError {
    pub(crate) fn from_adapter(backend: &str, error: AdapterError) -> Self {
        match error {
            AdapterError::Unsupported(operation) => Self::Unsupported {
                backend: backend.to_string(),
                operation,
            },
            other => Self::Provider {
                backend: backend.to_string(),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_formats_status() {
        let err = AdapterError::Provider {
            status: Some(503),
            message: "busy".into(),
        };
        assert_eq!(err.to_string(), "provider error (503): busy");
    }

    #[test]
    fn unsupported_adapter_error_maps_to_unsupported() {
        let err = DispatchError::from_adapter("worker", AdapterError::Unsupported("cancel"));
        assert!(matches!(
            err,
            DispatchError::Unsupported { ref backend, operation: "cancel" } if backend == "worker"
        ));
    }
}
