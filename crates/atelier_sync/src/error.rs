//! Error types for catalog synchronization.

use atelier_models::RegistryError;

/// Errors produced while synchronizing.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A catalog source could not be fetched.
    #[error("catalog source '{source_name}' failed: {message}")]
    Fetch {
        /// Name of the source.
        source_name: String,
        /// Failure description.
        message: String,
    },

    /// The registry refused the merged snapshot.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The background task is no longer running.
    #[error("sync task has stopped")]
    Stopped,
}

impl SyncError {
    /// Builds a [`SyncError::Fetch`].
    pub fn fetch(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}
