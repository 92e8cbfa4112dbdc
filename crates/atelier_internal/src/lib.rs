//! # Atelier Internal Library
//!
//! Re-exports the core Atelier crates for convenience.

/// Ids, clock and tracing setup.
pub use atelier_core;

/// Storage boundary.
pub use atelier_persistence;

/// Model registry and provider dispatch.
pub use atelier_models;

/// Branching conversation trees.
pub use atelier_tree;

/// Generation job tracking.
pub use atelier_jobs;

/// Background catalog sync.
pub use atelier_sync;

/// HTTP provider adapters.
pub use atelier_model_providers;

/// Conversations wired to generation jobs.
pub use atelier_studio;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use atelier_core::{Clock, Timestamp, TracingConfig};
    pub use atelier_jobs::{AccessRequest, Job, JobError, JobId, JobStatus, JobTracker};
    pub use atelier_models::{
        Dispatcher, GenerationAdapter, GenerationRequest, GenerationResult, ModelDefinition,
        ModelRegistry, RequestType,
    };
    pub use atelier_persistence::{MemoryStore, Store};
    pub use atelier_studio::{Studio, StudioError};
    pub use atelier_sync::{CatalogSource, SyncConfig, SyncScheduler};
    pub use atelier_tree::{ChatTree, ConversationId, Conversations, NodeId, Role};
}
