//! Studio facade for Atelier.
//!
//! Wires the conversation trees, the model registry, provider dispatch and
//! the job tracker into one control flow:
//!
//! ```text
//! request_generation(conversation, node, ...)
//!   │  node exists?  ──► AuthGate ──► Dispatcher::select ──► job queued
//!   ▼
//! watcher task: wait / poll ──► job terminal
//!   │
//!   └─ completed: image/video outputs attached to `node`
//! ```
//!
//! # Example
//!
//! ```no_run
//! use atelier_jobs::AccessRequest;
//! use atelier_models::{Dispatcher, GenerationRequest, ModelRegistry, default_catalog};
//! use atelier_studio::Studio;
//! use atelier_tree::Role;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(ModelRegistry::seeded(default_catalog())?);
//! let studio = Studio::builder(Arc::new(Dispatcher::new(registry))).build();
//!
//! let conversation = studio.conversations().create();
//! let node = studio
//!     .conversations()
//!     .add_message(&conversation, Role::User, "A fox in the snow")?;
//!
//! let generation = studio
//!     .request_generation(
//!         &conversation,
//!         &node,
//!         &AccessRequest::anonymous(),
//!         GenerationRequest::image("A fox in the snow"),
//!         None,
//!     )
//!     .await?;
//! let outcome = generation.finished().await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod studio;

pub use config::StudioConfig;
pub use error::StudioError;
pub use studio::{ContextMessage, Generation, GenerationOutcome, Restored, Studio, StudioBuilder};
