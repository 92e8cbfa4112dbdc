//! Background synchronization for Atelier.
//!
//! [`SyncScheduler`] periodically refreshes the
//! [`ModelRegistry`](atelier_models::ModelRegistry) from a set of
//! [`CatalogSource`]s and polls processing jobs that have gone quiet.
//!
//! # Example
//!
//! ```no_run
//! # async fn demo(registry: std::sync::Arc<atelier_models::ModelRegistry>, tracker: atelier_jobs::JobTracker) {
//! use atelier_sync::{StaticSource, SyncConfig, SyncScheduler};
//! use std::sync::Arc;
//!
//! let handle = SyncScheduler::new(registry, SyncConfig::default())
//!     .with_source(Arc::new(StaticSource::new("builtin", atelier_models::default_catalog())))
//!     .with_tracker(tracker)
//!     .spawn();
//!
//! let report = handle.sync_now().await.unwrap();
//! assert!(report.catalog_ok());
//! handle.shutdown().await;
//! # }
//! ```

mod config;
mod error;
mod scheduler;
mod source;

pub use config::SyncConfig;
pub use error::SyncError;
pub use scheduler::{RoundReport, SyncHandle, SyncScheduler, SyncStatus};
pub use source::{CatalogSource, StaticSource};
