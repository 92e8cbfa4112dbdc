//! HTTP collaborators for Atelier's provider-agnostic core.
//!
//! Each backend is packaged as a [`GenerationAdapter`](atelier_models::GenerationAdapter)
//! that is registered with a [`Dispatcher`](atelier_models::Dispatcher) under
//! the backend name its models declare.
//!
//! # Supported Backends
//!
//! | Backend | Feature Flag | Description |
//! |---------|--------------|-------------|
//! | Local worker | `worker` (default) | Job-style HTTP worker (`/jobs` protocol) |
//!
//! The [`HttpCatalogSource`] feeds the sync scheduler from a JSON catalog
//! endpoint and is always available.
//!
//! # Usage
//!
//! ```no_run
//! # #[cfg(feature = "worker")]
//! # {
//! use atelier_model_providers::{WorkerAdapter, WorkerConfig};
//! use atelier_models::{Dispatcher, ModelRegistry, default_catalog};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ModelRegistry::seeded(default_catalog()).unwrap());
//! let adapter = Arc::new(WorkerAdapter::new(WorkerConfig::from_env()));
//!
//! let mut dispatcher = Dispatcher::new(registry);
//! dispatcher.register_adapter("sdxl-turbo", adapter);
//! # }
//! ```

mod catalog;

#[cfg(feature = "worker")]
pub mod worker;

pub use catalog::HttpCatalogSource;

#[cfg(feature = "worker")]
pub use worker::{WorkerAdapter, WorkerConfig};
