//! Model registry and provider adapter dispatch for Atelier.
//!
//! This crate provides:
//!
//! - [`ModelRegistry`]: Thread-safe catalog of [`ModelDefinition`]s with
//!   capability lookup and atomic whole-catalog refresh.
//!
//! - [`GenerationRequest`] / [`GenerationResult`]: The closed set of typed
//!   payloads and outputs, one per [`RequestType`].
//!
//! - [`GenerationAdapter`]: Trait implemented once per backend (a local
//!   worker, a hosted API) to run generations.
//!
//! - [`Dispatcher`]: Selects a model and adapter for a request through the
//!   registry, and forwards invoke/poll/cancel calls.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        Dispatcher                          │
//! │  select(request_type, model_id?) ──► ModelRegistry         │
//! │                                       (capability lookup)  │
//! │  invoke / poll / cancel ──► adapters["backend"]            │
//! └──────────────────────────────┬─────────────────────────────┘
//!                                │
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!      WorkerAdapter       hosted API adapter     test MockAdapter
//! ```
//!
//! # Feature Flags
//!
//! - `test-utils` - Enables [`testing::MockAdapter`]

mod adapter;
mod catalog;
mod dispatch;
pub mod error;
mod model;
mod registry;
mod request;
mod result;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use adapter::{Credentials, GenerationAdapter, Invocation, PendingHandle, StatusUpdate};
pub use catalog::{Catalog, default_catalog};
pub use dispatch::{Dispatcher, Selection};
pub use error::{AdapterError, DispatchError, RegistryError, ValidationError};
pub use model::{ModelDefinition, ModelKind, ModelProvider, normalize_capability};
pub use registry::ModelRegistry;
pub use request::{
    CompositeMode, CompositeRequest, DemixRequest, DepthRequest, GenerationRequest, IconRequest,
    ImageRequest, InpaintRequest, MasterRequest, RequestType, SpeechRequest, StabilizeRequest,
    TrainingRequest, VideoRequest,
};
pub use result::{GenerationResult, MediaOutput};
