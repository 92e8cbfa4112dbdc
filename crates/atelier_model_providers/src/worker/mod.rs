//! Local worker backend.
//!
//! Talks to a job-style generation worker:
//!
//! - `POST {base}/jobs` with `{ modelId, request }` starts work and answers
//!   with either a finished result or a job id to poll.
//! - `GET {base}/jobs/{jobId}` reports status, progress and the result.
//! - `POST {base}/jobs/{jobId}/cancel` asks the worker to stop.
//!
//! ```no_run
//! # use atelier_model_providers::worker::{WorkerAdapter, WorkerConfig};
//! let adapter = WorkerAdapter::new(WorkerConfig::new("http://127.0.0.1:8188"));
//! ```

mod adapter;
mod client;
mod config;
mod types;

pub use adapter::WorkerAdapter;
pub use config::{DEFAULT_WORKER_URL, WORKER_API_KEY_ENV, WORKER_URL_ENV, WorkerConfig};
