//! Asynchronous generation job tracking for Atelier.
//!
//! A [`Job`] is one generation request tracked from submission to a terminal
//! outcome. The [`JobTracker`] owns every job:
//!
//! - [`JobTracker::submit`] validates the request, selects a model through the
//!   [`Dispatcher`](atelier_models::Dispatcher), queues the job and invokes
//!   the provider on a spawned task
//! - [`JobTracker::poll`] and [`JobTracker::ingest`] advance pending jobs
//! - [`JobTracker::subscribe`] and [`JobTracker::wait`] observe them
//!
//! # State Machine
//!
//! ```text
//!            ┌──────────── immediate result / failure ────────────┐
//!            │                                                    ▼
//!        ┌────────┐   pending handle   ┌────────────┐      ┌───────────┐
//!  ────► │ queued │ ─────────────────► │ processing │ ───► │ completed │
//!        └────────┘                    └────────────┘      │  failed   │
//!                                                          └───────────┘
//! ```
//!
//! Terminal states are final. Every transition is applied atomically with
//! respect to readers of the same job.

pub mod auth;
mod error;
mod job;
mod tracker;

pub use auth::{AccessRequest, AuthDecision, AuthGate, OpenGate, RateLimitProfile, Rejection, SlidingWindowGate};
pub use error::JobError;
pub use job::{Job, JobId, JobStatus};
pub use tracker::{CANCELLED, JobTracker, JobTrackerBuilder, TrackerConfig};
