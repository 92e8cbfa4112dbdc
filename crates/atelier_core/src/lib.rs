//! Core infrastructure for Atelier.
//!
//! This crate provides the ambient pieces every other Atelier crate relies on:
//!
//! - [`define_id!`] - String identifier newtypes backed by `nanoid`
//! - [`Clock`] - Wall-clock time provider, mockable for testing
//! - [`TracingConfig`] - Logging and observability setup via the `tracing` crate
//!
//! # Feature Flags
//!
//! - `test-utils` - Enables [`MockClock`] for deterministic time testing
//!
//! # Example
//!
//! ```no_run
//! use atelier_core::{Clock, TracingConfig, TracingFormat};
//! use tracing::Level;
//!
//! TracingConfig::default()
//!     .with_level(Level::DEBUG)
//!     .with_format(TracingFormat::Compact)
//!     .init();
//!
//! let clock = Clock::default();
//! tracing::info!(now = %clock.now(), "studio starting");
//! ```

// Self-reference so `define_id!` expansions resolve inside this crate too.
extern crate self as atelier_core;

mod id;
mod time;
mod tracing_config;

pub use time::{Clock, ClockProvider, Timestamp};
pub use tracing_config::{TracingConfig, TracingFormat};

#[cfg(any(test, feature = "test-utils"))]
pub use time::MockClock;

#[doc(hidden)]
pub mod __private {
    pub use nanoid::nanoid;
    pub use serde;
}
