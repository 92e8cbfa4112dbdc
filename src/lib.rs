//! Branching conversations with provider-agnostic asynchronous media generation.
//!

pub use atelier_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use atelier_internal::prelude::*;
}
