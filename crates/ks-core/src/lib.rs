//! ks-core: shared error type, configuration, and cancellation scopes.
//!
//! This crate is the foundational dependency for all other ks-* crates,
//! providing a unified error type, the configuration surface read by the
//! recorder and editor facades, and the [`Scope`] used to cancel every
//! blocking operation in the workspace.

pub mod config;
pub mod error;
pub mod scope;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use scope::Scope;
