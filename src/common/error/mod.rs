//! Unified error types for pictura.
//!
//! This module provides a single error type shared by providers, codecs,
//! picture data and the container, presenting a consistent API to users.

// Submodule declarations
pub mod conversions;
pub mod types;

// Re-exports
pub use types::{Error, Result};
