//! Unified error types for pictura.
//!
//! Every fallible operation of the crate reports one of these variants.
//! Provider-level failures are normally polled (see
//! [`PictureDataProvider::last_error`](crate::provider::PictureDataProvider::last_error))
//! and only surface here when a caller explicitly escalates them.
use std::sync::Arc;
use thiserror::Error;

/// Main error type for pictura operations.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// IO error (shared so errors can be stored and re-raised)
    #[error("IO error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// Parse error occurred
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Data is not a picture container nor a recognized image file
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Container header version this build cannot read
    #[error("Unsupported picture block version: {0}")]
    UnsupportedVersion(u32),

    /// Corrupted or truncated data
    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    /// Requested byte range is outside the source
    #[error("Range out of bounds: offset {offset}, size {size}, available {available}")]
    OutOfRange { offset: u64, size: u64, available: u64 },

    /// The provider is not valid
    #[error("Invalid data provider: {0}")]
    InvalidProvider(String),

    /// The bytes could not be decoded in the expected format
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Entry or file not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type for pictura operations.
pub type Result<T> = std::result::Result<T, Error>;
