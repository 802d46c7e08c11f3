//! Error conversion implementations.
//!
//! This module contains From trait implementations to convert from library
//! and dependency error types to the unified Error type.

use super::types::Error;
use crate::common::binary::BinaryError;
use std::sync::Arc;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(err.to_string()),
            std::io::ErrorKind::UnexpectedEof => Error::CorruptedData(err.to_string()),
            _ => Error::Io(Arc::new(err)),
        }
    }
}

impl From<BinaryError> for Error {
    fn from(err: BinaryError) -> Self {
        match err {
            BinaryError::InsufficientData {
                expected,
                available,
            } => Error::CorruptedData(format!(
                "Insufficient data: expected {} bytes, got {}",
                expected, available
            )),
            BinaryError::ParseError(msg) => Error::ParseError(msg),
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(e) => Error::Unsupported(e.to_string()),
            image::ImageError::IoError(e) => Error::from(e),
            other => Error::DecodeError(other.to_string()),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::ParseError(format!("XML: {}", err))
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::ParseError(format!("Invalid UTF-8: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error as _;

        let err: Error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked").into();
        let source = err.source().expect("io source");
        let io = source.downcast_ref::<Arc<std::io::Error>>().expect("io error");
        assert_eq!(io.kind(), std::io::ErrorKind::PermissionDenied);

        let stored = err.clone();
        assert!(matches!(stored, Error::Io(ref shared) if shared.kind() == std::io::ErrorKind::PermissionDenied));
        assert!(stored.to_string().contains("locked"));
    }

    #[test]
    fn test_binary_error_maps_to_corrupted() {
        let err: Error = BinaryError::InsufficientData {
            expected: 8,
            available: 3,
        }
        .into();
        assert!(matches!(err, Error::CorruptedData(_)));
    }
}
