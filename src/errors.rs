// SPDX-License-Identifier: MPL-2.0

//! Error types for the capture pipeline
//!
//! Every failure is isolated to the request (or the single `capture()` call)
//! that triggered it. Nothing here is fatal to the pipeline itself.

use crate::backends::BackendError;
use std::fmt;

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Capture pipeline error type
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// Invalid or uninitialized capture source, mismatched dimensions or
    /// pixel format, or an invalid configuration value
    Configuration(String),
    /// The GPU copy has not completed yet (poll-negative, retried next tick)
    ReadbackNotReady,
    /// Mapping the completed readback failed
    Readback(BackendError),
    /// The encoder rejected the pixel buffer
    Encode(String),
    /// Writing the encoded file failed
    DiskWrite(String),
    /// The background task died before reporting an outcome
    Task(String),
}

impl CaptureError {
    /// Short category name used in structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::Configuration(_) => "configuration",
            CaptureError::ReadbackNotReady => "readback_not_ready",
            CaptureError::Readback(_) => "readback",
            CaptureError::Encode(_) => "encode",
            CaptureError::DiskWrite(_) => "disk_write",
            CaptureError::Task(_) => "task",
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            CaptureError::ReadbackNotReady => write!(f, "GPU readback not ready yet"),
            CaptureError::Readback(e) => write!(f, "Readback failed: {}", e),
            CaptureError::Encode(msg) => write!(f, "Encoding failed: {}", msg),
            CaptureError::DiskWrite(msg) => write!(f, "Disk write failed: {}", msg),
            CaptureError::Task(msg) => write!(f, "Encode task failed: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<BackendError> for CaptureError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotInitialized(msg) | BackendError::FormatNotSupported(msg) => {
                CaptureError::Configuration(msg)
            }
            BackendError::NotReady => CaptureError::ReadbackNotReady,
            other => CaptureError::Readback(other),
        }
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        CaptureError::Encode(err.to_string())
    }
}

impl From<exr::error::Error> for CaptureError {
    fn from(err: exr::error::Error) -> Self {
        CaptureError::Encode(err.to_string())
    }
}

// Conversions for I/O errors
impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::DiskWrite(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_map_to_taxonomy() {
        let err: CaptureError = BackendError::NotInitialized("no texture".into()).into();
        assert_eq!(err.kind(), "configuration");

        let err: CaptureError = BackendError::MapFailed("device lost".into()).into();
        assert_eq!(err.kind(), "readback");

        let err: CaptureError = BackendError::NotReady.into();
        assert_eq!(err, CaptureError::ReadbackNotReady);
    }

    #[test]
    fn test_io_error_is_disk_write() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CaptureError = io.into();
        assert!(matches!(err, CaptureError::DiskWrite(_)));
        assert!(err.to_string().contains("denied"));
    }
}
