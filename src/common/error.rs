use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DarkFrameError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to load camera SDK: {0}")]
    SdkLoad(String),

    #[error("Camera error during {operation}: {message}")]
    Camera {
        operation: &'static str,
        message: String,
    },

    #[error("Binning value must be one of {supported:?}, got {requested}")]
    UnsupportedBinning { requested: u32, supported: Vec<u32> },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Timed out after {0:?} waiting for exposure to complete")]
    CaptureTimeout(Duration),

    #[error("Capture failed after {attempts} attempts: {last}")]
    CaptureExhausted { attempts: u32, last: String },

    #[error("Interrupted by user")]
    Interrupted,

    #[error("Invalid dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),

    #[error("Failed to encode image: {0}")]
    EncodeError(String),

    #[error("Failed to write output file: {0}")]
    OutputWriteError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DarkFrameError {
    pub fn camera(operation: &'static str, message: impl Into<String>) -> Self {
        DarkFrameError::Camera {
            operation,
            message: message.into(),
        }
    }

    /// Errors a capture retry can recover from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DarkFrameError::Camera { .. } | DarkFrameError::CaptureTimeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DarkFrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DarkFrameError::camera("capture", "ASI_ERROR_GENERAL_ERROR").is_transient());
        assert!(DarkFrameError::CaptureTimeout(Duration::from_secs(3)).is_transient());
        assert!(!DarkFrameError::Interrupted.is_transient());
        assert!(!DarkFrameError::InvalidArgument("x".to_string()).is_transient());
    }

    #[test]
    fn test_exhausted_message_carries_last_cause() {
        let err = DarkFrameError::CaptureExhausted {
            attempts: 3,
            last: "Camera error during capture: ASI_ERROR_TIMEOUT".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Capture failed after 3 attempts: Camera error during capture: ASI_ERROR_TIMEOUT"
        );
    }
}
