//! Error types for nutriscan-scanner

use nutriscan_core::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Camera stream already open")]
    StreamAlreadyOpen,

    #[error("Recognition model failed to load: {0}")]
    WorkerLoad(String),

    #[error("Recognition worker unavailable")]
    WorkerUnavailable,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Malformed result: {0}")]
    MalformedResult(String),

    #[error("Cannot {action} while {state}")]
    InvalidTransition { state: String, action: &'static str },

    #[error("An analysis submission is already in flight")]
    SubmissionInFlight,

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl ScanError {
    /// Whether the user can recover by invoking the same action again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScanError::Network(_)
                | ScanError::Server { .. }
                | ScanError::MalformedResult(_)
                | ScanError::DeviceUnavailable(_)
        )
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ScanError::MalformedResult(err.to_string());
        }
        match err.status() {
            Some(status) => ScanError::Server {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => ScanError::Network(err.to_string()),
        }
    }
}
