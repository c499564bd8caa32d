use thiserror::Error;

use crate::intake::RuntimeErrorKind;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("Lookup client error: {0}")]
    LookupClient(#[from] reqwest::Error),
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

// Capture Source Error Type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("No capture device available")]
    DeviceUnavailable,
    #[error("Failed to attach capture input: {0}")]
    AttachInput(String),
    #[error("Failed to attach capture output: {0}")]
    AttachOutput(String),
    #[error("Failed to start capture source: {0}")]
    Start(String),
}

// Lookup Error Type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("No product found for code {0}")]
    NotFound(String),
    #[error("Lookup request failed: {0}")]
    Network(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        FetchError::Network(error.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("Frame has no pixels ({0}x{1})")]
    EmptyFrame(u32, u32),
    #[error("Recognition pass aborted: {0}")]
    Aborted(String),
    #[error("Recognition engine failed: {0}")]
    Engine(String),
}

/// Error as published in the pipeline state. Every failure that reaches a
/// reader is represented by one of these values, never by a panic or a
/// returned `Err`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("Camera permission denied")]
    PermissionDenied,
    #[error("No capture device available")]
    DeviceUnavailable,
    #[error("Capture configuration failed: {0}")]
    ConfigurationFailure(String),
    #[error("Lookup failed: {0}")]
    NetworkFailure(String),
    #[error("No product found for code {0}")]
    NotFound(String),
    #[error("Capture interrupted: {0}")]
    RuntimeInterruption(RuntimeErrorKind),
}

impl From<CaptureError> for ErrorKind {
    fn from(error: CaptureError) -> Self {
        match error {
            CaptureError::DeviceUnavailable => ErrorKind::DeviceUnavailable,
            other => ErrorKind::ConfigurationFailure(other.to_string()),
        }
    }
}

impl From<FetchError> for ErrorKind {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::NotFound(code) => ErrorKind::NotFound(code),
            FetchError::Network(message) => ErrorKind::NetworkFailure(message),
        }
    }
}
