use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::common::Frame;
use crate::error::CaptureError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RuntimeErrorKind {
    /// The platform's media services were torn down and brought back.
    MediaServicesReset,
    DeviceDisconnected,
    DeviceInUse,
    Other(String),
}

impl RuntimeErrorKind {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RuntimeErrorKind::MediaServicesReset)
    }
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeErrorKind::MediaServicesReset => write!(f, "media services were reset"),
            RuntimeErrorKind::DeviceDisconnected => write!(f, "device disconnected"),
            RuntimeErrorKind::DeviceInUse => write!(f, "device in use by another client"),
            RuntimeErrorKind::Other(message) => write!(f, "{}", message),
        }
    }
}

/// Runtime error notification from a capture source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeErrorEvent {
    pub kind: RuntimeErrorKind,
    pub still_running: bool,
}

/// Delivery side handed to a capture source when its output is attached.
///
/// Both methods are non-blocking and safe to call from the source's own
/// capture thread.
#[derive(Debug, Clone)]
pub struct CaptureOutput {
    frames: mpsc::Sender<Frame>,
    errors: mpsc::Sender<RuntimeErrorEvent>,
}

impl CaptureOutput {
    pub fn new(frames: mpsc::Sender<Frame>, errors: mpsc::Sender<RuntimeErrorEvent>) -> Self {
        Self { frames, errors }
    }

    /// Offers a frame to the pipeline. Returns `false` when the frame was
    /// dropped because the pipeline is busy or gone.
    pub fn deliver(&self, frame: Frame) -> bool {
        match self.frames.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(frame)) => {
                trace!(frame_id = %frame.id(), "Frame channel full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn report(&self, event: RuntimeErrorEvent) {
        if let Err(e) = self.errors.try_send(event) {
            warn!("Failed to report capture runtime error: {}", e);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.frames.is_closed()
    }
}

/// A single video capture source.
///
/// Only the session manager holds one; nothing else in the crate starts,
/// stops or configures it.
pub trait CaptureSource: Send {
    fn default_device(&self) -> Option<DeviceInfo>;

    fn attach_input(&mut self, device: &DeviceInfo) -> Result<(), CaptureError>;

    /// Replaces any previously attached output.
    fn attach_output(&mut self, output: CaptureOutput) -> Result<(), CaptureError>;

    fn start(&mut self) -> Result<(), CaptureError>;

    fn stop(&mut self);

    fn is_running(&self) -> bool;
}
