use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::CaptureError;
use crate::intake::frame_pump::FramePump;
use crate::intake::permission::{PermissionProvider, check_permission};
use crate::intake::source::{CaptureOutput, CaptureSource, DeviceInfo, RuntimeErrorEvent};
use crate::pipeline::events::{Generation, PipelineEvent};
use crate::pipeline::services::{CodeRecognizer, FrameThrottler};
use crate::pipeline::types::SessionState;

const RUNTIME_ERROR_BUFFER: usize = 8;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub throttle_interval: Duration,
    pub max_in_flight_recognitions: usize,
    pub frame_buffer_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    /// The answer belongs to a start that has since been superseded.
    Stale,
    Denied,
    /// The session moved to `Starting`; call `complete_start` next.
    Granted,
}

struct PumpHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the capture source and drives the session state machine.
///
/// The source is a private field: starting, stopping and configuring it all
/// go through this type.
pub struct CaptureSessionManager {
    source: Box<dyn CaptureSource>,
    permission: Arc<dyn PermissionProvider>,
    recognizer: CodeRecognizer,
    settings: SessionSettings,
    events: mpsc::Sender<PipelineEvent>,
    state: SessionState,
    generation: Generation,
    pending_permission: Option<Generation>,
    input: Option<DeviceInfo>,
    pump: Option<PumpHandle>,
}

impl CaptureSessionManager {
    pub(crate) fn new(
        source: Box<dyn CaptureSource>,
        permission: Arc<dyn PermissionProvider>,
        recognizer: CodeRecognizer,
        settings: SessionSettings,
        events: mpsc::Sender<PipelineEvent>,
    ) -> Self {
        Self {
            source,
            permission,
            recognizer,
            settings,
            events,
            state: SessionState::Idle,
            generation: Generation::default(),
            pending_permission: None,
            input: None,
            pump: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation == generation
    }

    /// Begins a start by checking permission in the background. The answer
    /// arrives as `PipelineEvent::PermissionResolved`. Returns `false` when a
    /// start is already pending, starting or running.
    pub fn request_start(&mut self) -> bool {
        if self.pending_permission.is_some()
            || matches!(self.state, SessionState::Starting | SessionState::Running)
        {
            debug!(state = ?self.state, "Start ignored, session already starting or running");
            return false;
        }

        self.generation = self.generation.next();
        let generation = self.generation;
        self.pending_permission = Some(generation);

        let permission = Arc::clone(&self.permission);
        let events = self.events.clone();
        tokio::spawn(async move {
            let granted = check_permission(permission.as_ref()).await;
            let _ = events
                .send(PipelineEvent::PermissionResolved {
                    generation,
                    granted,
                })
                .await;
        });
        debug!(%generation, "Checking camera permission");
        true
    }

    pub fn on_permission(&mut self, generation: Generation, granted: bool) -> PermissionOutcome {
        if self.pending_permission != Some(generation) {
            debug!(%generation, "Ignoring permission answer for superseded start");
            return PermissionOutcome::Stale;
        }
        self.pending_permission = None;

        if !granted {
            warn!("Camera access denied");
            return PermissionOutcome::Denied;
        }
        self.state = SessionState::Starting;
        PermissionOutcome::Granted
    }

    /// Configures the source and starts it. Leaves the session `Running` on
    /// success and `Errored` on any configuration failure.
    pub fn complete_start(&mut self) -> Result<(), CaptureError> {
        if self.state != SessionState::Starting {
            return Ok(());
        }
        match self.configure_and_start() {
            Ok(()) => {
                self.state = SessionState::Running;
                info!(generation = %self.generation, "Capture session running");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Capture session failed to start");
                self.teardown_pump();
                self.source.stop();
                self.state = SessionState::Errored;
                Err(e)
            }
        }
    }

    fn configure_and_start(&mut self) -> Result<(), CaptureError> {
        if self.input.is_none() {
            let device = self
                .source
                .default_device()
                .ok_or(CaptureError::DeviceUnavailable)?;
            self.source.attach_input(&device)?;
            info!(device = %device.name, "Capture input attached");
            self.input = Some(device);
        }

        // A source left over from an interrupted session must not keep
        // feeding the output that is about to be replaced.
        if self.source.is_running() {
            self.source.stop();
        }

        let (frame_tx, frame_rx) = mpsc::channel(self.settings.frame_buffer_size.max(1));
        let (error_tx, error_rx) = mpsc::channel(RUNTIME_ERROR_BUFFER);
        self.source
            .attach_output(CaptureOutput::new(frame_tx, error_tx))?;

        self.teardown_pump();
        let pump = FramePump::new(
            FrameThrottler::new(self.settings.throttle_interval),
            self.recognizer.clone(),
            self.settings.max_in_flight_recognitions,
            self.generation,
            self.events.clone(),
        );
        let cancel = CancellationToken::new();
        let task = tokio::spawn(pump.run(frame_rx, error_rx, cancel.clone()));
        self.pump = Some(PumpHandle { cancel, task });

        self.source.start()
    }

    /// Moves to `Stopping` and invalidates everything in flight. Returns
    /// `false` when there is no session to stop.
    pub fn begin_stop(&mut self) -> bool {
        self.pending_permission = None;
        self.generation = self.generation.next();
        match self.state {
            SessionState::Idle | SessionState::Stopping => false,
            SessionState::Starting | SessionState::Running | SessionState::Errored => {
                self.state = SessionState::Stopping;
                true
            }
        }
    }

    pub fn finish_stop(&mut self) {
        self.teardown_pump();
        self.source.stop();
        self.state = SessionState::Idle;
        info!("Capture session stopped");
    }

    /// Applies a runtime error from the current session. A fatal one moves a
    /// running session to `Errored`. Returns `false` for stale reports.
    pub fn on_runtime_error(&mut self, generation: Generation, event: &RuntimeErrorEvent) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        if !event.still_running && self.state == SessionState::Running {
            self.teardown_pump();
            self.source.stop();
            self.state = SessionState::Errored;
            warn!(kind = %event.kind, "Capture session interrupted");
        }
        true
    }

    fn teardown_pump(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.cancel.cancel();
            pump.task.abort();
        }
    }
}

impl Drop for CaptureSessionManager {
    fn drop(&mut self) {
        self.teardown_pump();
        if self.source.is_running() {
            self.source.stop();
        }
    }
}
