use tracing::{info, warn};

use crate::intake::RuntimeErrorEvent;
use crate::pipeline::types::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    /// Start the session again.
    Restart,
    /// Keep the error in the published state and leave the session alone.
    Record,
}

/// Decides what happens after the capture source reports a runtime error.
///
/// Only transient faults are restarted, and only once the session has
/// actually stopped running. Persistent device failures stay visible instead
/// of looping through restarts.
#[derive(Debug, Default)]
pub struct RecoveryMonitor {
    restarts: u64,
}

impl RecoveryMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_runtime_error(
        &mut self,
        event: &RuntimeErrorEvent,
        session_state: SessionState,
    ) -> RecoveryDecision {
        warn!(kind = %event.kind, still_running = event.still_running, "Capture runtime error");

        let running = event.still_running || session_state == SessionState::Running;
        if event.kind.is_recoverable() && !running {
            self.restarts += 1;
            info!(kind = %event.kind, restarts = self.restarts, "Restarting capture session");
            RecoveryDecision::Restart
        } else {
            RecoveryDecision::Record
        }
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }
}
