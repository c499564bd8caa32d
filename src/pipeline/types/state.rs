use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::ErrorKind;
use crate::pipeline::types::{DetectedCode, EnrichmentRecord};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
    Errored,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PipelineStats {
    pub recognition_passes: u64,
    pub recognition_failures: u64,
    pub duplicate_detections: u64,
    pub lookups_started: u64,
    pub stale_results_dropped: u64,
}

/// Snapshot of everything the pipeline publishes to its readers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineState {
    pub session_state: SessionState,
    pub ordered_codes: Vec<DetectedCode>,
    pub latest_record: Option<EnrichmentRecord>,
    pub last_error: Option<ErrorKind>,
    pub stats: PipelineStats,
}

impl PipelineState {
    pub fn contains_code(&self, payload: &str) -> bool {
        self.ordered_codes.iter().any(|code| code.payload() == payload)
    }

    pub fn payloads(&self) -> impl Iterator<Item = &str> {
        self.ordered_codes.iter().map(DetectedCode::payload)
    }
}

/// Read side of the published state. Cloning is cheap; every clone sees the
/// same last-published snapshot.
#[derive(Debug, Clone)]
pub struct StateHandle {
    rx: watch::Receiver<PipelineState>,
}

impl StateHandle {
    pub(crate) fn new(rx: watch::Receiver<PipelineState>) -> Self {
        Self { rx }
    }

    pub fn snapshot(&self) -> PipelineState {
        self.rx.borrow().clone()
    }

    /// Waits for the next publish. Returns `false` once the pipeline is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Waits until a published snapshot satisfies `predicate` and returns it.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&PipelineState) -> bool,
    ) -> Option<PipelineState> {
        self.rx
            .wait_for(|state| predicate(state))
            .await
            .ok()
            .map(|state| state.clone())
    }
}
