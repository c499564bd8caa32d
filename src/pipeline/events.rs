use std::fmt;

use crate::error::FetchError;
use crate::intake::RuntimeErrorEvent;
use crate::pipeline::services::RecognitionPass;
use crate::pipeline::types::EnrichmentRecord;

/// Session identifier. Bumped on every start and stop so that work begun
/// under an older session can be recognised and dropped when it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Requests from the outside world. Nothing else can drive the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
}

/// Completions flowing back into the state-owning controller. Every async
/// operation the pipeline launches reports back with exactly one of these.
#[derive(Debug)]
pub enum PipelineEvent {
    PermissionResolved {
        generation: Generation,
        granted: bool,
    },
    Recognized {
        generation: Generation,
        pass: RecognitionPass,
    },
    Enriched {
        generation: Generation,
        code: String,
        result: Result<EnrichmentRecord, FetchError>,
    },
    RuntimeError {
        generation: Generation,
        event: RuntimeErrorEvent,
    },
}
