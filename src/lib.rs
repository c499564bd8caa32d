pub mod common;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod intake;
pub mod pipeline;

#[cfg(test)]
mod testing;

pub use crate::config::{Configuration, LookupSettings};
pub use crate::coordinator::{Pipeline, PipelineBuilder};
pub use crate::error::{AppError, CaptureError, ErrorKind, FetchError, RecognitionError};
pub use crate::pipeline::{EnrichmentRecord, PipelineState, SessionState, StateHandle};
