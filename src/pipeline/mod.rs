pub(crate) mod controller;
pub mod events;
pub mod services;
pub mod types;

pub use services::{
    BarcodeEngine, CodeRecognizer, DeduplicationStore, EnrichmentFetcher, FrameThrottler,
    NutritionixFetcher, QrEngine, RecognitionEngine, RecoveryMonitor,
};
pub use types::{
    DetectedCode, DeviceOrientation, EnrichmentRecord, PipelineState, PipelineStats,
    SessionState, StateHandle,
};
