pub mod barcode_engine;
pub mod dedup;
pub mod fetcher;
pub mod qr_engine;
pub mod recognizer;
pub mod recovery;
pub mod throttle;

pub use barcode_engine::BarcodeEngine;
pub use dedup::DeduplicationStore;
pub use fetcher::{EnrichmentFetcher, NutritionixFetcher};
pub use qr_engine::QrEngine;
pub use recognizer::{CodeRecognizer, RecognitionEngine, RecognitionPass};
pub use recovery::{RecoveryDecision, RecoveryMonitor};
pub use throttle::FrameThrottler;
