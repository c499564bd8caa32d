mod detected_code;
mod enrichment_record;
mod orientation;
mod state;

pub use detected_code::DetectedCode;
pub use enrichment_record::{EnrichmentRecord, FoodItem, LookupResponse};
pub use orientation::{DeviceOrientation, ImageOrientation};
pub use state::{PipelineState, PipelineStats, SessionState, StateHandle};
