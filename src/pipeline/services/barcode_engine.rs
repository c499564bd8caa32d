use image::DynamicImage;
use rxing::Exceptions;
use tracing::{debug, trace};

use crate::error::RecognitionError;
use crate::pipeline::services::recognizer::{RecognitionEngine, prepare_luma};
use crate::pipeline::types::ImageOrientation;

/// Multi-format decoder backed by `rxing`: retail 1D symbologies
/// (UPC-A/E, EAN-8/13, Code 128, ...) as well as 2D codes.
///
/// 1D bars need more horizontal resolution than QR modules, hence the larger
/// default bound.
pub struct BarcodeEngine {
    max_dimension: u32,
}

impl Default for BarcodeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BarcodeEngine {
    pub fn new() -> Self {
        Self {
            max_dimension: 1280,
        }
    }

    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self { max_dimension }
    }
}

impl RecognitionEngine for BarcodeEngine {
    fn name(&self) -> &'static str {
        "rxing"
    }

    fn recognize(
        &self,
        image: &DynamicImage,
        orientation: ImageOrientation,
    ) -> Result<Vec<String>, RecognitionError> {
        let luma = prepare_luma(image, orientation, self.max_dimension)?;
        let (width, height) = luma.dimensions();
        trace!(width, height, ?orientation, "Prepared grayscale frame");

        match rxing::helpers::detect_multiple_in_luma(luma.into_raw(), width, height) {
            Ok(results) => {
                let mut codes: Vec<String> = Vec::with_capacity(results.len());
                for result in &results {
                    debug!(format = ?result.getBarcodeFormat(), "Barcode decoded");
                    let text = result.getText();
                    if !codes.iter().any(|code| code == text) {
                        codes.push(text.to_string());
                    }
                }
                Ok(codes)
            }
            // Nothing in view is the common case, not a failure.
            Err(Exceptions::NotFoundException(_)) => Ok(Vec::new()),
            Err(e) => Err(RecognitionError::Engine(e.to_string())),
        }
    }
}
