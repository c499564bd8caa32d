use image::DynamicImage;
use tracing::{debug, trace};

use crate::error::RecognitionError;
use crate::pipeline::services::recognizer::{RecognitionEngine, prepare_luma};
use crate::pipeline::types::ImageOrientation;

/// QR code decoder backed by `rqrr`.
///
/// Frames larger than `max_dimension` on either side are downscaled first;
/// codes held up to a camera stay well above the decoder's minimum module size
/// at that resolution.
pub struct QrEngine {
    max_dimension: u32,
}

impl Default for QrEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QrEngine {
    pub fn new() -> Self {
        Self { max_dimension: 640 }
    }

    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self { max_dimension }
    }
}

impl RecognitionEngine for QrEngine {
    fn name(&self) -> &'static str {
        "rqrr"
    }

    fn recognize(
        &self,
        image: &DynamicImage,
        orientation: ImageOrientation,
    ) -> Result<Vec<String>, RecognitionError> {
        let luma = prepare_luma(image, orientation, self.max_dimension)?;
        let (width, height) = luma.dimensions();
        trace!(width, height, ?orientation, "Prepared grayscale frame");

        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                luma.get_pixel(x as u32, y as u32).0[0]
            });
        let grids = prepared.detect_grids();

        let mut codes = Vec::with_capacity(grids.len());
        for grid in grids {
            match grid.decode() {
                Ok((_, content)) => codes.push(content),
                Err(e) => debug!(error = %e, "Failed to decode grid"),
            }
        }
        Ok(codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    #[test]
    fn blank_frame_has_no_codes() {
        let image = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(64, 48, Luma([255u8])));
        let codes = QrEngine::new()
            .recognize(&image, ImageOrientation::Right)
            .expect("blank frame decodes cleanly");
        assert!(codes.is_empty());
    }

    #[test]
    fn large_frames_are_downscaled_before_decoding() {
        let image = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(1920, 1080, Luma([0u8])));
        let codes = QrEngine::with_max_dimension(320)
            .recognize(&image, ImageOrientation::Up)
            .expect("dark frame decodes cleanly");
        assert!(codes.is_empty());
    }

    #[test]
    fn zero_max_dimension_is_rejected() {
        let image = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(8, 8, Luma([0u8])));
        assert!(QrEngine::with_max_dimension(0)
            .recognize(&image, ImageOrientation::Up)
            .is_err());
    }
}
