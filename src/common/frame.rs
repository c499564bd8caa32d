use chrono::{DateTime, Utc};
use image::DynamicImage;
use std::sync::Arc;
use uuid::Uuid;

use crate::pipeline::types::DeviceOrientation;

/// One captured image. The pixel buffer is shared, so handing a frame to a
/// recognition pass never copies it.
#[derive(Debug, Clone)]
pub struct Frame {
    id: Uuid,
    image: Arc<DynamicImage>,
    captured_at: DateTime<Utc>,
    orientation: DeviceOrientation,
}

impl Frame {
    pub fn new(image: DynamicImage, orientation: DeviceOrientation) -> Self {
        Self::with_timestamp(image, orientation, Utc::now())
    }

    pub fn with_timestamp(
        image: DynamicImage,
        orientation: DeviceOrientation,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self::from_shared(Arc::new(image), orientation, captured_at)
    }

    /// Wraps a buffer the caller keeps a handle to, e.g. a replayed still.
    pub fn from_shared(
        image: Arc<DynamicImage>,
        orientation: DeviceOrientation,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            image,
            captured_at,
            orientation,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn orientation(&self) -> DeviceOrientation {
        self.orientation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn cloning_frame_shares_image_buffer() {
        let img: DynamicImage = DynamicImage::ImageRgb8(
            ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(16, 16, Rgb([1, 2, 3])),
        );
        let f1 = Frame::new(img, DeviceOrientation::Portrait);
        let f2 = f1.clone();
        assert!(Arc::ptr_eq(&f1.image, &f2.image));
        assert_eq!(f1.id(), f2.id());
    }
}
