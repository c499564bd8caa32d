use futures::future::BoxFuture;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::common::Frame;
use crate::error::RecognitionError;
use crate::pipeline::types::ImageOrientation;

/// A synchronous decoder. Implementations receive the raw sensor buffer and
/// the orientation it must be read in.
pub trait RecognitionEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn recognize(
        &self,
        image: &DynamicImage,
        orientation: ImageOrientation,
    ) -> Result<Vec<String>, RecognitionError>;
}

/// Rotates `image` upright, shrinks it to fit `max_dimension` and converts
/// it to 8-bit grayscale, the common input of every engine.
pub(crate) fn prepare_luma(
    image: &DynamicImage,
    orientation: ImageOrientation,
    max_dimension: u32,
) -> Result<GrayImage, RecognitionError> {
    if max_dimension == 0 {
        return Err(RecognitionError::Engine(
            "max dimension must be positive".to_string(),
        ));
    }
    let upright = orientation.upright(image);
    if upright.width() > max_dimension || upright.height() > max_dimension {
        Ok(upright
            .resize(max_dimension, max_dimension, FilterType::Triangle)
            .to_luma8())
    } else {
        Ok(upright.to_luma8())
    }
}

/// Result of one recognition pass over one admitted frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionPass {
    pub frame_id: Uuid,
    pub result: Result<Vec<String>, RecognitionError>,
}

impl RecognitionPass {
    /// Decoded payloads, or nothing when the pass failed.
    pub fn codes(&self) -> &[String] {
        match &self.result {
            Ok(codes) => codes.as_slice(),
            Err(_) => &[],
        }
    }
}

/// Runs the engine on the blocking pool, one pass per frame.
#[derive(Clone)]
pub struct CodeRecognizer {
    engine: Arc<dyn RecognitionEngine>,
}

impl CodeRecognizer {
    pub fn new(engine: Arc<dyn RecognitionEngine>) -> Self {
        Self { engine }
    }

    /// Decoded payloads for `frame`. A failed pass is logged and yields an
    /// empty list.
    pub async fn recognize(&self, frame: Frame) -> Vec<String> {
        let frame_id = frame.id();
        match self.try_recognize(frame).await {
            Ok(codes) => codes,
            Err(e) => {
                warn!(%frame_id, error = %e, "Recognition pass failed");
                Vec::new()
            }
        }
    }

    pub async fn try_recognize(&self, frame: Frame) -> Result<Vec<String>, RecognitionError> {
        let engine = Arc::clone(&self.engine);
        let orientation = ImageOrientation::from(frame.orientation());
        let frame_id = frame.id();
        let captured_at = frame.captured_at();

        let codes = tokio::task::spawn_blocking(move || {
            let image = frame.image();
            if image.width() == 0 || image.height() == 0 {
                return Err(RecognitionError::EmptyFrame(image.width(), image.height()));
            }
            engine.recognize(image, orientation)
        })
        .await
        .map_err(|e| RecognitionError::Aborted(e.to_string()))??;

        let codes: Vec<String> = codes.into_iter().filter(|code| !code.is_empty()).collect();
        debug!(
            %frame_id,
            %captured_at,
            engine = self.engine.name(),
            count = codes.len(),
            "Recognition pass complete"
        );
        Ok(codes)
    }
}

impl Service<Frame> for CodeRecognizer {
    type Response = RecognitionPass;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, frame: Frame) -> Self::Future {
        let recognizer = self.clone();
        Box::pin(async move {
            let frame_id = frame.id();
            let result = recognizer.try_recognize(frame).await;
            Ok(RecognitionPass { frame_id, result })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::DeviceOrientation;
    use image::{ImageBuffer, Luma};
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct RecordingEngine {
        seen: Mutex<Vec<ImageOrientation>>,
        output: Result<Vec<String>, RecognitionError>,
    }

    impl RecognitionEngine for RecordingEngine {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn recognize(
            &self,
            _image: &DynamicImage,
            orientation: ImageOrientation,
        ) -> Result<Vec<String>, RecognitionError> {
            self.seen.lock().unwrap().push(orientation);
            self.output.clone()
        }
    }

    fn frame(width: u32, height: u32, orientation: DeviceOrientation) -> Frame {
        Frame::new(
            DynamicImage::ImageLuma8(ImageBuffer::from_pixel(width, height, Luma([255u8]))),
            orientation,
        )
    }

    #[tokio::test]
    async fn engine_receives_corrected_orientation() {
        let engine = Arc::new(RecordingEngine {
            seen: Mutex::new(Vec::new()),
            output: Ok(vec!["012345678905".to_string()]),
        });
        let recognizer = CodeRecognizer::new(engine.clone());

        let codes = recognizer
            .recognize(frame(4, 4, DeviceOrientation::LandscapeRight))
            .await;

        assert_eq!(codes, vec!["012345678905".to_string()]);
        assert_eq!(*engine.seen.lock().unwrap(), vec![ImageOrientation::Down]);
    }

    #[tokio::test]
    async fn engine_failure_yields_empty_result() {
        let engine = Arc::new(RecordingEngine {
            seen: Mutex::new(Vec::new()),
            output: Err(RecognitionError::Engine("sensor noise".into())),
        });
        let recognizer = CodeRecognizer::new(engine);

        let codes = recognizer
            .recognize(frame(4, 4, DeviceOrientation::Portrait))
            .await;
        assert!(codes.is_empty());
    }

    #[tokio::test]
    async fn empty_frame_never_reaches_engine() {
        let engine = Arc::new(RecordingEngine {
            seen: Mutex::new(Vec::new()),
            output: Ok(vec!["x".to_string()]),
        });
        let recognizer = CodeRecognizer::new(engine.clone());

        let result = recognizer
            .try_recognize(frame(0, 0, DeviceOrientation::Portrait))
            .await;
        assert_eq!(result, Err(RecognitionError::EmptyFrame(0, 0)));
        assert!(engine.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn service_drops_empty_payloads() {
        let engine = Arc::new(RecordingEngine {
            seen: Mutex::new(Vec::new()),
            output: Ok(vec![String::new(), "4006381333931".to_string()]),
        });
        let pass = CodeRecognizer::new(engine)
            .oneshot(frame(2, 2, DeviceOrientation::Unknown))
            .await
            .expect("infallible");
        assert_eq!(pass.codes(), &["4006381333931".to_string()]);
    }
}
