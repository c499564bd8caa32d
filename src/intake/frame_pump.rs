use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower::limit::ConcurrencyLimit;
use tower::{Service, ServiceBuilder, ServiceExt};
use tracing::{debug, trace};

use crate::common::Frame;
use crate::intake::RuntimeErrorEvent;
use crate::pipeline::events::{Generation, PipelineEvent};
use crate::pipeline::services::{CodeRecognizer, FrameThrottler};

/// Per-session delivery task: throttles incoming frames, dispatches
/// recognition passes and forwards runtime errors, all tagged with the
/// session's generation.
pub(crate) struct FramePump {
    throttler: FrameThrottler,
    recognizer: ConcurrencyLimit<CodeRecognizer>,
    generation: Generation,
    events: mpsc::Sender<PipelineEvent>,
}

impl FramePump {
    pub(crate) fn new(
        throttler: FrameThrottler,
        recognizer: CodeRecognizer,
        max_in_flight: usize,
        generation: Generation,
        events: mpsc::Sender<PipelineEvent>,
    ) -> Self {
        let recognizer = ServiceBuilder::new()
            .concurrency_limit(max_in_flight.max(1))
            .service(recognizer);
        Self {
            throttler,
            recognizer,
            generation,
            events,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut frames: mpsc::Receiver<Frame>,
        mut errors: mpsc::Receiver<RuntimeErrorEvent>,
        cancel: CancellationToken,
    ) {
        debug!(generation = %self.generation, "Frame pump started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some(frame) = frames.recv() => self.on_frame(frame),
                Some(event) = errors.recv() => {
                    let event = PipelineEvent::RuntimeError {
                        generation: self.generation,
                        event,
                    };
                    if self.events.send(event).await.is_err() {
                        break;
                    }
                }
                else => break,
            }
        }
        debug!(generation = %self.generation, "Frame pump stopped");
    }

    fn on_frame(&mut self, frame: Frame) {
        if !self.throttler.admit(&frame, Instant::now()) {
            return;
        }

        // Admitted frames are dropped rather than queued when every
        // recognition slot is taken.
        let service = match self.recognizer.ready().now_or_never() {
            Some(Ok(service)) => service,
            Some(Err(never)) => match never {},
            None => {
                trace!(frame_id = %frame.id(), "Recognizer saturated, dropping frame");
                return;
            }
        };

        let pass = service.call(frame);
        let events = self.events.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let pass = match pass.await {
                Ok(pass) => pass,
                Err(never) => match never {},
            };
            let _ = events
                .send(PipelineEvent::Recognized { generation, pass })
                .await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecognitionError;
    use crate::intake::RuntimeErrorKind;
    use crate::pipeline::services::RecognitionEngine;
    use crate::pipeline::types::{DeviceOrientation, ImageOrientation};
    use image::{DynamicImage, ImageBuffer, Luma};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingEngine {
        passes: AtomicUsize,
    }

    impl RecognitionEngine for CountingEngine {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn recognize(
            &self,
            _image: &DynamicImage,
            _orientation: ImageOrientation,
        ) -> Result<Vec<String>, RecognitionError> {
            self.passes.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["012345678905".to_string()])
        }
    }

    fn frame() -> Frame {
        Frame::new(
            DynamicImage::ImageLuma8(ImageBuffer::from_pixel(2, 2, Luma([0u8]))),
            DeviceOrientation::Portrait,
        )
    }

    #[tokio::test]
    async fn tags_recognitions_and_errors_with_generation() {
        let engine = Arc::new(CountingEngine {
            passes: AtomicUsize::new(0),
        });
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let (frame_tx, frame_rx) = mpsc::channel(4);
        let (error_tx, error_rx) = mpsc::channel(4);
        let generation = Generation::default().next();
        let pump = FramePump::new(
            FrameThrottler::new(Duration::ZERO),
            CodeRecognizer::new(engine.clone()),
            2,
            generation,
            events_tx,
        );
        let cancel = CancellationToken::new();
        let task = tokio::spawn(pump.run(frame_rx, error_rx, cancel.clone()));

        frame_tx.send(frame()).await.expect("pump alive");
        match events_rx.recv().await.expect("event") {
            PipelineEvent::Recognized {
                generation: seen,
                pass,
            } => {
                assert_eq!(seen, generation);
                assert_eq!(pass.codes(), &["012345678905".to_string()]);
            }
            other => panic!("unexpected event {other:?}"),
        }

        error_tx
            .send(RuntimeErrorEvent {
                kind: RuntimeErrorKind::DeviceInUse,
                still_running: true,
            })
            .await
            .expect("pump alive");
        match events_rx.recv().await.expect("event") {
            PipelineEvent::RuntimeError { generation: seen, event } => {
                assert_eq!(seen, generation);
                assert_eq!(event.kind, RuntimeErrorKind::DeviceInUse);
            }
            other => panic!("unexpected event {other:?}"),
        }

        cancel.cancel();
        task.await.expect("pump exits cleanly");
        assert_eq!(engine.passes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn throttled_frames_never_reach_the_engine() {
        let engine = Arc::new(CountingEngine {
            passes: AtomicUsize::new(0),
        });
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let mut pump = FramePump::new(
            FrameThrottler::new(Duration::from_secs(60)),
            CodeRecognizer::new(engine.clone()),
            4,
            Generation::default(),
            events_tx,
        );

        for _ in 0..5 {
            pump.on_frame(frame());
        }
        drop(pump);

        let mut recognized = 0;
        while let Some(event) = events_rx.recv().await {
            assert!(matches!(event, PipelineEvent::Recognized { .. }));
            recognized += 1;
        }
        assert_eq!(recognized, 1);
        assert_eq!(engine.passes.load(Ordering::SeqCst), 1);
    }
}
