//! In-crate fakes for the pipeline's collaborators.

use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, Luma};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::common::Frame;
use crate::error::{CaptureError, FetchError, RecognitionError};
use crate::intake::{
    CaptureOutput, CaptureSource, DeviceInfo, PermissionProvider, PermissionStatus,
    RuntimeErrorEvent,
};
use crate::pipeline::services::{EnrichmentFetcher, RecognitionEngine};
use crate::pipeline::types::{DeviceOrientation, EnrichmentRecord, ImageOrientation};

pub fn test_frame() -> Frame {
    Frame::new(
        DynamicImage::ImageLuma8(ImageBuffer::from_pixel(4, 4, Luma([255u8]))),
        DeviceOrientation::Portrait,
    )
}

pub fn soda_record(code: &str) -> EnrichmentRecord {
    EnrichmentRecord {
        code: code.to_string(),
        name: "Soda".to_string(),
        brand: "Acme".to_string(),
        calories: 150.0,
        fat: 0.0,
        protein: 0.0,
        sugar: 39.0,
    }
}

#[derive(Default)]
struct SourceState {
    device_missing: bool,
    start_failure: Option<CaptureError>,
    inputs_attached: usize,
    starts: usize,
    stops: usize,
    running: bool,
    output: Option<CaptureOutput>,
}

/// Test-side view of a `FakeSource` after it has been moved into a pipeline.
#[derive(Clone, Default)]
pub struct SourceHandle {
    inner: Arc<Mutex<SourceState>>,
}

impl SourceHandle {
    fn with<R>(&self, f: impl FnOnce(&mut SourceState) -> R) -> R {
        let mut state = self.inner.lock().expect("fake source lock");
        f(&mut state)
    }

    pub fn remove_device(&self) {
        self.with(|state| state.device_missing = true);
    }

    pub fn fail_start(&self, error: CaptureError) {
        self.with(|state| state.start_failure = Some(error));
    }

    pub fn inputs_attached(&self) -> usize {
        self.with(|state| state.inputs_attached)
    }

    pub fn starts(&self) -> usize {
        self.with(|state| state.starts)
    }

    pub fn stops(&self) -> usize {
        self.with(|state| state.stops)
    }

    pub fn is_running(&self) -> bool {
        self.with(|state| state.running)
    }

    /// Delivers a frame through the most recently attached output. A source
    /// that is not running delivers nothing.
    pub fn push_frame(&self, frame: Frame) -> bool {
        self.with(|state| match (&state.output, state.running) {
            (Some(output), true) => output.deliver(frame),
            _ => false,
        })
    }

    pub fn report(&self, event: RuntimeErrorEvent) {
        self.with(|state| {
            if !event.still_running {
                state.running = false;
            }
            if let Some(output) = &state.output {
                output.report(event);
            }
        });
    }
}

pub struct FakeSource {
    handle: SourceHandle,
}

pub fn fake_source() -> (FakeSource, SourceHandle) {
    let handle = SourceHandle::default();
    (
        FakeSource {
            handle: handle.clone(),
        },
        handle,
    )
}

impl CaptureSource for FakeSource {
    fn default_device(&self) -> Option<DeviceInfo> {
        if self.handle.with(|state| state.device_missing) {
            return None;
        }
        Some(DeviceInfo {
            id: "fake-0".to_string(),
            name: "Fake camera".to_string(),
        })
    }

    fn attach_input(&mut self, _device: &DeviceInfo) -> Result<(), CaptureError> {
        self.handle.with(|state| state.inputs_attached += 1);
        Ok(())
    }

    fn attach_output(&mut self, output: CaptureOutput) -> Result<(), CaptureError> {
        self.handle.with(|state| state.output = Some(output));
        Ok(())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        self.handle.with(|state| {
            if let Some(error) = state.start_failure.clone() {
                return Err(error);
            }
            if state.running {
                return Ok(());
            }
            state.starts += 1;
            state.running = true;
            Ok(())
        })
    }

    fn stop(&mut self) {
        self.handle.with(|state| {
            state.stops += 1;
            state.running = false;
        });
    }

    fn is_running(&self) -> bool {
        self.handle.is_running()
    }
}

/// Engine that replays queued results, then keeps returning `fallback`.
#[derive(Default)]
pub struct ScriptedEngine {
    queue: Mutex<VecDeque<Result<Vec<String>, RecognitionError>>>,
    fallback: Vec<String>,
    passes: AtomicUsize,
}

impl ScriptedEngine {
    pub fn always(codes: &[&str]) -> Self {
        Self {
            fallback: codes.iter().map(|code| code.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn then(self, result: Result<Vec<String>, RecognitionError>) -> Self {
        self.queue.lock().expect("engine lock").push_back(result);
        self
    }

    pub fn passes(&self) -> usize {
        self.passes.load(Ordering::SeqCst)
    }
}

impl RecognitionEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn recognize(
        &self,
        _image: &DynamicImage,
        _orientation: ImageOrientation,
    ) -> Result<Vec<String>, RecognitionError> {
        self.passes.fetch_add(1, Ordering::SeqCst);
        self.queue
            .lock()
            .expect("engine lock")
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Fetcher with canned answers per code. Unknown codes are `NotFound`.
/// With a gate, every call parks until the test hands out a permit.
#[derive(Default)]
pub struct FakeFetcher {
    responses: Mutex<HashMap<String, Result<EnrichmentRecord, FetchError>>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeFetcher {
    pub fn respond(self, code: &str, result: Result<EnrichmentRecord, FetchError>) -> Self {
        self.responses
            .lock()
            .expect("fetcher lock")
            .insert(code.to_string(), result);
        self
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("fetcher lock").clone()
    }
}

#[async_trait]
impl EnrichmentFetcher for FakeFetcher {
    async fn fetch(&self, code: &str) -> Result<EnrichmentRecord, FetchError> {
        self.calls
            .lock()
            .expect("fetcher lock")
            .push(code.to_string());
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate open").forget();
        }
        self.responses
            .lock()
            .expect("fetcher lock")
            .get(code)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::NotFound(code.to_string())))
    }
}

/// Authorized once the test releases the gate.
pub struct GatedPermission {
    gate: Arc<Semaphore>,
}

impl GatedPermission {
    pub fn new(gate: Arc<Semaphore>) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl PermissionProvider for GatedPermission {
    async fn status(&self) -> PermissionStatus {
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        PermissionStatus::Authorized
    }

    async fn request_access(&self) -> bool {
        true
    }
}
