use chrono::Utc;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::common::Frame;
use crate::error::CaptureError;
use crate::intake::source::{
    CaptureOutput, CaptureSource, DeviceInfo, RuntimeErrorEvent, RuntimeErrorKind,
};
use crate::pipeline::types::DeviceOrientation;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp"];

struct CaptureWorker {
    stop_signal: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Capture source that replays the still images in a directory, in file name
/// order and looping, at a fixed frame rate on its own thread.
///
/// The directory plays the part of the camera: when it holds no images there
/// is no device.
pub struct DirectorySource {
    directory: PathBuf,
    frame_interval: Duration,
    orientation: DeviceOrientation,
    images: Vec<PathBuf>,
    output: Option<CaptureOutput>,
    worker: Option<CaptureWorker>,
}

impl DirectorySource {
    pub fn new(
        directory: impl Into<PathBuf>,
        frames_per_second: u32,
        orientation: DeviceOrientation,
    ) -> Self {
        let frame_interval = Duration::from_secs(1) / frames_per_second.max(1);
        Self {
            directory: directory.into(),
            frame_interval,
            orientation,
            images: Vec::new(),
            output: None,
            worker: None,
        }
    }

    fn list_images(directory: &Path) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(directory = %directory.display(), error = %e, "Cannot read frame directory");
                return Vec::new();
            }
        };
        let mut images: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        images.sort();
        images
    }

    fn decode_all(paths: &[PathBuf]) -> Vec<Arc<DynamicImage>> {
        paths
            .iter()
            .filter_map(|path| match image::open(path) {
                Ok(image) => Some(Arc::new(image)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping undecodable frame");
                    None
                }
            })
            .collect()
    }
}

impl CaptureSource for DirectorySource {
    fn default_device(&self) -> Option<DeviceInfo> {
        if Self::list_images(&self.directory).is_empty() {
            return None;
        }
        let name = self
            .directory
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.directory.display().to_string());
        Some(DeviceInfo {
            id: self.directory.display().to_string(),
            name,
        })
    }

    fn attach_input(&mut self, device: &DeviceInfo) -> Result<(), CaptureError> {
        let images = Self::list_images(Path::new(&device.id));
        if images.is_empty() {
            return Err(CaptureError::AttachInput(format!(
                "no images in {}",
                device.id
            )));
        }
        info!(device = %device.name, frames = images.len(), "Frame directory attached");
        self.directory = PathBuf::from(&device.id);
        self.images = images;
        Ok(())
    }

    fn attach_output(&mut self, output: CaptureOutput) -> Result<(), CaptureError> {
        self.output = Some(output);
        Ok(())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        if self.is_running() {
            return Ok(());
        }
        // A replay that ended on its own is reaped before starting over.
        self.stop();
        let output = self
            .output
            .clone()
            .ok_or_else(|| CaptureError::Start("no output attached".to_string()))?;
        if self.images.is_empty() {
            return Err(CaptureError::Start("no input attached".to_string()));
        }

        let paths = self.images.clone();
        let frame_interval = self.frame_interval;
        let orientation = self.orientation;
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);

        let thread = thread::Builder::new()
            .name("directory-capture".to_string())
            .spawn(move || {
                let frames = Self::decode_all(&paths);
                if frames.is_empty() {
                    output.report(RuntimeErrorEvent {
                        kind: RuntimeErrorKind::Other("no decodable frames".to_string()),
                        still_running: false,
                    });
                    return;
                }

                let mut delivered = 0u64;
                for image in frames.iter().cycle() {
                    if stop_signal_clone.load(Ordering::SeqCst) || output.is_closed() {
                        break;
                    }
                    let frame = Frame::from_shared(Arc::clone(image), orientation, Utc::now());
                    if output.deliver(frame) {
                        delivered += 1;
                    }
                    thread::sleep(frame_interval);
                }
                debug!(delivered, "Directory capture thread exiting");
            })
            .map_err(|e| CaptureError::Start(e.to_string()))?;

        self.worker = Some(CaptureWorker {
            stop_signal,
            thread,
        });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.stop_signal.store(true, Ordering::SeqCst);
        if worker.thread.is_finished() {
            join_worker(worker.thread);
            return;
        }
        // The thread notices the flag within one frame interval. Inside a
        // runtime that wait happens on the blocking pool.
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || join_worker(worker.thread));
            }
            Err(_) => join_worker(worker.thread),
        }
    }

    fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|worker| !worker.thread.is_finished())
            .unwrap_or(false)
    }
}

fn join_worker(thread: JoinHandle<()>) {
    if thread.join().is_err() {
        warn!("Directory capture thread panicked");
    }
}

impl Drop for DirectorySource {
    fn drop(&mut self) {
        self.stop();
    }
}
