use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Configuration;
use crate::error::AppError;
use crate::intake::{
    CaptureSessionManager, CaptureSource, PermissionProvider, SessionSettings, StaticPermission,
};
use crate::pipeline::controller::PipelineController;
use crate::pipeline::events::Command;
use crate::pipeline::services::{
    BarcodeEngine, CodeRecognizer, EnrichmentFetcher, NutritionixFetcher, RecognitionEngine,
};
use crate::pipeline::types::{PipelineState, StateHandle};

const COMMAND_BUFFER_SIZE: usize = 16;

/// Running pipeline. `start()` and `stop()` are the only controls; everything
/// else is observed through the published state.
pub struct Pipeline {
    command_tx: mpsc::Sender<Command>,
    state: StateHandle,
    controller_task: Option<JoinHandle<()>>,
    cancel_token: CancellationToken,
}

impl Pipeline {
    pub fn builder(configuration: Configuration) -> PipelineBuilder {
        PipelineBuilder::new(configuration)
    }

    pub async fn start(&self) -> Result<(), AppError> {
        self.send(Command::Start).await
    }

    pub async fn stop(&self) -> Result<(), AppError> {
        self.send(Command::Stop).await
    }

    async fn send(&self, command: Command) -> Result<(), AppError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| AppError::Pipeline("Pipeline controller has shut down".to_string()))
    }

    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    pub fn snapshot(&self) -> PipelineState {
        self.state.snapshot()
    }

    /// Stops any running session and waits for the controller to exit.
    pub async fn shutdown(mut self) -> Result<(), AppError> {
        self.cancel_token.cancel();
        if let Some(task) = self.controller_task.take() {
            task.await
                .map_err(|e| AppError::Pipeline(format!("Controller task failed: {}", e)))?;
        }
        info!("Pipeline shut down");
        Ok(())
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

pub struct PipelineBuilder {
    configuration: Configuration,
    source: Option<Box<dyn CaptureSource>>,
    permission: Option<Arc<dyn PermissionProvider>>,
    engine: Option<Arc<dyn RecognitionEngine>>,
    fetcher: Option<Arc<dyn EnrichmentFetcher>>,
}

impl PipelineBuilder {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            source: None,
            permission: None,
            engine: None,
            fetcher: None,
        }
    }

    // Sets the minimum gap between admitted frames, this will override the default configuration.
    pub fn throttle_interval(mut self, interval: Duration) -> Self {
        self.configuration.throttle_interval_ms = interval.as_millis() as u64;
        self
    }

    // Caps concurrent recognition passes, this will override the default configuration.
    pub fn max_in_flight_recognitions(mut self, max_in_flight: usize) -> Self {
        self.configuration.max_in_flight_recognitions = max_in_flight;
        self
    }

    // Adjusts the frame buffer size, this will override the default configuration.
    pub fn frame_buffer_size(mut self, frame_buffer_size: usize) -> Self {
        self.configuration.frame_buffer_size = frame_buffer_size;
        self
    }

    // Adjusts the event buffer size, this will override the default configuration.
    pub fn event_buffer_size(mut self, event_buffer_size: usize) -> Self {
        self.configuration.event_buffer_size = event_buffer_size;
        self
    }

    pub fn capture_source(mut self, source: impl CaptureSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Defaults to always granted.
    pub fn permission(mut self, permission: Arc<dyn PermissionProvider>) -> Self {
        self.permission = Some(permission);
        self
    }

    // Defaults to the multi-format barcode engine.
    pub fn recognition_engine(mut self, engine: Arc<dyn RecognitionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    // Defaults to the HTTP fetcher built from the lookup configuration.
    pub fn fetcher(mut self, fetcher: Arc<dyn EnrichmentFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Spawns the controller task, so this must run inside a tokio runtime.
    pub fn build(self) -> Result<Pipeline, AppError> {
        let source = self
            .source
            .ok_or(AppError::Pipeline("Capture source not set".to_string()))?;
        let fetcher: Arc<dyn EnrichmentFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(NutritionixFetcher::new(&self.configuration.lookup)?),
        };
        let engine = self.engine.unwrap_or_else(|| Arc::new(BarcodeEngine::new()));
        let permission = self
            .permission
            .unwrap_or_else(|| Arc::new(StaticPermission::granted()));
        debug!(engine = engine.name(), configuration = ?self.configuration, "Building pipeline");

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let (events_tx, events_rx) = mpsc::channel(self.configuration.event_buffer_size.max(1));
        let (state_tx, state_rx) = watch::channel(PipelineState::default());

        let session = CaptureSessionManager::new(
            source,
            permission,
            CodeRecognizer::new(engine),
            SessionSettings {
                throttle_interval: self.configuration.throttle_interval(),
                max_in_flight_recognitions: self.configuration.max_in_flight_recognitions,
                frame_buffer_size: self.configuration.frame_buffer_size,
            },
            events_tx.clone(),
        );
        let controller = PipelineController::new(session, fetcher, events_tx, state_tx);

        let cancel_token = CancellationToken::new();
        let controller_task =
            tokio::spawn(controller.run(command_rx, events_rx, cancel_token.clone()));

        Ok(Pipeline {
            command_tx,
            state: StateHandle::new(state_rx),
            controller_task: Some(controller_task),
            cancel_token,
        })
    }
}
