use clap::{Parser, ValueEnum};
use nutriscan::config::Configuration;
use nutriscan::coordinator::Pipeline;
use nutriscan::error::AppError;
use nutriscan::intake::{DirectorySource, StaticPermission};
use nutriscan::pipeline::services::{BarcodeEngine, QrEngine, RecognitionEngine};
use nutriscan::pipeline::types::DeviceOrientation;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Scans barcodes from a stream of frames and looks each new one up.
#[derive(Debug, Parser)]
#[command(name = "nutriscan", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of still images replayed as the camera feed
    #[arg(short, long)]
    frames: PathBuf,

    /// Replay rate in frames per second
    #[arg(long, default_value_t = 15)]
    fps: u32,

    /// Device orientation reported with each frame
    #[arg(long, default_value = "portrait")]
    orientation: DeviceOrientation,

    /// Decoder to run on admitted frames
    #[arg(long, value_enum, default_value_t = Engine::Barcode)]
    engine: Engine,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Engine {
    /// Retail 1D barcodes and 2D codes
    Barcode,
    /// QR codes only
    Qr,
}

impl Engine {
    fn build(self) -> Arc<dyn RecognitionEngine> {
        match self {
            Engine::Barcode => Arc::new(BarcodeEngine::new()),
            Engine::Qr => Arc::new(QrEngine::new()),
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging();

    let configuration = Configuration::load(cli.config.as_deref())?;
    if configuration.lookup.app_id.is_empty() || configuration.lookup.app_key.is_empty() {
        warn!("Lookup credentials are not configured, every lookup will be rejected");
    }

    let pipeline = Pipeline::builder(configuration)
        .capture_source(DirectorySource::new(&cli.frames, cli.fps, cli.orientation))
        .permission(Arc::new(StaticPermission::granted()))
        .recognition_engine(cli.engine.build())
        .build()?;
    pipeline.start().await?;

    let mut state = pipeline.state();
    let mut last = state.snapshot();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
            alive = state.changed() => {
                if !alive {
                    break;
                }
                let current = state.snapshot();
                if current.session_state != last.session_state {
                    info!(state = ?current.session_state, "Session state changed");
                }
                if current.ordered_codes.len() > last.ordered_codes.len() {
                    for code in &current.ordered_codes[last.ordered_codes.len()..] {
                        info!(code = code.payload(), "Detected");
                    }
                }
                if current.latest_record != last.latest_record {
                    if let Some(record) = &current.latest_record {
                        info!(
                            code = %record.code,
                            name = %record.name,
                            brand = %record.brand,
                            calories = record.calories,
                            "Product"
                        );
                    }
                }
                if current.last_error != last.last_error {
                    if let Some(error) = &current.last_error {
                        warn!(%error, "Pipeline error");
                    }
                }
                last = current;
            }
        }
    }

    pipeline.stop().await?;
    pipeline.shutdown().await
}
