//! panel-scan - replay recorded detection streams through the tracking engine

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

use panel_scan::capture::FrameImage;
use panel_scan::storage::{self, InMemorySession};
use panel_scan::vision::{Detection, HintRecognizer};
use panel_scan::{config, EngineConfig, EngineError, TrackingEngine};

/// panel-scan - detection tracking and capture confirmation engine
#[derive(Parser, Debug)]
#[command(name = "panel-scan")]
#[command(about = "Track panel detections and replay capture sessions")]
struct Args {
    /// Config file to use instead of the one in the platform config dir
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed a recorded detection stream through the engine
    Replay {
        /// JSON file holding the recorded frames
        file: PathBuf,

        /// Answer given to every confirmation prompt
        #[arg(long, value_enum, default_value_t = Decision::Confirm)]
        decision: Decision,

        /// Capture panel labels only
        #[arg(long)]
        label_only: bool,
    },
    /// Print the effective configuration as TOML
    PrintConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Decision {
    Confirm,
    Ignore,
}

/// One recorded frame
#[derive(Debug, Deserialize)]
struct RecordedFrame {
    #[serde(default = "default_width")]
    width: u32,
    #[serde(default = "default_height")]
    height: u32,
    /// Milliseconds to wait after this frame
    #[serde(default = "default_interval")]
    interval_ms: u64,
    #[serde(default)]
    detections: Vec<Detection>,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_interval() -> u64 {
    33
}

/// Time allowed for the last recognitions to report back
const SETTLE_ROUNDS: usize = 20;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = load_or_create_config(args.config.as_deref())?;

    match args.command {
        Command::PrintConfig => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Command::Replay {
            file,
            decision,
            label_only,
        } => {
            let mut config = config;
            if label_only {
                config.confirmation.mode = panel_scan::CaptureMode::LabelOnly;
            }
            replay(&file, config, decision).await?;
        }
    }

    Ok(())
}

/// Load configuration from `path`, or from the platform config dir, or fall
/// back to defaults
fn load_or_create_config(path: Option<&Path>) -> Result<EngineConfig> {
    if let Some(path) = path {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_path) = storage::default_config_path() {
        if config_path.exists() {
            if let Ok(config) = config::load_config(&config_path) {
                info!("Loaded configuration from {:?}", config_path);
                return Ok(config);
            }
            warn!("Ignoring unreadable configuration at {:?}", config_path);
        }
    }
    info!("Using default configuration");
    Ok(EngineConfig::default())
}

async fn replay(file: &Path, config: EngineConfig, decision: Decision) -> Result<()> {
    let content = std::fs::read_to_string(file).with_context(|| format!("Failed to read replay file {:?}", file))?;
    let frames: Vec<RecordedFrame> =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse replay file {:?}", file))?;
    info!("Replaying {} frames from {:?}", frames.len(), file);

    let session = InMemorySession::new();
    let engine = TrackingEngine::start(
        config,
        Arc::new(HintRecognizer::default()),
        Box::new(session.clone()),
    );
    engine.set_recording(true)?;

    let mut answered: Option<Uuid> = None;
    for recorded in frames {
        let frame = Arc::new(FrameImage::blank(recorded.width, recorded.height));
        engine
            .process_frame(recorded.detections, frame)
            .await
            .context("Tracking engine stopped during replay")?;
        tokio::time::sleep(Duration::from_millis(recorded.interval_ms)).await;
        answer_pending(&engine, decision, &mut answered).await?;
    }

    for _ in 0..SETTLE_ROUNDS {
        tokio::time::sleep(Duration::from_millis(50)).await;
        answer_pending(&engine, decision, &mut answered).await?;
    }

    let snapshot = engine.snapshot();
    info!(
        frames = snapshot.frame_number,
        tracks = snapshot.tracks.len(),
        captures = session.len(),
        "Replay finished"
    );
    engine.shutdown().await?;

    println!("{}", serde_json::to_string_pretty(&session.captures())?);
    Ok(())
}

async fn answer_pending(engine: &TrackingEngine, decision: Decision, answered: &mut Option<Uuid>) -> Result<()> {
    let Some(pending) = engine.snapshot().pending else {
        return Ok(());
    };
    if *answered == Some(pending.id) {
        return Ok(());
    }
    *answered = Some(pending.id);

    info!(text = %pending.text, ?decision, "Answering confirmation");
    answer(engine, decision, pending.id).await
}

/// Send one decision. A prompt that cleared between the snapshot and the
/// answer is logged and skipped.
async fn answer(engine: &TrackingEngine, decision: Decision, pending_id: Uuid) -> Result<()> {
    let result = match decision {
        Decision::Confirm => engine.confirm(pending_id).await.map(|_| ()),
        Decision::Ignore => engine.ignore(pending_id).await,
    };
    match result {
        Err(EngineError::Decision(e)) => {
            warn!(%pending_id, "Confirmation already cleared: {}", e);
            Ok(())
        }
        other => other.map_err(anyhow::Error::from),
    }
}
