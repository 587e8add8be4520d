//! Message types delivered to the engine actor's inbox

use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::analysis::{ConfirmOutcome, DecisionError};
use crate::capture::FrameImage;
use crate::config::{CaptureMode, EngineConfig};
use crate::pipeline::{FrameSummary, RecognitionOutcome};
use crate::vision::Detection;

/// Messages sent from the engine handle (and recognition tasks) to the actor
#[derive(Debug)]
pub enum EngineMessage {
    /// One frame of detections plus the image they were found in
    ProcessFrame {
        detections: Vec<Detection>,
        frame: Arc<FrameImage>,
        done: oneshot::Sender<FrameSummary>,
    },
    /// A spawned recognition job reported back
    RecognitionFinished(RecognitionOutcome),
    /// Confirm the pending candidate
    Confirm {
        pending_id: Uuid,
        reply: oneshot::Sender<Result<ConfirmOutcome, DecisionError>>,
    },
    /// Ignore the pending candidate
    Ignore {
        pending_id: Uuid,
        reply: oneshot::Sender<Result<(), DecisionError>>,
    },
    /// Forget tracks, captures and the pending slot
    ResetTracking,
    /// Replace the configuration (clamped on arrival)
    UpdateConfig(EngineConfig),
    /// Toggle the session recording flag
    SetRecording(bool),
    /// Switch between all-classes and label-only capture
    SetCaptureMode(CaptureMode),
}
