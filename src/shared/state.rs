//! Published engine state, read by hosts for live display

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

use crate::analysis::PendingConfirmation;
use crate::config::CaptureMode;
use crate::tracking::TrackView;
use crate::vision::EnrichedDetection;

/// Snapshot of the engine after the last applied message
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackingSnapshot {
    /// Frames processed since start
    pub frame_number: u64,
    /// Live tracks
    pub tracks: Vec<TrackView>,
    /// Candidate awaiting a decision, if any
    pub pending: Option<PendingConfirmation>,
    /// Detections of the latest frame with their resolved text
    pub detections: Vec<EnrichedDetection>,
    /// Number of confirmed capture points known to the dedup registry
    pub captures: usize,
    pub recording: bool,
    pub mode: CaptureMode,
}

/// Snapshot handle shared between the engine and its hosts
pub type SharedSnapshot = Arc<RwLock<TrackingSnapshot>>;
