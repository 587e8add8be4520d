//! Track entity: one physical instance followed across frames

use std::sync::Arc;

use serde::Serialize;

use crate::capture::FrameImage;
use crate::vision::{BoundingBox, Detection, DetectionClass};

/// Smoothing factor for the confidence EMA
pub const CONFIDENCE_ALPHA: f32 = 0.3;

/// Opaque track identifier
pub type TrackId = u64;

/// A tracked physical instance
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    /// Fixed at creation
    pub class: DetectionClass,
    pub bbox: BoundingBox,
    /// Confidence of the latest matched detection
    pub raw_confidence: f32,
    /// Exponentially smoothed confidence
    pub smoothed_confidence: f32,
    /// Frames of continued presence since the last reset
    pub dwell: u32,
    /// Frames remaining before recognition is allowed again
    pub cooldown: u32,
    pub captured: bool,
    pub last_text: Option<String>,
    pub last_text_confidence: f32,
    pub last_seen_frame: u64,
    /// Text the detection source attached most recently
    pub source_text: Option<String>,
    /// Whether a recognition job for this track has not reported back yet
    pub recognition_in_flight: bool,
    /// Frame held while a confirmation for this track is pending
    pub retained_frame: Option<Arc<FrameImage>>,
}

impl Track {
    pub fn new(id: TrackId, detection: &Detection, frame_number: u64) -> Self {
        Self {
            id,
            class: detection.class,
            bbox: detection.bbox,
            raw_confidence: detection.confidence,
            smoothed_confidence: detection.confidence,
            dwell: 0,
            cooldown: 0,
            captured: false,
            last_text: None,
            last_text_confidence: 0.0,
            last_seen_frame: frame_number,
            source_text: detection.text.clone(),
            recognition_in_flight: false,
            retained_frame: None,
        }
    }

    /// Apply a matched detection. Dwell restarts when the track was missed
    /// on the frames in between.
    pub fn update(&mut self, detection: &Detection, frame_number: u64) {
        if frame_number.saturating_sub(self.last_seen_frame) > 1 {
            self.dwell = 0;
        }
        self.bbox = detection.bbox;
        self.raw_confidence = detection.confidence;
        self.smoothed_confidence =
            CONFIDENCE_ALPHA * detection.confidence + (1.0 - CONFIDENCE_ALPHA) * self.smoothed_confidence;
        self.last_seen_frame = frame_number;
        if detection.text.is_some() {
            self.source_text = detection.text.clone();
        }
    }

    pub fn center(&self) -> (f32, f32) {
        self.bbox.center()
    }

    pub fn is_cooling_down(&self) -> bool {
        self.cooldown > 0
    }

    pub fn frames_unseen(&self, current_frame: u64) -> u64 {
        current_frame.saturating_sub(self.last_seen_frame)
    }

    /// Reset dwell and start the cooldown
    pub fn cool_down(&mut self, frames: u32) {
        self.dwell = 0;
        self.cooldown = frames;
    }

    /// Reset dwell only, allowing a retry as soon as dwell builds up again
    pub fn reset_dwell(&mut self) {
        self.dwell = 0;
    }

    pub fn tick_cooldown(&mut self) {
        self.cooldown = self.cooldown.saturating_sub(1);
    }

    /// Drop the retained frame, returning whether one was held
    pub fn release_frame(&mut self) -> bool {
        self.retained_frame.take().is_some()
    }

    /// Read-only view for hosts
    pub fn view(&self) -> TrackView {
        TrackView {
            id: self.id,
            class: self.class,
            bbox: self.bbox,
            confidence: self.smoothed_confidence,
            dwell: self.dwell,
            cooldown: self.cooldown,
            captured: self.captured,
            text: self.last_text.clone(),
        }
    }
}

/// Snapshot of a track for live display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackView {
    pub id: TrackId,
    pub class: DetectionClass,
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub dwell: u32,
    pub cooldown: u32,
    pub captured: bool,
    pub text: Option<String>,
}
