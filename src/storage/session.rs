//! Session state sink
//!
//! The authoritative list of confirmed captures belongs to the host. The
//! engine only writes to it, and only from the confirm path.

use image::RgbaImage;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

use crate::vision::BoundingBox;

/// Receiver of confirmed captures
pub trait SessionSink: Send {
    /// A confirmed panel label
    fn capture_label(&mut self, text: &str, confidence: f32, crop: Option<RgbaImage>);

    /// A confirmed item (breaker or other text region)
    fn capture_item(
        &mut self,
        text: &str,
        confidence: f32,
        recognition_confidence: f32,
        bbox: BoundingBox,
        crop: Option<RgbaImage>,
    );
}

/// Kind of confirmed capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureKind {
    Label,
    Item,
}

/// One confirmed capture
#[derive(Debug, Clone, Serialize)]
pub struct SessionCapture {
    pub kind: CaptureKind,
    pub text: String,
    /// Recognition confidence for labels, detection confidence for items
    pub confidence: f32,
    pub recognition_confidence: Option<f32>,
    pub bbox: Option<BoundingBox>,
    /// Crop dimensions, if a crop was attached
    pub crop_size: Option<(u32, u32)>,
    #[serde(skip)]
    pub crop: Option<RgbaImage>,
}

/// In-memory session. Clones share the same capture list.
#[derive(Debug, Clone, Default)]
pub struct InMemorySession {
    captures: Arc<Mutex<Vec<SessionCapture>>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every capture recorded so far
    pub fn captures(&self) -> Vec<SessionCapture> {
        self.captures.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.captures.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.lock().is_empty()
    }
}

impl SessionSink for InMemorySession {
    fn capture_label(&mut self, text: &str, confidence: f32, crop: Option<RgbaImage>) {
        self.captures.lock().push(SessionCapture {
            kind: CaptureKind::Label,
            text: text.to_string(),
            confidence,
            recognition_confidence: None,
            bbox: None,
            crop_size: crop.as_ref().map(|c| c.dimensions()),
            crop,
        });
    }

    fn capture_item(
        &mut self,
        text: &str,
        confidence: f32,
        recognition_confidence: f32,
        bbox: BoundingBox,
        crop: Option<RgbaImage>,
    ) {
        self.captures.lock().push(SessionCapture {
            kind: CaptureKind::Item,
            text: text.to_string(),
            confidence,
            recognition_confidence: Some(recognition_confidence),
            bbox: Some(bbox),
            crop_size: crop.as_ref().map(|c| c.dimensions()),
            crop,
        });
    }
}
