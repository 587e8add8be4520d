//! Vision Layer
//!
//! Value types produced by the detection model, plus the geometry and text
//! helpers the tracker builds on. Model inference and text recognition
//! themselves are external; see [`ocr::TextRecognizer`].

pub mod geometry;
pub mod ocr;
pub mod text;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use geometry::BoundingBox;
pub use ocr::{HintRecognizer, OcrError, OcrResult, RecognitionRequest, TextRecognizer};
pub use text::{BreakerModelValidator, TextShapeValidator};

/// Object classes emitted by the panel detection model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionClass {
    /// Printed label on the panel door or circuit directory
    PanelLabel,
    /// Face of an individual breaker carrying its model number
    BreakerFace,
    /// Generic region containing text
    TextRoi,
    /// The panel enclosure itself
    Panel,
}

impl DetectionClass {
    pub const ALL: [DetectionClass; 4] = [
        DetectionClass::PanelLabel,
        DetectionClass::BreakerFace,
        DetectionClass::TextRoi,
        DetectionClass::Panel,
    ];

    /// Wire label used by the detection model
    pub fn label(&self) -> &'static str {
        match self {
            DetectionClass::PanelLabel => "panel_label",
            DetectionClass::BreakerFace => "breaker_face",
            DetectionClass::TextRoi => "text_roi",
            DetectionClass::Panel => "panel",
        }
    }

    /// Panel labels take the short-dwell, human-judged recognition path
    pub fn is_fast_path(&self) -> bool {
        matches!(self, DetectionClass::PanelLabel)
    }

    /// Whether recognition is ever attempted for this class
    pub fn is_text_bearing(&self) -> bool {
        !matches!(self, DetectionClass::Panel)
    }

    /// Margin added on each side of the box before cropping for recognition
    pub fn crop_margin(&self) -> f32 {
        if self.is_fast_path() {
            0.15
        } else {
            0.10
        }
    }
}

impl fmt::Display for DetectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One detection in one frame. Carries no identity across frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: DetectionClass,
    /// Model confidence (0.0 - 1.0)
    pub confidence: f32,
    pub bbox: BoundingBox,
    /// Text attached by the detection source, if it reads text itself
    #[serde(default)]
    pub text: Option<String>,
}

impl Detection {
    pub fn new(class: DetectionClass, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class,
            confidence,
            bbox,
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// A detection annotated with the track it matched and that track's text,
/// for live display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedDetection {
    pub detection: Detection,
    /// Track the detection was associated with (None if it was gated out)
    pub track_id: Option<u64>,
    /// Last text recognized for that track
    pub resolved_text: Option<String>,
}
