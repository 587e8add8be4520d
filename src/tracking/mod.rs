//! Tracking Layer
//!
//! Frame-to-frame identity for detections, plus the rules that decide when a
//! track is worth reading and whether the reading is usable.

pub mod gate;
pub mod registry;
pub mod track;
pub mod triage;

pub use gate::{GateDecision, RecognitionGate, RecognitionJob, SkipReason, FAST_PATH_DWELL_FRAMES};
pub use registry::{Association, Merge, TrackRegistry};
pub use track::{Track, TrackId, TrackView};
pub use triage::{triage, RejectReason, TriageVerdict};
