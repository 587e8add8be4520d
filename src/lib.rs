//! panel-scan - Detection tracking and human-confirmed capture for
//! electrical panel inventory
//!
//! Turns a noisy stream of per-frame detections into a deduplicated list of
//! items a person has confirmed, reading text only from tracks that have
//! stayed in view long enough to be worth it.

pub mod analysis;
pub mod app;
pub mod capture;
pub mod config;
pub mod pipeline;
pub mod shared;
pub mod storage;
pub mod tracking;
pub mod vision;

pub use app::{EngineError, TrackingEngine};
pub use config::{CaptureMode, EngineConfig};
pub use pipeline::{FrameSummary, TrackingPipeline};
