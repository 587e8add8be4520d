//! Recognition Gate
//!
//! Decides per matched track per frame whether the track is stable enough to
//! be worth a recognition job, and cuts the region the job will read.

use std::sync::Arc;

use super::track::{Track, TrackId};
use crate::capture::{CropError, FrameImage};
use crate::config::{CaptureMode, RecognitionSettings};
use crate::vision::RecognitionRequest;

/// Dwell required before a panel label is read. Not zero, so the first
/// motion-blurred frames are skipped.
pub const FAST_PATH_DWELL_FRAMES: u32 = 2;

/// Why a track was not considered this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The track holds the pending confirmation
    PendingConfirmation,
    /// A job for the track has not reported back
    InFlight,
    Captured,
    CoolingDown,
    /// The class is never read (or not in the current capture mode)
    NotEligible,
}

/// Gate verdict for one track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Skip(SkipReason),
    /// Still building dwell
    Wait { dwell: u32, required: u32 },
    /// Dispatch a recognition job now
    Fire,
}

/// Stateless gate over a track's counters
#[derive(Debug, Clone, Copy, Default)]
pub struct RecognitionGate;

impl RecognitionGate {
    /// Evaluate a matched track, advancing its dwell when it is eligible.
    pub fn evaluate(
        &self,
        track: &mut Track,
        pending_track: Option<TrackId>,
        settings: &RecognitionSettings,
        mode: CaptureMode,
    ) -> GateDecision {
        if pending_track == Some(track.id) {
            return GateDecision::Skip(SkipReason::PendingConfirmation);
        }
        if track.recognition_in_flight {
            return GateDecision::Skip(SkipReason::InFlight);
        }
        if track.captured {
            return GateDecision::Skip(SkipReason::Captured);
        }
        if track.is_cooling_down() {
            return GateDecision::Skip(SkipReason::CoolingDown);
        }
        if !is_eligible(track, mode) {
            return GateDecision::Skip(SkipReason::NotEligible);
        }

        let required = required_dwell(track, settings);
        track.dwell = track.dwell.saturating_add(1);

        if track.dwell >= required {
            GateDecision::Fire
        } else {
            GateDecision::Wait {
                dwell: track.dwell,
                required,
            }
        }
    }

    /// Cut the track's region out of `frame` and package it as a job.
    pub fn prepare_job(&self, track: &Track, frame: &Arc<FrameImage>) -> Result<RecognitionJob, CropError> {
        let region = frame.crop(&track.bbox, track.class.crop_margin())?;
        Ok(RecognitionJob {
            request: RecognitionRequest {
                track_id: track.id,
                class: track.class,
                region,
                hint: track.source_text.clone(),
            },
            frame: Arc::clone(frame),
        })
    }
}

fn is_eligible(track: &Track, mode: CaptureMode) -> bool {
    match mode {
        CaptureMode::All => track.class.is_text_bearing(),
        CaptureMode::LabelOnly => track.class.is_fast_path(),
    }
}

fn required_dwell(track: &Track, settings: &RecognitionSettings) -> u32 {
    if track.class.is_fast_path() {
        FAST_PATH_DWELL_FRAMES
    } else {
        settings.dwell_frames
    }
}

/// A recognition job ready for dispatch
#[derive(Debug, Clone)]
pub struct RecognitionJob {
    pub request: RecognitionRequest,
    /// Frame the region was cut from; retained if the result is prompted
    pub frame: Arc<FrameImage>,
}
