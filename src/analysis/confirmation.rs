//! Confirmation Coordinator
//!
//! Single-slot state machine between recognition and the human. At most one
//! candidate is surfaced at a time; it leaves the slot through confirm,
//! ignore or timeout. Only confirm writes to the capture registry and the
//! session.
//!
//! ```text
//! Idle --offer--> AwaitingConfirmation --confirm/ignore/timeout--> Idle
//! ```

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dedup::CaptureRegistry;
use super::events::{ClearReason, EventEmitter, SuppressReason, TrackingEvent};
use crate::capture::FrameImage;
use crate::config::{CaptureMode, EngineConfig};
use crate::storage::SessionSink;
use crate::tracking::{TrackId, TrackRegistry};
use crate::vision::text::fuzzy_eq;
use crate::vision::{BoundingBox, DetectionClass};

/// The candidate currently awaiting a human decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingConfirmation {
    pub id: Uuid,
    pub track_id: TrackId,
    pub text: String,
    /// Recognition confidence
    pub confidence: f32,
    /// Track box when the text was read
    pub bbox: BoundingBox,
    pub class: DetectionClass,
    #[serde(skip)]
    pub created_at: Instant,
}

impl PendingConfirmation {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

/// A triaged recognition result offered for confirmation
#[derive(Debug, Clone)]
pub struct Candidate {
    pub track_id: TrackId,
    pub class: DetectionClass,
    pub text: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    /// Frame the text was read from
    pub frame: Arc<FrameImage>,
}

/// Result of offering a candidate
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Prompted(PendingConfirmation),
    Suppressed(SuppressReason),
}

/// Result of a confirm decision
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    Captured { text: String, center: (f32, f32) },
    /// Track or frame vanished; the slot was cleared without a capture
    Anomaly,
}

/// A user decision that does not apply to the live slot
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecisionError {
    #[error("No confirmation is pending")]
    NoPending,
    #[error("Confirmation {got} is not the pending one ({expected})")]
    Mismatch { expected: Uuid, got: Uuid },
}

/// Owns the pending slot, the prompting set, the capture registry and the
/// session sink.
pub struct ConfirmationCoordinator {
    pending: Option<PendingConfirmation>,
    prompting: HashSet<String>,
    captures: CaptureRegistry,
    session: Box<dyn SessionSink>,
    recording: bool,
}

impl ConfirmationCoordinator {
    pub fn new(session: Box<dyn SessionSink>, fuzzy_distance: usize) -> Self {
        Self {
            pending: None,
            prompting: HashSet::new(),
            captures: CaptureRegistry::new(fuzzy_distance),
            session,
            recording: false,
        }
    }

    pub fn pending(&self) -> Option<&PendingConfirmation> {
        self.pending.as_ref()
    }

    pub fn pending_track(&self) -> Option<TrackId> {
        self.pending.as_ref().map(|p| p.track_id)
    }

    /// Track held by a pending confirmation that has not yet expired
    pub fn live_pending_track(&self, now: Instant, timeout: Duration) -> Option<TrackId> {
        self.pending
            .as_ref()
            .filter(|p| p.age(now) < timeout)
            .map(|p| p.track_id)
    }

    pub fn captures(&self) -> &CaptureRegistry {
        &self.captures
    }

    pub fn is_prompting(&self, text: &str) -> bool {
        self.prompting.contains(text)
    }

    pub fn prompting_len(&self) -> usize {
        self.prompting.len()
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    pub fn set_fuzzy_distance(&mut self, fuzzy_distance: usize) {
        self.captures.set_fuzzy_distance(fuzzy_distance);
    }

    /// Try to move `candidate` into the pending slot.
    pub fn offer(
        &mut self,
        candidate: Candidate,
        tracks: &mut TrackRegistry,
        config: &EngineConfig,
        now: Instant,
        events: &EventEmitter,
    ) -> Admission {
        let fast_path = candidate.class.is_fast_path();
        let center = candidate.bbox.center();
        let fuzzy = config.tracking.fuzzy_distance;

        let verdict = if config.confirmation.mode == CaptureMode::LabelOnly && !fast_path {
            Some(SuppressReason::ModeFiltered)
        } else if !self.recording {
            Some(SuppressReason::NotRecording)
        } else if self.prompting.iter().any(|t| fuzzy_eq(t, &candidate.text, fuzzy)) {
            Some(SuppressReason::AlreadyPrompting)
        } else if self.captures.is_duplicate(&candidate.text, center, fast_path) {
            Some(SuppressReason::Duplicate)
        } else if self.pending.is_some() {
            Some(SuppressReason::SlotBusy)
        } else {
            None
        };

        if let Some(reason) = verdict {
            if let Some(track) = tracks.get_mut(candidate.track_id) {
                match reason {
                    SuppressReason::Duplicate => track.cool_down(config.tracking.cooldown_frames),
                    _ => track.reset_dwell(),
                }
            }
            if reason != SuppressReason::ModeFiltered {
                debug!(track_id = candidate.track_id, text = %candidate.text, ?reason, "Candidate suppressed");
                events.emit(TrackingEvent::CandidateSuppressed {
                    track_id: candidate.track_id,
                    text: candidate.text,
                    reason,
                });
            }
            return Admission::Suppressed(reason);
        }

        let pending = PendingConfirmation {
            id: Uuid::new_v4(),
            track_id: candidate.track_id,
            text: candidate.text.clone(),
            confidence: candidate.confidence,
            bbox: candidate.bbox,
            class: candidate.class,
            created_at: now,
        };

        if let Some(track) = tracks.get_mut(candidate.track_id) {
            track.retained_frame = Some(candidate.frame);
        }
        self.prompting.insert(candidate.text);
        self.pending = Some(pending.clone());

        info!(
            pending_id = %pending.id,
            track_id = pending.track_id,
            text = %pending.text,
            "Awaiting confirmation"
        );
        events.emit(TrackingEvent::ConfirmationRequested {
            pending: pending.clone(),
        });

        Admission::Prompted(pending)
    }

    fn take_pending(&mut self, pending_id: Uuid) -> Result<PendingConfirmation, DecisionError> {
        match &self.pending {
            None => Err(DecisionError::NoPending),
            Some(p) if p.id != pending_id => Err(DecisionError::Mismatch {
                expected: p.id,
                got: pending_id,
            }),
            Some(_) => {
                let pending = self.pending.take().ok_or(DecisionError::NoPending)?;
                self.prompting.remove(&pending.text);
                Ok(pending)
            }
        }
    }

    /// Record the pending candidate as a capture.
    pub fn confirm(
        &mut self,
        pending_id: Uuid,
        tracks: &mut TrackRegistry,
        config: &EngineConfig,
        events: &EventEmitter,
    ) -> Result<ConfirmOutcome, DecisionError> {
        let pending = self.take_pending(pending_id)?;

        let frame = tracks
            .get_mut(pending.track_id)
            .and_then(|track| track.retained_frame.take());
        let (Some(frame), Some(track)) = (frame, tracks.get_mut(pending.track_id)) else {
            warn!(
                pending_id = %pending.id,
                track_id = pending.track_id,
                "Confirmed track or its frame is gone; dropping confirmation"
            );
            events.emit(TrackingEvent::ConfirmationCleared {
                pending_id: pending.id,
                track_id: pending.track_id,
                text: pending.text,
                reason: ClearReason::Anomaly,
            });
            return Ok(ConfirmOutcome::Anomaly);
        };

        track.captured = true;
        track.cool_down(config.tracking.cooldown_frames);
        track.last_text = Some(pending.text.clone());
        let center = track.center();
        let detection_confidence = track.smoothed_confidence;

        self.captures.insert(&pending.text, center);

        let crop = frame.crop(&pending.bbox, pending.class.crop_margin()).ok();
        if pending.class.is_fast_path() {
            self.session.capture_label(&pending.text, pending.confidence, crop);
        } else {
            self.session.capture_item(
                &pending.text,
                detection_confidence,
                pending.confidence,
                pending.bbox,
                crop,
            );
        }
        drop(frame);

        info!(pending_id = %pending.id, text = %pending.text, "Captured");
        events.emit(TrackingEvent::ItemCaptured {
            pending_id: pending.id,
            track_id: pending.track_id,
            text: pending.text.clone(),
            class: pending.class,
            center,
        });

        Ok(ConfirmOutcome::Captured {
            text: pending.text,
            center,
        })
    }

    /// Drop the pending candidate without a trace; its track retries at once.
    pub fn ignore(
        &mut self,
        pending_id: Uuid,
        tracks: &mut TrackRegistry,
        events: &EventEmitter,
    ) -> Result<(), DecisionError> {
        let pending = self.take_pending(pending_id)?;
        self.release(pending, ClearReason::Ignored, tracks, events);
        Ok(())
    }

    /// Clear the pending candidate if it is at least `timeout` old.
    pub fn expire(
        &mut self,
        now: Instant,
        timeout: Duration,
        tracks: &mut TrackRegistry,
        events: &EventEmitter,
    ) -> Option<PendingConfirmation> {
        let expired = self.pending.as_ref().is_some_and(|p| p.age(now) >= timeout);
        if !expired {
            return None;
        }

        let pending = self.pending.take()?;
        self.prompting.remove(&pending.text);
        self.release(pending.clone(), ClearReason::TimedOut, tracks, events);
        Some(pending)
    }

    fn release(
        &mut self,
        pending: PendingConfirmation,
        reason: ClearReason,
        tracks: &mut TrackRegistry,
        events: &EventEmitter,
    ) {
        match tracks.get_mut(pending.track_id) {
            Some(track) => {
                track.reset_dwell();
                track.release_frame();
            }
            None => debug!(track_id = pending.track_id, "Released confirmation for evicted track"),
        }

        info!(pending_id = %pending.id, text = %pending.text, ?reason, "Confirmation cleared");
        events.emit(TrackingEvent::ConfirmationCleared {
            pending_id: pending.id,
            track_id: pending.track_id,
            text: pending.text,
            reason,
        });
    }

    /// Forget the pending slot, the prompting set and every capture. The
    /// session sink is left alone.
    pub fn reset(&mut self, tracks: &mut TrackRegistry, events: &EventEmitter) {
        if let Some(pending) = self.pending.take() {
            self.release(pending, ClearReason::Reset, tracks, events);
        }
        self.prompting.clear();
        self.captures.clear();
    }
}
