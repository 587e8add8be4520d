//! Tracking Pipeline
//!
//! Synchronous core of the engine. Owns the track registry, the confirmation
//! coordinator and the per-frame bookkeeping, and is driven one message at a
//! time by the engine actor. Time is passed in, never read, so every rule can
//! be exercised without a runtime.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::analysis::{
    Admission, Candidate, ConfirmOutcome, ConfirmationCoordinator, DecisionError, EventEmitter,
    PendingConfirmation, SuppressReason, TrackingEvent,
};
use crate::capture::FrameImage;
use crate::config::{CaptureMode, EngineConfig};
use crate::shared::TrackingSnapshot;
use crate::storage::SessionSink;
use crate::tracking::{
    triage, GateDecision, RecognitionGate, RecognitionJob, RejectReason, TrackId, TrackRegistry, TriageVerdict,
};
use crate::vision::{
    BreakerModelValidator, Detection, DetectionClass, EnrichedDetection, OcrError, OcrResult, TextShapeValidator,
};

/// Per-frame counters, returned to the caller once the frame is applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrameSummary {
    pub frame_number: u64,
    /// Tracks matched or created this frame
    pub matched: usize,
    pub created: usize,
    pub merged: usize,
    pub evicted: usize,
    /// Recognition jobs dispatched this frame
    pub dispatched: usize,
}

/// Result of processing one frame
#[derive(Debug)]
pub struct FrameOutput {
    pub summary: FrameSummary,
    /// Jobs to run; the caller owns scheduling
    pub jobs: Vec<RecognitionJob>,
}

/// A finished recognition job on its way back into the pipeline
#[derive(Debug)]
pub struct RecognitionOutcome {
    pub track_id: TrackId,
    pub class: DetectionClass,
    /// Frame the job read from
    pub frame: Arc<FrameImage>,
    pub result: Result<Option<OcrResult>, OcrError>,
}

impl RecognitionOutcome {
    pub fn new(job: RecognitionJob, result: Result<Option<OcrResult>, OcrError>) -> Self {
        Self {
            track_id: job.request.track_id,
            class: job.request.class,
            frame: job.frame,
            result,
        }
    }
}

/// What became of a recognition result
#[derive(Debug, Clone, PartialEq)]
pub enum ResultDisposition {
    /// Track gone, captured, or already holding the pending slot
    Stale,
    Rejected(RejectReason),
    Suppressed(SuppressReason),
    Prompted(PendingConfirmation),
}

/// The engine's serialized state
pub struct TrackingPipeline {
    config: EngineConfig,
    tracks: TrackRegistry,
    gate: RecognitionGate,
    coordinator: ConfirmationCoordinator,
    validator: Box<dyn TextShapeValidator>,
    events: EventEmitter,
    frame_number: u64,
    detections: Vec<EnrichedDetection>,
}

impl TrackingPipeline {
    pub fn new(config: EngineConfig, session: Box<dyn SessionSink>, events: EventEmitter) -> Self {
        let config = config.clamped();
        let coordinator = ConfirmationCoordinator::new(session, config.tracking.fuzzy_distance);
        Self {
            config,
            tracks: TrackRegistry::new(),
            gate: RecognitionGate,
            coordinator,
            validator: Box::new(BreakerModelValidator),
            events,
            frame_number: 0,
            detections: Vec::new(),
        }
    }

    /// Replace the text-shape validator used for non-label classes
    pub fn with_validator(mut self, validator: Box<dyn TextShapeValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracks(&self) -> &TrackRegistry {
        &self.tracks
    }

    pub fn coordinator(&self) -> &ConfirmationCoordinator {
        &self.coordinator
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Apply one frame of detections and collect the recognition jobs it fires.
    pub fn process_frame(&mut self, detections: &[Detection], frame: Arc<FrameImage>, now: Instant) -> FrameOutput {
        self.frame_number += 1;
        let frame_number = self.frame_number;
        let mut summary = FrameSummary {
            frame_number,
            ..Default::default()
        };

        self.tracks.tick_cooldowns();

        let association = self.tracks.associate(detections, frame_number, &self.config.tracking);
        summary.matched = association.tracks.len();
        summary.created = association.created.len();
        for &id in &association.created {
            if let Some(track) = self.tracks.get(id) {
                self.events.emit(TrackingEvent::TrackCreated {
                    track_id: id,
                    class: track.class,
                });
            }
        }

        let merges = self
            .tracks
            .merge_duplicates(self.config.tracking.fuzzy_distance, self.coordinator.pending_track());
        summary.merged = merges.len();
        for merge in merges {
            self.events.emit(TrackingEvent::TracksMerged {
                kept: merge.kept,
                discarded: merge.discarded,
            });
        }

        let keep_alive = self
            .coordinator
            .live_pending_track(now, self.config.confirmation.timeout());
        let evicted = self
            .tracks
            .evict_stale(frame_number, self.config.tracking.stale_frames, keep_alive);
        summary.evicted = evicted.len();
        for track_id in evicted {
            self.events.emit(TrackingEvent::TrackEvicted { track_id });
        }

        let jobs = self.run_gate(&association.tracks, &frame);
        summary.dispatched = jobs.len();

        self.detections = detections
            .iter()
            .zip(&association.assignments)
            .map(|(detection, assignment)| {
                let track_text = (*assignment)
                    .and_then(|id| self.tracks.get(id))
                    .and_then(|track| track.last_text.clone());
                EnrichedDetection {
                    detection: detection.clone(),
                    track_id: *assignment,
                    resolved_text: track_text.or_else(|| detection.text.clone()),
                }
            })
            .collect();

        FrameOutput { summary, jobs }
    }

    fn run_gate(&mut self, matched: &[TrackId], frame: &Arc<FrameImage>) -> Vec<RecognitionJob> {
        let pending_track = self.coordinator.pending_track();
        let mode = self.config.confirmation.mode;
        let mut jobs = Vec::new();
        let mut seen = BTreeSet::new();

        for &id in matched {
            if !seen.insert(id) {
                continue;
            }
            // Merged away this frame
            let Some(track) = self.tracks.get_mut(id) else {
                continue;
            };

            if self.gate.evaluate(track, pending_track, &self.config.recognition, mode) != GateDecision::Fire {
                continue;
            }

            track.reset_dwell();
            match self.gate.prepare_job(track, frame) {
                Ok(job) => {
                    track.recognition_in_flight = true;
                    debug!(track_id = id, class = %track.class, "Recognition dispatched");
                    self.events.emit(TrackingEvent::RecognitionDispatched {
                        track_id: id,
                        class: track.class,
                    });
                    jobs.push(job);
                }
                Err(e) => debug!(track_id = id, "Skipping recognition: {}", e),
            }
        }

        jobs
    }

    /// Apply a finished recognition job.
    pub fn apply_recognition(&mut self, outcome: RecognitionOutcome, now: Instant) -> ResultDisposition {
        let track_id = outcome.track_id;
        let pending_track = self.coordinator.pending_track();

        let Some(track) = self.tracks.get_mut(track_id) else {
            debug!(track_id, "Recognition result for a vanished track");
            self.events.emit(TrackingEvent::StaleResult { track_id });
            return ResultDisposition::Stale;
        };
        track.recognition_in_flight = false;

        if track.captured || pending_track == Some(track_id) {
            debug!(track_id, "Recognition result no longer needed");
            self.events.emit(TrackingEvent::StaleResult { track_id });
            return ResultDisposition::Stale;
        }

        let result = match outcome.result {
            Ok(result) => result,
            Err(e) => {
                debug!(track_id, "Recognition failed: {}", e);
                None
            }
        };

        let verdict = triage(
            track.class,
            result.as_ref(),
            self.config.recognition.ocr_confidence,
            self.validator.as_ref(),
        );

        let (text, confidence) = match verdict {
            TriageVerdict::Reject { reason, cooldown } => {
                if cooldown {
                    track.cool_down(self.config.tracking.cooldown_frames);
                } else {
                    track.reset_dwell();
                }
                debug!(track_id, ?reason, cooldown, "Recognition rejected");
                self.events.emit(TrackingEvent::RecognitionRejected {
                    track_id,
                    text: result.map(|r| r.text),
                    reason,
                    cooldown,
                });
                return ResultDisposition::Rejected(reason);
            }
            TriageVerdict::Accept { text, confidence } => (text, confidence),
        };

        track.last_text = Some(text.clone());
        track.last_text_confidence = confidence;

        let candidate = Candidate {
            track_id,
            class: track.class,
            text,
            confidence,
            bbox: track.bbox,
            frame: outcome.frame,
        };

        match self
            .coordinator
            .offer(candidate, &mut self.tracks, &self.config, now, &self.events)
        {
            Admission::Prompted(pending) => ResultDisposition::Prompted(pending),
            Admission::Suppressed(reason) => ResultDisposition::Suppressed(reason),
        }
    }

    pub fn confirm(&mut self, pending_id: Uuid) -> Result<ConfirmOutcome, DecisionError> {
        self.coordinator
            .confirm(pending_id, &mut self.tracks, &self.config, &self.events)
    }

    pub fn ignore(&mut self, pending_id: Uuid) -> Result<(), DecisionError> {
        self.coordinator.ignore(pending_id, &mut self.tracks, &self.events)
    }

    /// Drop the pending confirmation if it has outlived the timeout.
    pub fn poll_timeout(&mut self, now: Instant) -> Option<PendingConfirmation> {
        let expired = self.coordinator.expire(
            now,
            self.config.confirmation.timeout(),
            &mut self.tracks,
            &self.events,
        );
        if let Some(pending) = &expired {
            warn!(pending_id = %pending.id, text = %pending.text, "Confirmation timed out");
        }
        expired
    }

    /// Forget every track, capture and the pending slot. The session sink
    /// keeps what it already has.
    pub fn reset_tracking(&mut self) {
        self.coordinator.reset(&mut self.tracks, &self.events);
        self.tracks.clear();
        self.detections.clear();
        self.events.emit(TrackingEvent::TrackingReset);
    }

    pub fn update_config(&mut self, config: EngineConfig) {
        self.config = config.clamped();
        self.coordinator
            .set_fuzzy_distance(self.config.tracking.fuzzy_distance);
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.coordinator.set_recording(recording);
    }

    pub fn set_capture_mode(&mut self, mode: CaptureMode) {
        self.config.confirmation.mode = mode;
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        TrackingSnapshot {
            frame_number: self.frame_number,
            tracks: self.tracks.views(),
            pending: self.coordinator.pending().cloned(),
            detections: self.detections.clone(),
            captures: self.coordinator.captures().len(),
            recording: self.coordinator.is_recording(),
            mode: self.config.confirmation.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ClearReason, TimestampedEvent};
    use crate::storage::InMemorySession;
    use crate::vision::BoundingBox;
    use crossbeam_channel::Receiver;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::time::Duration;

    struct Harness {
        pipeline: TrackingPipeline,
        session: InMemorySession,
        events: Receiver<TimestampedEvent>,
        frame: Arc<FrameImage>,
        now: Instant,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_config(EngineConfig::default())
        }

        fn with_config(config: EngineConfig) -> Self {
            let session = InMemorySession::new();
            let (emitter, events) = EventEmitter::channel();
            let mut pipeline = TrackingPipeline::new(config, Box::new(session.clone()), emitter);
            pipeline.set_recording(true);
            Self {
                pipeline,
                session,
                events,
                frame: Arc::new(FrameImage::blank(400, 400)),
                now: Instant::now(),
            }
        }

        fn frame(&mut self, detections: &[Detection]) -> FrameOutput {
            self.now += Duration::from_millis(33);
            self.pipeline
                .process_frame(detections, Arc::clone(&self.frame), self.now)
        }

        /// Run frames until jobs appear, returning every job seen
        fn frames(&mut self, detections: &[Detection], count: usize) -> Vec<RecognitionJob> {
            (0..count).flat_map(|_| self.frame(detections).jobs).collect()
        }

        fn answer(&mut self, job: RecognitionJob, text: &str, confidence: f32) -> ResultDisposition {
            let result = Ok(Some(OcrResult {
                text: text.to_string(),
                confidence,
            }));
            self.pipeline
                .apply_recognition(RecognitionOutcome::new(job, result), self.now)
        }

        fn drain(&self) -> Vec<TrackingEvent> {
            self.events.try_iter().map(|e| e.event).collect()
        }
    }

    fn breaker(x: f32, y: f32) -> Detection {
        Detection::new(DetectionClass::BreakerFace, 0.9, BoundingBox::new(x, y, 0.1, 0.1))
    }

    fn label(x: f32, y: f32) -> Detection {
        Detection::new(DetectionClass::PanelLabel, 0.9, BoundingBox::new(x, y, 0.2, 0.06))
    }

    fn prompted(disposition: ResultDisposition) -> PendingConfirmation {
        match disposition {
            ResultDisposition::Prompted(pending) => pending,
            other => panic!("expected a prompt, got {other:?}"),
        }
    }

    #[test]
    fn test_breaker_seen_six_frames_is_captured_once() {
        let mut h = Harness::new();
        let jobs = h.frames(&[breaker(0.4, 0.4)], 6);
        assert_eq!(jobs.len(), 1);
        assert_eq!(h.pipeline.tracks().len(), 1);

        let job = jobs.into_iter().next().unwrap();
        let pending = prompted(h.answer(job, "BJA36050", 0.9));
        assert_eq!(h.pipeline.snapshot().pending.map(|p| p.id), Some(pending.id));

        let outcome = h.pipeline.confirm(pending.id).unwrap();
        assert!(matches!(outcome, ConfirmOutcome::Captured { ref text, .. } if text == "BJA36050"));
        assert_eq!(h.pipeline.coordinator().captures().len(), 1);
        assert_eq!(h.session.len(), 1);
        assert!(h.pipeline.snapshot().pending.is_none());
    }

    #[test]
    fn test_in_flight_track_gets_no_second_job() {
        let mut h = Harness::new();
        let jobs = h.frames(&[breaker(0.4, 0.4)], 20);
        assert_eq!(jobs.len(), 1);

        // Once the result is applied the track can fire again
        let job = jobs.into_iter().next().unwrap();
        h.pipeline.set_recording(false);
        assert_eq!(
            h.answer(job, "BJA36050", 0.9),
            ResultDisposition::Suppressed(SuppressReason::NotRecording)
        );
        assert_eq!(h.frames(&[breaker(0.4, 0.4)], 5).len(), 1);
    }

    #[test]
    fn test_dwell_restarts_after_gap() {
        let mut h = Harness::new();
        assert!(h.frames(&[breaker(0.4, 0.4)], 4).is_empty());
        assert!(h.frames(&[], 20).is_empty());

        // Back in view: the first frame after the gap starts a new dwell
        assert!(h.frame(&[breaker(0.4, 0.4)]).jobs.is_empty());
        assert_eq!(h.pipeline.tracks().len(), 1);
        assert_eq!(h.pipeline.tracks().get(1).unwrap().dwell, 1);

        assert!(h.frames(&[breaker(0.4, 0.4)], 3).is_empty());
        assert_eq!(h.frame(&[breaker(0.4, 0.4)]).jobs.len(), 1);
    }

    #[test]
    fn test_near_identical_texts_in_one_tick_prompt_once() {
        let mut h = Harness::new();
        let mut settings = h.pipeline.config().clone();
        // Keep two overlapping detections on separate tracks
        settings.tracking.iou = crate::config::ClassThresholds::uniform(0.99);
        h.pipeline.update_config(settings);

        let jobs = h.frames(&[breaker(0.40, 0.40), breaker(0.41, 0.40)], 5);
        assert_eq!(jobs.len(), 2);

        let mut jobs = jobs.into_iter();
        let first = h.answer(jobs.next().unwrap(), "BJA36050", 0.9);
        let second = h.answer(jobs.next().unwrap(), "BJA360S0", 0.9);

        let pending = prompted(first);
        assert!(matches!(
            second,
            ResultDisposition::Suppressed(SuppressReason::AlreadyPrompting | SuppressReason::Duplicate)
        ));
        assert_eq!(h.pipeline.snapshot().pending.map(|p| p.id), Some(pending.id));
        assert_eq!(h.pipeline.coordinator().prompting_len(), 1);
    }

    #[test]
    fn test_unanswered_prompt_times_out_without_frames() {
        let mut h = Harness::new();
        let job = h.frames(&[breaker(0.4, 0.4)], 5).pop().unwrap();
        let pending = prompted(h.answer(job, "BJA36050", 0.9));
        let track_id = pending.track_id;
        h.pipeline.tracks.get_mut(track_id).unwrap().dwell = 3;

        assert!(h.pipeline.poll_timeout(h.now + Duration::from_secs(29)).is_none());
        let expired = h.pipeline.poll_timeout(h.now + Duration::from_secs(31)).unwrap();
        assert_eq!(expired.id, pending.id);

        let track = h.pipeline.tracks().get(track_id).unwrap();
        assert_eq!(track.dwell, 0);
        assert_eq!(track.cooldown, 0);
        assert!(track.retained_frame.is_none());
        assert_eq!(h.pipeline.coordinator().prompting_len(), 0);
        assert!(h.pipeline.coordinator().captures().is_empty());
        assert!(h.session.is_empty());
        assert!(h.drain().iter().any(|e| matches!(
            e,
            TrackingEvent::ConfirmationCleared {
                reason: ClearReason::TimedOut,
                ..
            }
        )));
    }

    #[test]
    fn test_ignored_candidate_leaves_no_trace() {
        let mut h = Harness::new();
        let job = h.frames(&[breaker(0.4, 0.4)], 5).pop().unwrap();
        let pending = prompted(h.answer(job, "BJA36050", 0.9));

        h.pipeline.ignore(pending.id).unwrap();
        assert!(h.pipeline.coordinator().captures().is_empty());
        assert!(h.session.is_empty());

        // Same text at the same spot is offered again on the next attempt
        let job = h.frames(&[breaker(0.4, 0.4)], 5).pop().unwrap();
        assert!(matches!(h.answer(job, "BJA36050", 0.9), ResultDisposition::Prompted(_)));
    }

    #[test]
    fn test_pending_track_survives_eviction_until_timeout() {
        let mut h = Harness::new();
        let job = h.frames(&[breaker(0.4, 0.4)], 5).pop().unwrap();
        let pending = prompted(h.answer(job, "BJA36050", 0.9));

        // Out of view for longer than the stale window, but under the timeout
        h.frames(&[], 40);
        assert!(h.pipeline.tracks().get(pending.track_id).is_some());

        h.now += Duration::from_secs(31);
        h.frame(&[]);
        assert!(h.pipeline.tracks().get(pending.track_id).is_none());

        // Confirming after the track is gone is an anomaly, not a capture
        assert_eq!(h.pipeline.confirm(pending.id), Ok(ConfirmOutcome::Anomaly));
        assert!(h.session.is_empty());
        assert_eq!(h.pipeline.coordinator().prompting_len(), 0);
    }

    #[test]
    fn test_stale_results_are_discarded() {
        let mut h = Harness::new();
        let job = h.frames(&[breaker(0.4, 0.4)], 5).pop().unwrap();
        h.pipeline.reset_tracking();

        assert_eq!(h.answer(job, "BJA36050", 0.9), ResultDisposition::Stale);
        assert!(h.pipeline.snapshot().pending.is_none());
        assert!(h.drain().contains(&TrackingEvent::StaleResult { track_id: 1 }));
    }

    #[test]
    fn test_rejected_breaker_retries_without_cooldown() {
        let mut h = Harness::new();
        let job = h.frames(&[breaker(0.4, 0.4)], 5).pop().unwrap();
        let track_id = job.request.track_id;

        let result = RecognitionOutcome::new(job, Ok(None));
        assert_eq!(
            h.pipeline.apply_recognition(result, h.now),
            ResultDisposition::Rejected(RejectReason::NoResult)
        );
        assert_eq!(h.pipeline.tracks().get(track_id).unwrap().cooldown, 0);
        assert_eq!(h.frames(&[breaker(0.4, 0.4)], 5).len(), 1);
    }

    #[test]
    fn test_low_confidence_breaker_cools_down() {
        let mut h = Harness::new();
        let job = h.frames(&[breaker(0.4, 0.4)], 5).pop().unwrap();
        let track_id = job.request.track_id;

        assert_eq!(
            h.answer(job, "BJA36050", 0.2),
            ResultDisposition::Rejected(RejectReason::LowConfidence { confidence: 0.2 })
        );
        assert_eq!(h.pipeline.tracks().get(track_id).unwrap().cooldown, 30);
        assert!(h.frames(&[breaker(0.4, 0.4)], 20).is_empty());
    }

    #[test]
    fn test_recognizer_error_is_a_miss() {
        let mut h = Harness::new();
        let job = h.frames(&[label(0.3, 0.1)], 2).pop().unwrap();
        let result = RecognitionOutcome::new(job, Err(OcrError::InferenceError("busy".into())));
        assert_eq!(
            h.pipeline.apply_recognition(result, h.now),
            ResultDisposition::Rejected(RejectReason::NoResult)
        );
    }

    #[test]
    fn test_label_fast_path_and_capture() {
        let mut h = Harness::new();
        let jobs = h.frames(&[label(0.3, 0.1)], 2);
        assert_eq!(jobs.len(), 1);

        let pending = prompted(h.answer(jobs.into_iter().next().unwrap(), "LP-1A", 0.3));
        h.pipeline.confirm(pending.id).unwrap();

        let captures = h.session.captures();
        assert_eq!(captures[0].kind, crate::storage::CaptureKind::Label);
        assert_eq!(captures[0].text, "LP-1A");
    }

    #[test]
    fn test_label_only_mode_skips_breakers() {
        let mut h = Harness::new();
        h.pipeline.set_capture_mode(CaptureMode::LabelOnly);

        let jobs = h.frames(&[breaker(0.6, 0.6), label(0.1, 0.1)], 10);
        assert!(jobs.iter().all(|j| j.request.class == DetectionClass::PanelLabel));
        assert!(!jobs.is_empty());
    }

    #[test]
    fn test_tiny_region_dispatches_nothing() {
        let mut h = Harness::new();
        h.frame = Arc::new(FrameImage::blank(40, 40));
        let tiny = Detection::new(DetectionClass::BreakerFace, 0.9, BoundingBox::new(0.4, 0.4, 0.1, 0.1));

        assert!(h.frames(&[tiny.clone()], 12).is_empty());
        assert_eq!(h.pipeline.tracks().iter().next().unwrap().dwell, 2);
    }

    #[test]
    fn test_captured_breaker_is_not_prompted_again() {
        let mut h = Harness::new();
        let job = h.frames(&[breaker(0.4, 0.4)], 5).pop().unwrap();
        let pending = prompted(h.answer(job, "BJA36050", 0.9));
        h.pipeline.confirm(pending.id).unwrap();

        // Track lost, then the same breaker reappears as a new track
        h.frames(&[], 31);
        assert!(h.pipeline.tracks().is_empty());
        let job = h.frames(&[breaker(0.41, 0.4)], 5).pop().unwrap();
        assert_eq!(
            h.answer(job, "BJA36050", 0.9),
            ResultDisposition::Suppressed(SuppressReason::Duplicate)
        );
        assert_eq!(h.session.len(), 1);
    }

    #[test]
    fn test_reset_keeps_session() {
        let mut h = Harness::new();
        let job = h.frames(&[breaker(0.4, 0.4)], 5).pop().unwrap();
        let pending = prompted(h.answer(job, "BJA36050", 0.9));
        h.pipeline.confirm(pending.id).unwrap();

        h.pipeline.reset_tracking();
        let snapshot = h.pipeline.snapshot();
        assert!(snapshot.tracks.is_empty());
        assert!(snapshot.detections.is_empty());
        assert_eq!(snapshot.captures, 0);
        assert_eq!(h.session.len(), 1);
    }

    #[test]
    fn test_snapshot_resolves_detection_text() {
        let mut h = Harness::new();
        let job = h.frames(&[breaker(0.4, 0.4)], 5).pop().unwrap();
        h.answer(job, "BJA36050", 0.9);

        h.frame(&[breaker(0.4, 0.4), breaker(0.8, 0.8).with_text("QO120")]);
        let snapshot = h.pipeline.snapshot();
        assert_eq!(snapshot.detections.len(), 2);
        assert_eq!(snapshot.detections[0].resolved_text.as_deref(), Some("BJA36050"));
        assert_eq!(snapshot.detections[1].resolved_text.as_deref(), Some("QO120"));
        assert!(snapshot.recording);
    }

    /// Random frames, answers, decisions and clock jumps against the slot and
    /// capture invariants.
    #[test]
    fn test_fuzzed_sequences_keep_invariants() {
        const TEXTS: [&str; 5] = ["BJA36050", "BJA360S0", "QO120", "HOM2100", "THQL1120"];
        const SPOTS: [(f32, f32); 4] = [(0.1, 0.1), (0.12, 0.1), (0.5, 0.5), (0.7, 0.2)];

        for seed in 0..20u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut h = Harness::new();
            let mut in_flight: Vec<RecognitionJob> = Vec::new();
            let mut confirmed = 0usize;

            for _ in 0..400 {
                match rng.gen_range(0..10) {
                    0..=4 => {
                        let detections: Vec<Detection> = SPOTS
                            .iter()
                            .filter(|_| rng.gen_bool(0.6))
                            .map(|&(x, y)| breaker(x, y))
                            .collect();
                        in_flight.extend(h.frame(&detections).jobs);
                    }
                    5 | 6 if !in_flight.is_empty() => {
                        let job = in_flight.swap_remove(rng.gen_range(0..in_flight.len()));
                        let text = TEXTS[rng.gen_range(0..TEXTS.len())];
                        h.answer(job, text, rng.gen_range(0.3..1.0));
                    }
                    7 => {
                        if let Some(pending) = h.pipeline.snapshot().pending {
                            if let Ok(ConfirmOutcome::Captured { .. }) = h.pipeline.confirm(pending.id) {
                                confirmed += 1;
                            }
                        }
                    }
                    8 => {
                        if let Some(pending) = h.pipeline.snapshot().pending {
                            h.pipeline.ignore(pending.id).unwrap();
                        }
                    }
                    _ => {
                        h.now += Duration::from_secs(rng.gen_range(0..40));
                        h.pipeline.poll_timeout(h.now);
                    }
                }

                let coordinator = h.pipeline.coordinator();
                let prompting = coordinator.prompting_len();
                assert!(prompting <= 1, "seed {seed}: {prompting} texts prompting");
                assert_eq!(prompting == 1, coordinator.pending().is_some(), "seed {seed}");
                assert_eq!(coordinator.captures().len(), confirmed, "seed {seed}");
                assert_eq!(h.session.len(), confirmed, "seed {seed}");
            }
        }
    }
}
