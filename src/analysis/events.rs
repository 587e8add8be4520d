//! Event system for tracking state changes
//!
//! The engine reports everything a host may want to react to (new prompts,
//! captures, rejections, anomalies) as [`TrackingEvent`]s on a channel the
//! host drains at its own pace.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

use super::confirmation::PendingConfirmation;
use crate::tracking::{RejectReason, TrackId};
use crate::vision::DetectionClass;

/// Why a candidate that passed triage did not become a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressReason {
    /// Another confirmation is already pending
    SlotBusy,
    /// The same text is already on its way to a prompt
    AlreadyPrompting,
    /// Matches an earlier capture near the same place
    Duplicate,
    /// Class is suppressed in label-only mode
    ModeFiltered,
    /// The session is not recording
    NotRecording,
}

/// How a pending confirmation ended without a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearReason {
    Ignored,
    TimedOut,
    /// Track or retained frame disappeared before the confirm landed
    Anomaly,
    /// Cleared by a tracking reset
    Reset,
}

/// Types of events the engine emits
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackingEvent {
    TrackCreated {
        track_id: TrackId,
        class: DetectionClass,
    },
    TracksMerged {
        kept: TrackId,
        discarded: TrackId,
    },
    TrackEvicted {
        track_id: TrackId,
    },
    RecognitionDispatched {
        track_id: TrackId,
        class: DetectionClass,
    },
    RecognitionRejected {
        track_id: TrackId,
        text: Option<String>,
        reason: RejectReason,
        cooldown: bool,
    },
    /// A result arrived for a track that is gone or no longer waiting for it
    StaleResult {
        track_id: TrackId,
    },
    CandidateSuppressed {
        track_id: TrackId,
        text: String,
        reason: SuppressReason,
    },
    ConfirmationRequested {
        pending: PendingConfirmation,
    },
    ItemCaptured {
        pending_id: Uuid,
        track_id: TrackId,
        text: String,
        class: DetectionClass,
        center: (f32, f32),
    },
    ConfirmationCleared {
        pending_id: Uuid,
        track_id: TrackId,
        text: String,
        reason: ClearReason,
    },
    TrackingReset,
}

/// A timestamped tracking event
#[derive(Debug, Clone)]
pub struct TimestampedEvent {
    /// The event
    pub event: TrackingEvent,
    /// When it occurred
    pub timestamp: Instant,
}

/// Event emitter feeding the host's event queue
#[derive(Debug, Clone)]
pub struct EventEmitter {
    sender: Sender<TimestampedEvent>,
}

impl EventEmitter {
    /// Create an emitter and the receiver the host drains
    pub fn channel() -> (Self, Receiver<TimestampedEvent>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }

    /// Emit an event. A host that dropped its receiver just stops hearing.
    pub fn emit(&self, event: TrackingEvent) {
        let _ = self.sender.send(TimestampedEvent {
            event,
            timestamp: Instant::now(),
        });
    }
}
