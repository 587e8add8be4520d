//! Analysis Layer
//!
//! Everything downstream of triage: the single confirmation slot, the
//! capture deduplication registry and the events reported to the host.

pub mod confirmation;
pub mod dedup;
pub mod events;

pub use confirmation::{
    Admission, Candidate, ConfirmOutcome, ConfirmationCoordinator, DecisionError, PendingConfirmation,
};
pub use dedup::{CaptureRegistry, ITEM_DEDUP_RADIUS, LABEL_DEDUP_RADIUS};
pub use events::{ClearReason, EventEmitter, SuppressReason, TimestampedEvent, TrackingEvent};
