//! Engine Coordinator
//!
//! Runs the tracking pipeline as a single tokio task that owns all mutable
//! state. Hosts talk to it through [`TrackingEngine`]: frames, decisions and
//! settings go in as messages, state comes back through the published
//! snapshot and the event channel. Recognition jobs run as separate tasks
//! bounded by a semaphore and report back through the same inbox.

use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::{ConfirmOutcome, DecisionError, EventEmitter, TimestampedEvent};
use crate::capture::FrameImage;
use crate::config::{CaptureMode, EngineConfig};
use crate::pipeline::{FrameSummary, RecognitionOutcome, TrackingPipeline};
use crate::shared::{EngineMessage, SharedSnapshot, TrackingSnapshot};
use crate::storage::SessionSink;
use crate::tracking::RecognitionJob;
use crate::vision::{Detection, OcrError, TextRecognizer};

/// Engine handle errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// The actor has shut down
    #[error("Tracking engine is not running")]
    Stopped,

    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error("Tracking engine task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Handle to a running tracking engine
pub struct TrackingEngine {
    inbox: mpsc::UnboundedSender<EngineMessage>,
    snapshot: SharedSnapshot,
    events: Receiver<TimestampedEvent>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl TrackingEngine {
    /// Spawn the engine actor on the current tokio runtime.
    pub fn start(
        config: EngineConfig,
        recognizer: Arc<dyn TextRecognizer>,
        session: Box<dyn SessionSink>,
    ) -> Self {
        let (emitter, events) = EventEmitter::channel();
        let pipeline = TrackingPipeline::new(config, session, emitter);
        Self::spawn(pipeline, recognizer, events)
    }

    /// Spawn the engine actor around an already configured pipeline.
    pub fn spawn(
        pipeline: TrackingPipeline,
        recognizer: Arc<dyn TextRecognizer>,
        events: Receiver<TimestampedEvent>,
    ) -> Self {
        let (inbox, receiver) = mpsc::unbounded_channel();
        let snapshot = Arc::new(RwLock::new(pipeline.snapshot()));
        let cancel_token = CancellationToken::new();

        let max_concurrent = pipeline.config().recognition.max_concurrent;
        let actor = EngineActor {
            pipeline,
            recognizer,
            pool: RecognitionPool::new(max_concurrent),
            max_concurrent,
            inbox: receiver,
            outbox: inbox.clone(),
            snapshot: Arc::clone(&snapshot),
        };

        let handle = tokio::spawn(actor.run(cancel_token.clone()));
        info!("Tracking engine started");

        Self {
            inbox,
            snapshot,
            events,
            cancel_token,
            handle: Some(handle),
        }
    }

    fn send(&self, message: EngineMessage) -> Result<(), EngineError> {
        self.inbox.send(message).map_err(|_| EngineError::Stopped)
    }

    /// Queue a frame. The receiver resolves once the frame's state updates
    /// are applied and published; it errors if the engine is gone.
    pub fn process_frame(&self, detections: Vec<Detection>, frame: Arc<FrameImage>) -> oneshot::Receiver<FrameSummary> {
        let (done, receiver) = oneshot::channel();
        // A failed send drops `done`, which closes the receiver
        let _ = self.send(EngineMessage::ProcessFrame {
            detections,
            frame,
            done,
        });
        receiver
    }

    /// Confirm the pending candidate
    pub async fn confirm(&self, pending_id: Uuid) -> Result<ConfirmOutcome, EngineError> {
        let (reply, receiver) = oneshot::channel();
        self.send(EngineMessage::Confirm { pending_id, reply })?;
        Ok(receiver.await.map_err(|_| EngineError::Stopped)??)
    }

    /// Ignore the pending candidate
    pub async fn ignore(&self, pending_id: Uuid) -> Result<(), EngineError> {
        let (reply, receiver) = oneshot::channel();
        self.send(EngineMessage::Ignore { pending_id, reply })?;
        Ok(receiver.await.map_err(|_| EngineError::Stopped)??)
    }

    pub fn reset_tracking(&self) -> Result<(), EngineError> {
        self.send(EngineMessage::ResetTracking)
    }

    pub fn update_config(&self, config: EngineConfig) -> Result<(), EngineError> {
        self.send(EngineMessage::UpdateConfig(config))
    }

    pub fn set_recording(&self, recording: bool) -> Result<(), EngineError> {
        self.send(EngineMessage::SetRecording(recording))
    }

    pub fn set_capture_mode(&self, mode: CaptureMode) -> Result<(), EngineError> {
        self.send(EngineMessage::SetCaptureMode(mode))
    }

    /// Copy of the latest published state
    pub fn snapshot(&self) -> TrackingSnapshot {
        self.snapshot.read().clone()
    }

    /// Shared handle to the published state
    pub fn state(&self) -> SharedSnapshot {
        Arc::clone(&self.snapshot)
    }

    /// Event stream for the host to drain
    pub fn events(&self) -> Receiver<TimestampedEvent> {
        self.events.clone()
    }

    /// Check if the actor is still running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the actor and wait for it to exit. In-flight recognition jobs
    /// finish on their own and their results are dropped.
    pub async fn shutdown(mut self) -> Result<(), EngineError> {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.await?;
        }
        Ok(())
    }
}

impl Drop for TrackingEngine {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// State owned by the actor task
struct EngineActor {
    pipeline: TrackingPipeline,
    recognizer: Arc<dyn TextRecognizer>,
    pool: RecognitionPool,
    max_concurrent: usize,
    inbox: mpsc::UnboundedReceiver<EngineMessage>,
    /// Handed to recognition tasks for reporting back
    outbox: mpsc::UnboundedSender<EngineMessage>,
    snapshot: SharedSnapshot,
}

impl EngineActor {
    async fn run(mut self, cancel_token: CancellationToken) {
        let mut ticker = self.ticker();

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("Tracking engine shutting down");
                    break;
                }
                message = self.inbox.recv() => {
                    let Some(message) = message else {
                        break;
                    };
                    self.handle(message);
                    if ticker.period() != self.pipeline.config().confirmation.poll_interval() {
                        ticker = self.ticker();
                    }
                }
                _ = ticker.tick() => {
                    if self.pipeline.poll_timeout(Instant::now()).is_some() {
                        self.publish();
                    }
                }
            }
        }
    }

    fn ticker(&self) -> Interval {
        let mut ticker = interval(self.pipeline.config().confirmation.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    fn publish(&self) {
        *self.snapshot.write() = self.pipeline.snapshot();
    }

    fn handle(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::ProcessFrame {
                detections,
                frame,
                done,
            } => {
                let output = self.pipeline.process_frame(&detections, frame, Instant::now());
                for job in output.jobs {
                    self.dispatch(job);
                }
                self.publish();
                let _ = done.send(output.summary);
            }
            EngineMessage::RecognitionFinished(outcome) => {
                let disposition = self.pipeline.apply_recognition(outcome, Instant::now());
                debug!(?disposition, "Recognition applied");
                self.publish();
            }
            EngineMessage::Confirm { pending_id, reply } => {
                let result = self.pipeline.confirm(pending_id);
                self.publish();
                let _ = reply.send(result);
            }
            EngineMessage::Ignore { pending_id, reply } => {
                let result = self.pipeline.ignore(pending_id);
                self.publish();
                let _ = reply.send(result);
            }
            EngineMessage::ResetTracking => {
                self.pipeline.reset_tracking();
                info!("Tracking reset");
                self.publish();
            }
            EngineMessage::UpdateConfig(config) => {
                self.pipeline.update_config(config);
                let max_concurrent = self.pipeline.config().recognition.max_concurrent;
                if max_concurrent != self.max_concurrent {
                    self.pool.resize(self.max_concurrent, max_concurrent);
                    self.max_concurrent = max_concurrent;
                }
                info!("Engine config updated");
                self.publish();
            }
            EngineMessage::SetRecording(recording) => {
                self.pipeline.set_recording(recording);
                info!(recording, "Recording toggled");
                self.publish();
            }
            EngineMessage::SetCaptureMode(mode) => {
                self.pipeline.set_capture_mode(mode);
                info!(?mode, "Capture mode changed");
                self.publish();
            }
        }
    }

    /// Run a recognition job in its own task, never blocking the actor.
    /// Every job reports back, including one whose recognizer panicked.
    fn dispatch(&self, job: RecognitionJob) {
        let recognizer = Arc::clone(&self.recognizer);
        let pool = self.pool.clone();
        let outbox = self.outbox.clone();
        let RecognitionJob { request, frame } = job;
        let (track_id, class) = (request.track_id, request.class);

        tokio::spawn(async move {
            let result = match pool.acquire().await {
                Some(permit) => {
                    let task = tokio::spawn(async move { recognizer.recognize(&request).await });
                    let result = match task.await {
                        Ok(result) => result,
                        Err(e) => {
                            warn!(track_id, "Recognizer task failed: {}", e);
                            Err(OcrError::InferenceError(format!("recognizer task failed: {e}")))
                        }
                    };
                    pool.release(permit);
                    result
                }
                None => Err(OcrError::Unavailable("recognition pool closed".to_string())),
            };
            let outcome = RecognitionOutcome {
                track_id,
                class,
                frame,
                result,
            };
            let _ = outbox.send(EngineMessage::RecognitionFinished(outcome));
        });
    }
}

/// Permit pool bounding concurrent recognitions. Shrinking forgets idle
/// permits at once and retires busy ones as their jobs finish.
#[derive(Clone)]
struct RecognitionPool {
    permits: Arc<Semaphore>,
    /// Busy permits to forget instead of returning
    retiring: Arc<AtomicUsize>,
}

impl RecognitionPool {
    fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size)),
            retiring: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn resize(&self, from: usize, to: usize) {
        if to > from {
            let grow = to - from;
            let retiring = self
                .retiring
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| Some(r.saturating_sub(grow)))
                .unwrap_or(0);
            self.permits.add_permits(grow - retiring.min(grow));
        } else {
            let shrink = from - to;
            let forgotten = self.permits.forget_permits(shrink);
            self.retiring.fetch_add(shrink - forgotten, Ordering::SeqCst);
        }
    }

    async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.permits).acquire_owned().await.ok()
    }

    fn release(&self, permit: OwnedSemaphorePermit) {
        let retire = self
            .retiring
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| r.checked_sub(1))
            .is_ok();
        if retire {
            permit.forget();
        }
    }
}
