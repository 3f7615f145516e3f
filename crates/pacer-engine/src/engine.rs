//! Dispatch engine: configuration, queue, run state and the run slot.
//!
//! All process-wide mutable state (RunState, configuration, queue, last run
//! report) lives in one `EngineState` behind a single `parking_lot::Mutex`.
//! The lock is never held across an `.await`. The per-run snapshot is owned
//! by the spawned run task and is not reachable from here.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use pacer_core::{
    ConfigPatch, DispatchConfig, DispatchError, DispatchResult, MessageQueue, RecipientId, RunId,
    RunReport, RunState, RunSummary,
};
use pacer_delivery::DynDelivery;

use crate::events::DispatchEvent;
use crate::run_loop::{DispatchJob, RunLoop};
use crate::source::MessageSource;

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Acknowledgment returned by a successful `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAck {
    pub run_id: RunId,
    pub recipient_id: RecipientId,
    pub queue_length: usize,
}

/// Acknowledgment returned by `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopAck {
    /// True if a running loop was asked to stop by this call.
    pub signalled: bool,
    /// RunState right after the call.
    pub run_state: RunState,
}

/// Progress of the active run, as seen from outside the run task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRunStatus {
    pub run_id: RunId,
    pub recipient_id: RecipientId,
    /// Items dispatched so far.
    pub cursor: usize,
    pub total: usize,
    pub started_at: DateTime<Utc>,
}

/// Read-only view returned by `status()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub run_state: RunState,
    pub config: DispatchConfig,
    pub queue_length: usize,
    pub has_credential: bool,
    pub active_run: Option<ActiveRunStatus>,
    pub last_run: Option<RunReport>,
}

/// Bookkeeping for the single active run.
struct ActiveRun {
    run_id: RunId,
    recipient: RecipientId,
    total: usize,
    started_at: DateTime<Utc>,
    progress: Arc<AtomicUsize>,
    token: CancellationToken,
}

struct EngineState {
    run_state: RunState,
    config: DispatchConfig,
    queue: MessageQueue,
    active: Option<ActiveRun>,
    last_run: Option<RunReport>,
    /// Set by `shutdown`; the next run exit lands in `Stopped`.
    shutting_down: bool,
}

struct EngineInner {
    state: Mutex<EngineState>,
    delivery: DynDelivery,
    events: broadcast::Sender<DispatchEvent>,
    state_tx: watch::Sender<RunState>,
}

/// The dispatch engine.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct DispatchEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("DispatchEngine")
            .field("run_state", &state.run_state)
            .field("queue_length", &state.queue.len())
            .finish()
    }
}

impl DispatchEngine {
    /// Create an engine with default configuration and an empty queue.
    #[must_use]
    pub fn new(delivery: DynDelivery) -> Self {
        Self::with_config(delivery, DispatchConfig::default())
    }

    /// Create an engine with an initial configuration.
    #[must_use]
    pub fn with_config(delivery: DynDelivery, config: DispatchConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, _) = watch::channel(RunState::Idle);

        Self {
            inner: Arc::new(EngineInner {
                state: Mutex::new(EngineState {
                    run_state: RunState::Idle,
                    config,
                    queue: MessageQueue::default(),
                    active: None,
                    last_run: None,
                    shutting_down: false,
                }),
                delivery,
                events,
                state_tx,
            }),
        }
    }

    /// Subscribe to engine events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.inner.events.subscribe()
    }

    /// Subscribe to RunState changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<RunState> {
        self.inner.state_tx.subscribe()
    }

    /// Current RunState.
    #[must_use]
    pub fn run_state(&self) -> RunState {
        self.inner.state.lock().run_state
    }

    /// Apply a partial configuration update.
    ///
    /// Affects future runs only; an active run keeps the configuration it
    /// captured at start.
    pub fn configure(&self, patch: &ConfigPatch) -> DispatchResult<DispatchConfig> {
        let config = {
            let mut state = self.inner.state.lock();
            state.config.apply(patch)?.clone()
        };

        info!(
            delay_ms = config.delay_ms,
            prefix = %config.prefix,
            display_name = %config.display_name,
            policy = %config.failure_policy,
            "Configuration updated"
        );
        self.emit(DispatchEvent::ConfigUpdated {
            config: config.clone(),
        });
        Ok(config)
    }

    /// Replace the message queue from a source.
    ///
    /// The source is read completely before the queue is swapped. On error
    /// the previous queue is kept.
    pub async fn load_queue(&self, source: &dyn MessageSource) -> DispatchResult<usize> {
        let description = source.describe();
        let items = source.load().await?;
        Ok(self.replace_queue(items, description))
    }

    fn replace_queue(&self, items: Vec<String>, description: String) -> usize {
        let count = items.len();
        {
            let mut state = self.inner.state.lock();
            state.queue = MessageQueue::new(items);
        }

        info!(count, source = %description, "Message queue loaded");
        self.emit(DispatchEvent::QueueLoaded {
            count,
            source: description,
        });
        count
    }

    /// Start a dispatch run to `recipient`.
    ///
    /// Returns as soon as the run loop has been spawned. Must be called from
    /// within a tokio runtime.
    pub fn start(&self, recipient: &str) -> DispatchResult<StartAck> {
        let recipient = RecipientId::parse(recipient)?;

        let (run_loop, ack, delay_ms, started_at) = {
            let mut state = self.inner.state.lock();

            if !state.run_state.can_start() {
                debug!(state = %state.run_state, "Start rejected, run already active");
                return Err(DispatchError::AlreadyRunning);
            }
            if !self.inner.delivery.is_ready() {
                return Err(DispatchError::NotReady(
                    "delivery credential is not set".to_string(),
                ));
            }
            if state.queue.is_empty() {
                return Err(DispatchError::EmptyQueue);
            }

            let run_id = RunId::new();
            let token = CancellationToken::new();
            let progress = Arc::new(AtomicUsize::new(0));
            let started_at = Utc::now();

            let job = DispatchJob {
                run_id,
                recipient: recipient.clone(),
                queue: state.queue.clone(),
                config: state.config.clone(),
                started_at,
                outcomes: Vec::new(),
            };
            let ack = StartAck {
                run_id,
                recipient_id: recipient.clone(),
                queue_length: job.queue.len(),
            };

            state.active = Some(ActiveRun {
                run_id,
                recipient,
                total: job.queue.len(),
                started_at,
                progress: progress.clone(),
                token: token.clone(),
            });
            state.shutting_down = false;
            self.set_state(&mut state, RunState::Running);

            let run_loop = RunLoop::new(
                job,
                self.inner.delivery.clone(),
                token,
                progress,
                self.inner.events.clone(),
            );
            let delay_ms = state.config.delay_ms;
            (run_loop, ack, delay_ms, started_at)
        };

        self.emit(DispatchEvent::RunStarted {
            run_id: ack.run_id,
            recipient_id: ack.recipient_id.clone(),
            queue_length: ack.queue_length,
            delay_ms,
        });
        self.spawn_run(run_loop, &ack, started_at);

        Ok(ack)
    }

    fn spawn_run(&self, run_loop: RunLoop, ack: &StartAck, started_at: DateTime<Utc>) {
        let run_id = ack.run_id;
        let recipient = ack.recipient_id.clone();
        let engine = self.clone();

        let handle = tokio::spawn(run_loop.run());
        tokio::spawn(async move {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => {
                    error!(run_id = %run_id, error = %e, "Dispatch task failed");
                    RunReport {
                        run_id,
                        recipient_id: recipient,
                        started_at,
                        finished_at: Utc::now(),
                        summary: RunSummary::Aborted {
                            index: 0,
                            reason: format!("dispatch task failed: {e}"),
                        },
                        outcomes: Vec::new(),
                    }
                }
            };
            engine.finish_run(report);
        });
    }

    /// Release the run slot once the loop has exited.
    fn finish_run(&self, report: RunReport) {
        let run_id = report.run_id;
        let summary = report.summary.clone();
        debug!(run_id = %run_id, "Releasing run slot");
        if let Some(err) = summary.failure() {
            warn!(run_id = %run_id, kind = err.kind(), error = %err, "Run ended on delivery failure");
        }
        {
            let mut state = self.inner.state.lock();
            match &state.active {
                Some(active) if active.run_id == run_id => {}
                _ => {
                    warn!(run_id = %run_id, "Finished run does not own the run slot");
                    return;
                }
            }
            state.active = None;
            state.last_run = Some(report);
            self.emit(DispatchEvent::RunFinished { run_id, summary });

            let next = if state.shutting_down {
                RunState::Stopped
            } else {
                RunState::Idle
            };
            self.set_state(&mut state, next);
        }
    }

    /// Request cooperative cancellation of the active run.
    ///
    /// Idempotent. Returns immediately without waiting for the loop to exit.
    pub fn stop(&self) -> StopAck {
        let mut state = self.inner.state.lock();
        let signalled = Self::signal_stop(&mut state);
        if signalled {
            self.set_state(&mut state, RunState::Stopping);
            info!("Stop requested");
        }
        StopAck {
            signalled,
            run_state: state.run_state,
        }
    }

    /// Stop any active run and mark the engine as shut down.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        state.shutting_down = true;
        if Self::signal_stop(&mut state) {
            self.set_state(&mut state, RunState::Stopping);
        } else if !state.run_state.is_active() {
            self.set_state(&mut state, RunState::Stopped);
        }
        info!(state = %state.run_state, "Engine shutdown requested");
    }

    fn signal_stop(state: &mut EngineState) -> bool {
        if state.run_state != RunState::Running {
            return false;
        }
        match &state.active {
            Some(active) => {
                active.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Wait until no run is active.
    pub async fn wait_until_inactive(&self) {
        let mut rx = self.watch_state();
        loop {
            if !rx.borrow_and_update().is_active() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Snapshot of the engine for the control surface.
    #[must_use]
    pub fn status(&self) -> EngineStatus {
        let state = self.inner.state.lock();
        EngineStatus {
            run_state: state.run_state,
            config: state.config.clone(),
            queue_length: state.queue.len(),
            has_credential: self.inner.delivery.is_ready(),
            active_run: state.active.as_ref().map(|active| ActiveRunStatus {
                run_id: active.run_id,
                recipient_id: active.recipient.clone(),
                cursor: active.progress.load(Ordering::SeqCst),
                total: active.total,
                started_at: active.started_at,
            }),
            last_run: state.last_run.clone(),
        }
    }

    fn set_state(&self, state: &mut EngineState, next: RunState) {
        if state.run_state == next {
            return;
        }
        debug!(from = %state.run_state, to = %next, "RunState transition");
        state.run_state = next;
        self.emit(DispatchEvent::StateChanged { state: next });
        self.inner.state_tx.send_replace(next);
    }

    fn emit(&self, event: DispatchEvent) {
        // No receivers is normal when nothing is subscribed.
        let _ = self.inner.events.send(event);
    }
}
