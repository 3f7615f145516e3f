//! Engine events broadcast to subscribers (control surface, metrics).

use serde::Serialize;

use pacer_core::{DispatchConfig, OutcomeRecord, RecipientId, RunId, RunState, RunSummary};

/// Something observable happened inside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum DispatchEvent {
    /// RunState transition.
    StateChanged { state: RunState },
    /// A run was accepted and its loop spawned.
    RunStarted {
        run_id: RunId,
        recipient_id: RecipientId,
        queue_length: usize,
        delay_ms: u64,
    },
    /// One item went through the delivery port.
    ItemDispatched {
        run_id: RunId,
        record: OutcomeRecord,
    },
    /// A run reached a terminal summary.
    RunFinished { run_id: RunId, summary: RunSummary },
    /// Configuration was changed by `configure`.
    ConfigUpdated { config: DispatchConfig },
    /// The message queue was replaced.
    QueueLoaded { count: usize, source: String },
}

impl DispatchEvent {
    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::RunStarted { .. } => "run_started",
            Self::ItemDispatched { .. } => "item_dispatched",
            Self::RunFinished { .. } => "run_finished",
            Self::ConfigUpdated { .. } => "config_updated",
            Self::QueueLoaded { .. } => "queue_loaded",
        }
    }
}
