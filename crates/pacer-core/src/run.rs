//! Run lifecycle types: state, identifiers, outcomes and summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{DispatchError, DispatchResult};

/// Engine run state. Exactly one value exists per engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// No run is active.
    #[default]
    Idle,
    /// A dispatch loop is walking the queue.
    Running,
    /// Stop was requested; the loop has not exited yet.
    Stopping,
    /// The engine was shut down. Accepts `start` like `Idle`.
    Stopped,
}

impl RunState {
    /// Whether a new run may be started from this state.
    #[must_use]
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }

    /// Whether a dispatch loop currently exists.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Stopping)
    }

    /// All states, in declaration order.
    pub const ALL: [RunState; 4] = [Self::Idle, Self::Running, Self::Stopping, Self::Stopped];
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Unique identifier of a dispatch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random run ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the recipient a run sends to. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(String);

impl RecipientId {
    /// Parse a recipient identifier, trimming surrounding whitespace.
    pub fn parse(raw: &str) -> DispatchResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DispatchError::InvalidArgument(
                "recipientId is required".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RecipientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Outcome of a single delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Delivered,
    Failed { reason: String },
}

impl DeliveryOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Metrics label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Failed { .. } => "failed",
        }
    }
}

/// One entry of a run's outcome log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    /// 0-based position of the item in the queue snapshot.
    pub index: usize,
    /// The formatted text that was sent.
    pub text: String,
    pub outcome: DeliveryOutcome,
    /// Time spent inside the delivery call (ms).
    pub elapsed_ms: u64,
}

/// Terminal summary of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RunSummary {
    /// Every item was dispatched. `failed` is non-zero only under the
    /// `continue` failure policy.
    Completed { delivered: usize, failed: usize },
    /// Stop was requested after `dispatched` items.
    Stopped { dispatched: usize },
    /// Aborted on the failed delivery of item `index`.
    Aborted { index: usize, reason: String },
}

impl RunSummary {
    /// Metrics label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Stopped { .. } => "stopped",
            Self::Aborted { .. } => "aborted",
        }
    }

    /// The failure that ended the run, if it was aborted.
    #[must_use]
    pub fn failure(&self) -> Option<DispatchError> {
        match self {
            Self::Aborted { index, reason } => Some(DispatchError::DeliveryFailure {
                index: *index,
                reason: reason.clone(),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { delivered, failed } => {
                write!(f, "completed ({delivered} delivered, {failed} failed)")
            }
            Self::Stopped { dispatched } => write!(f, "stopped after {dispatched} items"),
            Self::Aborted { index, reason } => {
                write!(f, "aborted after failure at item {index}: {reason}")
            }
        }
    }
}

/// Record of a finished run, kept for status reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: RunId,
    pub recipient_id: RecipientId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: RunSummary,
    pub outcomes: Vec<OutcomeRecord>,
}
