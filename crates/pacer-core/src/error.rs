//! Error types for pacer-core.

use thiserror::Error;

/// Errors returned synchronously by dispatch engine operations.
///
/// Failures that happen inside a running dispatch loop are never returned
/// through this type to a caller; they end up in the run report instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("A dispatch run is already active")]
    AlreadyRunning,

    #[error("Message queue is empty")]
    EmptyQueue,

    #[error("Message source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Delivery failed at item {index}: {reason}")]
    DeliveryFailure { index: usize, reason: String },
}

impl DispatchError {
    /// Stable machine-readable kind, used in API error bodies and metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotReady(_) => "not_ready",
            Self::AlreadyRunning => "already_running",
            Self::EmptyQueue => "empty_queue",
            Self::SourceUnavailable(_) => "source_unavailable",
            Self::DeliveryFailure { .. } => "delivery_failure",
        }
    }
}

/// Result type alias for engine operations.
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
