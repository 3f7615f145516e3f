//! Delivery port trait.

use std::pin::Pin;
use std::sync::Arc;

use pacer_core::{DeliveryOutcome, RecipientId};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Result of a single send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendResult {
    /// Accepted by the messaging API.
    Delivered,
    /// No credential is configured.
    NotReady,
    /// The API answered with a non-2xx status or an error body.
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },
    /// The request never produced a response.
    Transport(String),
}

impl SendResult {
    /// Check if the send was successful.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, SendResult::Delivered)
    }

    /// Collapse into the outcome recorded by the engine.
    ///
    /// Every non-success variant is treated uniformly as a failure.
    #[must_use]
    pub fn into_outcome(self) -> DeliveryOutcome {
        match self {
            SendResult::Delivered => DeliveryOutcome::Delivered,
            SendResult::NotReady => DeliveryOutcome::Failed {
                reason: "delivery credential not set".to_string(),
            },
            SendResult::Rejected { status, body } => DeliveryOutcome::Failed {
                reason: format!("HTTP {status}: {body}"),
            },
            SendResult::Transport(e) => DeliveryOutcome::Failed {
                reason: format!("transport error: {e}"),
            },
        }
    }
}

/// Capability to send one formatted message to one recipient.
pub trait DeliveryPort: Send + Sync {
    /// Send `text` to `recipient`.
    fn send<'a>(&'a self, recipient: &'a RecipientId, text: &'a str)
        -> BoxFuture<'a, SendResult>;

    /// Whether a delivery credential is available.
    fn is_ready(&self) -> bool;
}

/// Arc wrapper for DeliveryPort trait objects.
pub type DynDelivery = Arc<dyn DeliveryPort>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_result_properties() {
        assert!(SendResult::Delivered.is_success());
        assert!(!SendResult::NotReady.is_success());
        assert!(!SendResult::Transport("reset".to_string()).is_success());
    }

    #[test]
    fn test_failures_collapse_to_failed_outcome() {
        let rejected = SendResult::Rejected {
            status: 403,
            body: "banned".to_string(),
        };
        assert_eq!(
            rejected.into_outcome(),
            DeliveryOutcome::Failed {
                reason: "HTTP 403: banned".to_string()
            }
        );
        assert!(!SendResult::NotReady.into_outcome().is_success());
        assert!(SendResult::Delivered.into_outcome().is_success());
    }
}
