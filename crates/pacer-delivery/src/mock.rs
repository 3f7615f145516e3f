//! Mock delivery port for testing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use pacer_core::RecipientId;

use crate::port::{BoxFuture, DeliveryPort, SendResult};

/// A send captured by [`MockDelivery`].
#[derive(Debug, Clone)]
pub struct RecordedSend {
    pub recipient: String,
    pub text: String,
    /// When the send started.
    pub at: Instant,
}

/// Mock delivery port.
///
/// Records every send, answers `Delivered` unless the call index (0-based,
/// counted across the mock's lifetime) was marked as failing.
#[derive(Debug)]
pub struct MockDelivery {
    /// Recorded sends for verification.
    sends: parking_lot::Mutex<Vec<RecordedSend>>,
    /// Call indices that fail.
    fail_at: parking_lot::Mutex<HashSet<usize>>,
    /// Simulated time spent inside each send.
    latency: parking_lot::Mutex<Duration>,
    /// Whether the mock is ready.
    ready: AtomicBool,
}

impl Default for MockDelivery {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDelivery {
    /// Create a ready mock that delivers everything instantly.
    pub fn new() -> Self {
        Self {
            sends: parking_lot::Mutex::new(Vec::new()),
            fail_at: parking_lot::Mutex::new(HashSet::new()),
            latency: parking_lot::Mutex::new(Duration::ZERO),
            ready: AtomicBool::new(true),
        }
    }

    /// Make the send with the given call index fail.
    pub fn fail_at(&self, call_index: usize) {
        self.fail_at.lock().insert(call_index);
    }

    /// Set the simulated send latency.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Set whether the mock is ready.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Get recorded sends.
    pub fn sends(&self) -> Vec<RecordedSend> {
        self.sends.lock().clone()
    }

    /// Texts of recorded sends, in order.
    pub fn texts(&self) -> Vec<String> {
        self.sends.lock().iter().map(|s| s.text.clone()).collect()
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().len()
    }
}

impl DeliveryPort for MockDelivery {
    fn send<'a>(
        &'a self,
        recipient: &'a RecipientId,
        text: &'a str,
    ) -> BoxFuture<'a, SendResult> {
        Box::pin(async move {
            let call_index = {
                let mut sends = self.sends.lock();
                sends.push(RecordedSend {
                    recipient: recipient.to_string(),
                    text: text.to_string(),
                    at: Instant::now(),
                });
                sends.len() - 1
            };

            let latency = *self.latency.lock();
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }

            if self.fail_at.lock().contains(&call_index) {
                SendResult::Rejected {
                    status: 400,
                    body: format!("mock failure at call {call_index}"),
                }
            } else {
                SendResult::Delivered
            }
        })
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
