//! The paced send loop.
//!
//! Walks a queue snapshot in order, one delivery at a time. The only
//! suspension point besides the delivery call itself is the inter-item delay,
//! which races the run's cancellation token so `stop()` takes effect without
//! waiting for the delay to elapse. An in-flight delivery is never aborted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pacer_core::{
    format_item, DeliveryOutcome, DispatchConfig, FailurePolicy, MessageQueue, OutcomeRecord,
    RecipientId, RunId, RunReport, RunSummary,
};
use pacer_delivery::DynDelivery;

use crate::events::DispatchEvent;

/// Per-run snapshot. Owned by the run task and nothing else.
#[derive(Debug)]
pub(crate) struct DispatchJob {
    pub run_id: RunId,
    pub recipient: RecipientId,
    pub queue: MessageQueue,
    pub config: DispatchConfig,
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<OutcomeRecord>,
}

/// A dispatch run ready to be spawned.
pub(crate) struct RunLoop {
    job: DispatchJob,
    delivery: DynDelivery,
    token: CancellationToken,
    /// Number of items dispatched so far, readable by `status()`.
    progress: Arc<AtomicUsize>,
    events: broadcast::Sender<DispatchEvent>,
}

impl RunLoop {
    pub(crate) fn new(
        job: DispatchJob,
        delivery: DynDelivery,
        token: CancellationToken,
        progress: Arc<AtomicUsize>,
        events: broadcast::Sender<DispatchEvent>,
    ) -> Self {
        Self {
            job,
            delivery,
            token,
            progress,
            events,
        }
    }

    /// Run to a terminal summary and hand back the report.
    pub(crate) async fn run(mut self) -> RunReport {
        info!(
            run_id = %self.job.run_id,
            recipient = %self.job.recipient,
            items = self.job.queue.len(),
            delay_ms = self.job.config.delay_ms,
            policy = %self.job.config.failure_policy,
            "Dispatch run started"
        );

        let summary = self.walk().await;

        info!(run_id = %self.job.run_id, summary = %summary, "Dispatch run finished");

        RunReport {
            run_id: self.job.run_id,
            recipient_id: self.job.recipient,
            started_at: self.job.started_at,
            finished_at: Utc::now(),
            summary,
            outcomes: self.job.outcomes,
        }
    }

    async fn walk(&mut self) -> RunSummary {
        let total = self.job.queue.len();
        let delay = self.job.config.delay();
        let mut failed = 0;

        for index in 0..total {
            if self.token.is_cancelled() {
                return RunSummary::Stopped { dispatched: index };
            }

            let Some(item) = self.job.queue.get(index) else {
                break;
            };
            let text = format_item(&self.job.config.prefix, item);

            let started = Instant::now();
            let outcome = self
                .delivery
                .send(&self.job.recipient, &text)
                .await
                .into_outcome();
            let elapsed_ms = started.elapsed().as_millis() as u64;

            self.record(index, text, outcome.clone(), elapsed_ms);

            if let DeliveryOutcome::Failed { reason } = outcome {
                match self.job.config.failure_policy {
                    FailurePolicy::Abort => {
                        warn!(
                            run_id = %self.job.run_id,
                            index,
                            reason = %reason,
                            "Delivery failed, aborting run"
                        );
                        return RunSummary::Aborted { index, reason };
                    }
                    FailurePolicy::Continue => {
                        warn!(
                            run_id = %self.job.run_id,
                            index,
                            reason = %reason,
                            "Delivery failed, continuing"
                        );
                        failed += 1;
                    }
                }
            }

            if index + 1 < total {
                // Wait for delay OR stop signal (cancellation-aware sleep)
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = self.token.cancelled() => {
                        debug!(run_id = %self.job.run_id, index, "Stop requested during delay");
                        return RunSummary::Stopped { dispatched: index + 1 };
                    }
                }
            }
        }

        RunSummary::Completed {
            delivered: total - failed,
            failed,
        }
    }

    fn record(&mut self, index: usize, text: String, outcome: DeliveryOutcome, elapsed_ms: u64) {
        debug!(
            run_id = %self.job.run_id,
            index,
            outcome = outcome.label(),
            elapsed_ms,
            "Item dispatched"
        );

        let record = OutcomeRecord {
            index,
            text,
            outcome,
            elapsed_ms,
        };
        self.job.outcomes.push(record.clone());
        self.progress.store(index + 1, Ordering::SeqCst);

        // No receivers is normal.
        let _ = self.events.send(DispatchEvent::ItemDispatched {
            run_id: self.job.run_id,
            record,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pacer_delivery::MockDelivery;
    use std::time::Duration;

    fn job(items: &[&str], config: DispatchConfig) -> DispatchJob {
        DispatchJob {
            run_id: RunId::new(),
            recipient: RecipientId::parse("r1").unwrap(),
            queue: MessageQueue::new(items.iter().map(|s| s.to_string()).collect()),
            config,
            started_at: Utc::now(),
            outcomes: Vec::new(),
        }
    }

    fn run_loop(job: DispatchJob, delivery: Arc<MockDelivery>) -> (RunLoop, CancellationToken) {
        let token = CancellationToken::new();
        let (events, _) = broadcast::channel(64);
        let run = RunLoop::new(
            job,
            delivery,
            token.clone(),
            Arc::new(AtomicUsize::new(0)),
            events,
        );
        (run, token)
    }

    #[tokio::test]
    async fn test_continue_policy_dispatches_everything() {
        let delivery = Arc::new(MockDelivery::new());
        delivery.fail_at(1);
        let config = DispatchConfig {
            delay_ms: 0,
            failure_policy: FailurePolicy::Continue,
            ..DispatchConfig::default()
        };
        let (run, _token) = run_loop(job(&["a", "b", "c"], config), delivery.clone());

        let report = run.run().await;
        assert_eq!(
            report.summary,
            RunSummary::Completed {
                delivered: 2,
                failed: 1
            }
        );
        assert_eq!(delivery.send_count(), 3);
        assert!(!report.outcomes[1].outcome.is_success());
    }

    #[tokio::test]
    async fn test_cancel_before_first_item() {
        let delivery = Arc::new(MockDelivery::new());
        let (run, token) = run_loop(job(&["a", "b"], DispatchConfig::default()), delivery.clone());
        token.cancel();

        let report = run.run().await;
        assert_eq!(report.summary, RunSummary::Stopped { dispatched: 0 });
        assert_eq!(delivery.send_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_last_send_still_completes() {
        let delivery = Arc::new(MockDelivery::new());
        delivery.set_latency(Duration::from_millis(50));
        let config = DispatchConfig {
            delay_ms: 0,
            ..DispatchConfig::default()
        };
        let (run, token) = run_loop(job(&["only"], config), delivery.clone());

        let handle = tokio::spawn(run.run());
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        let report = handle.await.unwrap();
        assert_eq!(
            report.summary,
            RunSummary::Completed {
                delivered: 1,
                failed: 0
            }
        );
    }
}
