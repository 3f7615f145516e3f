//! Main application orchestration.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pacer_control::AppState;
use pacer_delivery::{CredentialStore, DynDelivery, HttpDelivery};
use pacer_engine::{DispatchEngine, DispatchEvent};
use pacer_telemetry::Metrics;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::AppResult;

/// Environment variable that seeds the delivery credential at startup.
pub const CREDENTIAL_ENV: &str = "PACER_CREDENTIAL";

/// Main application.
pub struct Application {
    config: AppConfig,
    credentials: Arc<CredentialStore>,
    engine: DispatchEngine,
}

impl Application {
    /// Create the application with the HTTP delivery adapter.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let credentials = Arc::new(CredentialStore::new());
        if let Ok(credential) = std::env::var(CREDENTIAL_ENV) {
            match credentials.set(credential) {
                Ok(()) => info!(env = CREDENTIAL_ENV, "Delivery credential seeded from environment"),
                Err(e) => warn!(env = CREDENTIAL_ENV, error = %e, "Ignoring credential from environment"),
            }
        }

        let delivery = Arc::new(HttpDelivery::new(&config.delivery, credentials.clone())?);
        info!(endpoint = %config.delivery.endpoint, "HTTP delivery configured");

        Ok(Self::with_delivery(config, credentials, delivery))
    }

    /// Create the application with a caller-supplied delivery port.
    pub fn with_delivery(
        config: AppConfig,
        credentials: Arc<CredentialStore>,
        delivery: DynDelivery,
    ) -> Self {
        let engine = DispatchEngine::with_config(delivery, config.dispatch.clone());
        Self {
            config,
            credentials,
            engine,
        }
    }

    /// Handle to the dispatch engine.
    pub fn engine(&self) -> DispatchEngine {
        self.engine.clone()
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        let recorder = self.start_recorder();
        let state = self.control_state();

        let result = pacer_control::run_server(state, shutdown_signal()).await;
        self.shutdown(recorder).await;
        result?;
        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let recorder = self.start_recorder();
        let state = self.control_state();

        let result = pacer_control::serve(listener, state, shutdown).await;
        self.shutdown(recorder).await;
        result?;
        Ok(())
    }

    fn control_state(&self) -> AppState {
        AppState::new(
            self.engine.clone(),
            self.credentials.clone(),
            self.config.control.clone(),
        )
    }

    fn start_recorder(&self) -> JoinHandle<()> {
        let status = self.engine.status();
        Metrics::run_state_set(status.run_state);
        Metrics::queue_length_set(status.queue_length);
        tokio::spawn(record_metrics(self.engine.subscribe()))
    }

    /// Stop any active run and wait for it to exit.
    async fn shutdown(&self, recorder: JoinHandle<()>) {
        info!("Shutting down");
        self.engine.shutdown();

        let timeout = Duration::from_millis(self.config.shutdown_timeout_ms);
        if tokio::time::timeout(timeout, self.engine.wait_until_inactive())
            .await
            .is_err()
        {
            warn!(
                timeout_ms = self.config.shutdown_timeout_ms,
                "Active run did not exit before shutdown timeout"
            );
        }

        recorder.abort();
        info!(state = %self.engine.run_state(), "Shutdown complete");
    }
}

/// Feed Prometheus metrics from the engine event stream.
pub async fn record_metrics(mut rx: broadcast::Receiver<DispatchEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                debug!(event = event.name(), "Recording engine event");
                match event {
                    DispatchEvent::StateChanged { state } => Metrics::run_state_set(state),
                    DispatchEvent::RunStarted { .. } => Metrics::run_started(),
                    DispatchEvent::ItemDispatched { record, .. } => {
                        Metrics::item_dispatched(record.outcome.label(), record.elapsed_ms as f64);
                    }
                    DispatchEvent::RunFinished { summary, .. } => {
                        Metrics::run_finished(summary.label());
                    }
                    DispatchEvent::QueueLoaded { count, .. } => Metrics::queue_length_set(count),
                    DispatchEvent::ConfigUpdated { .. } => {}
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "Metrics recorder lagged behind engine events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pacer_core::{ConfigPatch, RunState};
    use pacer_delivery::MockDelivery;
    use pacer_engine::InlineSource;
    use pacer_telemetry::metrics::{ITEMS_TOTAL, QUEUE_LENGTH};

    #[tokio::test]
    async fn test_recorder_follows_events() {
        let delivery = Arc::new(MockDelivery::new());
        let app = Application::with_delivery(
            AppConfig::default(),
            Arc::new(CredentialStore::new()),
            delivery.clone(),
        );
        let engine = app.engine();
        let recorder = app.start_recorder();

        let delivered_before = ITEMS_TOTAL.with_label_values(&["delivered"]).get();
        engine.configure(&ConfigPatch::delay(0)).unwrap();
        engine
            .load_queue(&InlineSource::new(vec!["a".into(), "b".into()]))
            .await
            .unwrap();
        engine.start("r").unwrap();
        tokio::time::timeout(Duration::from_secs(5), engine.wait_until_inactive())
            .await
            .unwrap();

        // Let the recorder drain the channel.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(QUEUE_LENGTH.get(), 2);
        assert!(ITEMS_TOTAL.with_label_values(&["delivered"]).get() >= delivered_before + 2.0);
        recorder.abort();
    }

    #[tokio::test]
    async fn test_shutdown_stops_active_run() {
        let delivery = Arc::new(MockDelivery::new());
        let mut config = AppConfig::default();
        config.dispatch.delay_ms = 60_000;
        let app = Application::with_delivery(config, Arc::new(CredentialStore::new()), delivery);
        let engine = app.engine();

        engine
            .load_queue(&InlineSource::new(vec!["a".into(), "b".into()]))
            .await
            .unwrap();
        engine.start("r").unwrap();

        let recorder = app.start_recorder();
        app.shutdown(recorder).await;
        assert_eq!(engine.run_state(), RunState::Stopped);
    }
}
