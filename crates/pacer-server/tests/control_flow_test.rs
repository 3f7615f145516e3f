//! End-to-end control flow tests.
//!
//! Runs the full application on a real TCP listener with a mock delivery port
//! and drives it over HTTP:
//! - Credential, queue, configure, start, status
//! - Stop during a long delay
//! - Event stream over WebSocket
//! - Graceful shutdown while a run is active

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use pacer_core::RunState;
use pacer_delivery::{CredentialStore, MockDelivery};
use pacer_engine::DispatchEngine;
use pacer_server::{AppConfig, Application};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

/// Running application bound to an ephemeral port.
struct TestServer {
    addr: SocketAddr,
    engine: DispatchEngine,
    delivery: Arc<MockDelivery>,
    client: reqwest::Client,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let delivery = Arc::new(MockDelivery::new());
        let mut config = AppConfig::default();
        config.shutdown_timeout_ms = 2_000;
        let app = Application::with_delivery(
            config,
            Arc::new(CredentialStore::new()),
            delivery.clone(),
        );
        let engine = app.engine();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            app.serve(listener, shutdown).await.unwrap();
        });

        Self {
            addr,
            engine,
            delivery,
            client: reqwest::Client::new(),
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let response = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn status(&self) -> Value {
        self.client
            .get(self.url("/api/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn wait_for_state(&self, state: &str) -> Value {
        timeout(Duration::from_secs(5), async {
            loop {
                let status = self.status().await;
                if status["runState"] == state {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("state should be reached within timeout")
    }

    async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        timeout(Duration::from_secs(5), &mut self.handle)
            .await
            .expect("server should shut down")
            .unwrap();
    }
}

#[tokio::test]
async fn test_dispatch_over_http() {
    let server = TestServer::start().await;

    let (status, _) = server
        .post("/api/credential", json!({"credential": "token"}))
        .await;
    assert_eq!(status, 200);

    let (status, _) = server
        .post("/api/configure", json!({"delayMillis": 10, "prefix": "[X]"}))
        .await;
    assert_eq!(status, 200);

    let (status, body) = server
        .post("/api/queue", json!({"messages": ["a", "b", "c"]}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["count"], 3);

    let (status, body) = server
        .post("/api/start", json!({"recipientId": "thread-9"}))
        .await;
    assert_eq!(status, 200);
    let run_id = body["runId"].as_str().unwrap().to_string();

    let status = server.wait_for_state("idle").await;
    assert_eq!(status["lastRun"]["runId"], run_id.as_str());
    assert_eq!(status["lastRun"]["summary"]["kind"], "completed");
    assert_eq!(status["lastRun"]["summary"]["delivered"], 3);
    assert_eq!(server.delivery.texts(), vec!["[X] a", "[X] b", "[X] c"]);

    let metrics = server
        .client
        .get(server.url("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("pacer_runs_started_total"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_stop_during_long_delay() {
    let server = TestServer::start().await;
    server.post("/api/configure", json!({"delayMillis": 60000})).await;
    server
        .post("/api/queue", json!({"messages": ["a", "b", "c"]}))
        .await;

    let (status, _) = server.post("/api/start", json!({"recipientId": "r"})).await;
    assert_eq!(status, 200);

    let (status, body) = server.post("/api/start", json!({"recipientId": "r"})).await;
    assert_eq!(status, 409);
    assert_eq!(body["kind"], "already_running");

    let (status, body) = server.post("/api/stop", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["signalled"], true);

    let status = server.wait_for_state("idle").await;
    assert_eq!(status["lastRun"]["summary"]["kind"], "stopped");
    assert!(server.delivery.send_count() <= 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_event_stream() {
    let server = TestServer::start().await;
    server.post("/api/configure", json!({"delayMillis": 0})).await;
    server.post("/api/queue", json!({"messages": ["a", "b"]})).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/api/events", server.addr))
        .await
        .unwrap();

    // First frame is the current status.
    let first = next_json(&mut ws).await;
    assert_eq!(first["type"], "status");
    assert_eq!(first["status"]["queueLength"], 2);

    server.post("/api/start", json!({"recipientId": "r"})).await;

    let mut types = Vec::new();
    timeout(Duration::from_secs(5), async {
        loop {
            let event = next_json(&mut ws).await;
            let kind = event["type"].as_str().unwrap_or_default().to_string();
            types.push(kind.clone());
            if kind == "run_finished" {
                break;
            }
        }
    })
    .await
    .expect("run_finished should arrive");

    assert_eq!(types.first().map(String::as_str), Some("state_changed"));
    assert!(types.contains(&"run_started".to_string()));
    assert_eq!(
        types.iter().filter(|t| t.as_str() == "item_dispatched").count(),
        2
    );

    drop(ws);
    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_with_active_run() {
    let server = TestServer::start().await;
    server.post("/api/configure", json!({"delayMillis": 60000})).await;
    server.post("/api/queue", json!({"messages": ["a", "b"]})).await;
    server.post("/api/start", json!({"recipientId": "r"})).await;

    let engine = server.engine.clone();
    server.shutdown().await;

    assert_eq!(engine.run_state(), RunState::Stopped);
    let report = engine.status().last_run.unwrap();
    assert_eq!(report.summary.label(), "stopped");
}

async fn next_json<S>(ws: &mut S) -> Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("event stream ended: {other:?}"),
        }
    }
}
