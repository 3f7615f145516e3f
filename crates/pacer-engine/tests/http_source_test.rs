//! URL message source tests.
//!
//! Loads queues from an in-process text server:
//! - 200 body parsed into trimmed, non-blank lines
//! - Non-2xx is `source_unavailable`
//! - A failed URL load keeps the previous queue

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use pacer_core::ConfigPatch;
use pacer_delivery::MockDelivery;
use pacer_engine::{DispatchEngine, HttpSource, InlineSource, MessageSource, SourceLocator};
use tokio::net::TcpListener;

/// Stub server for message documents.
struct TextServer {
    addr: SocketAddr,
    handle: tokio::task::JoinHandle<()>,
}

impl TextServer {
    async fn start() -> Self {
        let app = Router::new()
            .route(
                "/messages.txt",
                get(|| async { "  first \n\n second\r\n\t\nthird\n" }),
            )
            .route(
                "/missing.txt",
                get(|| async { (StatusCode::NOT_FOUND, "no such list") }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TextServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn test_url_source_reads_lines_in_order() {
    let server = TextServer::start().await;
    let source = HttpSource::new(server.url("/messages.txt")).unwrap();

    assert_eq!(
        source.load().await.unwrap(),
        vec!["first", "second", "third"]
    );
    assert_eq!(source.describe(), server.url("/messages.txt"));
}

#[tokio::test]
async fn test_url_source_non_2xx_is_unavailable() {
    let server = TextServer::start().await;
    let source = HttpSource::new(server.url("/missing.txt")).unwrap();

    let err = source.load().await.unwrap_err();
    assert_eq!(err.kind(), "source_unavailable");
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn test_engine_loads_queue_from_url() {
    let server = TextServer::start().await;
    let engine = DispatchEngine::new(Arc::new(MockDelivery::new()));

    let source = SourceLocator::parse(&server.url("/messages.txt"))
        .unwrap()
        .into_source()
        .unwrap();
    assert_eq!(engine.load_queue(source.as_ref()).await.unwrap(), 3);
    assert_eq!(engine.status().queue_length, 3);
}

#[tokio::test]
async fn test_failed_url_load_keeps_previous_queue() {
    let server = TextServer::start().await;
    let delivery = Arc::new(MockDelivery::new());
    let engine = DispatchEngine::new(delivery.clone());
    engine.configure(&ConfigPatch::delay(0)).unwrap();
    engine
        .load_queue(&InlineSource::new(vec!["kept-1".into(), "kept-2".into()]))
        .await
        .unwrap();

    let failing = HttpSource::new(server.url("/missing.txt")).unwrap();
    let err = engine.load_queue(&failing).await.unwrap_err();
    assert_eq!(err.kind(), "source_unavailable");
    assert_eq!(engine.status().queue_length, 2);

    engine.start("r").unwrap();
    tokio::time::timeout(Duration::from_secs(5), engine.wait_until_inactive())
        .await
        .expect("run should finish within timeout");
    assert_eq!(delivery.texts(), vec!["kept-1", "kept-2"]);
}
