//! HTTP server implementation using axum.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use pacer_delivery::CredentialStore;
use pacer_engine::{DispatchEngine, EngineStatus, InlineSource, MessageSource, SourceLocator};
use pacer_telemetry::Metrics;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::ControlConfig;
use crate::error::{ControlError, ControlResult};
use crate::types::{
    ConfigureRequest, ConfigureResponse, CredentialRequest, MessageResponse, QueueRequest,
    QueueResponse, StartRequest, StartResponse, StopResponse,
};

/// Connection limiter to prevent too many concurrent event stream connections.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Claim a slot. The slot is released when the guard is dropped.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                Metrics::event_connection_opened();
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }
}

/// Owned slot in a [`ConnectionLimiter`]; movable into the upgraded socket task.
pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
        Metrics::event_connection_closed();
    }
}

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    engine: DispatchEngine,
    credentials: Arc<CredentialStore>,
    connection_limiter: Arc<ConnectionLimiter>,
    config: ControlConfig,
}

impl AppState {
    pub fn new(
        engine: DispatchEngine,
        credentials: Arc<CredentialStore>,
        config: ControlConfig,
    ) -> Self {
        Self {
            engine,
            credentials,
            connection_limiter: Arc::new(ConnectionLimiter::new(config.max_event_connections)),
            config,
        }
    }

    pub fn engine(&self) -> &DispatchEngine {
        &self.engine
    }
}

/// Create the axum router.
///
/// Every control endpoint is also mounted under its legacy path.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/credential", post(set_credential))
        .route("/set-cookie", post(set_credential))
        .route("/api/queue", post(load_queue))
        .route("/load-messages", post(load_queue))
        .route("/api/configure", post(configure))
        .route("/configure", post(configure))
        .route("/api/start", post(start))
        .route("/start", post(start))
        .route("/api/stop", post(stop))
        .route("/stop", post(stop))
        .route("/api/status", get(status))
        .route("/status", get(status))
        .route("/api/events", get(events_handler))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Unwrap a JSON body, mapping extractor rejections to `invalid_argument`.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ControlResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ControlError::BadRequest(rejection.body_text()))
}

async fn set_credential(
    State(state): State<AppState>,
    body: Result<Json<CredentialRequest>, JsonRejection>,
) -> ControlResult<Json<MessageResponse>> {
    let request = json_body(body)?;
    let credential = request.credential.unwrap_or_default();
    state.credentials.set(credential)?;
    Ok(Json(MessageResponse::ok("Credential stored")))
}

async fn load_queue(
    State(state): State<AppState>,
    body: Result<Json<QueueRequest>, JsonRejection>,
) -> ControlResult<Json<QueueResponse>> {
    let request = json_body(body)?;
    let source: Box<dyn MessageSource> = match (request.messages, request.file_path, request.url) {
        (Some(messages), None, None) => Box::new(InlineSource::new(messages)),
        (None, Some(path), None) => SourceLocator::parse(&path)?.into_source()?,
        (None, None, Some(url)) => match SourceLocator::parse(&url)? {
            locator @ SourceLocator::Url(_) => locator.into_source()?,
            SourceLocator::File(_) => {
                return Err(ControlError::BadRequest(
                    "url must start with http:// or https://".to_string(),
                ))
            }
        },
        (None, None, None) => {
            return Err(ControlError::BadRequest(
                "one of filePath, url or messages is required".to_string(),
            ))
        }
        _ => {
            return Err(ControlError::BadRequest(
                "only one of filePath, url or messages may be given".to_string(),
            ))
        }
    };

    let count = state.engine.load_queue(source.as_ref()).await?;
    Ok(Json(QueueResponse {
        success: true,
        message: format!("Loaded {count} messages"),
        count,
    }))
}

async fn configure(
    State(state): State<AppState>,
    body: Result<Json<ConfigureRequest>, JsonRejection>,
) -> ControlResult<Json<ConfigureResponse>> {
    let patch = json_body(body)?.into_patch()?;
    let config = state.engine.configure(&patch)?;
    Ok(Json(ConfigureResponse {
        success: true,
        config,
    }))
}

async fn start(
    State(state): State<AppState>,
    body: Result<Json<StartRequest>, JsonRejection>,
) -> ControlResult<Json<StartResponse>> {
    let request = json_body(body)?;
    let ack = state
        .engine
        .start(request.recipient_id.as_deref().unwrap_or_default())?;

    Ok(Json(StartResponse {
        success: true,
        message: format!("Dispatch of {} messages started", ack.queue_length),
        run_id: ack.run_id,
        recipient_id: ack.recipient_id,
        queue_length: ack.queue_length,
    }))
}

async fn stop(State(state): State<AppState>) -> Json<StopResponse> {
    let ack = state.engine.stop();
    let message = if ack.signalled {
        "Stop requested"
    } else {
        "No active run"
    };
    Json(StopResponse {
        success: true,
        message: message.to_string(),
        signalled: ack.signalled,
    })
}

async fn status(State(state): State<AppState>) -> Json<EngineStatus> {
    Json(state.engine.status())
}

async fn metrics() -> ControlResult<Response> {
    let text = Metrics::gather().map_err(|e| ControlError::Metrics(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    )
        .into_response())
}

async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler for the event stream.
async fn events_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    // Check connection limit
    let Some(guard) = state.connection_limiter.try_acquire() else {
        warn!(
            current = state.connection_limiter.current_count(),
            max = state.config.max_event_connections,
            "Event stream connection limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };

    info!(
        connections = state.connection_limiter.current_count(),
        "New event stream connection"
    );

    ws.on_upgrade(move |socket| handle_events_connection(socket, state, guard))
}

/// Forward engine events to one WebSocket client.
async fn handle_events_connection(socket: WebSocket, state: AppState, _guard: ConnectionGuard) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot so nothing falls in between.
    let mut events_rx = state.engine.subscribe();

    // Send initial status
    let initial = serde_json::json!({
        "type": "status",
        "status": state.engine.status(),
    });
    if sender
        .send(Message::Text(initial.to_string().into()))
        .await
        .is_err()
    {
        debug!("Failed to send initial status, client disconnected");
        return;
    }

    // Spawn task to handle incoming messages (for close)
    let mut incoming_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    debug!("Client sent close frame");
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "WebSocket receive error");
                    break;
                }
                _ => {}
            }
        }
    });

    // Main loop: forward engine events to WebSocket
    loop {
        tokio::select! {
            result = events_rx.recv() => {
                match result {
                    Ok(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!(error = %e, event = event.name(), "Failed to serialize event");
                                continue;
                            }
                        };
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            debug!("Failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Event stream client lagged, catching up");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Event channel closed");
                        break;
                    }
                }
            }
            _ = &mut incoming_task => {
                debug!("Incoming task completed, closing connection");
                break;
            }
        }
    }

    incoming_task.abort();
    info!(
        connections = state.connection_limiter.current_count().saturating_sub(1),
        "Event stream connection closed"
    );
}

/// Serve the control API on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> ControlResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Bind the configured address and serve the control API.
pub async fn run_server<F>(state: AppState, shutdown: F) -> ControlResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = state.config.socket_addr()?;
    info!(%addr, "Starting control server");

    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, shutdown).await
}
