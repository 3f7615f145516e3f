//! pacer-control - HTTP control surface for the dispatch engine.
//!
//! Translates JSON requests into [`DispatchEngine`](pacer_engine::DispatchEngine)
//! calls and engine errors into HTTP status codes.
//!
//! # Endpoints
//!
//! ```text
//! POST /api/credential   (/set-cookie)     store the delivery credential
//! POST /api/queue        (/load-messages)  load the message queue
//! POST /api/configure    (/configure)      partial configuration update
//! POST /api/start        (/start)          start a dispatch run
//! POST /api/stop         (/stop)           request stop
//! GET  /api/status       (/status)         engine status
//! GET  /api/events                         WebSocket stream of engine events
//! GET  /metrics                            Prometheus text exposition
//! GET  /health                             liveness
//! ```
//!
//! Error responses are `{"success": false, "error": "...", "kind": "..."}`.

mod config;
mod error;
mod server;
mod types;

pub use config::ControlConfig;
pub use error::{ControlError, ControlResult};
pub use server::{create_router, run_server, serve, AppState, ConnectionGuard, ConnectionLimiter};
pub use types::{
    ConfigureRequest, CredentialRequest, DelayValue, ErrorBody, QueueRequest, StartRequest,
};
