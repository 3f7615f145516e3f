//! pacer - paced message dispatch service.
//!
//! Wires the components into one process:
//! - Delivery credential store and HTTP delivery adapter
//! - Dispatch engine
//! - Metrics recorder fed from the engine event stream
//! - HTTP control surface
//! - Graceful shutdown on Ctrl-C

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
