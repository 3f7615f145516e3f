//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Control server error: {0}")]
    Control(#[from] pacer_control::ControlError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] pacer_delivery::DeliveryError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] pacer_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
