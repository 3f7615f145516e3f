//! Delivery error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;
