//! Control surface error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pacer_core::DispatchError;
use pacer_delivery::DeliveryError;
use thiserror::Error;

use crate::types::ErrorBody;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid bind address: {0}")]
    InvalidBind(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metrics error: {0}")]
    Metrics(String),
}

pub type ControlResult<T> = Result<T, ControlError>;

impl ControlError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Dispatch(e) => match e {
                DispatchError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                DispatchError::AlreadyRunning => StatusCode::CONFLICT,
                DispatchError::NotReady(_) | DispatchError::EmptyQueue => {
                    StatusCode::PRECONDITION_FAILED
                }
                DispatchError::SourceUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DispatchError::DeliveryFailure { .. } => StatusCode::BAD_GATEWAY,
            },
            Self::Delivery(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidBind(_) | Self::Io(_) | Self::Metrics(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Dispatch(e) => e.kind(),
            Self::Delivery(_) | Self::BadRequest(_) => "invalid_argument",
            Self::InvalidBind(_) | Self::Io(_) | Self::Metrics(_) => "internal",
        }
    }
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}
