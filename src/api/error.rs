use axum::{http::StatusCode, Json};
use serde::Serialize;

use crate::application::AllocationError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.to_string(),
            details: None,
        }),
    )
}

pub fn status_for(e: &AllocationError) -> StatusCode {
    match e {
        AllocationError::InvalidRange
        | AllocationError::OutOfWindow(_)
        | AllocationError::InvalidPriority(_)
        | AllocationError::Validation(_) => StatusCode::BAD_REQUEST,
        AllocationError::NotFound(_) => StatusCode::NOT_FOUND,
        AllocationError::Forbidden(_) => StatusCode::FORBIDDEN,
        AllocationError::DuplicateEntry
        | AllocationError::InvalidState(_)
        | AllocationError::CapacityExceeded { .. }
        | AllocationError::Conflict(_) => StatusCode::CONFLICT,
        AllocationError::StorageFailure {
            retryable: true, ..
        } => StatusCode::SERVICE_UNAVAILABLE,
        AllocationError::StorageFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AllocationError> for (StatusCode, Json<ErrorResponse>) {
    fn from(e: AllocationError) -> Self {
        let status = status_for(&e);

        // Storage internals stay in the logs
        let (error, details) = match &e {
            AllocationError::StorageFailure { reason, retryable } => {
                tracing::error!("Storage failure (retryable: {}): {}", retryable, reason);
                let error = if *retryable {
                    "The sign-up system is busy, please try again"
                } else {
                    "Internal storage error"
                };
                (error.to_string(), None)
            }
            AllocationError::CapacityExceeded { accepted, max } => (
                e.to_string(),
                Some(format!("accepted={} max={}", accepted, max)),
            ),
            _ => (e.to_string(), None),
        };

        (
            status,
            Json(ErrorResponse {
                error,
                code: e.code().to_string(),
                details,
            }),
        )
    }
}
