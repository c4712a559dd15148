use chrono::{DateTime, Utc};

use crate::domain::repositories::RepositoryError;
use crate::domain::value_objects::InvalidPriority;

/// Errors surfaced by allocation operations
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("Slot start must be before its end")]
    InvalidRange,
    #[error("{0} is outside the convention window")]
    OutOfWindow(DateTime<Utc>),
    #[error("Priority must be between 1 and 5, got {0}")]
    InvalidPriority(i64),
    #[error("An entry for this slot already exists")]
    DuplicateEntry,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Slot is full ({accepted} of {max} players accepted)")]
    CapacityExceeded { accepted: u32, max: u32 },
    #[error("Scheduling conflict: {0}")]
    Conflict(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Storage failure: {reason}")]
    StorageFailure { reason: String, retryable: bool },
}

impl AllocationError {
    /// Only contention is worth retrying; everything else fails the same way twice
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AllocationError::StorageFailure {
                retryable: true,
                ..
            }
        )
    }

    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            AllocationError::InvalidRange => "INVALID_RANGE",
            AllocationError::OutOfWindow(_) => "OUT_OF_WINDOW",
            AllocationError::InvalidPriority(_) => "INVALID_PRIORITY",
            AllocationError::DuplicateEntry => "DUPLICATE_ENTRY",
            AllocationError::NotFound(_) => "NOT_FOUND",
            AllocationError::InvalidState(_) => "INVALID_STATE",
            AllocationError::Forbidden(_) => "FORBIDDEN",
            AllocationError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            AllocationError::Conflict(_) => "CONFLICT",
            AllocationError::Validation(_) => "VALIDATION_ERROR",
            AllocationError::StorageFailure { .. } => "STORAGE_FAILURE",
        }
    }

    pub(crate) fn busy(reason: impl Into<String>) -> Self {
        AllocationError::StorageFailure {
            reason: reason.into(),
            retryable: true,
        }
    }
}

impl From<RepositoryError> for AllocationError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Busy(reason) => AllocationError::busy(reason),
            RepositoryError::AlreadyExists(what) => {
                AllocationError::Validation(format!("{} already exists", what))
            }
            RepositoryError::NotFound(what) => AllocationError::StorageFailure {
                reason: format!("{} disappeared during the operation", what),
                retryable: false,
            },
            RepositoryError::Database(reason) => AllocationError::StorageFailure {
                reason,
                retryable: false,
            },
        }
    }
}

impl From<InvalidPriority> for AllocationError {
    fn from(e: InvalidPriority) -> Self {
        AllocationError::InvalidPriority(e.0)
    }
}
