mod allocation_repository;

pub use allocation_repository::*;

/// Error type for repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    /// Lock or connection contention; the same operation may succeed if retried
    #[error("Storage busy: {0}")]
    Busy(String),
    #[error("Database error: {0}")]
    Database(String),
}
