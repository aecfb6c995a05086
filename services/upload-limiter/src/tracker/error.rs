use thiserror::Error;

use crate::storage::StorageError;

use super::clock::Hour;

#[derive(Debug, Error)]
pub enum UsageError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("storage provider {0} not found")]
    NotFound(String),
    #[error(
        "upload limit exceeded for storage provider {provider_id} at {hour}: usage={usage}, limit={limit}"
    )]
    QuotaExceeded {
        provider_id: String,
        hour: Hour,
        usage: i64,
        limit: i64,
    },
    #[error("storage error: {0}")]
    StorageFailure(#[from] StorageError),
}
