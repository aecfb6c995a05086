use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("storage provider {0} already exists")]
    DuplicateProvider(String),
    #[error("corrupt record for storage provider {provider_id}: {reason}")]
    CorruptRecord { provider_id: String, reason: String },
    #[error("ledger lock poisoned")]
    LockPoisoned,
}
