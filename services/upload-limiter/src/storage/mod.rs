pub mod database;
pub mod error;
pub mod memory;
pub mod schema;

pub use database::LedgerDatabase;
pub use error::StorageError;
pub use memory::InMemoryLedger;

use crate::tracker::ProviderRecord;

pub const LEDGER_DB_FILENAME: &str = "miner_limits.db";

/// Durable home of provider records, keyed by provider id.
///
/// `create` must reject an id that is already stored; `save` overwrites the
/// full usage and limit arrays of the record with the same id.
pub trait LedgerStore: Send + Sync {
    fn find(&self, provider_id: &str) -> Result<Option<ProviderRecord>, StorageError>;

    fn create(&self, record: &ProviderRecord) -> Result<(), StorageError>;

    fn save(&self, record: &ProviderRecord) -> Result<(), StorageError>;

    fn list(&self) -> Result<Vec<ProviderRecord>, StorageError>;
}
