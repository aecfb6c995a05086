use std::collections::HashMap;
use std::sync::RwLock;

use crate::tracker::ProviderRecord;

use super::error::StorageError;
use super::LedgerStore;

/// Process-local ledger. Records live as long as the value does.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    records: RwLock<HashMap<String, ProviderRecord>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LedgerStore for InMemoryLedger {
    fn find(&self, provider_id: &str) -> Result<Option<ProviderRecord>, StorageError> {
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.get(provider_id).cloned())
    }

    fn create(&self, record: &ProviderRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().map_err(|_| StorageError::LockPoisoned)?;
        if records.contains_key(record.id()) {
            return Err(StorageError::DuplicateProvider(record.id().to_string()));
        }
        records.insert(record.id().to_string(), record.clone());
        Ok(())
    }

    fn save(&self, record: &ProviderRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().map_err(|_| StorageError::LockPoisoned)?;
        records.insert(record.id().to_string(), record.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<ProviderRecord>, StorageError> {
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut all: Vec<_> = records.values().cloned().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(all)
    }
}
