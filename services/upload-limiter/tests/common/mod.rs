#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sp_upload_limiter::{
    FixedClock, Hour, InMemoryLedger, LedgerStore, ProviderRecord, StorageError, UsageTracker,
};

/// In-memory ledger that counts calls and can be told to fail writes.
#[derive(Default)]
pub struct InstrumentedLedger {
    pub inner: InMemoryLedger,
    pub creates: AtomicUsize,
    pub saves: AtomicUsize,
    pub fail_creates: AtomicBool,
    pub fail_saves: AtomicBool,
    pub panic_next_save: AtomicBool,
    pub find_delay: Option<Duration>,
}

impl InstrumentedLedger {
    pub fn with_find_delay(delay: Duration) -> Self {
        Self {
            find_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

fn rejected() -> StorageError {
    StorageError::DatabaseError(rusqlite::Error::InvalidQuery)
}

impl LedgerStore for InstrumentedLedger {
    fn find(&self, provider_id: &str) -> Result<Option<ProviderRecord>, StorageError> {
        if let Some(delay) = self.find_delay {
            std::thread::sleep(delay);
        }
        self.inner.find(provider_id)
    }

    fn create(&self, record: &ProviderRecord) -> Result<(), StorageError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(rejected());
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(record)
    }

    fn save(&self, record: &ProviderRecord) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(rejected());
        }
        if self.panic_next_save.swap(false, Ordering::SeqCst) {
            panic!("ledger save panicked");
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(record)
    }

    fn list(&self) -> Result<Vec<ProviderRecord>, StorageError> {
        self.inner.list()
    }
}

pub fn hour(h: u32) -> Hour {
    Hour::try_from(h).expect("hour in range")
}

pub fn tracker_with(ledger: Arc<InstrumentedLedger>, h: u32) -> (UsageTracker, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(hour(h)));
    let tracker = UsageTracker::new(ledger, clock.clone());
    (tracker, clock)
}
