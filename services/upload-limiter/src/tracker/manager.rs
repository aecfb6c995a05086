use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::storage::{LedgerStore, StorageError};

use super::clock::{Hour, HourClock};
use super::error::UsageError;
use super::record::{LimitCheck, ProviderRecord};

type SharedRecord = Arc<Mutex<ProviderRecord>>;

/// Hourly upload tracker fronting a [`LedgerStore`].
///
/// Every cached provider has exactly one shared record. Resolving an id that
/// is not cached yet happens while holding the map's entry guard, so two
/// first-time callers for the same id cannot both create it. Mutations lock
/// the record itself and persist before releasing it.
#[derive(Clone)]
pub struct UsageTracker {
    cache: Arc<DashMap<String, SharedRecord>>,
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn HourClock>,
}

impl UsageTracker {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn HourClock>) -> Self {
        Self {
            cache: Arc::new(DashMap::new()),
            store,
            clock,
        }
    }

    pub fn current_hour(&self) -> Hour {
        self.clock.current_hour()
    }

    /// Loads every stored record into the cache. Records already cached are
    /// left untouched.
    pub fn warm_cache(&self) -> Result<usize, StorageError> {
        let mut loaded = 0usize;

        for record in self.store.list()? {
            if let Entry::Vacant(slot) = self.cache.entry(record.id().to_string()) {
                slot.insert(Arc::new(Mutex::new(record)));
                loaded += 1;
            }
        }

        Ok(loaded)
    }

    pub fn get_or_create(&self, provider_id: &str) -> Result<ProviderRecord, UsageError> {
        let shared = self.resolve_or_create(provider_id)?;
        let record = lock_record(&shared, provider_id);
        Ok(record.clone())
    }

    pub fn record_limit(&self, provider_id: &str, value: i64) -> Result<ProviderRecord, UsageError> {
        self.record_limit_at(provider_id, self.current_hour(), value)
    }

    pub fn record_limit_at(
        &self,
        provider_id: &str,
        hour: Hour,
        value: i64,
    ) -> Result<ProviderRecord, UsageError> {
        let shared = self.resolve_or_create(provider_id)?;
        let mut record = lock_record(&shared, provider_id);

        let previous = record.set_limit(hour, value);
        self.store.save(&record)?;

        debug!(
            provider_id,
            hour = hour.value(),
            previous,
            limit = value,
            "recorded upload limit"
        );
        Ok(record.clone())
    }

    pub fn record_usage(&self, provider_id: &str, amount: i64) -> Result<ProviderRecord, UsageError> {
        self.record_usage_at(provider_id, self.current_hour(), amount)
    }

    pub fn record_usage_at(
        &self,
        provider_id: &str,
        hour: Hour,
        amount: i64,
    ) -> Result<ProviderRecord, UsageError> {
        if amount < 0 {
            return Err(UsageError::InvalidInput(format!(
                "upload size must not be negative, got {amount}"
            )));
        }

        let shared = self.resolve_or_create(provider_id)?;
        let mut record = lock_record(&shared, provider_id);

        let total = record.add_usage(hour, amount);
        self.store.save(&record)?;

        debug!(
            provider_id,
            hour = hour.value(),
            amount,
            total,
            "recorded upload usage"
        );
        Ok(record.clone())
    }

    pub fn check_limit(&self, provider_id: &str) -> Result<LimitCheck, UsageError> {
        self.check_limit_at(provider_id, self.current_hour())
    }

    /// Compares usage with the limit for `hour`. Unknown providers are
    /// reported as [`UsageError::NotFound`] and are not created.
    pub fn check_limit_at(&self, provider_id: &str, hour: Hour) -> Result<LimitCheck, UsageError> {
        let shared = self.resolve_existing(provider_id)?;
        let record = lock_record(&shared, provider_id).clone();
        Ok(LimitCheck::evaluate(record, hour))
    }

    pub fn enforce_limit(&self, provider_id: &str) -> Result<ProviderRecord, UsageError> {
        self.enforce_limit_at(provider_id, self.current_hour())
    }

    pub fn enforce_limit_at(
        &self,
        provider_id: &str,
        hour: Hour,
    ) -> Result<ProviderRecord, UsageError> {
        let check = self.check_limit_at(provider_id, hour)?;

        if check.exceeded {
            info!(
                provider_id,
                hour = hour.value(),
                usage = check.usage,
                limit = check.limit,
                "upload limit exceeded"
            );
            return Err(UsageError::QuotaExceeded {
                provider_id: provider_id.to_string(),
                hour,
                usage: check.usage,
                limit: check.limit,
            });
        }

        Ok(check.record)
    }

    pub fn get_record(&self, provider_id: &str) -> Result<ProviderRecord, UsageError> {
        let shared = self.resolve_existing(provider_id)?;
        let record = lock_record(&shared, provider_id);
        Ok(record.clone())
    }

    pub fn cached_records(&self) -> Result<Vec<ProviderRecord>, UsageError> {
        let shared: Vec<(String, SharedRecord)> = self
            .cache
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut records = Vec::with_capacity(shared.len());
        for (provider_id, record) in shared {
            records.push(lock_record(&record, &provider_id).clone());
        }
        records.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(records)
    }

    fn resolve_or_create(&self, provider_id: &str) -> Result<SharedRecord, UsageError> {
        validate_provider_id(provider_id)?;

        if let Some(existing) = self.cache.get(provider_id) {
            return Ok(Arc::clone(existing.value()));
        }

        match self.cache.entry(provider_id.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(slot) => {
                if let Some(stored) = self.store.find(provider_id)? {
                    debug!(provider_id, "loaded storage provider from ledger");
                    let shared = Arc::new(Mutex::new(stored));
                    slot.insert(Arc::clone(&shared));
                    return Ok(shared);
                }

                let record = ProviderRecord::new(provider_id);
                let shared = Arc::new(Mutex::new(record.clone()));

                // keep the entry guard until the ledger row exists
                let guard = slot.insert(Arc::clone(&shared));
                let created = self.store.create(&record);
                drop(guard);
                created?;

                info!(provider_id, "created storage provider record");
                Ok(shared)
            }
        }
    }

    fn resolve_existing(&self, provider_id: &str) -> Result<SharedRecord, UsageError> {
        validate_provider_id(provider_id)?;

        if let Some(existing) = self.cache.get(provider_id) {
            return Ok(Arc::clone(existing.value()));
        }

        match self.cache.entry(provider_id.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(slot) => match self.store.find(provider_id)? {
                Some(stored) => {
                    debug!(provider_id, "loaded storage provider from ledger");
                    let shared = Arc::new(Mutex::new(stored));
                    slot.insert(Arc::clone(&shared));
                    Ok(shared)
                }
                None => Err(UsageError::NotFound(provider_id.to_string())),
            },
        }
    }
}

/// Ids are used verbatim; only empty or all-whitespace ids are rejected.
fn validate_provider_id(provider_id: &str) -> Result<(), UsageError> {
    if provider_id.trim().is_empty() {
        return Err(UsageError::InvalidInput(
            "storage provider id cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// A panic in the ledger can poison a record's lock after its slot was
/// already written; the arrays are still whole, so the guard is reclaimed.
fn lock_record<'a>(shared: &'a SharedRecord, provider_id: &str) -> MutexGuard<'a, ProviderRecord> {
    shared.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
        warn!(provider_id, "recovering record lock after a panicked update");
        shared.clear_poison();
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryLedger;
    use crate::tracker::FixedClock;

    fn hour(h: u32) -> Hour {
        Hour::try_from(h).unwrap()
    }

    fn tracker_at(h: u32) -> (UsageTracker, Arc<InMemoryLedger>, Arc<FixedClock>) {
        let ledger = Arc::new(InMemoryLedger::new());
        let clock = Arc::new(FixedClock::new(hour(h)));
        let tracker = UsageTracker::new(ledger.clone(), clock.clone());
        (tracker, ledger, clock)
    }

    #[test]
    fn get_or_create_persists_zeroed_record_once() {
        let (tracker, ledger, _) = tracker_at(0);

        let first = tracker.get_or_create("f01").unwrap();
        let second = tracker.get_or_create("f01").unwrap();

        assert_eq!(first, ProviderRecord::new("f01"));
        assert_eq!(first, second);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn get_or_create_prefers_stored_record() {
        let (tracker, ledger, _) = tracker_at(0);
        let mut stored = ProviderRecord::new("f02");
        stored.set_limit(hour(4), 99);
        ledger.create(&stored).unwrap();

        let record = tracker.get_or_create("f02").unwrap();
        assert_eq!(record.limit_at(hour(4)), 99);
    }

    #[test]
    fn empty_provider_id_is_invalid() {
        let (tracker, ledger, _) = tracker_at(0);

        assert!(matches!(
            tracker.record_usage("  ", 1),
            Err(UsageError::InvalidInput(_))
        ));
        assert!(matches!(
            tracker.check_limit(""),
            Err(UsageError::InvalidInput(_))
        ));
        assert!(ledger.is_empty());
    }

    #[test]
    fn record_limit_uses_clock_hour_and_overwrites() {
        let (tracker, ledger, clock) = tracker_at(14);

        tracker.record_limit("f03", 10).unwrap();
        let record = tracker.record_limit("f03", 0).unwrap();
        assert_eq!(record.limit_at(hour(14)), 0);

        clock.set(hour(15));
        let record = tracker.record_limit("f03", 25).unwrap();
        assert_eq!(record.limit_at(hour(14)), 0);
        assert_eq!(record.limit_at(hour(15)), 25);

        let stored = ledger.find("f03").unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[test]
    fn negative_usage_is_rejected_without_creating() {
        let (tracker, ledger, _) = tracker_at(1);

        let err = tracker.record_usage("f04", -5).unwrap_err();
        assert!(matches!(err, UsageError::InvalidInput(_)));
        assert!(ledger.is_empty());
        assert!(matches!(
            tracker.check_limit("f04"),
            Err(UsageError::NotFound(_))
        ));
    }

    #[test]
    fn check_limit_does_not_create_unknown_provider() {
        let (tracker, ledger, _) = tracker_at(2);

        assert!(matches!(
            tracker.check_limit("f05"),
            Err(UsageError::NotFound(id)) if id == "f05"
        ));
        assert!(matches!(
            tracker.get_record("f05"),
            Err(UsageError::NotFound(_))
        ));
        assert!(ledger.is_empty());
        assert!(tracker.cached_records().unwrap().is_empty());
    }

    #[test]
    fn check_limit_reads_through_to_ledger() {
        let (tracker, ledger, _) = tracker_at(6);
        let mut stored = ProviderRecord::new("f06");
        stored.add_usage(hour(6), 11);
        stored.set_limit(hour(6), 10);
        ledger.create(&stored).unwrap();

        let check = tracker.check_limit("f06").unwrap();
        assert!(check.exceeded);
        assert_eq!(tracker.cached_records().unwrap().len(), 1);
    }

    #[test]
    fn enforce_limit_signals_quota_exceeded() {
        let (tracker, _, _) = tracker_at(20);
        tracker.record_limit("f07", 5).unwrap();
        tracker.record_usage("f07", 5).unwrap();
        assert!(tracker.enforce_limit("f07").is_ok());

        tracker.record_usage("f07", 1).unwrap();
        match tracker.enforce_limit("f07") {
            Err(UsageError::QuotaExceeded {
                provider_id,
                hour: h,
                usage,
                limit,
            }) => {
                assert_eq!(provider_id, "f07");
                assert_eq!(h, hour(20));
                assert_eq!(usage, 6);
                assert_eq!(limit, 5);
            }
            other => panic!("expected quota exceeded, got {other:?}"),
        }
    }

    #[test]
    fn warm_cache_keeps_existing_entries() {
        let (tracker, ledger, _) = tracker_at(3);
        ledger.create(&ProviderRecord::new("a")).unwrap();
        ledger.create(&ProviderRecord::new("b")).unwrap();

        tracker.record_usage("a", 7).unwrap();
        let loaded = tracker.warm_cache().unwrap();

        assert_eq!(loaded, 1);
        let records = tracker.cached_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].usage_at(hour(3)), 7);
    }
}
