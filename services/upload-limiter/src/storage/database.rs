use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info};

use crate::tracker::{HourlySlots, ProviderRecord};

use super::error::StorageError;
use super::schema::init_database;
use super::{LedgerStore, LEDGER_DB_FILENAME};

/// SQLite-backed ledger; the usage and limit arrays are stored as JSON text.
pub struct LedgerDatabase {
    conn: Mutex<Connection>,
}

impl LedgerDatabase {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)?;
        let db_path = data_dir.join(LEDGER_DB_FILENAME);
        let conn = Connection::open(&db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        init_database(&conn)?;
        info!(path = %db_path.display(), "opened provider ledger");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl LedgerStore for LedgerDatabase {
    fn find(&self, provider_id: &str) -> Result<Option<ProviderRecord>, StorageError> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT miner, uploads, limits
            FROM storage_providers
            WHERE miner = ?1
            "#,
        )?;

        let row = stmt
            .query_row(params![provider_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .optional()?;

        row.map(|(miner, uploads, limits)| decode_record(miner, &uploads, &limits))
            .transpose()
    }

    fn create(&self, record: &ProviderRecord) -> Result<(), StorageError> {
        let conn = self.connection()?;
        let now = Utc::now().to_rfc3339();
        let (uploads, limits) = encode_slots(record)?;

        let inserted = conn.execute(
            r#"
            INSERT INTO storage_providers (miner, uploads, limits, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![record.id(), uploads, limits, now, now],
        );

        match inserted {
            Ok(_) => {
                debug!(provider_id = record.id(), "inserted provider row");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::DuplicateProvider(record.id().to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, record: &ProviderRecord) -> Result<(), StorageError> {
        let conn = self.connection()?;
        let now = Utc::now().to_rfc3339();
        let (uploads, limits) = encode_slots(record)?;

        conn.execute(
            r#"
            INSERT INTO storage_providers (miner, uploads, limits, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(miner) DO UPDATE SET
                uploads = excluded.uploads,
                limits = excluded.limits,
                updated_at = excluded.updated_at
            "#,
            params![record.id(), uploads, limits, now, now],
        )?;

        Ok(())
    }

    fn list(&self) -> Result<Vec<ProviderRecord>, StorageError> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT miner, uploads, limits
            FROM storage_providers
            ORDER BY miner
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (miner, uploads, limits) = row?;
            records.push(decode_record(miner, &uploads, &limits)?);
        }
        Ok(records)
    }
}

fn encode_slots(record: &ProviderRecord) -> Result<(String, String), StorageError> {
    let encode = |slots: &HourlySlots| {
        serde_json::to_string(slots).map_err(|err| StorageError::CorruptRecord {
            provider_id: record.id().to_string(),
            reason: err.to_string(),
        })
    };
    Ok((encode(record.usage())?, encode(record.limit())?))
}

fn decode_record(
    provider_id: String,
    uploads: &str,
    limits: &str,
) -> Result<ProviderRecord, StorageError> {
    let usage = decode_slots(&provider_id, "uploads", uploads)?;
    let limit = decode_slots(&provider_id, "limits", limits)?;
    Ok(ProviderRecord::from_parts(provider_id, usage, limit))
}

fn decode_slots(provider_id: &str, column: &str, raw: &str) -> Result<HourlySlots, StorageError> {
    serde_json::from_str(raw).map_err(|err| StorageError::CorruptRecord {
        provider_id: provider_id.to_string(),
        reason: format!("{column}: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Hour;
    use tempfile::tempdir;

    #[test]
    fn create_then_find_returns_zeroed_record() {
        let dir = tempdir().expect("failed to create temp dir");
        let ledger = LedgerDatabase::new(dir.path().to_path_buf()).unwrap();

        ledger.create(&ProviderRecord::new("f01234")).unwrap();

        let found = ledger.find("f01234").unwrap().expect("record should exist");
        assert_eq!(found, ProviderRecord::new("f01234"));
        assert!(ledger.find("f09999").unwrap().is_none());
    }

    #[test]
    fn create_rejects_duplicate_provider() {
        let dir = tempdir().expect("failed to create temp dir");
        let ledger = LedgerDatabase::new(dir.path().to_path_buf()).unwrap();

        ledger.create(&ProviderRecord::new("f01234")).unwrap();
        let err = ledger.create(&ProviderRecord::new("f01234")).unwrap_err();

        assert!(matches!(err, StorageError::DuplicateProvider(id) if id == "f01234"));
    }

    #[test]
    fn save_overwrites_slots_and_survives_reopen() {
        let dir = tempdir().expect("failed to create temp dir");
        let hour = Hour::try_from(9u32).unwrap();

        {
            let ledger = LedgerDatabase::new(dir.path().to_path_buf()).unwrap();
            let mut record = ProviderRecord::new("f01234");
            ledger.create(&record).unwrap();
            record.set_limit(hour, 512);
            record.add_usage(hour, 128);
            ledger.save(&record).unwrap();
        }

        let reopened = LedgerDatabase::new(dir.path().to_path_buf()).unwrap();
        let record = reopened.find("f01234").unwrap().unwrap();
        assert_eq!(record.limit_at(hour), 512);
        assert_eq!(record.usage_at(hour), 128);
        assert_eq!(reopened.list().unwrap().len(), 1);
    }

    #[test]
    fn find_reports_rows_with_wrong_slot_count() {
        let dir = tempdir().expect("failed to create temp dir");
        let ledger = LedgerDatabase::new(dir.path().to_path_buf()).unwrap();

        ledger
            .connection()
            .unwrap()
            .execute(
                "INSERT INTO storage_providers VALUES ('f0bad', '[1,2,3]', '[0]', 'x', 'x')",
                [],
            )
            .unwrap();

        let err = ledger.find("f0bad").unwrap_err();
        assert!(matches!(err, StorageError::CorruptRecord { .. }));
    }
}
