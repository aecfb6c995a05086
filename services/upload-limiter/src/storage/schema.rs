use anyhow::Result;
use rusqlite::Connection;

pub const PROVIDERS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS storage_providers (
    miner TEXT PRIMARY KEY,
    uploads TEXT NOT NULL,
    limits TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

pub fn init_database(conn: &Connection) -> Result<()> {
    conn.execute_batch(PROVIDERS_TABLE_SCHEMA)?;
    Ok(())
}
