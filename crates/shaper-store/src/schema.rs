use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    // Seeds are u64 and may not fit an INTEGER column, so they are kept as text.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS runs (
            id             TEXT PRIMARY KEY,
            label          TEXT NOT NULL DEFAULT '',
            created_at     TEXT NOT NULL DEFAULT (datetime('now')),
            effective_seed TEXT,
            steps          INTEGER NOT NULL DEFAULT 0,
            remainder      TEXT NOT NULL DEFAULT '',
            reading_frame  INTEGER NOT NULL,
            config         TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS run_primitives (
            run_id    TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
            primitive TEXT NOT NULL,
            forgotten INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (run_id, primitive)
        );

        CREATE TABLE IF NOT EXISTS run_units (
            run_id TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
            unit   TEXT NOT NULL,
            weight REAL NOT NULL,
            PRIMARY KEY (run_id, unit)
        );

        CREATE INDEX IF NOT EXISTS idx_units_run ON run_units(run_id);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    tracing::debug!("schema v{SCHEMA_VERSION} ready");
    Ok(())
}
