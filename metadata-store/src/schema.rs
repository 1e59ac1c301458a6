//! Connection pragmas and table definitions.

use rusqlite::Connection;

use crate::errors::{MetadataError, to_backend_err};

/// WAL journal, NORMAL sync, 5s busy timeout, foreign keys ON.
pub fn apply_pragmas(conn: &Connection) -> Result<(), MetadataError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        ",
    )
    .map_err(to_backend_err)
}

/// `*_key` columns hold Unicode-lowercased copies used by lookups; SQLite's
/// own `lower()` only folds ASCII.
pub fn migrate(conn: &Connection) -> Result<(), MetadataError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS clusters (
            id            INTEGER PRIMARY KEY,
            name          TEXT NOT NULL,
            name_key      TEXT NOT NULL DEFAULT '',
            member_count  INTEGER NOT NULL DEFAULT 0,
            updated_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS documents (
            id            TEXT PRIMARY KEY,
            title         TEXT NOT NULL,
            topic         TEXT NOT NULL,
            date          TEXT NOT NULL,
            jurisdiction  TEXT NOT NULL,
            topic_key     TEXT NOT NULL DEFAULT '',
            jurisdiction_key TEXT NOT NULL DEFAULT '',
            source_path   TEXT NOT NULL,
            cluster_id    INTEGER NULL REFERENCES clusters(id) ON DELETE SET NULL,
            updated_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        ",
    )
    .map_err(to_backend_err)?;

    // Databases created before the key columns existed.
    add_key_column(conn, "documents", "topic_key", "topic")?;
    add_key_column(conn, "documents", "jurisdiction_key", "jurisdiction")?;
    add_key_column(conn, "clusters", "name_key", "name")?;

    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_documents_date ON documents(date);
        CREATE INDEX IF NOT EXISTS idx_documents_jurisdiction_key ON documents(jurisdiction_key);
        CREATE INDEX IF NOT EXISTS idx_documents_cluster ON documents(cluster_id);
        ",
    )
    .map_err(to_backend_err)
}

/// Adds `column` and backfills it from `source`. The backfill folds ASCII
/// only; re-ingesting refreshes the key with full Unicode folding.
fn add_key_column(
    conn: &Connection,
    table: &str,
    column: &str,
    source: &str,
) -> Result<(), MetadataError> {
    let exists: bool = conn
        .query_row(
            &format!("SELECT COUNT(*) > 0 FROM pragma_table_info('{table}') WHERE name = ?1"),
            [column],
            |r| r.get(0),
        )
        .map_err(to_backend_err)?;
    if exists {
        return Ok(());
    }
    conn.execute_batch(&format!(
        "ALTER TABLE {table} ADD COLUMN {column} TEXT NOT NULL DEFAULT '';
         UPDATE {table} SET {column} = lower({source});"
    ))
    .map_err(to_backend_err)
}

/// Lookup key for case-insensitive matching.
pub fn fold(s: &str) -> String {
    s.to_lowercase()
}
