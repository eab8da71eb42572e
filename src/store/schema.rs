//! Store schema and constraint bootstrap
//!
//! Every statement is idempotent (`IF NOT EXISTS`); an "already exists" error
//! from a concurrent bootstrap is swallowed.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::PersistenceError;
use crate::graph::NodeType;

/// Current schema version
pub const SCHEMA_VERSION: i64 = 1;

const TABLES: &str = "
CREATE TABLE IF NOT EXISTS meridian_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS nodes (
    tenant_id TEXT NOT NULL,
    repo_id TEXT NOT NULL,
    id TEXT NOT NULL,
    label TEXT NOT NULL,
    type TEXT NOT NULL,
    path TEXT,
    meta TEXT NOT NULL DEFAULT '{}',
    source_hash TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (tenant_id, repo_id, id)
);

CREATE TABLE IF NOT EXISTS edges (
    tenant_id TEXT NOT NULL,
    repo_id TEXT NOT NULL,
    from_id TEXT NOT NULL,
    to_id TEXT NOT NULL,
    type TEXT NOT NULL,
    meta TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (tenant_id, repo_id, from_id, to_id, type)
);

CREATE TABLE IF NOT EXISTS file_sources (
    tenant_id TEXT NOT NULL,
    repo_id TEXT NOT NULL,
    path TEXT NOT NULL,
    content TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (tenant_id, repo_id, path)
);

CREATE TABLE IF NOT EXISTS index_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    execution_id TEXT NOT NULL UNIQUE,
    tenant_id TEXT NOT NULL,
    repo_id TEXT NOT NULL,
    tool_version TEXT NOT NULL,
    started_at INTEGER NOT NULL,
    finished_at INTEGER,
    duration_ms INTEGER,
    outcome TEXT NOT NULL,
    error_message TEXT,
    files_seen INTEGER NOT NULL DEFAULT 0,
    files_indexed INTEGER NOT NULL DEFAULT 0,
    files_skipped INTEGER NOT NULL DEFAULT 0,
    nodes_written INTEGER NOT NULL DEFAULT 0,
    edges_written INTEGER NOT NULL DEFAULT 0,
    errors INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_nodes_label ON nodes (tenant_id, repo_id, label);
CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes (tenant_id, repo_id, type);
CREATE INDEX IF NOT EXISTS idx_edges_to ON edges (tenant_id, repo_id, to_id, type);
CREATE INDEX IF NOT EXISTS idx_index_runs_scope ON index_runs (tenant_id, repo_id, started_at DESC);
";

/// Per-entity-type uniqueness on the scoped natural key
fn type_constraints() -> String {
    NodeType::ALL
        .iter()
        .map(|t| {
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS ux_nodes_{t} ON nodes (tenant_id, repo_id, id) WHERE type = '{t}';\n",
                t = t.as_str()
            )
        })
        .collect()
}

fn swallow_exists(result: rusqlite::Result<()>) -> Result<(), PersistenceError> {
    match result {
        Err(e) if e.to_string().contains("already exists") => Ok(()),
        other => other.map_err(PersistenceError::from),
    }
}

/// Create tables, indexes and constraints; safe to run any number of times
pub fn bootstrap(conn: &Connection) -> Result<(), PersistenceError> {
    enable_wal(conn);
    swallow_exists(conn.execute_batch(TABLES))?;
    swallow_exists(conn.execute_batch(&type_constraints()))?;

    let version: Option<i64> = conn
        .query_row(
            "SELECT schema_version FROM meridian_meta WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    match version {
        None => {
            conn.execute(
                "INSERT OR IGNORE INTO meridian_meta (id, schema_version, created_at) VALUES (1, ?1, ?2)",
                params![SCHEMA_VERSION, chrono::Utc::now().timestamp_millis()],
            )?;
        }
        Some(v) if v > SCHEMA_VERSION => {
            return Err(PersistenceError::Unavailable(format!(
                "database schema version {} is newer than supported version {}",
                v, SCHEMA_VERSION
            )));
        }
        Some(_) => {}
    }
    Ok(())
}

/// Readers keep working while a batch is being written
///
/// The journal mode is persistent in the file; failing to switch it only
/// costs concurrency, so it is logged rather than returned.
fn enable_wal(conn: &Connection) {
    let current: rusqlite::Result<String> =
        conn.query_row("PRAGMA journal_mode", [], |row| row.get(0));
    if matches!(current.as_deref(), Ok(mode) if mode.eq_ignore_ascii_case("wal")) {
        return;
    }
    let switched = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
        row.get::<_, String>(0)
    });
    if let Err(e) = switched {
        tracing::warn!(error = %e, "could not enable WAL journal mode");
    }
}
