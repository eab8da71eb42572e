//! Persistence gateway
//!
//! The only component that touches durable storage. Nodes and edges are
//! merged by natural key under a [`RepoScope`]; repeating a write updates the
//! mutable fields and never the creation timestamp.
//!
//! Each operation opens its own SQLite connection with a busy timeout, so a
//! `GraphStore` can be shared freely and writers for different scopes never
//! contend on anything but SQLite's own file lock.

pub mod freshness;
pub mod queries;
pub mod runs;
pub mod schema;

pub use freshness::FreshnessReport;
pub use queries::ScopedStore;
pub use runs::{IndexRun, RunCounters, RunOutcome};

use rusqlite::{params, Connection, ToSql, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::PersistenceError;
use crate::graph::{Edge, EdgeType, Node, NodeId, NodeType, RepoScope};
use crate::ingest::extractor::content_hash;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Current time in epoch milliseconds
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One non-fatal (or fatal) problem in a batch call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    pub code: String,
    /// Natural key of the offending record, when the error is per-record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub message: String,
    /// The store itself is unavailable
    pub fatal: bool,
}

impl From<&PersistenceError> for BatchError {
    fn from(err: &PersistenceError) -> Self {
        let key = match err {
            PersistenceError::InvalidRecord { key, .. } => Some(key.clone()),
            _ => None,
        };
        BatchError {
            code: err.code().to_string(),
            key,
            message: err.to_string(),
            fatal: err.is_fatal(),
        }
    }
}

/// Result of every batch write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub created: usize,
    pub updated: usize,
    pub elapsed_ms: u64,
    pub errors: Vec<BatchError>,
}

impl BatchOutcome {
    pub fn written(&self) -> usize {
        self.created + self.updated
    }

    pub fn has_fatal_error(&self) -> bool {
        self.errors.iter().any(|e| e.fatal)
    }

    /// Fold another outcome into this one
    pub fn merge(&mut self, other: BatchOutcome) {
        self.created += other.created;
        self.updated += other.updated;
        self.elapsed_ms += other.elapsed_ms;
        self.errors.extend(other.errors);
    }

    fn record(&mut self, err: &PersistenceError) {
        tracing::warn!(code = err.code(), error = %err, "batch error");
        self.errors.push(BatchError::from(err));
    }
}

/// Rows removed by [`GraphStore::delete_repository`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionReport {
    pub nodes: usize,
    pub edges: usize,
    pub file_sources: usize,
    pub runs: usize,
}

/// Handle to a graph database file
#[derive(Debug, Clone)]
pub struct GraphStore {
    db_path: PathBuf,
}

impl GraphStore {
    /// Open (creating if needed) the database at `db_path` and bootstrap its schema
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let store = GraphStore {
            db_path: db_path.as_ref().to_path_buf(),
        };
        let conn = store.connect()?;
        schema::bootstrap(&conn)?;
        tracing::debug!(db = %store.db_path.display(), "graph store ready");
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Fresh connection with a busy timeout
    pub(crate) fn connect(&self) -> Result<Connection, PersistenceError> {
        let conn = Connection::open(&self.db_path)
            .map_err(|e| PersistenceError::Unavailable(format!("{}: {}", self.db_path.display(), e)))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Read access to one scope, for resolving against persisted data
    pub fn scoped<'a>(&'a self, scope: &'a RepoScope) -> ScopedStore<'a> {
        ScopedStore::new(self, scope)
    }

    /// Merge `nodes` into `scope`
    ///
    /// Invalid records are reported and skipped. Duplicate ids within the
    /// batch collapse, last one wins. Any store failure rolls back the whole
    /// batch and is reported in the outcome.
    pub fn upsert_nodes(&self, scope: &RepoScope, nodes: &[Node]) -> BatchOutcome {
        let started = Instant::now();
        let mut outcome = BatchOutcome::default();

        let mut rows: Vec<NodeRow> = Vec::with_capacity(nodes.len());
        let mut position: HashMap<&NodeId, usize> = HashMap::new();
        for node in nodes {
            match NodeRow::from_node(node) {
                Ok(row) => match position.get(&node.id) {
                    Some(&i) => rows[i] = row,
                    None => {
                        position.insert(&node.id, rows.len());
                        rows.push(row);
                    }
                },
                Err(e) => outcome.record(&e),
            }
        }

        if !rows.is_empty() {
            match self.connect().and_then(|mut conn| write_nodes(&mut conn, scope, &rows)) {
                Ok((created, updated)) => {
                    outcome.created = created;
                    outcome.updated = updated;
                }
                Err(e) => outcome.record(&e),
            }
        }

        outcome.elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            %scope,
            created = outcome.created,
            updated = outcome.updated,
            errors = outcome.errors.len(),
            "upserted nodes"
        );
        outcome
    }

    /// Merge `edges` into `scope`; same contract as [`GraphStore::upsert_nodes`]
    pub fn upsert_edges(&self, scope: &RepoScope, edges: &[Edge]) -> BatchOutcome {
        let started = Instant::now();
        let mut outcome = BatchOutcome::default();

        let mut rows: Vec<EdgeRow> = Vec::with_capacity(edges.len());
        let mut position: HashMap<(NodeId, NodeId, EdgeType), usize> = HashMap::new();
        for edge in edges {
            match EdgeRow::from_edge(edge) {
                Ok(row) => match position.get(&edge.key()) {
                    Some(&i) => rows[i] = row,
                    None => {
                        position.insert(edge.key(), rows.len());
                        rows.push(row);
                    }
                },
                Err(e) => outcome.record(&e),
            }
        }

        if !rows.is_empty() {
            match self.connect().and_then(|mut conn| write_edges(&mut conn, scope, &rows)) {
                Ok((created, updated)) => {
                    outcome.created = created;
                    outcome.updated = updated;
                }
                Err(e) => outcome.record(&e),
            }
        }

        outcome.elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            %scope,
            created = outcome.created,
            updated = outcome.updated,
            errors = outcome.errors.len(),
            "upserted edges"
        );
        outcome
    }

    /// Store file texts for the resolver's classification and import tiers
    pub fn store_file_sources(&self, scope: &RepoScope, files: &[(String, String)]) -> BatchOutcome {
        let started = Instant::now();
        let mut outcome = BatchOutcome::default();
        if files.is_empty() {
            return outcome;
        }

        // Repeated paths collapse, last one wins
        let mut latest: Vec<&(String, String)> = Vec::with_capacity(files.len());
        let mut position: HashMap<&str, usize> = HashMap::new();
        for file in files {
            match position.get(file.0.as_str()) {
                Some(&i) => latest[i] = file,
                None => {
                    position.insert(file.0.as_str(), latest.len());
                    latest.push(file);
                }
            }
        }

        let result = self
            .connect()
            .and_then(|mut conn| write_file_sources(&mut conn, scope, &latest));

        match result {
            Ok((created, updated)) => {
                outcome.created = created;
                outcome.updated = updated;
            }
            Err(e) => outcome.record(&e),
        }
        outcome.elapsed_ms = started.elapsed().as_millis() as u64;
        outcome
    }

    /// Remove every node, edge, stored source and run record in `scope`
    ///
    /// Runs in one transaction; re-running after a failure or on an already
    /// empty scope is safe.
    pub fn delete_repository(&self, scope: &RepoScope) -> Result<DeletionReport, PersistenceError> {
        let mut conn = self.connect()?;
        let tx = begin_write(&mut conn)?;
        let scoped = params![scope.tenant_id, scope.repo_id];

        let report = DeletionReport {
            edges: tx.execute("DELETE FROM edges WHERE tenant_id = ?1 AND repo_id = ?2", scoped)?,
            nodes: tx.execute("DELETE FROM nodes WHERE tenant_id = ?1 AND repo_id = ?2", scoped)?,
            file_sources: tx.execute(
                "DELETE FROM file_sources WHERE tenant_id = ?1 AND repo_id = ?2",
                scoped,
            )?,
            runs: tx.execute(
                "DELETE FROM index_runs WHERE tenant_id = ?1 AND repo_id = ?2",
                scoped,
            )?,
        };
        tx.commit()?;

        tracing::info!(
            %scope,
            nodes = report.nodes,
            edges = report.edges,
            "deleted repository"
        );
        Ok(report)
    }
}

/// A node validated and serialized for writing
struct NodeRow {
    id: String,
    label: String,
    node_type: &'static str,
    path: Option<String>,
    meta: String,
    source_hash: Option<String>,
}

impl NodeRow {
    fn from_node(node: &Node) -> Result<Self, PersistenceError> {
        let invalid = |reason: &str| PersistenceError::InvalidRecord {
            key: node.id.to_string(),
            reason: reason.to_string(),
        };
        if node.id.is_empty() {
            return Err(invalid("empty id"));
        }
        if node.label.trim().is_empty() {
            return Err(invalid("empty label"));
        }
        if node.node_type != NodeType::Import && node.path.as_deref().map_or(true, str::is_empty) {
            return Err(invalid("missing path"));
        }

        Ok(NodeRow {
            id: node.id.to_string(),
            label: node.label.clone(),
            node_type: node.node_type.as_str(),
            path: node.path.clone(),
            meta: serde_json::to_string(&node.meta)?,
            source_hash: node
                .meta
                .get("source_hash")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }
}

/// An edge validated and serialized for writing
struct EdgeRow {
    from: String,
    to: String,
    edge_type: &'static str,
    meta: String,
}

impl EdgeRow {
    fn from_edge(edge: &Edge) -> Result<Self, PersistenceError> {
        if edge.from.is_empty() || edge.to.is_empty() {
            return Err(PersistenceError::InvalidRecord {
                key: format!("{}-{}->{}", edge.from, edge.edge_type, edge.to),
                reason: "empty endpoint".to_string(),
            });
        }
        Ok(EdgeRow {
            from: edge.from.to_string(),
            to: edge.to.to_string(),
            edge_type: edge.edge_type.as_str(),
            meta: serde_json::to_string(&edge.meta)?,
        })
    }
}

/// Rows per multi-row statement; keeps bound parameters under 999
const ROWS_PER_STATEMENT: usize = 120;

/// Write transaction that takes the write lock up front
///
/// A deferred transaction that reads before writing cannot wait for another
/// writer: SQLite reports the lock upgrade as busy without retrying.
fn begin_write(conn: &mut Connection) -> Result<Transaction<'_>, PersistenceError> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

/// `(?1, ?2, ?a, ?b, ..., ?3, ?3)` groups: scope, `width` row values, timestamp twice
fn value_groups(rows: usize, width: usize) -> String {
    (0..rows)
        .map(|r| {
            let first = 4 + r * width;
            let values: Vec<String> = (first..first + width).map(|i| format!("?{}", i)).collect();
            format!("(?1, ?2, {}, ?3, ?3)", values.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `?3, ?4, ...` after the two scope parameters
fn key_list(count: usize) -> String {
    (0..count)
        .map(|i| format!("?{}", i + 3))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rows of one chunk that already exist in scope
fn count_existing(
    tx: &Transaction<'_>,
    sql: &str,
    scope: &RepoScope,
    keys: Vec<&dyn ToSql>,
) -> Result<usize, PersistenceError> {
    let mut values: Vec<&dyn ToSql> = vec![&scope.tenant_id, &scope.repo_id];
    values.extend(keys);
    let known: i64 = tx.query_row(sql, &*values, |row| row.get(0))?;
    Ok(known as usize)
}

/// Upsert rows in one transaction; returns (created, updated)
///
/// Rows must be unique by id. Per chunk, one query counts the ids already
/// present and one statement merges the whole chunk.
fn write_nodes(
    conn: &mut Connection,
    scope: &RepoScope,
    rows: &[NodeRow],
) -> Result<(usize, usize), PersistenceError> {
    let tx = begin_write(conn)?;
    let now = now_millis();
    let mut updated = 0;

    for chunk in rows.chunks(ROWS_PER_STATEMENT) {
        let existing = format!(
            "SELECT COUNT(*) FROM nodes WHERE tenant_id = ?1 AND repo_id = ?2 AND id IN ({})",
            key_list(chunk.len())
        );
        updated += count_existing(
            &tx,
            &existing,
            scope,
            chunk.iter().map(|r| &r.id as &dyn ToSql).collect(),
        )?;

        let upsert = format!(
            "INSERT INTO nodes (tenant_id, repo_id, id, label, type, path, meta, source_hash, created_at, updated_at)
             VALUES {}
             ON CONFLICT (tenant_id, repo_id, id) DO UPDATE SET
                label = excluded.label,
                type = excluded.type,
                path = excluded.path,
                meta = excluded.meta,
                source_hash = excluded.source_hash,
                updated_at = excluded.updated_at",
            value_groups(chunk.len(), 6)
        );
        let mut values: Vec<&dyn ToSql> = vec![&scope.tenant_id, &scope.repo_id, &now];
        for row in chunk {
            let row_values: [&dyn ToSql; 6] = [
                &row.id,
                &row.label,
                &row.node_type,
                &row.path,
                &row.meta,
                &row.source_hash,
            ];
            values.extend(row_values);
        }
        tx.execute(&upsert, &*values)?;
    }

    tx.commit()?;
    Ok((rows.len() - updated, updated))
}

fn write_edges(
    conn: &mut Connection,
    scope: &RepoScope,
    rows: &[EdgeRow],
) -> Result<(usize, usize), PersistenceError> {
    let tx = begin_write(conn)?;
    let now = now_millis();
    let mut updated = 0;

    for chunk in rows.chunks(ROWS_PER_STATEMENT) {
        let triples: Vec<String> = (0..chunk.len())
            .map(|r| {
                let first = 3 + r * 3;
                format!("(?{}, ?{}, ?{})", first, first + 1, first + 2)
            })
            .collect();
        let existing = format!(
            "SELECT COUNT(*) FROM edges
             WHERE tenant_id = ?1 AND repo_id = ?2 AND (from_id, to_id, type) IN (VALUES {})",
            triples.join(", ")
        );
        let mut keys: Vec<&dyn ToSql> = Vec::with_capacity(chunk.len() * 3);
        for row in chunk {
            let key: [&dyn ToSql; 3] = [&row.from, &row.to, &row.edge_type];
            keys.extend(key);
        }
        updated += count_existing(&tx, &existing, scope, keys)?;

        let upsert = format!(
            "INSERT INTO edges (tenant_id, repo_id, from_id, to_id, type, meta, created_at, updated_at)
             VALUES {}
             ON CONFLICT (tenant_id, repo_id, from_id, to_id, type) DO UPDATE SET
                meta = excluded.meta,
                updated_at = excluded.updated_at",
            value_groups(chunk.len(), 4)
        );
        let mut values: Vec<&dyn ToSql> = vec![&scope.tenant_id, &scope.repo_id, &now];
        for row in chunk {
            let row_values: [&dyn ToSql; 4] = [&row.from, &row.to, &row.edge_type, &row.meta];
            values.extend(row_values);
        }
        tx.execute(&upsert, &*values)?;
    }

    tx.commit()?;
    Ok((rows.len() - updated, updated))
}

/// Paths must be unique within `files`
fn write_file_sources(
    conn: &mut Connection,
    scope: &RepoScope,
    files: &[&(String, String)],
) -> Result<(usize, usize), PersistenceError> {
    let tx = begin_write(conn)?;
    let now = now_millis();
    let mut updated = 0;

    for chunk in files.chunks(ROWS_PER_STATEMENT) {
        let existing = format!(
            "SELECT COUNT(*) FROM file_sources WHERE tenant_id = ?1 AND repo_id = ?2 AND path IN ({})",
            key_list(chunk.len())
        );
        updated += count_existing(
            &tx,
            &existing,
            scope,
            chunk.iter().map(|(path, _)| path as &dyn ToSql).collect(),
        )?;

        let hashes: Vec<String> = chunk
            .iter()
            .map(|(_, content)| content_hash(content.as_bytes()))
            .collect();
        let upsert = format!(
            "INSERT INTO file_sources (tenant_id, repo_id, path, content, content_hash, created_at, updated_at)
             VALUES {}
             ON CONFLICT (tenant_id, repo_id, path) DO UPDATE SET
                content = excluded.content,
                content_hash = excluded.content_hash,
                updated_at = excluded.updated_at",
            value_groups(chunk.len(), 3)
        );
        let mut values: Vec<&dyn ToSql> = vec![&scope.tenant_id, &scope.repo_id, &now];
        for ((path, content), hash) in chunk.iter().zip(&hashes) {
            let row_values: [&dyn ToSql; 3] = [path, content, hash];
            values.extend(row_values);
        }
        tx.execute(&upsert, &*values)?;
    }

    tx.commit()?;
    Ok((files.len() - updated, updated))
}
