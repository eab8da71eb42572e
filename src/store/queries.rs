//! Read queries over a scoped graph

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;

use super::GraphStore;
use crate::error::PersistenceError;
use crate::graph::summary::{top_imports, RepositorySummary};
use crate::graph::{Edge, EdgeType, Meta, Node, NodeId, NodeType, RepoScope, EXTERNAL_PATH};
use crate::resolve::{GraphSnapshot, SymbolSource};

const NODE_COLUMNS: &str = "id, label, type, path, meta";

fn parse_meta(raw: &str) -> Result<Meta, PersistenceError> {
    Ok(serde_json::from_str(raw)?)
}

/// Raw node columns; decoded outside the row closure so serde errors keep their type
struct RawNode {
    id: String,
    label: String,
    node_type: String,
    path: Option<String>,
    meta: String,
}

impl RawNode {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawNode {
            id: row.get(0)?,
            label: row.get(1)?,
            node_type: row.get(2)?,
            path: row.get(3)?,
            meta: row.get(4)?,
        })
    }

    fn decode(self) -> Result<Node, PersistenceError> {
        let node_type = self.node_type.parse::<NodeType>().map_err(|reason| {
            PersistenceError::InvalidRecord {
                key: self.id.clone(),
                reason,
            }
        })?;
        Ok(Node {
            id: NodeId::from_stored(self.id),
            label: self.label,
            node_type,
            path: self.path,
            meta: parse_meta(&self.meta)?,
        })
    }
}

struct RawEdge {
    from: String,
    to: String,
    edge_type: String,
    meta: String,
}

impl RawEdge {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawEdge {
            from: row.get(0)?,
            to: row.get(1)?,
            edge_type: row.get(2)?,
            meta: row.get(3)?,
        })
    }

    fn decode(self) -> Result<Edge, PersistenceError> {
        let edge_type = self.edge_type.parse::<EdgeType>().map_err(|reason| {
            PersistenceError::InvalidRecord {
                key: format!("{}->{}", self.from, self.to),
                reason,
            }
        })?;
        Ok(Edge {
            from: NodeId::from_stored(self.from),
            to: NodeId::from_stored(self.to),
            edge_type,
            meta: parse_meta(&self.meta)?,
        })
    }
}

fn query_nodes<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Node>, PersistenceError> {
    let mut stmt = conn.prepare(sql)?;
    let raw = stmt
        .query_map(params, RawNode::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    raw.into_iter().map(RawNode::decode).collect()
}

fn query_edges<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Edge>, PersistenceError> {
    let mut stmt = conn.prepare(sql)?;
    let raw = stmt
        .query_map(params, RawEdge::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    raw.into_iter().map(RawEdge::decode).collect()
}

/// `?3, ?4, ...` placeholders for an IN list following the two scope parameters
fn in_list(count: usize) -> String {
    (0..count)
        .map(|i| format!("?{}", i + 3))
        .collect::<Vec<_>>()
        .join(", ")
}

fn kind_strings(kinds: &[NodeType]) -> Vec<String> {
    kinds.iter().map(|k| k.as_str().to_string()).collect()
}

impl GraphStore {
    /// Every node in `scope`, ordered by id
    pub fn nodes(&self, scope: &RepoScope) -> Result<Vec<Node>, PersistenceError> {
        let conn = self.connect()?;
        query_nodes(
            &conn,
            &format!(
                "SELECT {} FROM nodes WHERE tenant_id = ?1 AND repo_id = ?2 ORDER BY id",
                NODE_COLUMNS
            ),
            params![scope.tenant_id, scope.repo_id],
        )
    }

    /// Every edge in `scope`, ordered by (from, to, type)
    pub fn edges(&self, scope: &RepoScope) -> Result<Vec<Edge>, PersistenceError> {
        let conn = self.connect()?;
        query_edges(
            &conn,
            "SELECT from_id, to_id, type, meta FROM edges
             WHERE tenant_id = ?1 AND repo_id = ?2
             ORDER BY from_id, to_id, type",
            params![scope.tenant_id, scope.repo_id],
        )
    }

    pub fn node(&self, scope: &RepoScope, id: &NodeId) -> Result<Option<Node>, PersistenceError> {
        let conn = self.connect()?;
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM nodes WHERE tenant_id = ?1 AND repo_id = ?2 AND id = ?3",
                    NODE_COLUMNS
                ),
                params![scope.tenant_id, scope.repo_id, id.as_str()],
                RawNode::from_row,
            )
            .optional()?;
        raw.map(RawNode::decode).transpose()
    }

    pub fn count_nodes(&self, scope: &RepoScope) -> Result<usize, PersistenceError> {
        self.count("nodes", scope)
    }

    pub fn count_edges(&self, scope: &RepoScope) -> Result<usize, PersistenceError> {
        self.count("edges", scope)
    }

    fn count(&self, table: &str, scope: &RepoScope) -> Result<usize, PersistenceError> {
        let conn = self.connect()?;
        let n: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE tenant_id = ?1 AND repo_id = ?2",
                table
            ),
            params![scope.tenant_id, scope.repo_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Node created/updated timestamps in epoch milliseconds
    pub fn node_timestamps(
        &self,
        scope: &RepoScope,
        id: &NodeId,
    ) -> Result<Option<(i64, i64)>, PersistenceError> {
        let conn = self.connect()?;
        Ok(conn
            .query_row(
                "SELECT created_at, updated_at FROM nodes
                 WHERE tenant_id = ?1 AND repo_id = ?2 AND id = ?3",
                params![scope.tenant_id, scope.repo_id, id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?)
    }

    /// Summary computed from persisted data
    ///
    /// Import counts here are the number of files importing each module
    /// (one `imports` edge per file and module).
    pub fn repository_summary(
        &self,
        scope: &RepoScope,
        top_n: usize,
    ) -> Result<RepositorySummary, PersistenceError> {
        let conn = self.connect()?;
        let mut by_type: HashMap<String, usize> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT type, COUNT(*) FROM nodes
                 WHERE tenant_id = ?1 AND repo_id = ?2 AND (path IS NULL OR path != ?3)
                 GROUP BY type",
            )?;
            let rows = stmt.query_map(
                params![scope.tenant_id, scope.repo_id, EXTERNAL_PATH],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )?;
            for row in rows {
                let (t, n) = row?;
                by_type.insert(t, n as usize);
            }
        }

        let mut imports: HashMap<String, usize> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT to_id, COUNT(*) FROM edges
                 WHERE tenant_id = ?1 AND repo_id = ?2 AND type = 'imports'
                 GROUP BY to_id",
            )?;
            let rows = stmt.query_map(params![scope.tenant_id, scope.repo_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (module, n) = row?;
                imports.insert(module, n as usize);
            }
        }

        let count = |t: NodeType| by_type.get(t.as_str()).copied().unwrap_or(0);
        Ok(RepositorySummary {
            total_files: count(NodeType::File),
            total_functions: count(NodeType::Function),
            total_classes: count(NodeType::Class) + count(NodeType::Interface) + count(NodeType::Type),
            top_imports: top_imports(&imports, top_n),
        })
    }

    /// Stored text of one file
    pub fn file_text(
        &self,
        scope: &RepoScope,
        path: &str,
    ) -> Result<Option<String>, PersistenceError> {
        let conn = self.connect()?;
        Ok(conn
            .query_row(
                "SELECT content FROM file_sources WHERE tenant_id = ?1 AND repo_id = ?2 AND path = ?3",
                params![scope.tenant_id, scope.repo_id, path],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Read view for batch resolution
    ///
    /// Loads definitions, placeholders and file nodes, every `calls` edge, and
    /// the stored text of `paths` only.
    pub fn load_snapshot(
        &self,
        scope: &RepoScope,
        paths: &[&str],
    ) -> Result<GraphSnapshot, PersistenceError> {
        let conn = self.connect()?;

        let nodes = query_nodes(
            &conn,
            &format!(
                "SELECT {} FROM nodes WHERE tenant_id = ?1 AND repo_id = ?2 AND type != 'import'",
                NODE_COLUMNS
            ),
            params![scope.tenant_id, scope.repo_id],
        )?;
        let edges = query_edges(
            &conn,
            "SELECT from_id, to_id, type, meta FROM edges
             WHERE tenant_id = ?1 AND repo_id = ?2 AND type = 'calls'",
            params![scope.tenant_id, scope.repo_id],
        )?;

        let mut sources = HashMap::new();
        if !paths.is_empty() {
            let sql = format!(
                "SELECT path, content FROM file_sources
                 WHERE tenant_id = ?1 AND repo_id = ?2 AND path IN ({})",
                in_list(paths.len())
            );
            let mut values: Vec<&str> = vec![scope.tenant_id.as_str(), scope.repo_id.as_str()];
            values.extend_from_slice(paths);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (path, content) = row?;
                sources.insert(path, content);
            }
        }

        tracing::debug!(
            %scope,
            nodes = nodes.len(),
            calls = edges.len(),
            sources = sources.len(),
            "loaded snapshot"
        );
        Ok(GraphSnapshot::new(&nodes, &edges, sources))
    }
}

/// [`SymbolSource`] that queries the store directly, one statement per call
pub struct ScopedStore<'a> {
    store: &'a GraphStore,
    scope: &'a RepoScope,
}

impl<'a> ScopedStore<'a> {
    pub(crate) fn new(store: &'a GraphStore, scope: &'a RepoScope) -> Self {
        ScopedStore { store, scope }
    }

    pub fn scope(&self) -> &RepoScope {
        self.scope
    }
}

impl SymbolSource for ScopedStore<'_> {
    fn definitions(
        &self,
        name: &str,
        path: Option<&str>,
        kinds: &[NodeType],
    ) -> Result<Vec<Node>, PersistenceError> {
        if kinds.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.store.connect()?;

        // ?1 tenant, ?2 repo, ?3.. kinds, then label, external path, optional file path
        let kinds = kind_strings(kinds);
        let next = kinds.len() + 3;
        let mut sql = format!(
            "SELECT {} FROM nodes
             WHERE tenant_id = ?1 AND repo_id = ?2 AND type IN ({})
               AND label = ?{} AND path IS NOT NULL AND path != ?{}",
            NODE_COLUMNS,
            in_list(kinds.len()),
            next,
            next + 1
        );
        let mut values: Vec<String> = vec![self.scope.tenant_id.clone(), self.scope.repo_id.clone()];
        values.extend(kinds);
        values.push(name.to_string());
        values.push(EXTERNAL_PATH.to_string());
        if let Some(p) = path {
            sql.push_str(&format!(" AND path = ?{}", next + 2));
            values.push(p.to_string());
        }
        sql.push_str(" ORDER BY path, id");

        query_nodes(&conn, &sql, params_from_iter(values))
    }

    fn all_definitions(&self, kinds: &[NodeType]) -> Result<Vec<Node>, PersistenceError> {
        if kinds.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.store.connect()?;
        let kinds = kind_strings(kinds);
        let sql = format!(
            "SELECT {} FROM nodes
             WHERE tenant_id = ?1 AND repo_id = ?2 AND type IN ({})
               AND path IS NOT NULL AND path != ?{}
             ORDER BY path, label, id",
            NODE_COLUMNS,
            in_list(kinds.len()),
            kinds.len() + 3
        );
        let mut values: Vec<String> = vec![self.scope.tenant_id.clone(), self.scope.repo_id.clone()];
        values.extend(kinds);
        values.push(EXTERNAL_PATH.to_string());

        query_nodes(&conn, &sql, params_from_iter(values))
    }

    fn call_targets(&self, name: &str) -> Result<Vec<Node>, PersistenceError> {
        let conn = self.store.connect()?;
        query_nodes(
            &conn,
            "SELECT DISTINCT n.id, n.label, n.type, n.path, n.meta
             FROM edges e
             JOIN nodes n
               ON n.tenant_id = e.tenant_id AND n.repo_id = e.repo_id AND n.id = e.to_id
             WHERE e.tenant_id = ?1 AND e.repo_id = ?2 AND e.type = 'calls' AND n.label = ?3
             ORDER BY n.id",
            params![self.scope.tenant_id, self.scope.repo_id, name],
        )
    }

    fn file_text(&self, path: &str) -> Result<Option<String>, PersistenceError> {
        self.store.file_text(self.scope, path)
    }

    fn file_paths(&self) -> Result<Vec<String>, PersistenceError> {
        let conn = self.store.connect()?;
        let mut stmt = conn.prepare(
            "SELECT path FROM nodes
             WHERE tenant_id = ?1 AND repo_id = ?2 AND type = 'file' AND path IS NOT NULL
             ORDER BY path",
        )?;
        let paths = stmt
            .query_map(params![self.scope.tenant_id, self.scope.repo_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(paths)
    }
}
