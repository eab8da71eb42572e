//! Scope freshness checking
//!
//! Every write refreshes `updated_at`, so after a completed run any node the
//! run did not touch is older than the run's start. Those nodes belong to
//! files that were removed or renamed since; deletion is whole-repository only.

use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::GraphStore;
use crate::error::PersistenceError;
use crate::graph::RepoScope;

/// Staleness threshold in seconds (5 minutes)
pub const STALE_THRESHOLD_SECS: i64 = 300;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessReport {
    /// Newest `updated_at` in scope, epoch milliseconds
    pub last_updated_at: Option<i64>,
    /// Seconds between `last_updated_at` and now
    pub seconds_since_update: Option<i64>,
    /// Nodes not refreshed by the latest run
    pub stale_nodes: usize,
    pub total_nodes: usize,
}

impl FreshnessReport {
    /// Older than [`STALE_THRESHOLD_SECS`]; an empty scope is never stale
    pub fn is_stale(&self) -> bool {
        self.seconds_since_update
            .map_or(false, |s| s >= STALE_THRESHOLD_SECS)
    }

    pub fn minutes_since_update(&self) -> Option<i64> {
        self.seconds_since_update.map(|s| s / 60)
    }

    pub fn warning_message(&self, scope: &RepoScope) -> Option<String> {
        if !self.is_stale() {
            return None;
        }
        Some(format!(
            "WARNING: {} may be stale (last indexed {} minutes ago)\n  Run 'meridian index' to refresh",
            scope,
            self.minutes_since_update().unwrap_or(0)
        ))
    }
}

impl GraphStore {
    pub fn freshness(&self, scope: &RepoScope) -> Result<FreshnessReport, PersistenceError> {
        let conn = self.connect()?;
        let (last_updated_at, total): (Option<i64>, i64) = conn.query_row(
            "SELECT MAX(updated_at), COUNT(*) FROM nodes WHERE tenant_id = ?1 AND repo_id = ?2",
            params![scope.tenant_id, scope.repo_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let last_started: Option<i64> = conn.query_row(
            "SELECT MAX(started_at) FROM index_runs
             WHERE tenant_id = ?1 AND repo_id = ?2 AND finished_at IS NOT NULL",
            params![scope.tenant_id, scope.repo_id],
            |row| row.get(0),
        )?;

        let stale: i64 = match last_started {
            Some(started_at) => conn.query_row(
                "SELECT COUNT(*) FROM nodes
                 WHERE tenant_id = ?1 AND repo_id = ?2 AND updated_at < ?3",
                params![scope.tenant_id, scope.repo_id, started_at],
                |row| row.get(0),
            )?,
            None => 0,
        };

        let now = super::now_millis();
        Ok(FreshnessReport {
            last_updated_at,
            seconds_since_update: last_updated_at.map(|t| now.saturating_sub(t).max(0) / 1000),
            stale_nodes: stale as usize,
            total_nodes: total as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold() {
        assert_eq!(STALE_THRESHOLD_SECS, 300);
        let report = FreshnessReport {
            last_updated_at: Some(0),
            seconds_since_update: Some(600),
            stale_nodes: 0,
            total_nodes: 4,
        };
        assert!(report.is_stale());
        assert_eq!(report.minutes_since_update(), Some(10));
        let msg = report.warning_message(&RepoScope::new("t", "r")).unwrap();
        assert!(msg.contains("t/r"));
    }

    #[test]
    fn test_empty_scope_is_fresh() {
        let report = FreshnessReport::default();
        assert!(!report.is_stale());
        assert!(report.warning_message(&RepoScope::new("t", "r")).is_none());
    }

    #[test]
    fn test_store_freshness_counts_untouched_nodes() {
        use crate::graph::{Meta, Node, NodeId, NodeType};
        use crate::store::runs::{RunCounters, RunOutcome};

        let dir = tempfile::TempDir::new().unwrap();
        let store = GraphStore::open(dir.path().join("graph.db")).unwrap();
        let scope = RepoScope::new("t1", "r1");
        let node = |name: &str| Node {
            id: NodeId::function("a.py", name),
            label: name.to_string(),
            node_type: NodeType::Function,
            path: Some("a.py".to_string()),
            meta: Meta::new(),
        };

        store.upsert_nodes(&scope, &[node("gone")]);
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.start_run(&scope, "exec-1", "test").unwrap();
        store.upsert_nodes(&scope, &[node("kept")]);
        store
            .finish_run("exec-1", RunOutcome::Success, None, &RunCounters::default())
            .unwrap();

        let report = store.freshness(&scope).unwrap();
        assert_eq!(report.total_nodes, 2);
        assert_eq!(report.stale_nodes, 1);
        assert!(!report.is_stale());
    }
}
