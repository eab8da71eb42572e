//! Index run log
//!
//! Every indexing job records one row in `index_runs`: started when the job
//! begins, finished with its counters and outcome. The log gives an audit
//! trail for correlating CLI output (which carries the same execution id)
//! with what reached the store.

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{now_millis, GraphStore};
use crate::error::PersistenceError;
use crate::graph::RepoScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Running,
    Success,
    /// Finished with per-file or per-batch errors
    Partial,
    Cancelled,
    Error,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Running => "running",
            RunOutcome::Success => "success",
            RunOutcome::Partial => "partial",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::Error => "error",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunOutcome::Running),
            "success" => Ok(RunOutcome::Success),
            "partial" => Ok(RunOutcome::Partial),
            "cancelled" => Ok(RunOutcome::Cancelled),
            "error" => Ok(RunOutcome::Error),
            other => Err(format!("unknown run outcome: {}", other)),
        }
    }
}

/// Counters written when a run finishes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub files_seen: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub nodes_written: usize,
    pub edges_written: usize,
    pub errors: usize,
}

/// One row of the run log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRun {
    pub execution_id: String,
    pub scope: RepoScope,
    pub tool_version: String,
    /// Epoch milliseconds
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub duration_ms: Option<i64>,
    pub outcome: RunOutcome,
    pub error_message: Option<String>,
    pub counters: RunCounters,
}

const RUN_COLUMNS: &str = "execution_id, tenant_id, repo_id, tool_version, started_at, finished_at,
     duration_ms, outcome, error_message, files_seen, files_indexed, files_skipped,
     nodes_written, edges_written, errors";

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<(IndexRun, String)> {
    let get_count = |i: usize| -> rusqlite::Result<usize> { Ok(row.get::<_, i64>(i)? as usize) };
    let run = IndexRun {
        execution_id: row.get(0)?,
        scope: RepoScope::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?),
        tool_version: row.get(3)?,
        started_at: row.get(4)?,
        finished_at: row.get(5)?,
        duration_ms: row.get(6)?,
        outcome: RunOutcome::Running,
        error_message: row.get(8)?,
        counters: RunCounters {
            files_seen: get_count(9)?,
            files_indexed: get_count(10)?,
            files_skipped: get_count(11)?,
            nodes_written: get_count(12)?,
            edges_written: get_count(13)?,
            errors: get_count(14)?,
        },
    };
    Ok((run, row.get(7)?))
}

impl GraphStore {
    /// Record the start of a run; returns its start time
    pub fn start_run(
        &self,
        scope: &RepoScope,
        execution_id: &str,
        tool_version: &str,
    ) -> Result<i64, PersistenceError> {
        let conn = self.connect()?;
        let started_at = now_millis();
        conn.execute(
            "INSERT INTO index_runs (execution_id, tenant_id, repo_id, tool_version, started_at, outcome)
             VALUES (?1, ?2, ?3, ?4, ?5, 'running')",
            params![execution_id, scope.tenant_id, scope.repo_id, tool_version, started_at],
        )?;
        Ok(started_at)
    }

    /// Record the end of a run
    pub fn finish_run(
        &self,
        execution_id: &str,
        outcome: RunOutcome,
        error_message: Option<&str>,
        counters: &RunCounters,
    ) -> Result<(), PersistenceError> {
        let conn = self.connect()?;
        let finished_at = now_millis();
        conn.execute(
            "UPDATE index_runs SET
                finished_at = ?2,
                duration_ms = ?2 - started_at,
                outcome = ?3,
                error_message = ?4,
                files_seen = ?5,
                files_indexed = ?6,
                files_skipped = ?7,
                nodes_written = ?8,
                edges_written = ?9,
                errors = ?10
             WHERE execution_id = ?1",
            params![
                execution_id,
                finished_at,
                outcome.as_str(),
                error_message,
                counters.files_seen as i64,
                counters.files_indexed as i64,
                counters.files_skipped as i64,
                counters.nodes_written as i64,
                counters.edges_written as i64,
                counters.errors as i64
            ],
        )?;
        Ok(())
    }

    /// Most recent run in `scope`, finished or not
    pub fn last_run(&self, scope: &RepoScope) -> Result<Option<IndexRun>, PersistenceError> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM index_runs WHERE tenant_id = ?1 AND repo_id = ?2
                     ORDER BY started_at DESC, id DESC LIMIT 1",
                    RUN_COLUMNS
                ),
                params![scope.tenant_id, scope.repo_id],
                run_from_row,
            )
            .optional()?;

        match row {
            Some((mut run, outcome)) => {
                run.outcome = outcome.parse().map_err(|reason| PersistenceError::InvalidRecord {
                    key: run.execution_id.clone(),
                    reason,
                })?;
                Ok(Some(run))
            }
            None => Ok(None),
        }
    }
}
