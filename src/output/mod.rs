//! JSON output for CLI commands
//!
//! Every JSON response is wrapped in a [`JsonResponse`] envelope carrying a
//! schema version, the execution id of the run and a timestamp, so output can
//! be correlated with the `index_runs` log.

use serde::{Deserialize, Serialize};

use crate::graph::{Edge, Node, RepoScope, RepositorySummary};
use crate::store::{FreshnessReport, IndexRun};

/// Current JSON output schema version
pub const MERIDIAN_JSON_SCHEMA_VERSION: &str = "1.0.0";

/// Wrapper for all JSON responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse<T> {
    /// Schema version for parsing stability
    pub schema_version: String,
    /// Unique execution ID for this run
    pub execution_id: String,
    pub tool: String,
    /// RFC 3339, seconds precision
    pub timestamp: String,
    pub data: T,
    /// Whether the response is partial (e.g., a cancelled index job)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<bool>,
}

impl<T> JsonResponse<T> {
    pub fn new(data: T, execution_id: &str) -> Self {
        JsonResponse {
            schema_version: MERIDIAN_JSON_SCHEMA_VERSION.to_string(),
            execution_id: execution_id.to_string(),
            tool: "meridian".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            data,
            partial: None,
        }
    }

    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = Some(partial);
        self
    }
}

/// Response for errors in JSON mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable error code (`MER-...`) or category
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

/// Response for `status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub scope: RepoScope,
    pub nodes: usize,
    pub edges: usize,
    pub summary: RepositorySummary,
    pub freshness: FreshnessReport,
    pub last_run: Option<IndexRun>,
}

/// Response for `export`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub scope: RepoScope,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Human,
    /// JSON output with schema versioning
    Json,
}

impl OutputFormat {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Some(OutputFormat::Human),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

/// Generate a unique execution ID (UUID v4)
pub fn generate_execution_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Output JSON to stdout
pub fn output_json<T: Serialize>(data: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    println!("{}", json);
    Ok(())
}
