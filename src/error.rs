//! Typed error taxonomy
//!
//! Extraction errors skip a file; persistence errors are collected into batch
//! outcomes. Resolution failures are not errors at all (see
//! [`crate::resolve::ResolutionResult`]).

use rusqlite::ErrorCode;

use crate::error_codes::*;
use crate::ingest::Language;

/// A file could not be turned into graph candidates
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("binary content in {path}")]
    Binary { path: String },

    #[error("no grammar registered for {path}")]
    UnsupportedGrammar { path: String },

    #[error("failed to load {language} grammar: {message}")]
    Grammar { language: Language, message: String },

    #[error("parser produced no tree for {path}")]
    Parse { path: String },

    #[error("{path} is {size} bytes (limit {limit})")]
    TooLarge { path: String, size: usize, limit: usize },
}

impl ExtractionError {
    pub fn code(&self) -> &'static str {
        match self {
            ExtractionError::Binary { .. } => MER_EXT_001_BINARY_FILE,
            ExtractionError::UnsupportedGrammar { .. } | ExtractionError::Grammar { .. } => {
                MER_EXT_002_UNSUPPORTED_GRAMMAR
            }
            ExtractionError::Parse { .. } => MER_EXT_003_PARSE_FAILED,
            ExtractionError::TooLarge { .. } => MER_EXT_004_FILE_TOO_LARGE,
        }
    }
}

/// A store operation failed
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Store cannot be opened or reached; fatal for an indexing job
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("batch rejected: {0}")]
    BatchRejected(String),

    #[error("invalid record {key:?}: {reason}")]
    InvalidRecord { key: String, reason: String },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PersistenceError {
    pub fn code(&self) -> &'static str {
        match self {
            PersistenceError::Unavailable(_) => MER_DB_001_UNAVAILABLE,
            PersistenceError::Constraint(_) => MER_DB_002_CONSTRAINT,
            PersistenceError::BatchRejected(_) => MER_DB_003_BATCH_REJECTED,
            PersistenceError::InvalidRecord { .. } => MER_DB_004_INVALID_RECORD,
            PersistenceError::Serialization(_) => MER_DB_005_SERIALIZATION,
        }
    }

    /// Whether this error means the store itself is gone
    pub fn is_fatal(&self) -> bool {
        matches!(self, PersistenceError::Unavailable(_))
    }
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => PersistenceError::Constraint(err.to_string()),
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::PermissionDenied
                | ErrorCode::SystemIoFailure
                | ErrorCode::DatabaseCorrupt,
            ) => PersistenceError::Unavailable(err.to_string()),
            _ => PersistenceError::BatchRejected(err.to_string()),
        }
    }
}
