//! Meridian: multi-tenant code graph indexer
//!
//! Meridian turns source files into a typed graph of program entities (files,
//! functions, classes, interfaces, type aliases, imports) and links symbolic
//! references between them with a confidence score.
//!
//! # Pipeline
//!
//! - [`ingest`] walks one file's tree-sitter syntax tree into a
//!   [`ingest::FileExtraction`]: nodes, `contains` / `imports` edges and
//!   unresolved call sites.
//! - [`graph::GraphAccumulator`] merges extractions across a repository and
//!   links call sites against the complete node set.
//! - [`resolve::SymbolResolver`] resolves a name at a location through a
//!   cascade of strategies, from local scope down to name heuristics.
//! - [`store::GraphStore`] persists nodes and edges idempotently, scoped per
//!   tenant and repository.
//! - [`indexer::Indexer`] runs the two-phase job tying these together.
//!
//! # Position Conventions
//!
//! Lines in node metadata, call sites and resolver requests are 1-indexed.

pub mod config;
pub mod error;
pub mod error_codes;
pub mod graph;
pub mod indexer;
pub mod ingest;
pub mod output;
pub mod resolve;
pub mod store;
pub mod version;

pub use config::IndexConfig;
pub use error::{ExtractionError, PersistenceError};
pub use graph::{
    Edge, EdgeType, GraphAccumulator, ImportCount, Meta, Node, NodeId, NodeType, RepoScope,
    RepositorySummary, EXTERNAL_PATH,
};
pub use indexer::{discover_files, CancellationFlag, IndexReport, Indexer, SourceFile};
pub use ingest::{detect_language, extract_file, FileExtraction, Language};
pub use output::{generate_execution_id, output_json, JsonResponse, OutputFormat};
pub use resolve::{
    ReferenceKind, ResolutionMethod, ResolutionResult, ResolveRequest, SymbolResolver,
    SymbolSource,
};
pub use store::{BatchError, BatchOutcome, DeletionReport, GraphStore};
