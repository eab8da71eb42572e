//! Graph data model and repository-wide accumulation
//!
//! [`schema`] defines the node and edge records, [`ids`] their identity keys,
//! and [`accumulator`] merges per-file extractions and links call sites.

pub mod accumulator;
pub mod ids;
pub mod schema;
pub mod summary;

pub use accumulator::{GraphAccumulator, LinkStats};
pub use ids::{NodeId, RepoScope, EXTERNAL_PATH};
pub use schema::{Edge, EdgeType, Meta, Node, NodeType};
pub use summary::{ImportCount, RepositorySummary};
