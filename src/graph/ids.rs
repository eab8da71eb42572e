//! Identity keys for graph nodes
//!
//! Every node in the graph is addressed by a [`NodeId`] within a [`RepoScope`].
//! The string form is stable across indexing passes as long as the entity's
//! type, path and name do not change.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::schema::NodeType;

/// Path used for synthesized placeholder nodes
pub const EXTERNAL_PATH: &str = "external";

/// Tenant + repository pair that scopes every node and edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoScope {
    pub tenant_id: String,
    pub repo_id: String,
}

impl RepoScope {
    pub fn new(tenant_id: impl Into<String>, repo_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            repo_id: repo_id.into(),
        }
    }
}

impl fmt::Display for RepoScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.repo_id)
    }
}

/// Qualified node identifier
///
/// Formats:
/// - file: `file:{path}`
/// - file-scoped entity: `{type}:{path}:{name}`
/// - import: the module string itself (imports are repository-wide)
/// - placeholder: `function:external:{name}`
///
/// Construct through the typed constructors; the raw string is only exposed
/// for storage and display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Identity of a file node
    pub fn file(path: &str) -> Self {
        NodeId(format!("file:{}", path))
    }

    /// Identity of a function, class, interface or type alias defined in `path`
    ///
    /// Panics in debug builds if called with `NodeType::File` or `NodeType::Import`,
    /// which have their own constructors.
    pub fn entity(node_type: NodeType, path: &str, name: &str) -> Self {
        debug_assert!(
            !matches!(node_type, NodeType::File | NodeType::Import),
            "file and import ids have dedicated constructors"
        );
        NodeId(format!("{}:{}:{}", node_type.as_str(), path, name))
    }

    /// Identity of a function defined in `path`
    pub fn function(path: &str, name: &str) -> Self {
        Self::entity(NodeType::Function, path, name)
    }

    /// Identity of an imported module
    pub fn import(module: &str) -> Self {
        NodeId(module.to_string())
    }

    /// Identity of a placeholder for a call target that has no known definition
    pub fn placeholder(name: &str) -> Self {
        Self::entity(NodeType::Function, EXTERNAL_PATH, name)
    }

    /// Rebuild an id read back from storage
    pub(crate) fn from_stored(raw: String) -> Self {
        NodeId(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_format() {
        assert_eq!(NodeId::function("src/a.ts", "foo").as_str(), "function:src/a.ts:foo");
        assert_eq!(
            NodeId::entity(NodeType::Interface, "src/a.ts", "Shape").as_str(),
            "interface:src/a.ts:Shape"
        );
        assert_eq!(NodeId::file("src/a.ts").as_str(), "file:src/a.ts");
    }

    #[test]
    fn test_import_id_is_module_string() {
        assert_eq!(NodeId::import("./b").as_str(), "./b");
        assert_eq!(NodeId::import("os.path").as_str(), "os.path");
    }

    #[test]
    fn test_placeholder_uses_external_path() {
        assert_eq!(NodeId::placeholder("doThing").as_str(), "function:external:doThing");
    }

    #[test]
    fn test_ids_are_stable() {
        assert_eq!(NodeId::function("a.py", "run"), NodeId::function("a.py", "run"));
        assert_ne!(NodeId::function("a.py", "run"), NodeId::function("b.py", "run"));
    }
}
