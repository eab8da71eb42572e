//! Graph schema definitions for Meridian
//!
//! Defines the node and edge records exchanged between the extractor, the
//! accumulator, the resolver and the store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::ids::{NodeId, EXTERNAL_PATH};

/// Open metadata map attached to nodes and edges
///
/// Ordered so that serialized metadata is byte-identical across runs.
pub type Meta = BTreeMap<String, Value>;

/// Kind of graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    Function,
    Class,
    Interface,
    /// Type alias
    Type,
    Import,
}

impl NodeType {
    pub const ALL: [NodeType; 6] = [
        NodeType::File,
        NodeType::Function,
        NodeType::Class,
        NodeType::Interface,
        NodeType::Type,
        NodeType::Import,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::File => "file",
            NodeType::Function => "function",
            NodeType::Class => "class",
            NodeType::Interface => "interface",
            NodeType::Type => "type",
            NodeType::Import => "import",
        }
    }

    /// Class-like definitions (class, interface, type alias)
    pub fn is_class_like(&self) -> bool {
        matches!(self, NodeType::Class | NodeType::Interface | NodeType::Type)
    }

    /// Definitions that must be contained by a file
    pub fn is_definition(&self) -> bool {
        *self == NodeType::Function || self.is_class_like()
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown node type: {}", s))
    }
}

/// Kind of graph edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Contains,
    Calls,
    Imports,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Contains => "contains",
            EdgeType::Calls => "calls",
            EdgeType::Imports => "imports",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contains" => Ok(EdgeType::Contains),
            "calls" => Ok(EdgeType::Calls),
            "imports" => Ok(EdgeType::Imports),
            other => Err(format!("unknown edge type: {}", other)),
        }
    }
}

/// A program entity in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Display name
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Repo-relative path; `None` for imports, `"external"` for placeholders
    pub path: Option<String>,
    #[serde(default)]
    pub meta: Meta,
}

impl Node {
    /// Placeholder function for a call target with no known definition
    pub fn placeholder(name: &str) -> Self {
        let mut meta = Meta::new();
        meta.insert("external".to_string(), Value::Bool(true));
        Node {
            id: NodeId::placeholder(name),
            label: name.to_string(),
            node_type: NodeType::Function,
            path: Some(EXTERNAL_PATH.to_string()),
            meta,
        }
    }

    pub fn is_external(&self) -> bool {
        self.meta
            .get("external")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Start line recorded at extraction time (1-indexed)
    pub fn start_line(&self) -> Option<u64> {
        self.meta.get("start_line").and_then(Value::as_u64)
    }

    /// Source slice recorded at extraction time
    pub fn code(&self) -> Option<&str> {
        self.meta.get("code").and_then(Value::as_str)
    }
}

/// A relationship between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(default)]
    pub meta: Meta,
}

impl Edge {
    pub fn new(from: NodeId, to: NodeId, edge_type: EdgeType) -> Self {
        Edge {
            from,
            to,
            edge_type,
            meta: Meta::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    /// Identity triple; duplicates with the same key collapse
    pub fn key(&self) -> (NodeId, NodeId, EdgeType) {
        (self.from.clone(), self.to.clone(), self.edge_type)
    }

    pub fn is_external(&self) -> bool {
        self.meta
            .get("external")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_serializes_with_wire_names() {
        let node = Node::placeholder("doThing");
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["id"], "function:external:doThing");
        assert_eq!(json["type"], "function");
        assert_eq!(json["path"], "external");
        assert_eq!(json["meta"]["external"], true);
    }

    #[test]
    fn test_edge_serializes_with_wire_names() {
        let edge = Edge::new(
            NodeId::function("a.ts", "foo"),
            NodeId::function("b.ts", "bar"),
            EdgeType::Calls,
        )
        .with_meta("line", 3);
        let json = serde_json::to_value(&edge).unwrap();

        assert_eq!(json["from"], "function:a.ts:foo");
        assert_eq!(json["to"], "function:b.ts:bar");
        assert_eq!(json["type"], "calls");
        assert_eq!(json["meta"]["line"], 3);
    }

    #[test]
    fn test_node_type_round_trips_through_str() {
        for t in NodeType::ALL {
            assert_eq!(t.as_str().parse::<NodeType>().unwrap(), t);
        }
        assert!("module".parse::<NodeType>().is_err());
    }

    #[test]
    fn test_class_like_kinds() {
        assert!(NodeType::Interface.is_class_like());
        assert!(NodeType::Type.is_class_like());
        assert!(!NodeType::Function.is_class_like());
        assert!(NodeType::Function.is_definition());
        assert!(!NodeType::Import.is_definition());
    }
}
