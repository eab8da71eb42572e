//! Read access the resolver needs from a graph
//!
//! [`SymbolSource`] is implemented by the persistent [`crate::store::GraphStore`]
//! (one targeted query per call) and by [`GraphSnapshot`], an in-memory copy
//! used for batch resolution and for linking during an indexing pass.

use std::collections::{BTreeSet, HashMap};

use crate::error::PersistenceError;
use crate::graph::{Edge, EdgeType, Node, NodeId, NodeType};

pub trait SymbolSource {
    /// Definitions named `name` with one of `kinds`, ordered by path then id
    ///
    /// With `path` set, only definitions in that file are returned. External
    /// placeholders are never returned.
    fn definitions(
        &self,
        name: &str,
        path: Option<&str>,
        kinds: &[NodeType],
    ) -> Result<Vec<Node>, PersistenceError>;

    /// Every non-external definition with one of `kinds`, ordered by path then label
    fn all_definitions(&self, kinds: &[NodeType]) -> Result<Vec<Node>, PersistenceError>;

    /// First definition, in [`SymbolSource::all_definitions`] order, that `accept` takes
    ///
    /// `accept` sees every candidate up to the match.
    fn find_definition(
        &self,
        kinds: &[NodeType],
        accept: &mut dyn FnMut(&Node) -> bool,
    ) -> Result<Option<Node>, PersistenceError> {
        Ok(self.all_definitions(kinds)?.into_iter().find(|n| accept(n)))
    }

    /// Targets of existing `calls` edges whose label is `name`
    fn call_targets(&self, name: &str) -> Result<Vec<Node>, PersistenceError>;

    /// Stored source text for a file, if any
    fn file_text(&self, path: &str) -> Result<Option<String>, PersistenceError>;

    /// Paths of every file node in the graph, sorted
    fn file_paths(&self) -> Result<Vec<String>, PersistenceError>;
}

fn sort_definitions(nodes: &mut [Node]) {
    nodes.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.id.cmp(&b.id)));
}

/// In-memory read view over one scope's graph
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    /// Definitions and placeholders keyed by id
    nodes: HashMap<NodeId, Node>,
    /// Definition ids sorted by (path, id)
    ordered: Vec<NodeId>,
    /// Definition ids sorted by (path, label, id)
    by_label: Vec<NodeId>,
    /// Distinct `to` ids of `calls` edges
    call_targets: BTreeSet<NodeId>,
    files: BTreeSet<String>,
    sources: HashMap<String, String>,
}

impl GraphSnapshot {
    /// Build a snapshot from nodes, edges and file sources
    ///
    /// Only definitions, placeholders and file paths are retained from
    /// `nodes`; only `calls` edges from `edges`.
    pub fn new<'a>(
        nodes: impl IntoIterator<Item = &'a Node>,
        edges: impl IntoIterator<Item = &'a Edge>,
        sources: HashMap<String, String>,
    ) -> Self {
        let mut snapshot = GraphSnapshot {
            sources,
            ..Default::default()
        };

        let mut definitions = Vec::new();
        for node in nodes {
            match node.node_type {
                NodeType::File => {
                    if let Some(path) = &node.path {
                        snapshot.files.insert(path.clone());
                    }
                }
                NodeType::Import => {}
                _ => {
                    if !node.is_external() {
                        definitions.push(node.clone());
                    }
                    snapshot.nodes.insert(node.id.clone(), node.clone());
                }
            }
        }
        sort_definitions(&mut definitions);
        snapshot.ordered = definitions.iter().map(|n| n.id.clone()).collect();
        definitions.sort_by(|a, b| {
            (&a.path, &a.label, &a.id).cmp(&(&b.path, &b.label, &b.id))
        });
        snapshot.by_label = definitions.into_iter().map(|n| n.id).collect();

        snapshot.call_targets = edges
            .into_iter()
            .filter(|e| e.edge_type == EdgeType::Calls)
            .map(|e| e.to.clone())
            .collect();

        snapshot
    }

    pub fn definition_count(&self) -> usize {
        self.ordered.len()
    }

    fn ordered_nodes(&self) -> impl Iterator<Item = &Node> {
        self.ordered.iter().filter_map(|id| self.nodes.get(id))
    }

    fn nodes_by_label(&self) -> impl Iterator<Item = &Node> {
        self.by_label.iter().filter_map(|id| self.nodes.get(id))
    }
}

impl SymbolSource for GraphSnapshot {
    fn definitions(
        &self,
        name: &str,
        path: Option<&str>,
        kinds: &[NodeType],
    ) -> Result<Vec<Node>, PersistenceError> {
        Ok(self
            .ordered_nodes()
            .filter(|n| n.label == name && kinds.contains(&n.node_type))
            .filter(|n| path.map_or(true, |p| n.path.as_deref() == Some(p)))
            .cloned()
            .collect())
    }

    fn all_definitions(&self, kinds: &[NodeType]) -> Result<Vec<Node>, PersistenceError> {
        Ok(self
            .nodes_by_label()
            .filter(|n| kinds.contains(&n.node_type))
            .cloned()
            .collect())
    }

    fn find_definition(
        &self,
        kinds: &[NodeType],
        accept: &mut dyn FnMut(&Node) -> bool,
    ) -> Result<Option<Node>, PersistenceError> {
        Ok(self
            .nodes_by_label()
            .filter(|n| kinds.contains(&n.node_type))
            .find(|n| accept(n))
            .cloned())
    }

    fn call_targets(&self, name: &str) -> Result<Vec<Node>, PersistenceError> {
        Ok(self
            .call_targets
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|n| n.label == name)
            .cloned()
            .collect())
    }

    fn file_text(&self, path: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.sources.get(path).cloned())
    }

    fn file_paths(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.files.iter().cloned().collect())
    }
}
