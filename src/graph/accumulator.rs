//! Repository-wide graph accumulation and call linking
//!
//! Phase 1 of an indexing pass feeds every [`FileExtraction`] into a
//! [`GraphAccumulator`]; phase 2 calls [`GraphAccumulator::link_calls`] once
//! the node set is complete. Linking order for each call site:
//!
//! 1. same-file function `function:{path}:{callee}`
//! 2. first function (insertion order) labelled with the callee or, for
//!    dotted callees, its last segment
//! 3. an external placeholder
//!
//! Dotted callees (`repo.save`) additionally get a separate edge linked on the
//! last segment alone, tagged `call_type: "method"`.

use serde_json::Value;
use std::collections::HashMap;

use crate::graph::summary::{top_imports, RepositorySummary};
use crate::graph::{Edge, EdgeType, Node, NodeId, NodeType};
use crate::indexer::CancellationFlag;
use crate::ingest::{CallSite, FileExtraction, Language};
use crate::resolve::GraphSnapshot;

/// A call site waiting for phase 2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    pub path: String,
    pub language: Language,
    pub site: CallSite,
}

/// Target chosen by a fallback resolver for a call no definition matched
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackTarget {
    pub id: NodeId,
    pub confidence: f64,
    pub method: String,
}

/// Counters from one linking run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Call edges whose target is a real definition
    pub linked: usize,
    /// Call edges whose target is an external placeholder
    pub unresolved: usize,
    /// Call edges linked through the fallback resolver
    pub resolved_by_fallback: usize,
    /// Call sites left unlinked because of cancellation
    pub skipped: usize,
    pub cancelled: bool,
}

/// Accumulated nodes and edges for one repository pass
#[derive(Debug, Default)]
pub struct GraphAccumulator {
    nodes: Vec<Node>,
    node_index: HashMap<NodeId, usize>,
    edges: Vec<Edge>,
    edge_index: HashMap<(NodeId, NodeId, EdgeType), usize>,
    /// Label -> first real function with that label
    first_function: HashMap<String, NodeId>,
    import_counts: HashMap<String, usize>,
    pending: Vec<PendingCall>,
}

impl GraphAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node; a replaced node keeps its first position
    pub fn add_node(&mut self, node: Node) {
        if node.node_type == NodeType::Function && !node.is_external() {
            self.first_function
                .entry(node.label.clone())
                .or_insert_with(|| node.id.clone());
        }
        match self.node_index.get(&node.id) {
            Some(&i) => self.nodes[i] = node,
            None => {
                self.node_index.insert(node.id.clone(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    /// Insert an edge; a duplicate triple replaces the earlier edge's meta
    pub fn add_edge(&mut self, edge: Edge) {
        let key = edge.key();
        match self.edge_index.get(&key) {
            Some(&i) => self.edges[i] = edge,
            None => {
                self.edge_index.insert(key, self.edges.len());
                self.edges.push(edge);
            }
        }
    }

    /// Merge one file's extraction
    pub fn add_extraction(&mut self, extraction: FileExtraction) {
        let FileExtraction {
            path,
            language,
            nodes,
            edges,
            call_sites,
            imports,
            ..
        } = extraction;

        for node in nodes {
            self.add_node(node);
        }
        for edge in edges {
            self.add_edge(edge);
        }
        for import in imports {
            *self.import_counts.entry(import).or_insert(0) += 1;
        }
        self.pending.extend(call_sites.into_iter().map(|site| PendingCall {
            path: path.clone(),
            language,
            site,
        }));
    }

    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    /// Link every pending call site, `batch_size` at a time
    ///
    /// `cancel` is checked before each batch; on cancellation the remaining
    /// call sites are dropped unlinked. `fallback`, when given, is consulted
    /// before a placeholder is created.
    pub fn link_calls(
        &mut self,
        batch_size: usize,
        cancel: &CancellationFlag,
        fallback: Option<&dyn Fn(&PendingCall, &str) -> Option<FallbackTarget>>,
    ) -> LinkStats {
        let mut stats = LinkStats::default();
        let pending = std::mem::take(&mut self.pending);
        let batch_size = batch_size.max(1);

        for (batch_no, batch) in pending.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                stats.cancelled = true;
                stats.skipped = pending.len() - batch_no * batch_size;
                tracing::info!(skipped = stats.skipped, "call linking cancelled");
                break;
            }
            for call in batch {
                self.link_one(call, &mut stats, fallback);
            }
            tracing::debug!(batch = batch_no, calls = batch.len(), "linked call batch");
        }
        stats
    }

    fn link_one(
        &mut self,
        call: &PendingCall,
        stats: &mut LinkStats,
        fallback: Option<&dyn Fn(&PendingCall, &str) -> Option<FallbackTarget>>,
    ) {
        let callee = call.site.callee.as_str();
        let last_segment = callee.rsplit('.').next().unwrap_or(callee);
        let dotted = last_segment.len() != callee.len();

        self.link_target(call, callee, last_segment, false, stats, fallback);
        if dotted && !last_segment.is_empty() {
            self.link_target(call, last_segment, last_segment, true, stats, fallback);
        }
    }

    /// Steps 1-3 for one name; emits exactly one `calls` edge
    fn link_target(
        &mut self,
        call: &PendingCall,
        name: &str,
        label: &str,
        method: bool,
        stats: &mut LinkStats,
        fallback: Option<&dyn Fn(&PendingCall, &str) -> Option<FallbackTarget>>,
    ) {
        let mut edge = Edge::new(call.site.caller.clone(), NodeId::placeholder(name), EdgeType::Calls)
            .with_meta("line", call.site.line);
        if method {
            edge = edge.with_meta("call_type", "method");
        }

        let same_file = NodeId::function(&call.path, name);
        let target = if self.node_index.contains_key(&same_file) {
            Some(same_file)
        } else {
            self.first_function
                .get(name)
                .or_else(|| self.first_function.get(label))
                .cloned()
        };

        if let Some(target) = target {
            edge.to = target;
            stats.linked += 1;
            self.add_edge(edge);
            return;
        }

        if let Some(found) = fallback.and_then(|resolve| resolve(call, name)) {
            if self.node_index.contains_key(&found.id) {
                edge.to = found.id;
                edge = edge
                    .with_meta("confidence", found.confidence)
                    .with_meta("resolved_by", found.method);
                stats.resolved_by_fallback += 1;
                self.add_edge(edge);
                return;
            }
        }

        let placeholder = Node::placeholder(name);
        edge.to = placeholder.id.clone();
        edge = edge.with_meta("external", Value::Bool(true));
        if !self.node_index.contains_key(&placeholder.id) {
            self.add_node(placeholder);
        }
        stats.unresolved += 1;
        self.add_edge(edge);
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    /// Read view for resolving against the accumulated graph
    pub fn snapshot(&self, sources: HashMap<String, String>) -> GraphSnapshot {
        GraphSnapshot::new(&self.nodes, &self.edges, sources)
    }

    pub fn summary(&self, top_n: usize) -> RepositorySummary {
        let mut summary = RepositorySummary::default();
        for node in &self.nodes {
            match node.node_type {
                NodeType::File => summary.total_files += 1,
                NodeType::Function if !node.is_external() => summary.total_functions += 1,
                t if t.is_class_like() => summary.total_classes += 1,
                _ => {}
            }
        }
        summary.top_imports = top_imports(&self.import_counts, top_n);
        summary
    }

    pub fn into_parts(self) -> (Vec<Node>, Vec<Edge>) {
        (self.nodes, self.edges)
    }
}
