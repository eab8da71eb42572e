//! Symbol resolution
//!
//! Links a symbolic reference (name + location) to a definition through a
//! cascade of strategies, each with a fixed confidence:
//!
//! | tier        | confidence |
//! |-------------|------------|
//! | local       | 0.9        |
//! | import      | 0.8        |
//! | cross-file  | 0.6        |
//! | call graph  | 0.7        |
//! | heuristic   | 0.4 / 0.3  |
//!
//! Tiers run in the order listed; the first hit wins. Call graph follows
//! cross-file even though its confidence is higher.
//!
//! Resolution never fails: when every tier misses, the result carries no
//! definition and a confidence of 0.0. Store errors are collected into
//! [`ResolutionResult::errors`] and the cascade continues with the next tier.

pub mod classify;
pub mod imports;
pub mod module_resolver;
pub mod source;

pub use classify::{classify, ReferenceKind};
pub use imports::{parse_imports, ImportBinding};
pub use source::{GraphSnapshot, SymbolSource};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use crate::error::PersistenceError;
use crate::graph::{Node, NodeType, RepoScope};
use crate::ingest::{detect_language, Language};
use crate::store::GraphStore;

pub const LOCAL_CONFIDENCE: f64 = 0.9;
pub const IMPORT_CONFIDENCE: f64 = 0.8;
pub const CROSS_FILE_CONFIDENCE: f64 = 0.6;
pub const CALL_GRAPH_CONFIDENCE: f64 = 0.7;
pub const HEURISTIC_AFFIX_CONFIDENCE: f64 = 0.4;
pub const HEURISTIC_CONTAINMENT_CONFIDENCE: f64 = 0.3;

/// Accessor prefixes ignored by the heuristic tier
const ACCESSOR_PREFIXES: &[&str] = &["get_", "set_", "is_", "has_"];

/// Shortest name core the heuristic tier will substring-match
const MIN_HEURISTIC_LEN: usize = 3;

const FUNCTION_KINDS: &[NodeType] = &[NodeType::Function];
const INSTANTIABLE_KINDS: &[NodeType] = &[
    NodeType::Function,
    NodeType::Class,
    NodeType::Interface,
    NodeType::Type,
];

/// Which tier produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Local,
    Import,
    CrossFile,
    CallGraph,
    Heuristic,
    Unresolved,
}

impl ResolutionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMethod::Local => "local",
            ResolutionMethod::Import => "import",
            ResolutionMethod::CrossFile => "cross_file",
            ResolutionMethod::CallGraph => "call_graph",
            ResolutionMethod::Heuristic => "heuristic",
            ResolutionMethod::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving one reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub definition: Option<Node>,
    /// In `[0, 1]`; 0.0 exactly when `definition` is `None`
    pub confidence: f64,
    pub method: ResolutionMethod,
    pub reference_kind: ReferenceKind,
    /// Store errors met along the way; never fatal
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ResolutionResult {
    pub fn unresolved(reference_kind: ReferenceKind, errors: Vec<String>) -> Self {
        ResolutionResult {
            definition: None,
            confidence: 0.0,
            method: ResolutionMethod::Unresolved,
            reference_kind,
            errors,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.definition.is_some()
    }
}

/// One reference to resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub scope: RepoScope,
    pub symbol: String,
    pub file_path: String,
    /// 1-indexed line of the reference
    pub line: usize,
    /// Detected from `file_path` when absent
    pub language: Option<Language>,
}

/// Keep the value, or record the error and carry on
fn attempt<T>(result: Result<T, PersistenceError>, errors: &mut Vec<String>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(code = e.code(), error = %e, "resolver store query failed");
            errors.push(format!("{}: {}", e.code(), e));
            None
        }
    }
}

/// Lowercased name with one accessor prefix removed
fn name_core(name: &str) -> String {
    let lower = name.to_lowercase();
    for prefix in ACCESSOR_PREFIXES {
        if let Some(rest) = lower.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    lower
}

fn contains_either(a: &str, b: &str) -> bool {
    a.len() >= MIN_HEURISTIC_LEN && b.len() >= MIN_HEURISTIC_LEN && (a.contains(b) || b.contains(a))
}

/// Multi-strategy symbol resolver
///
/// Holds no state; construct once and pass by reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolResolver;

impl SymbolResolver {
    pub fn new() -> Self {
        SymbolResolver
    }

    /// Resolve `symbol` referenced at `line` of `file_path` against `source`
    pub fn resolve(
        &self,
        source: &dyn SymbolSource,
        symbol: &str,
        file_path: &str,
        line: usize,
        language: Option<Language>,
    ) -> ResolutionResult {
        let mut errors = Vec::new();
        let language = language.or_else(|| detect_language(Path::new(file_path)));

        // Qualified references (`repo.save`) resolve on their last segment
        let symbol = symbol.trim();
        let name = symbol.rsplit('.').next().unwrap_or(symbol);
        if name.is_empty() {
            return ResolutionResult::unresolved(ReferenceKind::Unknown, errors);
        }

        let text = attempt(source.file_text(file_path), &mut errors).flatten();
        let reference_kind = match language {
            Some(language) => classify(name, text.as_deref(), line, language),
            None => ReferenceKind::Unknown,
        };
        let kinds = if reference_kind == ReferenceKind::Instantiation {
            INSTANTIABLE_KINDS
        } else {
            FUNCTION_KINDS
        };

        let hit = |node: Node, confidence: f64, method: ResolutionMethod, errors: Vec<String>| {
            tracing::debug!(symbol, file_path, %method, target = %node.id, "resolved symbol");
            ResolutionResult {
                definition: Some(node),
                confidence,
                method,
                reference_kind,
                errors,
            }
        };

        // Local scope
        if let Some(node) = attempt(source.definitions(name, Some(file_path), kinds), &mut errors)
            .and_then(|found| found.into_iter().next())
        {
            return hit(node, LOCAL_CONFIDENCE, ResolutionMethod::Local, errors);
        }

        // Import resolution
        if let (Some(language), Some(text)) = (language, text.as_deref()) {
            if let Some(node) =
                self.resolve_import(source, symbol, name, file_path, text, language, kinds, &mut errors)
            {
                return hit(node, IMPORT_CONFIDENCE, ResolutionMethod::Import, errors);
            }
        }

        // Cross-file, first by path
        if let Some(node) = attempt(source.definitions(name, None, kinds), &mut errors).and_then(
            |found| {
                found
                    .into_iter()
                    .find(|n| n.path.as_deref() != Some(file_path))
            },
        ) {
            return hit(node, CROSS_FILE_CONFIDENCE, ResolutionMethod::CrossFile, errors);
        }

        // Existing call edges
        if let Some(node) = attempt(source.call_targets(name), &mut errors)
            .and_then(|found| found.into_iter().next())
        {
            return hit(node, CALL_GRAPH_CONFIDENCE, ResolutionMethod::CallGraph, errors);
        }

        // Heuristic name matching, in one pass over the definitions
        let core = name_core(name);
        let lower = name.to_lowercase();
        let mut containment: Option<Node> = None;
        let affix = attempt(
            source.find_definition(kinds, &mut |n: &Node| -> bool {
                if contains_either(&core, &name_core(&n.label)) {
                    return true;
                }
                if containment.is_none() && contains_either(&lower, &n.label.to_lowercase()) {
                    containment = Some(n.clone());
                }
                false
            }),
            &mut errors,
        )
        .flatten();
        if let Some(node) = affix {
            return hit(node, HEURISTIC_AFFIX_CONFIDENCE, ResolutionMethod::Heuristic, errors);
        }
        if let Some(node) = containment {
            return hit(
                node,
                HEURISTIC_CONTAINMENT_CONFIDENCE,
                ResolutionMethod::Heuristic,
                errors,
            );
        }

        tracing::debug!(symbol, file_path, "symbol unresolved");
        ResolutionResult::unresolved(reference_kind, errors)
    }

    /// Follow the file's imports to the module that defines `name`
    #[allow(clippy::too_many_arguments)]
    fn resolve_import(
        &self,
        source: &dyn SymbolSource,
        symbol: &str,
        name: &str,
        file_path: &str,
        text: &str,
        language: Language,
        kinds: &[NodeType],
        errors: &mut Vec<String>,
    ) -> Option<Node> {
        let bindings = imports::parse_imports(language, text);
        if bindings.is_empty() {
            return None;
        }
        let qualifier = symbol
            .rsplit_once('.')
            .map(|(q, _)| q.rsplit('.').next().unwrap_or(q));

        // Named bindings first, then namespace and glob imports
        let mut lookups: Vec<(String, &str)> = bindings
            .iter()
            .filter(|b| !b.is_wildcard() && b.local == name)
            .map(|b| (b.module.clone(), b.imported.as_str()))
            .collect();
        lookups.extend(
            bindings
                .iter()
                .filter(|b| b.is_wildcard())
                .filter(|b| qualifier.map_or(true, |q| b.local == q || b.local == imports::WILDCARD))
                .map(|b| (b.module.clone(), name)),
        );
        // from . import utils; utils.helper()
        if language == Language::Python {
            if let Some(q) = qualifier {
                lookups.extend(
                    bindings
                        .iter()
                        .filter(|b| !b.is_wildcard() && b.local == q)
                        .map(|b| (module_resolver::python_submodule(&b.module, &b.imported), name)),
                );
            }
        }
        if lookups.is_empty() {
            return None;
        }

        let files: BTreeSet<String> = attempt(source.file_paths(), errors)?.into_iter().collect();
        for (module, imported) in lookups {
            for candidate in module_resolver::candidate_files(&module, file_path, language, &files) {
                if candidate == file_path {
                    continue;
                }
                let found = attempt(source.definitions(imported, Some(&candidate), kinds), errors);
                if let Some(node) = found.and_then(|f| f.into_iter().next()) {
                    return Some(node);
                }
            }
        }
        None
    }

    /// Resolve many references, loading one snapshot per scope
    ///
    /// Results are returned in request order. A scope whose snapshot cannot be
    /// loaded yields unresolved results carrying the load error.
    pub fn resolve_batch(
        &self,
        store: &GraphStore,
        requests: &[ResolveRequest],
    ) -> Vec<ResolutionResult> {
        let mut by_scope: BTreeMap<&RepoScope, Vec<usize>> = BTreeMap::new();
        for (i, request) in requests.iter().enumerate() {
            by_scope.entry(&request.scope).or_default().push(i);
        }

        let mut results: Vec<Option<ResolutionResult>> = vec![None; requests.len()];
        for (scope, indices) in by_scope {
            let paths: BTreeSet<&str> = indices
                .iter()
                .map(|&i| requests[i].file_path.as_str())
                .collect();
            let paths: Vec<&str> = paths.into_iter().collect();

            match store.load_snapshot(scope, &paths) {
                Ok(snapshot) => {
                    for i in indices {
                        let r = &requests[i];
                        results[i] =
                            Some(self.resolve(&snapshot, &r.symbol, &r.file_path, r.line, r.language));
                    }
                }
                Err(e) => {
                    tracing::warn!(%scope, code = e.code(), error = %e, "snapshot load failed");
                    for i in indices {
                        results[i] = Some(ResolutionResult::unresolved(
                            ReferenceKind::Unknown,
                            vec![format!("{}: {}", e.code(), e)],
                        ));
                    }
                }
            }
        }

        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| ResolutionResult::unresolved(ReferenceKind::Unknown, Vec::new())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, EdgeType, Meta, NodeId};
    use std::collections::HashMap;

    fn def(node_type: NodeType, path: &str, name: &str) -> Node {
        Node {
            id: NodeId::entity(node_type, path, name),
            label: name.to_string(),
            node_type,
            path: Some(path.to_string()),
            meta: Meta::new(),
        }
    }

    fn file(path: &str) -> Node {
        Node {
            id: NodeId::file(path),
            label: path.to_string(),
            node_type: NodeType::File,
            path: Some(path.to_string()),
            meta: Meta::new(),
        }
    }

    fn snapshot(nodes: Vec<Node>, edges: Vec<Edge>, sources: &[(&str, &str)]) -> GraphSnapshot {
        let sources: HashMap<String, String> = sources
            .iter()
            .map(|(p, t)| (p.to_string(), t.to_string()))
            .collect();
        GraphSnapshot::new(&nodes, &edges, sources)
    }

    #[test]
    fn test_local_tier() {
        let graph = snapshot(
            vec![file("a.py"), def(NodeType::Function, "a.py", "helper")],
            vec![],
            &[("a.py", "def helper():\n    pass\nhelper()\n")],
        );
        let result = SymbolResolver::new().resolve(&graph, "helper", "a.py", 3, None);
        assert_eq!(result.method, ResolutionMethod::Local);
        assert_eq!(result.confidence, LOCAL_CONFIDENCE);
        assert_eq!(result.reference_kind, ReferenceKind::FunctionCall);
    }

    #[test]
    fn test_import_tier_beats_cross_file() {
        let graph = snapshot(
            vec![
                file("app/order.py"),
                file("app/aaa.py"),
                file("app/validators.py"),
                def(NodeType::Function, "app/aaa.py", "validate"),
                def(NodeType::Function, "app/validators.py", "validate"),
            ],
            vec![],
            &[("app/order.py", "from .validators import validate\n\nvalidate(x)\n")],
        );
        let result = SymbolResolver::new().resolve(&graph, "validate", "app/order.py", 3, None);
        assert_eq!(result.method, ResolutionMethod::Import);
        assert_eq!(result.confidence, IMPORT_CONFIDENCE);
        assert_eq!(
            result.definition.unwrap().path.as_deref(),
            Some("app/validators.py")
        );
    }

    #[test]
    fn test_cross_file_tier_orders_by_path() {
        let graph = snapshot(
            vec![
                def(NodeType::Function, "z.ts", "bar"),
                def(NodeType::Function, "b.ts", "bar"),
            ],
            vec![],
            &[],
        );
        let result = SymbolResolver::new().resolve(&graph, "bar", "a.ts", 1, None);
        assert_eq!(result.method, ResolutionMethod::CrossFile);
        assert_eq!(result.confidence, CROSS_FILE_CONFIDENCE);
        assert_eq!(result.definition.unwrap().path.as_deref(), Some("b.ts"));
        // No stored text: classification falls back to unknown
        assert_eq!(result.reference_kind, ReferenceKind::Unknown);
    }

    #[test]
    fn test_call_graph_tier_returns_placeholder_target() {
        let caller = def(NodeType::Function, "a.ts", "main");
        let target = Node::placeholder("fetchData");
        let edge = Edge::new(caller.id.clone(), target.id.clone(), EdgeType::Calls);
        let graph = snapshot(vec![caller, target.clone()], vec![edge], &[]);

        let result = SymbolResolver::new().resolve(&graph, "fetchData", "b.ts", 1, None);
        assert_eq!(result.method, ResolutionMethod::CallGraph);
        assert_eq!(result.confidence, CALL_GRAPH_CONFIDENCE);
        assert_eq!(result.definition, Some(target));
    }

    #[test]
    fn test_heuristic_affix_match() {
        let graph = snapshot(
            vec![file("util.py"), def(NodeType::Function, "util.py", "set_valid")],
            vec![],
            &[],
        );
        let result = SymbolResolver::new().resolve(&graph, "validate_input", "order.py", 42, None);
        assert_eq!(result.method, ResolutionMethod::Heuristic);
        assert!((0.3..=0.4).contains(&result.confidence));
        assert_eq!(result.definition.unwrap().label, "set_valid");
    }

    #[test]
    fn test_heuristic_containment_for_short_cores() {
        let graph = snapshot(
            vec![def(NodeType::Function, "x.py", "this_is_ok_now")],
            vec![],
            &[],
        );
        let result = SymbolResolver::new().resolve(&graph, "is_ok", "y.py", 1, None);
        assert_eq!(result.confidence, HEURISTIC_CONTAINMENT_CONFIDENCE);
    }

    #[test]
    fn test_affix_match_beats_earlier_containment_match() {
        let graph = snapshot(
            vec![
                def(NodeType::Function, "a.py", "get_u"),
                def(NodeType::Function, "b.py", "user_profile"),
            ],
            vec![],
            &[],
        );
        let result = SymbolResolver::new().resolve(&graph, "get_user", "c.py", 1, None);
        assert_eq!(result.confidence, HEURISTIC_AFFIX_CONFIDENCE);
        assert_eq!(result.definition.unwrap().label, "user_profile");

        let graph = snapshot(vec![def(NodeType::Function, "a.py", "get_u")], vec![], &[]);
        let result = SymbolResolver::new().resolve(&graph, "get_user", "c.py", 1, None);
        assert_eq!(result.confidence, HEURISTIC_CONTAINMENT_CONFIDENCE);
    }

    #[test]
    fn test_python_submodule_imported_from_package() {
        let graph = snapshot(
            vec![
                file("lib/helpers.py"),
                file("pkg/app.py"),
                file("pkg/utils.py"),
                def(NodeType::Function, "lib/helpers.py", "helper"),
                def(NodeType::Function, "pkg/utils.py", "helper"),
            ],
            vec![],
            &[(
                "pkg/app.py",
                "from . import utils\n\ndef run():\n    utils.helper()\n",
            )],
        );
        let result = SymbolResolver::new().resolve(&graph, "utils.helper", "pkg/app.py", 4, None);
        assert_eq!(result.method, ResolutionMethod::Import);
        assert_eq!(
            result.definition.unwrap().path.as_deref(),
            Some("pkg/utils.py")
        );
    }

    #[test]
    fn test_instantiation_accepts_classes() {
        let graph = snapshot(
            vec![file("shop.ts"), def(NodeType::Class, "models.ts", "Cart")],
            vec![],
            &[("shop.ts", "const cart = new Cart();\n")],
        );
        let result = SymbolResolver::new().resolve(&graph, "Cart", "shop.ts", 1, None);
        assert_eq!(result.reference_kind, ReferenceKind::Instantiation);
        assert_eq!(result.method, ResolutionMethod::CrossFile);
        assert_eq!(result.definition.unwrap().node_type, NodeType::Class);
    }

    #[test]
    fn test_unresolved_is_zero_confidence() {
        let graph = snapshot(vec![], vec![], &[]);
        for symbol in ["", "   ", "nothing", "a.b.", "\u{0}"] {
            let result = SymbolResolver::new().resolve(&graph, symbol, "??", 0, None);
            assert!(result.definition.is_none());
            assert_eq!(result.confidence, 0.0);
            assert_eq!(result.method, ResolutionMethod::Unresolved);
        }
    }

    #[test]
    fn test_name_core_strips_one_prefix() {
        assert_eq!(name_core("get_User"), "user");
        assert_eq!(name_core("is_has_x"), "has_x");
        assert_eq!(name_core("validate"), "validate");
    }
}
