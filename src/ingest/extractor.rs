//! Per-file syntax-tree walker
//!
//! Pure function: input (path, contents, language), output [`FileExtraction`].
//! No filesystem access, no shared state. Cross-file call linking happens later
//! in [`crate::graph::GraphAccumulator`] once every file has been extracted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tree_sitter::Node as TsNode;

use crate::error::ExtractionError;
use crate::graph::{Edge, EdgeType, Meta, Node, NodeId, NodeType};
use crate::ingest::detect::Language;
use crate::ingest::pool::with_parser;
use crate::ingest::syntax::{identifier_text, node_text, syntax_for, LanguageSyntax};
use crate::ingest::{Scope, ScopeStack};

/// Bytes inspected when sniffing for binary content
const BINARY_SNIFF_LEN: usize = 8000;

/// Unresolved call found inside a function body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub caller: NodeId,
    /// Callee expression text, member chains joined with `.`
    pub callee: String,
    /// 1-indexed
    pub line: usize,
}

/// Everything one file contributes to the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileExtraction {
    pub path: String,
    pub language: Language,
    pub file_id: NodeId,
    /// File node first, then definitions and imports in source order
    pub nodes: Vec<Node>,
    /// `contains` and `imports` edges
    pub edges: Vec<Edge>,
    pub call_sites: Vec<CallSite>,
    /// Imported module strings, one entry per import occurrence
    pub imports: Vec<String>,
    pub source_hash: String,
}

/// SHA-256 of `bytes` as lowercase hex
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Whether `source` looks like binary content (NUL byte near the start)
pub fn is_binary(source: &[u8]) -> bool {
    let end = source.len().min(BINARY_SNIFF_LEN);
    source[..end].contains(&0)
}

/// Extract nodes, same-file edges and call sites from one file
///
/// # Arguments
/// * `path` - Repo-relative path, used verbatim in identity keys
/// * `source` - Raw file contents; invalid UTF-8 is decoded lossily
/// * `language` - Grammar to parse with
///
/// # Errors
/// Binary content, grammar load failure, or a parser that yields no tree.
pub fn extract_file(
    path: &str,
    source: &[u8],
    language: Language,
) -> Result<FileExtraction, ExtractionError> {
    if is_binary(source) {
        return Err(ExtractionError::Binary {
            path: path.to_string(),
        });
    }

    let tree = with_parser(language, |parser| parser.parse(source, None))?.ok_or_else(|| {
        ExtractionError::Parse {
            path: path.to_string(),
        }
    })?;

    let source_hash = content_hash(source);
    let file_id = NodeId::file(path);

    let mut file_meta = Meta::new();
    file_meta.insert("language".to_string(), Value::from(language.as_str()));
    file_meta.insert("lines".to_string(), Value::from(line_count(source)));
    file_meta.insert("source_hash".to_string(), Value::from(source_hash.clone()));

    let mut walker = Walker {
        path,
        source,
        syntax: syntax_for(language),
        file_id: file_id.clone(),
        scopes: ScopeStack::new(),
        out: FileExtraction {
            path: path.to_string(),
            language,
            file_id: file_id.clone(),
            nodes: vec![Node {
                id: file_id,
                label: path.to_string(),
                node_type: NodeType::File,
                path: Some(path.to_string()),
                meta: file_meta,
            }],
            edges: Vec::new(),
            call_sites: Vec::new(),
            imports: Vec::new(),
            source_hash,
        },
    };
    walker.walk(tree.root_node());

    tracing::debug!(
        path,
        nodes = walker.out.nodes.len(),
        edges = walker.out.edges.len(),
        calls = walker.out.call_sites.len(),
        "extracted file"
    );
    Ok(walker.out)
}

fn line_count(source: &[u8]) -> usize {
    if source.is_empty() {
        return 0;
    }
    let newlines = source.iter().filter(|&&b| b == b'\n').count();
    if source.ends_with(b"\n") {
        newlines
    } else {
        newlines + 1
    }
}

struct Walker<'a> {
    path: &'a str,
    source: &'a [u8],
    syntax: &'static dyn LanguageSyntax,
    file_id: NodeId,
    scopes: ScopeStack,
    out: FileExtraction,
}

impl Walker<'_> {
    /// Pre-order traversal with a cursor; a frame pushed on entering a node is
    /// popped after its last descendant has been visited.
    fn walk(&mut self, root: TsNode) {
        let mut cursor = root.walk();
        // One flag per ancestor of the cursor: did that ancestor push a scope?
        let mut pushed: Vec<bool> = Vec::new();

        loop {
            let entered = self.visit(cursor.node());
            if cursor.goto_first_child() {
                pushed.push(entered);
                continue;
            }
            if entered {
                self.scopes.pop();
            }

            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return;
                }
                if pushed.pop() == Some(true) {
                    self.scopes.pop();
                }
            }
        }
    }

    /// Handle one node; returns true if a scope frame was pushed
    fn visit(&mut self, node: TsNode) -> bool {
        if let Some(node_type) = self.syntax.definition(&node, self.source) {
            return self.definition(node, node_type);
        }
        if self.syntax.is_import(&node) {
            self.import(node);
        } else if self.syntax.is_call(&node) {
            self.call(node);
        }
        false
    }

    fn definition(&mut self, node: TsNode, node_type: NodeType) -> bool {
        let Some(name) = self
            .syntax
            .definition_name(&node)
            .and_then(|n| identifier_text(&n, self.source))
        else {
            return false;
        };

        let id = NodeId::entity(node_type, self.path, &name);
        let code = node_text(&node, self.source);

        let mut meta = Meta::new();
        meta.insert("start_line".to_string(), Value::from(node.start_position().row + 1));
        meta.insert("end_line".to_string(), Value::from(node.end_position().row + 1));
        meta.insert("file".to_string(), Value::from(self.path));
        meta.insert("source_hash".to_string(), Value::from(content_hash(code.as_bytes())));
        meta.insert("code".to_string(), Value::from(code.into_owned()));

        self.out.nodes.push(Node {
            id: id.clone(),
            label: name,
            node_type,
            path: Some(self.path.to_string()),
            meta,
        });
        self.out
            .edges
            .push(Edge::new(self.file_id.clone(), id.clone(), EdgeType::Contains));

        if node_type == NodeType::Function {
            if let Some(class_id) = self.scopes.enclosing_class() {
                self.out
                    .edges
                    .push(Edge::new(class_id.clone(), id.clone(), EdgeType::Contains));
            }
            self.scopes.push(Scope::Function(id));
        } else {
            self.scopes.push(Scope::Class(id));
        }
        true
    }

    fn import(&mut self, node: TsNode) {
        let line = node.start_position().row + 1;
        for module in self.syntax.import_modules(&node, self.source) {
            let id = NodeId::import(&module);
            self.out.nodes.push(Node {
                id: id.clone(),
                label: module.clone(),
                node_type: NodeType::Import,
                path: None,
                meta: Meta::new(),
            });
            self.out.edges.push(
                Edge::new(self.file_id.clone(), id, EdgeType::Imports).with_meta("line", line),
            );
            self.out.imports.push(module);
        }
    }

    fn call(&mut self, node: TsNode) {
        let Some(caller) = self.scopes.current_function() else {
            return;
        };
        let Some(callee) = self
            .syntax
            .callee(&node)
            .and_then(|c| identifier_text(&c, self.source))
        else {
            return;
        };
        self.out.call_sites.push(CallSite {
            caller: caller.clone(),
            callee,
            line: node.start_position().row + 1,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_content_rejected() {
        let err = extract_file("blob.ts", b"abc\0def", Language::TypeScript).unwrap_err();
        assert!(matches!(err, ExtractionError::Binary { .. }));
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        let mut source = b"function caf".to_vec();
        source.push(0xE9);
        source.extend_from_slice(b"() { go(); }\n");
        let out = extract_file("latin1.js", &source, Language::JavaScript).unwrap();
        assert_eq!(out.nodes[0].node_type, NodeType::File);
    }

    #[test]
    fn test_file_node_comes_first_with_language_meta() {
        let out = extract_file("a.ts", b"function foo() {}\n", Language::TypeScript).unwrap();
        let file = &out.nodes[0];
        assert_eq!(file.id, NodeId::file("a.ts"));
        assert_eq!(file.meta["language"], "typescript");
        assert_eq!(file.meta["lines"], 1);
        assert_eq!(out.file_id, file.id);
    }

    #[test]
    fn test_function_meta() {
        let source = b"\nfunction foo() {\n  return 1;\n}\n";
        let out = extract_file("a.ts", source, Language::TypeScript).unwrap();
        let foo = out.nodes.iter().find(|n| n.label == "foo").unwrap();

        assert_eq!(foo.id.as_str(), "function:a.ts:foo");
        assert_eq!(foo.meta["start_line"], 2);
        assert_eq!(foo.meta["end_line"], 4);
        assert_eq!(foo.meta["file"], "a.ts");
        assert!(foo.code().unwrap().starts_with("function foo()"));
        assert_eq!(
            foo.meta["source_hash"].as_str().unwrap(),
            content_hash(foo.code().unwrap().as_bytes())
        );
    }

    #[test]
    fn test_every_definition_contained_by_file() {
        let source = b"class A { m() { inner(); } }\nfunction f() {}\n";
        let out = extract_file("a.js", source, Language::JavaScript).unwrap();
        for node in out.nodes.iter().filter(|n| n.node_type.is_definition()) {
            assert!(
                out.edges.iter().any(|e| e.edge_type == EdgeType::Contains
                    && e.from == out.file_id
                    && e.to == node.id),
                "{} has no file containment",
                node.id
            );
        }
    }

    #[test]
    fn test_import_edge_carries_line() {
        let out = extract_file("a.py", b"\nimport os\n", Language::Python).unwrap();
        let edge = out
            .edges
            .iter()
            .find(|e| e.edge_type == EdgeType::Imports)
            .unwrap();
        assert_eq!(edge.to, NodeId::import("os"));
        assert_eq!(edge.meta["line"], 2);
        let import = out.nodes.iter().find(|n| n.id == edge.to).unwrap();
        assert_eq!(import.node_type, NodeType::Import);
        assert_eq!(import.path, None);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let source = b"function a() { b(); }\nfunction b() { c.d(); }\n";
        let first = extract_file("x.js", source, Language::JavaScript).unwrap();
        let second = extract_file("x.js", source, Language::JavaScript).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_line_count() {
        assert_eq!(line_count(b""), 0);
        assert_eq!(line_count(b"a"), 1);
        assert_eq!(line_count(b"a\nb\n"), 2);
        assert_eq!(line_count(b"a\nb"), 2);
    }
}
