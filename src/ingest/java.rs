//! Java syntax table.
//!
//! Methods and constructors are functions. Classes, enums and records are
//! class-like; interfaces and annotation types are interfaces.

use tree_sitter::Node;

use crate::graph::NodeType;
use crate::ingest::detect::Language;
use crate::ingest::syntax::{node_text, LanguageSyntax};

pub struct JavaSyntax;

impl LanguageSyntax for JavaSyntax {
    fn language(&self) -> Language {
        Language::Java
    }

    fn definition(&self, node: &Node, _source: &[u8]) -> Option<NodeType> {
        match node.kind() {
            "method_declaration" | "constructor_declaration" => Some(NodeType::Function),
            "class_declaration" | "enum_declaration" | "record_declaration" => {
                Some(NodeType::Class)
            }
            "interface_declaration" | "annotation_type_declaration" => Some(NodeType::Interface),
            _ => None,
        }
    }

    fn is_import(&self, node: &Node) -> bool {
        node.kind() == "import_declaration"
    }

    fn import_modules(&self, node: &Node, source: &[u8]) -> Vec<String> {
        let mut cursor = node.walk();
        let mut module: Option<String> = None;
        let mut wildcard = false;
        for child in node.children(&mut cursor) {
            match child.kind() {
                "scoped_identifier" | "identifier" => {
                    module = Some(node_text(&child, source).trim().to_string());
                }
                "asterisk" => wildcard = true,
                _ => {}
            }
        }

        module
            .filter(|m| !m.is_empty())
            .map(|m| if wildcard { format!("{}.*", m) } else { m })
            .into_iter()
            .collect()
    }

    fn is_call(&self, node: &Node) -> bool {
        node.kind() == "method_invocation"
    }

    /// The invocation node carries both the receiver and the method name
    fn callee<'t>(&self, node: &Node<'t>) -> Option<Node<'t>> {
        Some(*node)
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{NodeId, NodeType};
    use crate::ingest::{extract_file, Language};

    const SOURCE: &[u8] = br#"
package com.example;

import java.util.List;
import com.example.util.*;

public class OrderService {
    public OrderService() { init(); }

    public void place(Order order) {
        validate(order);
        repository.save(order);
    }
}

interface Repository { void save(Order o); }
"#;

    #[test]
    fn test_extract_class_methods_and_interface() {
        let out = extract_file("OrderService.java", SOURCE, Language::Java).unwrap();

        let has = |t: NodeType, name: &str| {
            out.nodes
                .iter()
                .any(|n| n.id == NodeId::entity(t, "OrderService.java", name))
        };
        assert!(has(NodeType::Class, "OrderService"));
        assert!(has(NodeType::Interface, "Repository"));
        assert!(has(NodeType::Function, "place"));
        assert!(has(NodeType::Function, "save"));
        // Constructor shares the class name but lives under the function type
        assert!(has(NodeType::Function, "OrderService"));
    }

    #[test]
    fn test_imports_with_wildcard() {
        let out = extract_file("OrderService.java", SOURCE, Language::Java).unwrap();
        assert_eq!(out.imports, vec!["java.util.List", "com.example.util.*"]);
    }

    #[test]
    fn test_method_invocations_with_receivers() {
        let out = extract_file("OrderService.java", SOURCE, Language::Java).unwrap();
        let callees: Vec<_> = out.call_sites.iter().map(|c| c.callee.as_str()).collect();
        assert_eq!(callees, vec!["init", "validate", "repository.save"]);
    }
}
