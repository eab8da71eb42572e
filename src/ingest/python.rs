//! Python syntax table.

use tree_sitter::Node;

use crate::graph::NodeType;
use crate::ingest::detect::Language;
use crate::ingest::syntax::{node_text, LanguageSyntax};

pub struct PythonSyntax;

impl LanguageSyntax for PythonSyntax {
    fn language(&self) -> Language {
        Language::Python
    }

    fn definition(&self, node: &Node, _source: &[u8]) -> Option<NodeType> {
        match node.kind() {
            "function_definition" => Some(NodeType::Function),
            "class_definition" => Some(NodeType::Class),
            _ => None,
        }
    }

    fn is_import(&self, node: &Node) -> bool {
        matches!(node.kind(), "import_statement" | "import_from_statement")
    }

    fn import_modules(&self, node: &Node, source: &[u8]) -> Vec<String> {
        if node.kind() == "import_from_statement" {
            // from pkg.mod import a, b  -> "pkg.mod"
            return node
                .child_by_field_name("module_name")
                .map(|m| node_text(&m, source).trim().to_string())
                .into_iter()
                .collect();
        }

        // import a.b, c as d  -> ["a.b", "c"]
        let mut cursor = node.walk();
        node.children_by_field_name("name", &mut cursor)
            .filter_map(|name| {
                let target = if name.kind() == "aliased_import" {
                    name.child_by_field_name("name")?
                } else {
                    name
                };
                let text = node_text(&target, source).trim().to_string();
                (!text.is_empty()).then_some(text)
            })
            .collect()
    }

    fn is_call(&self, node: &Node) -> bool {
        node.kind() == "call"
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{EdgeType, NodeId, NodeType};
    use crate::ingest::{extract_file, Language};

    #[test]
    fn test_extract_functions_and_methods() {
        let source = br#"
class OrderService:
    def place(self, order):
        validate_input(order)
        self.repo.save(order)

def validate_input(order):
    return order is not None
"#;
        let out = extract_file("order.py", source, Language::Python).unwrap();

        assert!(out
            .nodes
            .iter()
            .any(|n| n.id == NodeId::entity(NodeType::Class, "order.py", "OrderService")));
        let place = NodeId::function("order.py", "place");
        let contains_place = out
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::Contains && e.to == place)
            .count();
        assert_eq!(contains_place, 2, "method contained by file and class");

        let callees: Vec<_> = out.call_sites.iter().map(|c| c.callee.as_str()).collect();
        assert_eq!(callees, vec!["validate_input", "self.repo.save"]);
    }

    #[test]
    fn test_import_forms() {
        let source = b"import os.path, json as j\nfrom .models import Order\nfrom pkg.util import helper\n";
        let out = extract_file("app.py", source, Language::Python).unwrap();
        assert_eq!(out.imports, vec!["os.path", "json", ".models", "pkg.util"]);
    }

    #[test]
    fn test_module_level_calls_are_not_call_sites() {
        let source = b"setup()\n\ndef main():\n    run()\n";
        let out = extract_file("main.py", source, Language::Python).unwrap();
        assert_eq!(out.call_sites.len(), 1);
        assert_eq!(out.call_sites[0].callee, "run");
    }

    #[test]
    fn test_line_numbers_are_one_indexed() {
        let source = b"\n\ndef late():\n    pass\n";
        let out = extract_file("late.py", source, Language::Python).unwrap();
        let late = out.nodes.iter().find(|n| n.label == "late").unwrap();
        assert_eq!(late.start_line(), Some(3));
    }
}
