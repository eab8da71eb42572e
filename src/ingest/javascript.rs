//! JavaScript syntax table.
//!
//! Also hosts the ECMAScript rules shared with TypeScript: functions, methods,
//! arrow functions bound to variables, classes, ES module imports and
//! re-exports.

use tree_sitter::Node;

use crate::graph::NodeType;
use crate::ingest::detect::Language;
use crate::ingest::syntax::{identifier_text, node_text, unquote, LanguageSyntax};

pub struct JavaScriptSyntax;

/// Function-valued expressions that turn a variable declarator into a definition
const FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function",
    "function_expression",
    "generator_function",
];

pub(crate) fn ecmascript_definition(node: &Node, source: &[u8]) -> Option<NodeType> {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" | "method_definition" => {
            Some(NodeType::Function)
        }
        "class_declaration" => Some(NodeType::Class),
        // const handler = () => {}
        "variable_declarator" => {
            let value = node.child_by_field_name("value")?;
            if !FUNCTION_VALUES.contains(&value.kind()) {
                return None;
            }
            let name = node.child_by_field_name("name")?;
            // Destructuring patterns do not name a function
            identifier_text(&name, source).map(|_| NodeType::Function)
        }
        // class Panel { handleClick = () => {} }
        "field_definition" | "public_field_definition" => {
            let value = node.child_by_field_name("value")?;
            FUNCTION_VALUES
                .contains(&value.kind())
                .then_some(NodeType::Function)
        }
        _ => None,
    }
}

/// JavaScript names class fields by `property`, TypeScript by `name`
pub(crate) fn ecmascript_definition_name<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    match node.kind() {
        "field_definition" => node.child_by_field_name("property"),
        _ => node.child_by_field_name("name"),
    }
}

pub(crate) fn ecmascript_is_import(node: &Node) -> bool {
    match node.kind() {
        "import_statement" => true,
        // export { x } from './y'
        "export_statement" => node.child_by_field_name("source").is_some(),
        _ => false,
    }
}

pub(crate) fn ecmascript_import_modules(node: &Node, source: &[u8]) -> Vec<String> {
    node.child_by_field_name("source")
        .map(|s| unquote(&node_text(&s, source)))
        .filter(|m| !m.is_empty())
        .into_iter()
        .collect()
}

impl LanguageSyntax for JavaScriptSyntax {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn definition(&self, node: &Node, source: &[u8]) -> Option<NodeType> {
        ecmascript_definition(node, source)
    }

    fn definition_name<'t>(&self, node: &Node<'t>) -> Option<Node<'t>> {
        ecmascript_definition_name(node)
    }

    fn is_import(&self, node: &Node) -> bool {
        ecmascript_is_import(node)
    }

    fn import_modules(&self, node: &Node, source: &[u8]) -> Vec<String> {
        ecmascript_import_modules(node, source)
    }

    fn is_call(&self, node: &Node) -> bool {
        node.kind() == "call_expression"
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{EdgeType, NodeId, NodeType};
    use crate::ingest::{extract_file, Language};

    #[test]
    fn test_extract_function_and_arrow_function() {
        let source = b"function foo() { bar(); }\nconst bar = () => 1;\n";
        let out = extract_file("src/a.js", source, Language::JavaScript).unwrap();

        let names: Vec<_> = out
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Function)
            .map(|n| n.label.as_str())
            .collect();
        assert_eq!(names, vec!["foo", "bar"]);
    }

    #[test]
    fn test_class_methods_are_contained_by_class() {
        let source = b"class Cart {\n  total() { return sum(this.items); }\n}\n";
        let out = extract_file("cart.js", source, Language::JavaScript).unwrap();

        let method = NodeId::function("cart.js", "total");
        let class_id = NodeId::entity(NodeType::Class, "cart.js", "Cart");
        let parents: Vec<_> = out
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::Contains && e.to == method)
            .map(|e| e.from.clone())
            .collect();
        assert_eq!(parents, vec![NodeId::file("cart.js"), class_id]);
    }

    #[test]
    fn test_import_and_reexport_sources() {
        let source = b"import { a } from './a';\nexport { b } from \"./b\";\n";
        let out = extract_file("index.js", source, Language::JavaScript).unwrap();
        assert_eq!(out.imports, vec!["./a".to_string(), "./b".to_string()]);
    }

    #[test]
    fn test_class_field_arrow_function_is_a_method() {
        let source = b"class Panel {\n  handleClick = () => { save(); };\n  size = 3;\n}\n";
        let out = extract_file("panel.js", source, Language::JavaScript).unwrap();

        let method = NodeId::function("panel.js", "handleClick");
        assert!(out.nodes.iter().any(|n| n.id == method));
        assert!(out.nodes.iter().all(|n| n.label != "size"));
        let parents: Vec<_> = out
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::Contains && e.to == method)
            .map(|e| e.from.clone())
            .collect();
        assert_eq!(
            parents,
            vec![NodeId::file("panel.js"), NodeId::entity(NodeType::Class, "panel.js", "Panel")]
        );
        assert_eq!(out.call_sites.len(), 1);
        assert_eq!(out.call_sites[0].caller, method);
        assert_eq!(out.call_sites[0].callee, "save");
    }

    #[test]
    fn test_destructuring_is_not_a_definition() {
        let source = b"const { a, b } = load();\n";
        let out = extract_file("x.js", source, Language::JavaScript).unwrap();
        assert!(out.nodes.iter().all(|n| n.node_type == NodeType::File));
    }
}
