//! Rust syntax table.
//!
//! Structs, enums and unions are class-like; traits are interfaces. `impl`
//! blocks are transparent: methods inside them belong to the file only.

use tree_sitter::Node;

use crate::graph::NodeType;
use crate::ingest::detect::Language;
use crate::ingest::syntax::{node_text, LanguageSyntax};

pub struct RustSyntax;

impl LanguageSyntax for RustSyntax {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn definition(&self, node: &Node, _source: &[u8]) -> Option<NodeType> {
        match node.kind() {
            "function_item" | "function_signature_item" => Some(NodeType::Function),
            "struct_item" | "enum_item" | "union_item" => Some(NodeType::Class),
            "trait_item" => Some(NodeType::Interface),
            "type_item" => Some(NodeType::Type),
            _ => None,
        }
    }

    fn is_import(&self, node: &Node) -> bool {
        node.kind() == "use_declaration"
    }

    fn import_modules(&self, node: &Node, source: &[u8]) -> Vec<String> {
        node.child_by_field_name("argument")
            .map(|arg| {
                node_text(&arg, source)
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
            })
            .filter(|m| !m.is_empty())
            .into_iter()
            .collect()
    }

    fn is_call(&self, node: &Node) -> bool {
        node.kind() == "call_expression"
    }
}
