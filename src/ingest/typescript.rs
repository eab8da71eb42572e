//! TypeScript syntax table (also used for TSX).
//!
//! Extends the ECMAScript rules with interfaces, type aliases, abstract
//! classes and enums.

use tree_sitter::Node;

use crate::graph::NodeType;
use crate::ingest::detect::Language;
use crate::ingest::javascript::{
    ecmascript_definition, ecmascript_definition_name, ecmascript_import_modules,
    ecmascript_is_import,
};
use crate::ingest::syntax::LanguageSyntax;

pub struct TypeScriptSyntax {
    pub language: Language,
}

impl LanguageSyntax for TypeScriptSyntax {
    fn language(&self) -> Language {
        self.language
    }

    fn definition(&self, node: &Node, source: &[u8]) -> Option<NodeType> {
        match node.kind() {
            "abstract_class_declaration" | "enum_declaration" => Some(NodeType::Class),
            "interface_declaration" => Some(NodeType::Interface),
            "type_alias_declaration" => Some(NodeType::Type),
            _ => ecmascript_definition(node, source),
        }
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
