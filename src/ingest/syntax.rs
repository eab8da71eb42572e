//! Per-language syntax tables behind one interface
//!
//! Each registered language provides a [`LanguageSyntax`] implementation that
//! classifies tree-sitter nodes as definitions, imports or calls. The walker in
//! [`super::extractor`] selects one implementation per file and never branches
//! on the language itself.

use std::borrow::Cow;
use tree_sitter::Node;

use crate::graph::NodeType;
use crate::ingest::detect::Language;
use crate::ingest::{java, javascript, python, rust, typescript};

/// Syntax knowledge for one language
pub trait LanguageSyntax: Sync {
    fn language(&self) -> Language;

    /// Node type produced by a definition node, or `None` if `node` defines nothing
    fn definition(&self, node: &Node, source: &[u8]) -> Option<NodeType>;

    /// Node holding the definition's name
    fn definition_name<'t>(&self, node: &Node<'t>) -> Option<Node<'t>> {
        node.child_by_field_name("name")
    }

    fn is_import(&self, node: &Node) -> bool;

    /// Module strings imported by an import node
    fn import_modules(&self, node: &Node, source: &[u8]) -> Vec<String>;

    fn is_call(&self, node: &Node) -> bool;

    /// Expression naming the called function
    fn callee<'t>(&self, node: &Node<'t>) -> Option<Node<'t>> {
        node.child_by_field_name("function")
    }
}

static RUST: rust::RustSyntax = rust::RustSyntax;
static PYTHON: python::PythonSyntax = python::PythonSyntax;
static JAVASCRIPT: javascript::JavaScriptSyntax = javascript::JavaScriptSyntax;
static TYPESCRIPT: typescript::TypeScriptSyntax = typescript::TypeScriptSyntax {
    language: Language::TypeScript,
};
static TSX: typescript::TypeScriptSyntax = typescript::TypeScriptSyntax {
    language: Language::Tsx,
};
static JAVA: java::JavaSyntax = java::JavaSyntax;

/// Registered syntax table for `language`
pub fn syntax_for(language: Language) -> &'static dyn LanguageSyntax {
    match language {
        Language::Rust => &RUST,
        Language::Python => &PYTHON,
        Language::JavaScript => &JAVASCRIPT,
        Language::TypeScript => &TYPESCRIPT,
        Language::Tsx => &TSX,
        Language::Java => &JAVA,
    }
}

/// Source text of `node`, decoded lossily
pub fn node_text<'s>(node: &Node, source: &'s [u8]) -> Cow<'s, str> {
    match source.get(node.start_byte()..node.end_byte()) {
        Some(bytes) => String::from_utf8_lossy(bytes),
        None => Cow::Borrowed(""),
    }
}

/// Extract a name from an identifier-like expression
///
/// Handles plain identifiers, member-access chains (joined with `.`), and
/// call expressions (recursing into the callee). Returns `None` for
/// expressions that do not name anything (literals, lambdas, subscripts).
pub fn identifier_text(node: &Node, source: &[u8]) -> Option<String> {
    let pair = |object: &str, member: &str| -> Option<String> {
        let member_node = node.child_by_field_name(member)?;
        let member_text = identifier_text(&member_node, source)?;
        match node
            .child_by_field_name(object)
            .and_then(|o| identifier_text(&o, source))
        {
            Some(object_text) => Some(format!("{}.{}", object_text, member_text)),
            None => Some(member_text),
        }
    };

    match node.kind() {
        // JS/TS obj.prop
        "member_expression" => pair("object", "property"),
        // Python obj.attr
        "attribute" => pair("object", "attribute"),
        // Rust value.field
        "field_expression" => pair("value", "field"),
        // Rust path::name
        "scoped_identifier" => pair("path", "name"),
        // Java obj.field
        "field_access" => pair("object", "field"),
        // Java obj.method(...) is itself the call node
        "method_invocation" => pair("object", "name"),
        "call_expression" | "call" | "generic_function" => {
            let callee = node.child_by_field_name("function")?;
            identifier_text(&callee, source)
        }
        "parenthesized_expression" | "non_null_expression" => {
            let inner = node.named_child(0)?;
            identifier_text(&inner, source)
        }
        "string" | "template_string" | "number" | "integer" | "float" | "string_literal"
        | "true" | "false" | "null" | "none" => None,
        _ if node.named_child_count() == 0 => {
            let text = node_text(node, source);
            let text = text.trim();
            if text.is_empty() {
                None
            } else {
                Some(text.to_string())
            }
        }
        _ => None,
    }
}

/// Strip surrounding quotes from a string literal
pub fn unquote(text: &str) -> String {
    text.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::pool::with_parser;

    fn first_call_name(language: Language, source: &str) -> Option<String> {
        let tree = with_parser(language, |p| p.parse(source, None))
            .unwrap()
            .unwrap();
        let syntax = syntax_for(language);
        let mut stack = vec![tree.root_node()];
        while let Some(node) = stack.pop() {
            if syntax.is_call(&node) {
                let callee = syntax.callee(&node)?;
                return identifier_text(&callee, source.as_bytes());
            }
            let mut cursor = node.walk();
            let children: Vec<_> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
        None
    }

    #[test]
    fn test_plain_identifier() {
        assert_eq!(
            first_call_name(Language::TypeScript, "bar();").as_deref(),
            Some("bar")
        );
    }

    #[test]
    fn test_member_chain_joined_with_dots() {
        assert_eq!(
            first_call_name(Language::TypeScript, "this.service.method();").as_deref(),
            Some("this.service.method")
        );
        assert_eq!(
            first_call_name(Language::Python, "self.repo.save(x)\n").as_deref(),
            Some("self.repo.save")
        );
    }

    #[test]
    fn test_call_expression_recurses_into_callee() {
        // The outer call's callee is `make().run`; its object is a call to `make`.
        assert_eq!(
            first_call_name(Language::JavaScript, "make().run();").as_deref(),
            Some("make.run")
        );
    }

    #[test]
    fn test_rust_scoped_path_uses_dots() {
        let source = "fn f() { Vec::new(); }";
        assert_eq!(first_call_name(Language::Rust, source).as_deref(), Some("Vec.new"));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'./b'"), "./b");
        assert_eq!(unquote("\"react\""), "react");
    }
}
