//! Thread-local parser pool for reusing tree-sitter Parser instances.
//!
//! Phase 1 of an indexing job parses files on a rayon pool. Each worker thread
//! keeps one parser per language, created lazily on first use, so parsers are
//! never shared across threads and never rebuilt per file.

use crate::error::ExtractionError;
use crate::ingest::detect::Language;
use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static PARSERS: RefCell<HashMap<Language, tree_sitter::Parser>> = RefCell::new(HashMap::new());
}

/// tree-sitter grammar for a registered language
pub fn grammar(language: Language) -> tree_sitter::Language {
    match language {
        Language::Rust => tree_sitter_rust::language(),
        Language::Python => tree_sitter_python::language(),
        Language::JavaScript => tree_sitter_javascript::language(),
        Language::TypeScript => tree_sitter_typescript::language_typescript(),
        Language::Tsx => tree_sitter_typescript::language_tsx(),
        Language::Java => tree_sitter_java::language(),
    }
}

/// Execute `f` with this thread's parser for `language`.
///
/// Fails only if the grammar cannot be loaded into a parser (ABI mismatch).
pub fn with_parser<F, R>(language: Language, f: F) -> Result<R, ExtractionError>
where
    F: FnOnce(&mut tree_sitter::Parser) -> R,
{
    PARSERS.with(|cell| {
        let mut parsers = cell.borrow_mut();
        if !parsers.contains_key(&language) {
            let mut parser = tree_sitter::Parser::new();
            parser
                .set_language(&grammar(language))
                .map_err(|e| ExtractionError::Grammar {
                    language,
                    message: e.to_string(),
                })?;
            parsers.insert(language, parser);
        }
        match parsers.get_mut(&language) {
            Some(parser) => Ok(f(parser)),
            None => Err(ExtractionError::Grammar {
                language,
                message: "parser missing after initialization".to_string(),
            }),
        }
    })
}
