//! Language detection from file extensions
//!
//! The extension table is configuration-driven (see [`crate::config::IndexConfig`]);
//! this module only knows the registered grammar set and the default table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Languages with a registered tree-sitter grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Java,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Rust,
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Tsx,
        Language::Java,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Java => "java",
        }
    }

    /// JavaScript-family languages share syntax tables and import semantics
    pub fn is_ecmascript(&self) -> bool {
        matches!(self, Language::JavaScript | Language::TypeScript | Language::Tsx)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rust" | "rs" => Ok(Language::Rust),
            "python" | "py" => Ok(Language::Python),
            "javascript" | "js" => Ok(Language::JavaScript),
            "typescript" | "ts" => Ok(Language::TypeScript),
            "tsx" => Ok(Language::Tsx),
            "java" => Ok(Language::Java),
            other => Err(format!("unsupported language: {}", other)),
        }
    }
}

/// Default extension → language table
pub fn default_extensions() -> BTreeMap<String, Language> {
    [
        ("rs", Language::Rust),
        ("py", Language::Python),
        ("pyi", Language::Python),
        ("js", Language::JavaScript),
        ("jsx", Language::JavaScript),
        ("mjs", Language::JavaScript),
        ("cjs", Language::JavaScript),
        ("ts", Language::TypeScript),
        ("mts", Language::TypeScript),
        ("tsx", Language::Tsx),
        ("java", Language::Java),
    ]
    .into_iter()
    .map(|(ext, lang)| (ext.to_string(), lang))
    .collect()
}

/// Detect the language of `path` using an extension table
///
/// Returns `None` for unrecognized extensions; callers skip those files.
pub fn detect_language_with(path: &Path, table: &BTreeMap<String, Language>) -> Option<Language> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    table.get(&ext).copied()
}

/// Detect the language of `path` using the default extension table
pub fn detect_language(path: &Path) -> Option<Language> {
    detect_language_with(path, &default_extensions())
}
