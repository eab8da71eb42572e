//! Import binding parsing for the import-resolution tier
//!
//! Works on stored file text with per-language regular expressions, so it is
//! usable against persisted graphs where no syntax tree is available.

use regex::Regex;
use std::sync::OnceLock;

use crate::ingest::Language;

/// Imported name meaning "everything the module exports"
pub const WILDCARD: &str = "*";

/// One name brought into a file by an import statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    /// Module string as written (`./util`, `pkg.models`, `crate::store`)
    pub module: String,
    /// Name as defined in the module, or [`WILDCARD`] for namespace and glob imports
    pub imported: String,
    /// Name visible in the importing file
    pub local: String,
}

impl ImportBinding {
    fn new(module: &str, imported: &str, local: &str) -> Self {
        ImportBinding {
            module: module.trim().to_string(),
            imported: imported.trim().to_string(),
            local: local.trim().to_string(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.imported == WILDCARD
    }
}

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> Option<&'static Regex> {
            static RE: OnceLock<Option<Regex>> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).ok()).as_ref()
        }
    };
}

cached_regex!(python_from, r"(?m)^\s*from\s+([\w.]+)\s+import\s+\(?([^)\n]+)\)?");
cached_regex!(python_import, r"(?m)^\s*import\s+([\w., ]+)$");
cached_regex!(es_import, r#"(?s)\bimport\s+([^'";]+?)\s+from\s+['"]([^'"]+)['"]"#);
cached_regex!(
    es_require,
    r#"\b(?:const|let|var)\s+(\{[^}]*\}|[\w$]+)\s*=\s*require\(\s*['"]([^'"]+)['"]\s*\)"#
);
cached_regex!(java_import, r"(?m)^\s*import\s+(static\s+)?([\w.]+?)(\.\*)?\s*;");
cached_regex!(rust_use, r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+([^;]+);");

/// Split `name as alias` (or `name: alias` for ES destructuring)
fn split_alias(item: &str, keyword: &str) -> (String, String) {
    let item = item.trim();
    match item.split_once(keyword) {
        Some((name, alias)) => (name.trim().to_string(), alias.trim().to_string()),
        None => (item.to_string(), item.to_string()),
    }
}

/// Parse every import binding in `text`
pub fn parse_imports(language: Language, text: &str) -> Vec<ImportBinding> {
    match language {
        Language::Python => parse_python(text),
        Language::JavaScript | Language::TypeScript | Language::Tsx => parse_ecmascript(text),
        Language::Java => parse_java(text),
        Language::Rust => parse_rust(text),
    }
}

fn parse_python(text: &str) -> Vec<ImportBinding> {
    let mut out = Vec::new();
    if let Some(re) = python_from() {
        for cap in re.captures_iter(text) {
            let module = &cap[1];
            for item in cap[2].split(',') {
                let item = item.trim().trim_end_matches('\\').trim();
                if item.is_empty() {
                    continue;
                }
                let (name, local) = split_alias(item, " as ");
                out.push(ImportBinding::new(module, &name, &local));
            }
        }
    }
    if let Some(re) = python_import() {
        for cap in re.captures_iter(text) {
            for item in cap[1].split(',') {
                let (module, local) = split_alias(item, " as ");
                if !module.is_empty() {
                    out.push(ImportBinding::new(&module, WILDCARD, &local));
                }
            }
        }
    }
    out
}

fn parse_es_clause(module: &str, clause: &str, out: &mut Vec<ImportBinding>) {
    let clause = clause.trim();
    if let Some(rest) = clause.strip_prefix("type ") {
        return parse_es_clause(module, rest, out);
    }

    // default, { named } / * as ns
    let (default, rest) = match clause.find(['{', '*']) {
        Some(0) => ("", clause),
        Some(pos) => (clause[..pos].trim().trim_end_matches(','), &clause[pos..]),
        None => (clause, ""),
    };
    if !default.is_empty() {
        out.push(ImportBinding::new(module, default, default));
    }

    let rest = rest.trim();
    if let Some(ns) = rest.strip_prefix('*') {
        let (_, local) = split_alias(ns, "as ");
        out.push(ImportBinding::new(module, WILDCARD, &local));
    } else if let Some(inner) = rest.strip_prefix('{') {
        let inner = inner.trim_end_matches('}');
        for item in inner.split(',') {
            let item = item.trim().trim_start_matches("type ");
            if item.is_empty() {
                continue;
            }
            let keyword = if item.contains(" as ") { " as " } else { ":" };
            let (name, local) = split_alias(item, keyword);
            out.push(ImportBinding::new(module, &name, &local));
        }
    }
}

fn parse_ecmascript(text: &str) -> Vec<ImportBinding> {
    let mut out = Vec::new();
    if let Some(re) = es_import() {
        for cap in re.captures_iter(text) {
            parse_es_clause(&cap[2], &cap[1], &mut out);
        }
    }
    if let Some(re) = es_require() {
        for cap in re.captures_iter(text) {
            parse_es_clause(&cap[2], &cap[1], &mut out);
        }
    }
    out
}

fn parse_java(text: &str) -> Vec<ImportBinding> {
    let Some(re) = java_import() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|cap| {
            let path = cap.get(2)?.as_str();
            if cap.get(3).is_some() {
                return Some(ImportBinding::new(path, WILDCARD, WILDCARD));
            }
            let (module, name) = match cap.get(1) {
                // import static a.b.C.method -> class a.b.C, member method
                Some(_) => path.rsplit_once('.')?,
                // import a.b.C -> class a.b.C
                None => (path, path.rsplit('.').next()?),
            };
            Some(ImportBinding::new(module, name, name))
        })
        .collect()
}

fn parse_rust(text: &str) -> Vec<ImportBinding> {
    let Some(re) = rust_use() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for cap in re.captures_iter(text) {
        let tree = cap[1].split_whitespace().collect::<Vec<_>>().join(" ");
        expand_rust_use("", &tree, &mut out);
    }
    out
}

fn join_path(prefix: &str, segment: &str) -> String {
    match (prefix.is_empty(), segment.is_empty()) {
        (true, _) => segment.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}::{}", prefix, segment),
    }
}

/// Expand one `use` tree, flattening nested groups
fn expand_rust_use(prefix: &str, tree: &str, out: &mut Vec<ImportBinding>) {
    let tree = tree.trim();
    if let Some(open) = tree.find('{') {
        let base = join_path(prefix, tree[..open].trim().trim_end_matches("::"));
        let inner = tree[open + 1..].trim_end();
        let inner = inner.strip_suffix('}').unwrap_or(inner);
        for item in split_top_level(inner) {
            expand_rust_use(&base, item, out);
        }
        return;
    }

    let (path, alias) = match tree.split_once(" as ") {
        Some((path, alias)) => (path.trim(), Some(alias.trim())),
        None => (tree, None),
    };
    let full = join_path(prefix, path);
    let Some((module, name)) = full.rsplit_once("::") else {
        return;
    };
    match name {
        WILDCARD => out.push(ImportBinding::new(module, WILDCARD, WILDCARD)),
        // use a::b::{self} binds the module itself
        "self" => {
            let last = module.rsplit("::").next().unwrap_or(module);
            out.push(ImportBinding::new(module, WILDCARD, alias.unwrap_or(last)));
        }
        _ => out.push(ImportBinding::new(module, name, alias.unwrap_or(name))),
    }
}

/// Split on commas that are not inside braces
fn split_top_level(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}
