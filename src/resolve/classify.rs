//! Reference classification
//!
//! Looks at the lines around a reference and decides what kind of use it is.
//! Each language has an ordered pattern table; the first pattern that matches
//! anywhere in the window wins.

use regex::RegexSet;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ingest::Language;

/// Lines inspected on each side of the reference line
pub const CONTEXT_LINES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    FunctionCall,
    MethodCall,
    Instantiation,
    Attribute,
    Variable,
    Unknown,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::FunctionCall => "function_call",
            ReferenceKind::MethodCall => "method_call",
            ReferenceKind::Instantiation => "instantiation",
            ReferenceKind::Attribute => "attribute",
            ReferenceKind::Variable => "variable",
            ReferenceKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a classification table; `{sym}` is replaced by the escaped symbol
struct Pattern {
    kind: ReferenceKind,
    template: &'static str,
    /// Only applies to symbols that start with an uppercase letter
    capitalized: bool,
}

const fn row(kind: ReferenceKind, template: &'static str) -> Pattern {
    Pattern {
        kind,
        template,
        capitalized: false,
    }
}

const METHOD_CALL: Pattern = row(ReferenceKind::MethodCall, r"\.\s*{sym}\s*\(");
const FUNCTION_CALL: Pattern = row(ReferenceKind::FunctionCall, r"(?:^|[^.\w]){sym}\s*\(");
const ATTRIBUTE: Pattern = row(ReferenceKind::Attribute, r"\.\s*{sym}\b");
const VARIABLE: Pattern = row(ReferenceKind::Variable, r"(?:^|\W){sym}(?:\W|$)");

static PYTHON_PATTERNS: &[Pattern] = &[
    Pattern {
        kind: ReferenceKind::Instantiation,
        template: r"(?:^|[^.\w]){sym}\s*\(",
        capitalized: true,
    },
    METHOD_CALL,
    FUNCTION_CALL,
    ATTRIBUTE,
    VARIABLE,
];

static ECMASCRIPT_PATTERNS: &[Pattern] = &[
    row(ReferenceKind::Instantiation, r"\bnew\s+{sym}\s*[(<]"),
    METHOD_CALL,
    FUNCTION_CALL,
    ATTRIBUTE,
    VARIABLE,
];

static JAVA_PATTERNS: &[Pattern] = &[
    row(ReferenceKind::Instantiation, r"\bnew\s+{sym}\s*[(<]"),
    METHOD_CALL,
    FUNCTION_CALL,
    ATTRIBUTE,
    VARIABLE,
];

static RUST_PATTERNS: &[Pattern] = &[
    row(ReferenceKind::Instantiation, r"\b{sym}\s*(?:::\s*new\s*\(|\{)"),
    METHOD_CALL,
    row(ReferenceKind::FunctionCall, r"(?:^|[^.\w]){sym}\s*(?:::<[^>]*>\s*)?\("),
    ATTRIBUTE,
    VARIABLE,
];

fn patterns(language: Language) -> &'static [Pattern] {
    match language {
        Language::Python => PYTHON_PATTERNS,
        Language::JavaScript | Language::TypeScript | Language::Tsx => ECMASCRIPT_PATTERNS,
        Language::Java => JAVA_PATTERNS,
        Language::Rust => RUST_PATTERNS,
    }
}

/// The window of `text` around 1-indexed `line`
pub fn context_window(text: &str, line: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return String::new();
    }
    let center = line.max(1).min(lines.len()) - 1;
    let start = center.saturating_sub(CONTEXT_LINES);
    let end = (center + CONTEXT_LINES + 1).min(lines.len());
    lines[start..end].join("\n")
}

/// Compiled tables kept per thread before the cache is reset
const CACHE_CAPACITY: usize = 4096;

thread_local! {
    static COMPILED: RefCell<HashMap<(Language, String), Option<Rc<RegexSet>>>> =
        RefCell::new(HashMap::new());
}

/// The language's pattern table for `symbol`, compiled once per thread
fn compiled(symbol: &str, language: Language) -> Option<Rc<RegexSet>> {
    COMPILED.with(|cache| {
        let mut cache = cache.borrow_mut();
        let key = (language, symbol.to_string());
        if let Some(set) = cache.get(&key) {
            return set.clone();
        }
        if cache.len() >= CACHE_CAPACITY {
            cache.clear();
        }

        let escaped = regex::escape(symbol);
        let sources = patterns(language)
            .iter()
            .map(|p| format!("(?m){}", p.template.replace("{sym}", &escaped)));
        let set = match RegexSet::new(sources) {
            Ok(set) => Some(Rc::new(set)),
            Err(e) => {
                tracing::debug!(symbol, error = %e, "cannot compile classification patterns");
                None
            }
        };
        cache.insert(key, set.clone());
        set
    })
}

/// Classify a reference to `symbol` at `line` of `text`
///
/// Returns [`ReferenceKind::Unknown`] when there is no text or nothing matches.
pub fn classify(symbol: &str, text: Option<&str>, line: usize, language: Language) -> ReferenceKind {
    let Some(text) = text else {
        return ReferenceKind::Unknown;
    };
    if symbol.is_empty() {
        return ReferenceKind::Unknown;
    }
    let Some(set) = compiled(symbol, language) else {
        return ReferenceKind::Unknown;
    };

    let window = context_window(text, line);
    let matched = set.matches(&window);
    let capitalized = symbol.chars().next().is_some_and(char::is_uppercase);

    patterns(language)
        .iter()
        .enumerate()
        .find(|(i, pattern)| matched.matched(*i) && (capitalized || !pattern.capitalized))
        .map_or(ReferenceKind::Unknown, |(_, pattern)| pattern.kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_text_is_unknown() {
        assert_eq!(
            classify("foo", None, 1, Language::Python),
            ReferenceKind::Unknown
        );
    }

    #[test]
    fn test_python_kinds() {
        let text = "order = Order(id)\nvalidate_input(order)\nself.repo.save(order)\nprint(order.total)\n";
        assert_eq!(
            classify("Order", Some(text), 1, Language::Python),
            ReferenceKind::Instantiation
        );
        assert_eq!(
            classify("validate_input", Some(text), 2, Language::Python),
            ReferenceKind::FunctionCall
        );
        assert_eq!(
            classify("save", Some(text), 3, Language::Python),
            ReferenceKind::MethodCall
        );
        assert_eq!(
            classify("total", Some(text), 4, Language::Python),
            ReferenceKind::Attribute
        );
        assert_eq!(
            classify("order", Some(text), 4, Language::Python),
            ReferenceKind::Variable
        );
    }

    #[test]
    fn test_same_symbol_classified_per_language() {
        let text = "total = Cart(items)\n";
        for _ in 0..2 {
            assert_eq!(
                classify("Cart", Some(text), 1, Language::Python),
                ReferenceKind::Instantiation
            );
            assert_eq!(
                classify("Cart", Some(text), 1, Language::JavaScript),
                ReferenceKind::FunctionCall
            );
        }
        assert_eq!(
            classify("Cart", Some("items.Cart\n"), 1, Language::Python),
            ReferenceKind::Attribute
        );
    }

    #[test]
    fn test_ecmascript_instantiation() {
        let text = "const cart = new Cart();\n";
        assert_eq!(
            classify("Cart", Some(text), 1, Language::TypeScript),
            ReferenceKind::Instantiation
        );
    }

    #[test]
    fn test_rust_struct_literal_and_turbofish() {
        let text = "let s = Store { items };\nlet v = parse::<u32>(x);\n";
        assert_eq!(
            classify("Store", Some(text), 1, Language::Rust),
            ReferenceKind::Instantiation
        );
        assert_eq!(
            classify("parse", Some(text), 2, Language::Rust),
            ReferenceKind::FunctionCall
        );
    }

    #[test]
    fn test_symbol_outside_window_is_unknown() {
        let mut text = String::from("far_away()\n");
        for _ in 0..20 {
            text.push_str("pass\n");
        }
        assert_eq!(
            classify("far_away", Some(&text), 20, Language::Python),
            ReferenceKind::Unknown
        );
    }

    #[test]
    fn test_regex_metacharacters_in_symbol() {
        let text = "$el.on(x)\n";
        assert_eq!(
            classify("$el", Some(text), 1, Language::JavaScript),
            ReferenceKind::Variable
        );
    }

    #[test]
    fn test_context_window_clamps_line() {
        assert_eq!(context_window("a\nb\nc", 99), "a\nb\nc");
        assert_eq!(context_window("", 1), "");
    }
}
