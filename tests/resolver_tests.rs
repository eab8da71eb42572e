//! Symbol resolution against an indexed store

use meridian::indexer::CancellationFlag;
use meridian::resolve::HEURISTIC_AFFIX_CONFIDENCE;
use meridian::{
    GraphStore, IndexConfig, Indexer, Language, NodeId, ReferenceKind, RepoScope,
    ResolutionMethod, ResolveRequest, SourceFile, SymbolResolver,
};
use tempfile::TempDir;

fn indexed(scope: &RepoScope, files: Vec<SourceFile>) -> (TempDir, GraphStore) {
    let dir = TempDir::new().unwrap();
    let store = GraphStore::open(dir.path().join("graph.db")).unwrap();
    let report = Indexer::new(&store, IndexConfig::default())
        .index(scope, &files, &CancellationFlag::new())
        .unwrap();
    assert_eq!(report.files_skipped, 0, "{:?}", report.skipped);
    (dir, store)
}

/// `order.py` references `validate_input` on line 42 without defining it
fn order_py() -> String {
    let mut text = String::new();
    for i in 1..42 {
        text.push_str(&format!("# line {}\n", i));
    }
    text.push_str("handler = validate_input\n");
    text
}

#[test]
fn test_heuristic_tier_matches_accessor_name() {
    let scope = RepoScope::new("t1", "r1");
    let (_dir, store) = indexed(
        &scope,
        vec![
            SourceFile::new("order.py", order_py(), Language::Python),
            SourceFile::new("checks.py", "def set_valid(flag):\n    return flag\n", Language::Python),
        ],
    );

    let result = SymbolResolver::new().resolve(
        &store.scoped(&scope),
        "validate_input",
        "order.py",
        42,
        Some(Language::Python),
    );

    let definition = result.definition.expect("heuristic match");
    assert_eq!(definition.id, NodeId::function("checks.py", "set_valid"));
    assert_eq!(result.method, ResolutionMethod::Heuristic);
    assert!((0.3..=0.4).contains(&result.confidence));
    assert_eq!(result.confidence, HEURISTIC_AFFIX_CONFIDENCE);
    assert_eq!(result.reference_kind, ReferenceKind::Variable);
    assert!(result.errors.is_empty());
}

#[test]
fn test_import_tier_follows_module() {
    let scope = RepoScope::new("t1", "r1");
    let (_dir, store) = indexed(
        &scope,
        vec![
            SourceFile::new(
                "src/app.ts",
                "import { format } from './util/text';\n\nexport function main() {\n  return format('x');\n}\n",
                Language::TypeScript,
            ),
            SourceFile::new(
                "src/legacy.ts",
                "export function format(x) { return x; }\n",
                Language::TypeScript,
            ),
            SourceFile::new(
                "src/util/text.ts",
                "export function format(s: string) { return s.trim(); }\n",
                Language::TypeScript,
            ),
        ],
    );

    let result = SymbolResolver::new().resolve(&store.scoped(&scope), "format", "src/app.ts", 4, None);
    assert_eq!(result.method, ResolutionMethod::Import);
    assert_eq!(result.confidence, 0.8);
    assert_eq!(
        result.definition.unwrap().id,
        NodeId::function("src/util/text.ts", "format")
    );
    assert_eq!(result.reference_kind, ReferenceKind::FunctionCall);
}

#[test]
fn test_unknown_symbol_is_zero_confidence() {
    let scope = RepoScope::new("t1", "r1");
    let (_dir, store) = indexed(
        &scope,
        vec![SourceFile::new("a.js", "function a() {}\n", Language::JavaScript)],
    );

    let result = SymbolResolver::new().resolve(&store.scoped(&scope), "zz", "a.js", 1, None);
    assert!(result.definition.is_none());
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.method, ResolutionMethod::Unresolved);
}

#[test]
fn test_resolution_is_scoped() {
    let t1 = RepoScope::new("t1", "r1");
    let (_dir, store) = indexed(
        &t1,
        vec![SourceFile::new("a.py", "def helper():\n    pass\n", Language::Python)],
    );
    let t2 = RepoScope::new("t2", "r1");

    let resolver = SymbolResolver::new();
    assert!(resolver
        .resolve(&store.scoped(&t1), "helper", "b.py", 1, None)
        .is_resolved());
    assert!(!resolver
        .resolve(&store.scoped(&t2), "helper", "b.py", 1, None)
        .is_resolved());
}

#[test]
fn test_batch_matches_single_resolution() {
    let scope = RepoScope::new("t1", "r1");
    let (_dir, store) = indexed(
        &scope,
        vec![
            SourceFile::new("order.py", order_py(), Language::Python),
            SourceFile::new("checks.py", "def set_valid(flag):\n    return flag\n", Language::Python),
            SourceFile::new(
                "main.py",
                "from checks import set_valid\n\ndef main():\n    set_valid(True)\n",
                Language::Python,
            ),
        ],
    );
    let other = RepoScope::new("t9", "r9");

    let request = |scope: &RepoScope, symbol: &str, file: &str, line: usize| ResolveRequest {
        scope: scope.clone(),
        symbol: symbol.to_string(),
        file_path: file.to_string(),
        line,
        language: None,
    };
    let requests = vec![
        request(&scope, "validate_input", "order.py", 42),
        request(&other, "set_valid", "main.py", 4),
        request(&scope, "set_valid", "main.py", 4),
    ];

    let resolver = SymbolResolver::new();
    let results = resolver.resolve_batch(&store, &requests);
    assert_eq!(results.len(), 3);

    let scoped = store.scoped(&scope);
    for i in [0, 2] {
        let r = &requests[i];
        let single = resolver.resolve(&scoped, &r.symbol, &r.file_path, r.line, r.language);
        assert_eq!(results[i], single, "batch result {} differs", i);
    }
    assert!(!results[1].is_resolved());
    assert_eq!(results[2].method, ResolutionMethod::Import);
}
