//! End-to-end indexing jobs against a temporary store

use meridian::error_codes::MER_EXT_001_BINARY_FILE;
use meridian::store::RunOutcome;
use meridian::{
    discover_files, CancellationFlag, EdgeType, GraphStore, IndexConfig, Indexer, Language,
    NodeId, RepoScope, SourceFile,
};
use std::fs;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn three_file_repo() -> Vec<SourceFile> {
    vec![
        SourceFile::new("a.ts", "export function foo() {\n  bar();\n}\n", Language::TypeScript),
        SourceFile::new("b.ts", "export function bar() {\n  return 1;\n}\n", Language::TypeScript),
        SourceFile::new(
            "c.ts",
            "function baz() {\n  vendorLib.doThing();\n}\n",
            Language::TypeScript,
        ),
    ]
}

fn open_store() -> (TempDir, GraphStore) {
    let dir = TempDir::new().unwrap();
    let store = GraphStore::open(dir.path().join("graph.db")).unwrap();
    (dir, store)
}

#[test]
fn test_reindex_unchanged_content_only_refreshes() {
    let (_dir, store) = open_store();
    let scope = RepoScope::new("t1", "r1");
    let indexer = Indexer::new(&store, IndexConfig::default());

    let first = indexer
        .index(&scope, &three_file_repo(), &CancellationFlag::new())
        .unwrap();
    let nodes = store.nodes(&scope).unwrap();
    let edges = store.edges(&scope).unwrap();
    let foo = NodeId::function("a.ts", "foo");
    let (created, updated) = store.node_timestamps(&scope, &foo).unwrap().unwrap();

    thread::sleep(Duration::from_millis(5));
    let second = indexer
        .index(&scope, &three_file_repo(), &CancellationFlag::new())
        .unwrap();

    assert_eq!(store.nodes(&scope).unwrap(), nodes);
    assert_eq!(store.edges(&scope).unwrap(), edges);
    assert_eq!(first.summary, second.summary);
    assert_eq!(first.nodes_written, second.nodes_written);

    let (created_again, updated_again) = store.node_timestamps(&scope, &foo).unwrap().unwrap();
    assert_eq!(created, created_again);
    assert!(updated_again > updated);
    assert_eq!(store.freshness(&scope).unwrap().stale_nodes, 0);
}

#[test]
fn test_linked_and_external_calls_persisted() {
    let (_dir, store) = open_store();
    let scope = RepoScope::new("t1", "r1");
    let report = Indexer::new(&store, IndexConfig::default())
        .index(&scope, &three_file_repo(), &CancellationFlag::new())
        .unwrap();

    assert_eq!(report.files_indexed, 3);
    assert_eq!(report.functions_linked, 1);
    assert!(report.unresolved_calls >= 1);
    assert_eq!(report.summary.total_functions, 3);

    let edges = store.edges(&scope).unwrap();
    assert!(edges.iter().any(|e| e.edge_type == EdgeType::Calls
        && e.from == NodeId::function("a.ts", "foo")
        && e.to == NodeId::function("b.ts", "bar")));
    let external = edges
        .iter()
        .find(|e| e.to == NodeId::placeholder("doThing"))
        .expect("edge to placeholder");
    assert!(external.is_external());

    let placeholder = store
        .node(&scope, &NodeId::placeholder("doThing"))
        .unwrap()
        .expect("placeholder persisted");
    assert!(placeholder.is_external());

    let summary = store.repository_summary(&scope, 10).unwrap();
    assert_eq!(summary.total_files, 3);
    assert_eq!(summary.total_functions, 3, "placeholders are not counted");
    assert_eq!(store.file_text(&scope, "b.ts").unwrap().as_deref(), Some("export function bar() {\n  return 1;\n}\n"));
}

#[test]
fn test_cancelled_job_resumes_on_rerun() {
    let (_dir, store) = open_store();
    let scope = RepoScope::new("t1", "r1");
    let indexer = Indexer::new(&store, IndexConfig::default());

    let cancel = CancellationFlag::new();
    cancel.cancel();
    let cancelled = indexer.index(&scope, &three_file_repo(), &cancel).unwrap();
    assert!(cancelled.cancelled);
    assert_eq!(cancelled.files_indexed, 0);
    assert_eq!(store.last_run(&scope).unwrap().unwrap().outcome, RunOutcome::Cancelled);

    let resumed = indexer
        .index(&scope, &three_file_repo(), &CancellationFlag::new())
        .unwrap();
    assert!(!resumed.cancelled);
    assert_eq!(resumed.files_indexed, 3);

    let (_clean_dir, clean) = open_store();
    Indexer::new(&clean, IndexConfig::default())
        .index(&scope, &three_file_repo(), &CancellationFlag::new())
        .unwrap();
    assert_eq!(store.nodes(&scope).unwrap(), clean.nodes(&scope).unwrap());
    assert_eq!(store.edges(&scope).unwrap(), clean.edges(&scope).unwrap());
}

#[test]
fn test_binary_file_skipped_and_counted() {
    let (_dir, store) = open_store();
    let scope = RepoScope::new("t1", "r1");
    let files = vec![
        SourceFile::new("logo.js", vec![0x89, b'P', b'N', b'G', 0, 0, 1], Language::JavaScript),
        SourceFile::new("ok.js", "function ok() {}\n", Language::JavaScript),
    ];

    let report = Indexer::new(&store, IndexConfig::default())
        .index(&scope, &files, &CancellationFlag::new())
        .unwrap();
    assert_eq!(report.files_seen, 2);
    assert_eq!(report.files_indexed, 1);
    assert_eq!(report.skipped[0].code, MER_EXT_001_BINARY_FILE);
    assert_eq!(store.last_run(&scope).unwrap().unwrap().outcome, RunOutcome::Partial);
}

#[test]
fn test_sequential_and_parallel_agree() {
    let (_a, parallel_store) = open_store();
    let (_b, sequential_store) = open_store();
    let scope = RepoScope::new("t1", "r1");

    Indexer::new(&parallel_store, IndexConfig::default())
        .index(&scope, &three_file_repo(), &CancellationFlag::new())
        .unwrap();
    let sequential = IndexConfig {
        parallel: false,
        batch_size: 2,
        link_batch_size: 1,
        ..IndexConfig::default()
    };
    Indexer::new(&sequential_store, sequential)
        .index(&scope, &three_file_repo(), &CancellationFlag::new())
        .unwrap();

    assert_eq!(parallel_store.nodes(&scope).unwrap(), sequential_store.nodes(&scope).unwrap());
    assert_eq!(parallel_store.edges(&scope).unwrap(), sequential_store.edges(&scope).unwrap());
}

#[test]
fn test_resolver_fallback_links_instead_of_placeholder() {
    let (_dir, store) = open_store();
    let scope = RepoScope::new("t1", "r1");
    let files = vec![
        SourceFile::new("a.py", "def run():\n    get_user()\n", Language::Python),
        SourceFile::new("b.py", "def user_profile():\n    pass\n", Language::Python),
    ];
    let config = IndexConfig {
        resolve_unlinked: true,
        min_link_confidence: 0.3,
        ..IndexConfig::default()
    };

    let report = Indexer::new(&store, config)
        .index(&scope, &files, &CancellationFlag::new())
        .unwrap();
    assert_eq!(report.resolved_by_fallback, 1);
    assert_eq!(report.unresolved_calls, 0);

    let edge = store
        .edges(&scope)
        .unwrap()
        .into_iter()
        .find(|e| e.edge_type == EdgeType::Calls)
        .unwrap();
    assert_eq!(edge.to, NodeId::function("b.py", "user_profile"));
    assert_eq!(edge.meta["resolved_by"], "heuristic");
    assert_eq!(edge.meta["confidence"], 0.4);
}

#[test]
fn test_discovered_tree_indexes() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("repo");
    fs::create_dir_all(root.join("pkg")).unwrap();
    fs::write(root.join("pkg/__init__.py"), "").unwrap();
    fs::write(root.join("pkg/util.py"), "def helper():\n    pass\n").unwrap();
    fs::write(
        root.join("main.py"),
        "from pkg.util import helper\n\ndef main():\n    helper()\n",
    )
    .unwrap();

    let config = IndexConfig::default();
    let files = discover_files(&root, &config).unwrap();
    assert_eq!(files.len(), 3);

    let store = GraphStore::open(dir.path().join("graph.db")).unwrap();
    let scope = RepoScope::new("t1", "r1");
    Indexer::new(&store, config)
        .index(&scope, &files, &CancellationFlag::new())
        .unwrap();

    let edges = store.edges(&scope).unwrap();
    assert!(edges.iter().any(|e| e.edge_type == EdgeType::Imports
        && e.from == NodeId::file("main.py")
        && e.to == NodeId::import("pkg.util")));
    assert!(edges.iter().any(|e| e.edge_type == EdgeType::Calls
        && e.to == NodeId::function("pkg/util.py", "helper")));
}
