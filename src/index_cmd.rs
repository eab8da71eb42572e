//! Index command implementation

use anyhow::{Context, Result};
use meridian::output::{output_json, JsonResponse};
use meridian::{discover_files, CancellationFlag, GraphStore, IndexConfig, Indexer, OutputFormat, RepoScope};
use std::path::{Path, PathBuf};

pub fn run_index(
    root: PathBuf,
    db_path: PathBuf,
    scope: RepoScope,
    config_path: Option<PathBuf>,
    output_format: OutputFormat,
) -> Result<()> {
    let config = match &config_path {
        Some(path) => IndexConfig::load(path)?,
        None => IndexConfig::default(),
    };

    let cancel = CancellationFlag::new();

    // SIGINT / SIGTERM cancel cooperatively; completed work is still persisted
    #[cfg(unix)]
    {
        use signal_hook::consts::signal;
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([signal::SIGTERM, signal::SIGINT])?;
        let flag = cancel.clone();
        std::thread::spawn(move || {
            if signals.forever().next().is_some() {
                flag.cancel();
            }
        });
    }

    let root = canonical_root(&root)?;
    let files = discover_files(&root, &config)?;
    let store = GraphStore::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    let report = Indexer::new(&store, config).index(&scope, &files, &cancel)?;

    match output_format {
        OutputFormat::Json => {
            let cancelled = report.cancelled;
            let execution_id = report.execution_id.clone();
            let mut response = JsonResponse::new(report, &execution_id);
            if cancelled {
                response = response.with_partial(true);
            }
            output_json(&response)?;
        }
        OutputFormat::Human => {
            println!("Indexed {} ({})", scope, root.display());
            println!(
                "  files: {} seen, {} indexed, {} skipped",
                report.files_seen, report.files_indexed, report.files_skipped
            );
            println!(
                "  calls: {} linked ({} via resolver), {} unresolved",
                report.functions_linked, report.resolved_by_fallback, report.unresolved_calls
            );
            println!(
                "  written: {} nodes, {} edges in {} ms",
                report.nodes_written, report.edges_written, report.elapsed_ms
            );
            println!(
                "  totals: {} files, {} functions, {} classes",
                report.summary.total_files, report.summary.total_functions, report.summary.total_classes
            );
            for skipped in &report.skipped {
                println!("  skipped {} [{}]: {}", skipped.path, skipped.code, skipped.message);
            }
            for err in &report.persistence_errors {
                println!("  store error [{}]: {}", err.code, err.message);
            }
            if report.cancelled {
                println!("  cancelled; re-run to complete");
            }
        }
    }
    Ok(())
}

fn canonical_root(root: &Path) -> Result<PathBuf> {
    let root = root
        .canonicalize()
        .with_context(|| format!("cannot access root {}", root.display()))?;
    if !root.is_dir() {
        anyhow::bail!("root is not a directory: {}", root.display());
    }
    Ok(root)
}
