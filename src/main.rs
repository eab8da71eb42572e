//! Meridian CLI - multi-tenant code graph indexer
//!
//! Usage: meridian <command> [arguments]

mod cli;
mod index_cmd;
mod resolve_cmd;

use anyhow::Result;
use cli::{parse_args, print_usage, Command};
use meridian::error_codes::remediation;
use meridian::output::{
    generate_execution_id, output_json, ErrorResponse, ExportResponse, JsonResponse,
    StatusResponse,
};
use meridian::{GraphStore, OutputFormat, PersistenceError, RepoScope};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr so stdout stays clean for JSON
fn init_logging() {
    let filter = std::env::var("MERIDIAN_LOG")
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_status(db_path: PathBuf, scope: RepoScope, output_format: OutputFormat) -> Result<()> {
    let store = GraphStore::open(&db_path)?;
    let response = StatusResponse {
        nodes: store.count_nodes(&scope)?,
        edges: store.count_edges(&scope)?,
        summary: store.repository_summary(&scope, 10)?,
        freshness: store.freshness(&scope)?,
        last_run: store.last_run(&scope)?,
        scope,
    };

    match output_format {
        OutputFormat::Json => {
            let execution_id = generate_execution_id();
            output_json(&JsonResponse::new(response, &execution_id))?;
        }
        OutputFormat::Human => {
            println!("scope: {}", response.scope);
            println!("nodes: {}", response.nodes);
            println!("edges: {}", response.edges);
            println!("files: {}", response.summary.total_files);
            println!("functions: {}", response.summary.total_functions);
            println!("classes: {}", response.summary.total_classes);
            for import in &response.summary.top_imports {
                println!("  import {} ({})", import.import, import.count);
            }
            println!("stale nodes: {}", response.freshness.stale_nodes);
            if let Some(run) = &response.last_run {
                println!(
                    "last run: {} {} ({} files indexed)",
                    run.execution_id, run.outcome, run.counters.files_indexed
                );
            }
            if let Some(warning) = response.freshness.warning_message(&response.scope) {
                eprintln!("{}", warning);
            }
        }
    }
    Ok(())
}

fn run_delete(db_path: PathBuf, scope: RepoScope, output_format: OutputFormat) -> Result<()> {
    let store = GraphStore::open(&db_path)?;
    let report = store.delete_repository(&scope)?;

    match output_format {
        OutputFormat::Json => {
            let execution_id = generate_execution_id();
            output_json(&JsonResponse::new(report, &execution_id))?;
        }
        OutputFormat::Human => {
            println!(
                "Deleted {}: {} nodes, {} edges, {} sources, {} runs",
                scope, report.nodes, report.edges, report.file_sources, report.runs
            );
        }
    }
    Ok(())
}

fn run_export(db_path: PathBuf, scope: RepoScope, output_format: OutputFormat) -> Result<()> {
    let store = GraphStore::open(&db_path)?;
    let response = ExportResponse {
        nodes: store.nodes(&scope)?,
        edges: store.edges(&scope)?,
        scope,
    };

    match output_format {
        OutputFormat::Json => {
            let execution_id = generate_execution_id();
            output_json(&JsonResponse::new(response, &execution_id))?;
        }
        // Export is JSON either way; human mode skips the envelope
        OutputFormat::Human => output_json(&response)?,
    }
    Ok(())
}

fn report_error(err: &anyhow::Error, output_format: OutputFormat) {
    let code = err
        .downcast_ref::<PersistenceError>()
        .map(|e| e.code().to_string());

    match output_format {
        OutputFormat::Json => {
            let response = ErrorResponse {
                error: code.clone().unwrap_or_else(|| "error".to_string()),
                message: format!("{:#}", err),
                remediation: code.as_deref().and_then(remediation).map(str::to_string),
            };
            let execution_id = generate_execution_id();
            if output_json(&JsonResponse::new(response, &execution_id)).is_err() {
                eprintln!("Error: {:#}", err);
            }
        }
        OutputFormat::Human => match code {
            Some(code) => eprintln!("Error [{}]: {:#}", code, err),
            None => eprintln!("Error: {:#}", err),
        },
    }
}

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let command = match parse_args() {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            return ExitCode::from(1);
        }
    };

    let (result, output_format) = match command {
        Command::Help => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Command::Version => {
            println!("{}", meridian::version::version());
            return ExitCode::SUCCESS;
        }
        Command::Index {
            root,
            db_path,
            scope,
            config_path,
            output_format,
        } => (
            index_cmd::run_index(root, db_path, scope, config_path, output_format),
            output_format,
        ),
        Command::Resolve {
            db_path,
            scope,
            symbol,
            file,
            line,
            language,
            output_format,
        } => (
            resolve_cmd::run_resolve(db_path, scope, symbol, file, line, language, output_format),
            output_format,
        ),
        Command::Delete {
            db_path,
            scope,
            output_format,
        } => (run_delete(db_path, scope, output_format), output_format),
        Command::Status {
            db_path,
            scope,
            output_format,
        } => (run_status(db_path, scope, output_format), output_format),
        Command::Export {
            db_path,
            scope,
            output_format,
        } => (run_export(db_path, scope, output_format), output_format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e, output_format);
            ExitCode::from(1)
        }
    }
}
