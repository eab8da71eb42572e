//! Resolve command implementation

use anyhow::Result;
use meridian::output::{generate_execution_id, output_json, JsonResponse};
use meridian::{GraphStore, Language, OutputFormat, RepoScope, SymbolResolver};
use std::path::PathBuf;

#[allow(clippy::too_many_arguments)]
pub fn run_resolve(
    db_path: PathBuf,
    scope: RepoScope,
    symbol: String,
    file: String,
    line: usize,
    language: Option<Language>,
    output_format: OutputFormat,
) -> Result<()> {
    let store = GraphStore::open(&db_path)?;
    let result = SymbolResolver::new().resolve(&store.scoped(&scope), &symbol, &file, line, language);

    match output_format {
        OutputFormat::Json => {
            let execution_id = generate_execution_id();
            output_json(&JsonResponse::new(result, &execution_id))?;
        }
        OutputFormat::Human => match &result.definition {
            Some(definition) => {
                println!(
                    "{} -> {} ({}, confidence {:.1}, {})",
                    symbol, definition.id, result.method, result.confidence, result.reference_kind
                );
                if let Some(line) = definition.start_line() {
                    println!("  defined at {}:{}", definition.path.as_deref().unwrap_or("?"), line);
                }
            }
            None => {
                println!("{}: unresolved ({})", symbol, result.reference_kind);
                for err in &result.errors {
                    println!("  error: {}", err);
                }
            }
        },
    }
    Ok(())
}
