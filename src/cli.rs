//! CLI argument parsing for Meridian
//!
//! Defines the Command enum and parse_args() for all CLI commands.

use anyhow::Result;
use meridian::{Language, OutputFormat, RepoScope};
use std::path::PathBuf;

pub fn print_usage() {
    eprintln!("Meridian - Multi-tenant code graph indexer");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  meridian <command> [arguments]");
    eprintln!("  meridian --help");
    eprintln!("  meridian --version");
    eprintln!();
    eprintln!("  meridian index --root <DIR> --db <FILE> --tenant <T> --repo <R> [--config <FILE>]");
    eprintln!("  meridian resolve --db <FILE> --tenant <T> --repo <R> --symbol <NAME> --file <PATH> --line <N> [--language <LANG>]");
    eprintln!("  meridian delete --db <FILE> --tenant <T> --repo <R>");
    eprintln!("  meridian status --db <FILE> --tenant <T> --repo <R>");
    eprintln!("  meridian export --db <FILE> --tenant <T> --repo <R>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  index     Extract, link and persist a repository's code graph");
    eprintln!("  resolve   Resolve a symbol reference against the persisted graph");
    eprintln!("  delete    Remove everything stored for a repository");
    eprintln!("  status    Show counts, summary, freshness and the last run");
    eprintln!("  export    Dump nodes and edges as JSON");
    eprintln!();
    eprintln!("Global arguments:");
    eprintln!("  --output <FORMAT>   Output format: human (default) or json");
    eprintln!();
    eprintln!("Scope arguments (all commands):");
    eprintln!("  --db <FILE>         Path to the graph database");
    eprintln!("  --tenant <T>        Tenant id");
    eprintln!("  --repo <R>          Repository id");
    eprintln!();
    eprintln!("Index arguments:");
    eprintln!("  --root <DIR>        Directory to index recursively");
    eprintln!("  --config <FILE>     TOML config file (optional)");
    eprintln!();
    eprintln!("Resolve arguments:");
    eprintln!("  --symbol <NAME>     Referenced name (dotted names resolve on the last segment)");
    eprintln!("  --file <PATH>       Repo-relative path of the referencing file");
    eprintln!("  --line <N>          1-indexed line of the reference");
    eprintln!("  --language <LANG>   Override language detection");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  MERIDIAN_LOG        Log filter (e.g. debug, meridian=trace); falls back to RUST_LOG");
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Index {
        root: PathBuf,
        db_path: PathBuf,
        scope: RepoScope,
        config_path: Option<PathBuf>,
        output_format: OutputFormat,
    },
    Resolve {
        db_path: PathBuf,
        scope: RepoScope,
        symbol: String,
        file: String,
        line: usize,
        language: Option<Language>,
        output_format: OutputFormat,
    },
    Delete {
        db_path: PathBuf,
        scope: RepoScope,
        output_format: OutputFormat,
    },
    Status {
        db_path: PathBuf,
        scope: RepoScope,
        output_format: OutputFormat,
    },
    Export {
        db_path: PathBuf,
        scope: RepoScope,
        output_format: OutputFormat,
    },
    Help,
    Version,
}

/// Flags shared by every command
#[derive(Default)]
struct CommonArgs {
    db_path: Option<PathBuf>,
    tenant: Option<String>,
    repo: Option<String>,
    output_format: OutputFormat,
}

impl CommonArgs {
    /// Consume a shared flag at `args[i]`; returns how many arguments were used
    fn take(&mut self, args: &[String], i: usize) -> Result<Option<usize>> {
        let flag = args[i].as_str();
        if !matches!(flag, "--db" | "--tenant" | "--repo" | "--output") {
            return Ok(None);
        }
        let value = value_of(args, i)?;
        match flag {
            "--db" => self.db_path = Some(PathBuf::from(value)),
            "--tenant" => self.tenant = Some(value.to_string()),
            "--repo" => self.repo = Some(value.to_string()),
            _ => {
                self.output_format = OutputFormat::from_str(value).ok_or_else(|| {
                    anyhow::anyhow!("Invalid output format: {}. Must be human or json", value)
                })?
            }
        }
        Ok(Some(2))
    }

    fn finish(self) -> Result<(PathBuf, RepoScope, OutputFormat)> {
        let db_path = self
            .db_path
            .ok_or_else(|| anyhow::anyhow!("--db is required"))?;
        let tenant = self
            .tenant
            .ok_or_else(|| anyhow::anyhow!("--tenant is required"))?;
        let repo = self.repo.ok_or_else(|| anyhow::anyhow!("--repo is required"))?;
        if tenant.is_empty() || repo.is_empty() {
            return Err(anyhow::anyhow!("--tenant and --repo must not be empty"));
        }
        Ok((db_path, RepoScope::new(tenant, repo), self.output_format))
    }
}

fn value_of(args: &[String], i: usize) -> Result<&str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("{} requires an argument", args[i]))
}

/// Parse a full argv (program name first)
pub fn parse_args_from(args: &[String]) -> Result<Command> {
    if args.len() < 2 {
        return Err(anyhow::anyhow!("Missing command"));
    }

    let command = &args[1];
    if command == "--version" || command == "-V" {
        return Ok(Command::Version);
    }
    if command == "--help" || command == "-h" {
        return Ok(Command::Help);
    }

    let mut common = CommonArgs::default();

    match command.as_str() {
        "index" => {
            let mut root: Option<PathBuf> = None;
            let mut config_path: Option<PathBuf> = None;

            let mut i = 2;
            while i < args.len() {
                if let Some(used) = common.take(args, i)? {
                    i += used;
                    continue;
                }
                match args[i].as_str() {
                    "--root" => {
                        root = Some(PathBuf::from(value_of(args, i)?));
                        i += 2;
                    }
                    "--config" => {
                        config_path = Some(PathBuf::from(value_of(args, i)?));
                        i += 2;
                    }
                    _ => return Err(anyhow::anyhow!("Unknown argument: {}", args[i])),
                }
            }

            let root = root.ok_or_else(|| anyhow::anyhow!("--root is required"))?;
            let (db_path, scope, output_format) = common.finish()?;
            Ok(Command::Index {
                root,
                db_path,
                scope,
                config_path,
                output_format,
            })
        }
        "resolve" => {
            let mut symbol: Option<String> = None;
            let mut file: Option<String> = None;
            let mut line: Option<usize> = None;
            let mut language: Option<Language> = None;

            let mut i = 2;
            while i < args.len() {
                if let Some(used) = common.take(args, i)? {
                    i += used;
                    continue;
                }
                match args[i].as_str() {
                    "--symbol" => {
                        symbol = Some(value_of(args, i)?.to_string());
                        i += 2;
                    }
                    "--file" => {
                        file = Some(value_of(args, i)?.to_string());
                        i += 2;
                    }
                    "--line" => {
                        let raw = value_of(args, i)?;
                        let n: usize = raw
                            .parse()
                            .map_err(|_| anyhow::anyhow!("--line must be a positive integer, got {}", raw))?;
                        if n == 0 {
                            return Err(anyhow::anyhow!("--line is 1-indexed"));
                        }
                        line = Some(n);
                        i += 2;
                    }
                    "--language" => {
                        language = Some(value_of(args, i)?.parse().map_err(|e: String| anyhow::anyhow!(e))?);
                        i += 2;
                    }
                    _ => return Err(anyhow::anyhow!("Unknown argument: {}", args[i])),
                }
            }

            let symbol = symbol.ok_or_else(|| anyhow::anyhow!("--symbol is required"))?;
            let file = file.ok_or_else(|| anyhow::anyhow!("--file is required"))?;
            let line = line.ok_or_else(|| anyhow::anyhow!("--line is required"))?;
            let (db_path, scope, output_format) = common.finish()?;
            Ok(Command::Resolve {
                db_path,
                scope,
                symbol,
                file,
                line,
                language,
                output_format,
            })
        }
        "delete" | "status" | "export" => {
            let mut i = 2;
            while i < args.len() {
                match common.take(args, i)? {
                    Some(used) => i += used,
                    None => return Err(anyhow::anyhow!("Unknown argument: {}", args[i])),
                }
            }

            let (db_path, scope, output_format) = common.finish()?;
            Ok(match command.as_str() {
                "delete" => Command::Delete {
                    db_path,
                    scope,
                    output_format,
                },
                "status" => Command::Status {
                    db_path,
                    scope,
                    output_format,
                },
                _ => Command::Export {
                    db_path,
                    scope,
                    output_format,
                },
            })
        }
        _ => Err(anyhow::anyhow!("Unknown command: {}", command)),
    }
}

/// Parse the process arguments
pub fn parse_args() -> Result<Command> {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from(&args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        std::iter::once("meridian")
            .chain(parts.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_index() {
        let cmd = parse_args_from(&argv(&[
            "index", "--root", "repo", "--db", "g.db", "--tenant", "acme", "--repo", "web",
            "--output", "json",
        ]))
        .unwrap();
        assert_eq!(
            cmd,
            Command::Index {
                root: PathBuf::from("repo"),
                db_path: PathBuf::from("g.db"),
                scope: RepoScope::new("acme", "web"),
                config_path: None,
                output_format: OutputFormat::Json,
            }
        );
    }

    #[test]
    fn test_parse_resolve_with_language() {
        let cmd = parse_args_from(&argv(&[
            "resolve", "--db", "g.db", "--tenant", "t", "--repo", "r", "--symbol", "helper",
            "--file", "src/a.py", "--line", "3", "--language", "python",
        ]))
        .unwrap();
        match cmd {
            Command::Resolve { line, language, .. } => {
                assert_eq!(line, 3);
                assert_eq!(language, Some(Language::Python));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_missing_scope_is_error() {
        let err = parse_args_from(&argv(&["status", "--db", "g.db", "--tenant", "t"])).unwrap_err();
        assert!(err.to_string().contains("--repo"));
    }

    #[test]
    fn test_zero_line_rejected() {
        assert!(parse_args_from(&argv(&[
            "resolve", "--db", "g.db", "--tenant", "t", "--repo", "r", "--symbol", "x", "--file",
            "a.py", "--line", "0",
        ]))
        .is_err());
    }

    #[test]
    fn test_unknown_argument_and_command() {
        assert!(parse_args_from(&argv(&["export", "--db", "g.db", "--bogus"])).is_err());
        assert!(parse_args_from(&argv(&["watch"])).is_err());
        assert_eq!(parse_args_from(&argv(&["--version"])).unwrap(), Command::Version);
    }
}
