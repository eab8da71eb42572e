//! Module string to repository file resolution
//!
//! Maps the module part of an import binding to the files that could define
//! it, given the importing file and the set of indexed file paths. Handles:
//! - relative ECMAScript specifiers (`./util`, `../lib/index`)
//! - Python dotted and relative modules (`pkg.models`, `..util`)
//! - Java packages and classes (`com.acme.Order`, wildcard packages)
//! - Rust `crate::`, `super::`, `self::` and plain paths

use std::collections::BTreeSet;

use crate::ingest::Language;

const ECMASCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// Files that may define members of `module`, imported from `from_file`
///
/// Only paths present in `files` are returned, in a deterministic order.
pub fn candidate_files(
    module: &str,
    from_file: &str,
    language: Language,
    files: &BTreeSet<String>,
) -> Vec<String> {
    let candidates = match language {
        Language::JavaScript | Language::TypeScript | Language::Tsx => {
            ecmascript_candidates(module, from_file)
        }
        Language::Python => python_candidates(module, from_file),
        Language::Java => return java_candidates(module, files),
        Language::Rust => rust_candidates(module, from_file),
    };

    let mut seen = BTreeSet::new();
    candidates
        .into_iter()
        .filter_map(|candidate| {
            if files.contains(&candidate) {
                return Some(candidate);
            }
            // Absolute module paths may be rooted below a source directory
            let suffix = format!("/{}", candidate);
            files.iter().find(|f| f.ends_with(&suffix)).cloned()
        })
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

/// Directory part of a repo-relative path ("" for top-level files)
fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Join and normalize `.`/`..` segments; `None` if the path escapes the root
fn normalize(base: &str, relative: &str) -> Option<String> {
    let mut parts: Vec<&str> = base.split('/').filter(|p| !p.is_empty()).collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

fn ecmascript_candidates(module: &str, from_file: &str) -> Vec<String> {
    if !module.starts_with('.') {
        // Bare specifiers name packages outside the repository
        return Vec::new();
    }
    let Some(target) = normalize(parent_dir(from_file), module) else {
        return Vec::new();
    };

    let mut out = vec![target.clone()];
    for ext in ECMASCRIPT_EXTENSIONS {
        out.push(format!("{}.{}", target, ext));
    }
    for ext in ECMASCRIPT_EXTENSIONS {
        out.push(format!("{}/index.{}", target, ext));
    }
    out
}

fn python_candidates(module: &str, from_file: &str) -> Vec<String> {
    let dots = module.chars().take_while(|c| *c == '.').count();
    let rest = module[dots..].replace('.', "/");

    let base = if dots == 0 {
        String::new()
    } else {
        // "." is the importing package, each further dot one level up
        let mut dir = parent_dir(from_file).to_string();
        for _ in 1..dots {
            dir = parent_dir(&dir).to_string();
        }
        dir
    };

    let target = match (base.is_empty(), rest.is_empty()) {
        (true, true) => return Vec::new(),
        (true, false) => rest,
        (false, true) => return vec![format!("{}/__init__.py", base)],
        (false, false) => format!("{}/{}", base, rest),
    };
    vec![
        format!("{}.py", target),
        format!("{}.pyi", target),
        format!("{}/__init__.py", target),
    ]
}

/// Module named by `from {module} import {name}` when `name` is a submodule
///
/// `from . import utils` names `.utils`; `from pkg import utils` names `pkg.utils`.
pub fn python_submodule(module: &str, name: &str) -> String {
    if module.chars().all(|c| c == '.') {
        format!("{}{}", module, name)
    } else {
        format!("{}.{}", module, name)
    }
}

fn java_candidates(module: &str, files: &BTreeSet<String>) -> Vec<String> {
    let as_path = module.replace('.', "/");
    let class_file = format!("{}.java", as_path);
    let exact: Vec<String> = files
        .iter()
        .filter(|f| f.as_str() == class_file || f.ends_with(&format!("/{}", class_file)))
        .cloned()
        .collect();
    if !exact.is_empty() {
        return exact;
    }

    // Package import: every class file directly inside the package directory
    let package_dir = format!("{}/", as_path);
    files
        .iter()
        .filter(|f| f.ends_with(".java"))
        .filter(|f| {
            let dir = parent_dir(f);
            dir == as_path || format!("{}/", dir).ends_with(&format!("/{}", package_dir))
        })
        .cloned()
        .collect()
}

/// Convert a Rust file path to its module path
///
/// Examples:
/// - "src/lib.rs" -> "crate"
/// - "src/foo.rs" -> "crate::foo"
/// - "src/foo/bar.rs" -> "crate::foo::bar"
/// - "src/foo/mod.rs" -> "crate::foo"
pub fn file_path_to_module_path(file_path: &str) -> String {
    let relative = match file_path.rfind("src/") {
        Some(pos) => &file_path[pos + 4..],
        None => file_path,
    };
    let without_ext = relative.strip_suffix(".rs").unwrap_or(relative);

    let mut segments: Vec<&str> = without_ext.split('/').filter(|s| !s.is_empty()).collect();
    if matches!(segments.last(), Some(&"mod") | Some(&"lib") | Some(&"main")) {
        segments.pop();
    }

    std::iter::once("crate")
        .chain(segments)
        .collect::<Vec<_>>()
        .join("::")
}

/// Parent of a module path; `crate` has none
///
/// Examples:
/// - "crate::foo::bar" -> "crate::foo"
/// - "crate::foo" -> "crate"
/// - "crate" -> None
pub fn parent_module(module_path: &str) -> Option<&str> {
    if module_path == "crate" {
        return None;
    }
    module_path.rfind("::").map(|pos| &module_path[..pos])
}

/// Crate source root of a file ("src" for "src/a/b.rs", "lib/x/src" for nested crates)
fn crate_root(file_path: &str) -> String {
    match file_path.rfind("src/") {
        Some(pos) => file_path[..pos + 3].to_string(),
        None => parent_dir(file_path).to_string(),
    }
}

fn rust_candidates(module: &str, from_file: &str) -> Vec<String> {
    let segments: Vec<&str> = module.split("::").filter(|s| !s.is_empty()).collect();
    let Some(first) = segments.first() else {
        return Vec::new();
    };

    let current = file_path_to_module_path(from_file);
    let absolute = match *first {
        "crate" => segments.join("::"),
        "self" => std::iter::once(current.as_str())
            .chain(segments[1..].iter().copied())
            .collect::<Vec<_>>()
            .join("::"),
        "super" => {
            let mut base = current.as_str();
            let mut rest = &segments[..];
            while rest.first() == Some(&"super") {
                let Some(parent) = parent_module(base) else {
                    return Vec::new();
                };
                base = parent;
                rest = &rest[1..];
            }
            std::iter::once(base)
                .chain(rest.iter().copied())
                .collect::<Vec<_>>()
                .join("::")
        }
        // Plain paths are tried as crate-relative
        _ => format!("crate::{}", segments.join("::")),
    };

    let root = crate_root(from_file);
    let inner: Vec<&str> = absolute.split("::").skip(1).collect();
    let join = |tail: &str| {
        if root.is_empty() {
            tail.to_string()
        } else {
            format!("{}/{}", root, tail)
        }
    };

    if inner.is_empty() {
        return vec![join("lib.rs"), join("main.rs")];
    }
    let as_path = inner.join("/");
    vec![join(&format!("{}.rs", as_path)), join(&format!("{}/mod.rs", as_path))]
}
