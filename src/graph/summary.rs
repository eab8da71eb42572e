//! Repository-level statistics

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How often one module is imported across a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCount {
    pub import: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub total_files: usize,
    pub total_functions: usize,
    /// Classes, interfaces and type aliases
    pub total_classes: usize,
    /// Most-imported modules, most frequent first, ties by name
    pub top_imports: Vec<ImportCount>,
}

/// The `n` most frequent imports, ordered by count descending then name
pub fn top_imports(counts: &HashMap<String, usize>, n: usize) -> Vec<ImportCount> {
    let mut ranked: Vec<ImportCount> = counts
        .iter()
        .map(|(import, &count)| ImportCount {
            import: import.clone(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.import.cmp(&b.import)));
    ranked.truncate(n);
    ranked
}
