//! Configuration handling for indexing jobs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error_codes::MER_CFG_001_INVALID_CONFIG;
use crate::ingest::{default_extensions, detect_language_with, Language};

/// Settings for one indexing job
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Extension (without dot, lowercase) to language
    #[serde(default = "default_extensions")]
    pub extensions: BTreeMap<String, Language>,

    /// Records per persistence batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Call sites per linking batch
    #[serde(default = "default_link_batch_size")]
    pub link_batch_size: usize,

    /// Larger files are skipped
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,

    /// Entries in the summary's top imports
    #[serde(default = "default_top_imports")]
    pub top_imports: usize,

    /// Extract files on the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Offer would-be placeholder calls to the symbol resolver first
    #[serde(default)]
    pub resolve_unlinked: bool,

    /// Lowest resolver confidence accepted when `resolve_unlinked` is set
    #[serde(default = "default_min_link_confidence")]
    pub min_link_confidence: f64,
}

fn default_batch_size() -> usize {
    500
}

fn default_link_batch_size() -> usize {
    1000
}

fn default_max_file_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_top_imports() -> usize {
    10
}

fn default_parallel() -> bool {
    true
}

fn default_min_link_confidence() -> f64 {
    0.6
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            batch_size: default_batch_size(),
            link_batch_size: default_link_batch_size(),
            max_file_bytes: default_max_file_bytes(),
            top_imports: default_top_imports(),
            parallel: default_parallel(),
            resolve_unlinked: false,
            min_link_confidence: default_min_link_confidence(),
        }
    }
}

impl IndexConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("{}: invalid config file {}", MER_CFG_001_INVALID_CONFIG, path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: IndexConfig = toml::from_str(content)?;
        config.extensions = config
            .extensions
            .into_iter()
            .map(|(ext, lang)| (ext.trim_start_matches('.').to_ascii_lowercase(), lang))
            .collect();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.link_batch_size == 0 {
            anyhow::bail!("batch sizes must be positive");
        }
        if !(0.0..=1.0).contains(&self.min_link_confidence) {
            anyhow::bail!(
                "min_link_confidence must be within [0, 1], got {}",
                self.min_link_confidence
            );
        }
        Ok(())
    }

    /// Language for `path` under this config's extension table
    pub fn language_for(&self, path: &Path) -> Option<Language> {
        detect_language_with(path, &self.extensions)
    }
}
