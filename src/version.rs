//! Build metadata captured by `build.rs`

use serde::Serialize;
use std::fmt;

const UNKNOWN: &str = "unknown";

/// Where and how this binary was built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub commit: &'static str,
    pub date: &'static str,
    pub rustc: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        BuildInfo {
            version: env!("CARGO_PKG_VERSION"),
            commit: option_env!("MERIDIAN_COMMIT_SHA").unwrap_or(UNKNOWN),
            date: option_env!("MERIDIAN_BUILD_DATE").unwrap_or(UNKNOWN),
            rustc: option_env!("MERIDIAN_RUSTC_VERSION").unwrap_or(UNKNOWN),
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "meridian {} ({} {}) rustc {}",
            self.version, self.commit, self.date, self.rustc
        )
    }
}

/// `meridian 0.4.0 (abc1234 2026-01-01) rustc 1.80.0`
pub fn version() -> String {
    BuildInfo::current().to_string()
}

/// Crate version alone, as recorded in the run log
pub fn package_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_line() {
        let info = BuildInfo::current();
        assert_eq!(info.version, package_version());
        assert!(version().starts_with(&format!("meridian {} (", package_version())));
        assert!(!info.commit.is_empty());
    }
}
