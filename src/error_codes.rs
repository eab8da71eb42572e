//! Meridian error codes
//!
//! Error codes follow the pattern: MER-{CATEGORY}-{3-digit number}
//!
//! Categories:
//! - EXT: Extraction errors (file skipped, pass continues)
//! - DB: Persistence errors (collected into batch outcomes)
//! - CFG: Configuration errors
//!
//! Each error code is stable and should not be reused.

/// File content is binary
pub const MER_EXT_001_BINARY_FILE: &str = "MER-EXT-001";

/// No grammar registered for the file's language
pub const MER_EXT_002_UNSUPPORTED_GRAMMAR: &str = "MER-EXT-002";

/// tree-sitter produced no tree
pub const MER_EXT_003_PARSE_FAILED: &str = "MER-EXT-003";

/// File exceeds the configured size limit
pub const MER_EXT_004_FILE_TOO_LARGE: &str = "MER-EXT-004";

/// Store cannot be opened or reached
pub const MER_DB_001_UNAVAILABLE: &str = "MER-DB-001";

/// Uniqueness or other constraint violated
pub const MER_DB_002_CONSTRAINT: &str = "MER-DB-002";

/// Store rejected the batch
pub const MER_DB_003_BATCH_REJECTED: &str = "MER-DB-003";

/// Record failed validation and was not written
pub const MER_DB_004_INVALID_RECORD: &str = "MER-DB-004";

/// Metadata could not be serialized
pub const MER_DB_005_SERIALIZATION: &str = "MER-DB-005";

/// Configuration file invalid
pub const MER_CFG_001_INVALID_CONFIG: &str = "MER-CFG-001";

/// Error code documentation
///
/// | Code | Description | Remediation |
/// |------|-------------|-------------|
/// | MER-EXT-001 | Binary file | None; file is skipped |
/// | MER-EXT-002 | Unsupported grammar | Map the extension to a registered language |
/// | MER-EXT-003 | Parse failed | Check the file decodes as source text |
/// | MER-EXT-004 | File too large | Raise `max_file_bytes` in the config |
/// | MER-DB-001 | Store unavailable | Check database path and permissions |
/// | MER-DB-002 | Constraint violation | Re-run; report if persistent |
/// | MER-DB-003 | Batch rejected | Inspect the message; the batch was rolled back |
/// | MER-DB-004 | Invalid record | Record had an empty key; fix the producer |
/// | MER-DB-005 | Serialization failed | Metadata contained unserializable values |
/// | MER-CFG-001 | Invalid config | Fix the TOML file |
pub fn remediation(code: &str) -> Option<&'static str> {
    match code {
        MER_EXT_001_BINARY_FILE => Some("None; file is skipped"),
        MER_EXT_002_UNSUPPORTED_GRAMMAR => Some("Map the extension to a registered language"),
        MER_EXT_003_PARSE_FAILED => Some("Check the file decodes as source text"),
        MER_EXT_004_FILE_TOO_LARGE => Some("Raise `max_file_bytes` in the config"),
        MER_DB_001_UNAVAILABLE => Some("Check database path and permissions"),
        MER_DB_002_CONSTRAINT => Some("Re-run; report if persistent"),
        MER_DB_003_BATCH_REJECTED => Some("Inspect the message; the batch was rolled back"),
        MER_DB_004_INVALID_RECORD => Some("Record had an empty key; fix the producer"),
        MER_DB_005_SERIALIZATION => Some("Metadata contained unserializable values"),
        MER_CFG_001_INVALID_CONFIG => Some("Fix the TOML file"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_pattern() {
        for code in [
            MER_EXT_001_BINARY_FILE,
            MER_EXT_004_FILE_TOO_LARGE,
            MER_DB_001_UNAVAILABLE,
            MER_DB_005_SERIALIZATION,
            MER_CFG_001_INVALID_CONFIG,
        ] {
            let parts: Vec<_> = code.split('-').collect();
            assert_eq!(parts.len(), 3, "{}", code);
            assert_eq!(parts[0], "MER");
            assert_eq!(parts[2].len(), 3);
            assert!(remediation(code).is_some(), "{} has no remediation", code);
        }
    }

    #[test]
    fn test_unknown_code_has_no_remediation() {
        assert_eq!(remediation("MER-XYZ-999"), None);
    }
}
