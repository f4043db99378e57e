//! Error types for configuration loading and validation.

/// Errors that can occur when loading or validating a `corebench.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_config_file, load_config_from_str};

    #[test]
    fn negative_budget_message() {
        let err = load_config_from_str("[run]\nmax_ticks = -3\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation error: run.max_ticks must not be negative (got -3)"
        );
    }

    #[test]
    fn empty_model_message() {
        let err = load_config_from_str("[dut]\nmodel = \"\"\n").unwrap_err();
        assert_eq!(err.to_string(), "missing required field: dut.model");
    }

    #[test]
    fn bad_edge_message_names_value() {
        let err = load_config_from_str("[reset]\nedge = \"both\"\n").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("failed to parse configuration:"));
        assert!(message.contains("both"));
    }

    #[test]
    fn missing_bench_file_is_io_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = load_config_file(&tmp.path().join("corebench.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
        assert!(err.to_string().starts_with("failed to read configuration:"));
    }
}
