//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::BenchConfig;
use std::path::Path;

/// File name looked up in the bench directory.
pub const CONFIG_FILE_NAME: &str = "corebench.toml";

/// Loads `<bench_dir>/corebench.toml`, or the defaults if there is none.
pub fn load_config(bench_dir: &Path) -> Result<BenchConfig, ConfigError> {
    let config_path = bench_dir.join(CONFIG_FILE_NAME);
    if !config_path.is_file() {
        return Ok(BenchConfig::default());
    }
    load_config_file(&config_path)
}

/// Loads and validates a configuration from an explicit file path.
///
/// Unlike [`load_config`], a missing file is an error.
pub fn load_config_file(path: &Path) -> Result<BenchConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<BenchConfig, ConfigError> {
    let config: BenchConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks values that parse fine but cannot drive a run.
///
/// The model name is only checked for presence. Whether it names a built-in
/// model is decided when the model is built, after command-line overrides.
pub fn validate_config(config: &BenchConfig) -> Result<(), ConfigError> {
    if config.run.max_ticks < 0 {
        return Err(ConfigError::ValidationError(format!(
            "run.max_ticks must not be negative (got {})",
            config.run.max_ticks
        )));
    }
    if config.reset.enabled && config.reset.start >= config.reset.end {
        return Err(ConfigError::ValidationError(format!(
            "reset window [{}, {}) is empty",
            config.reset.start, config.reset.end
        )));
    }
    if config.dut.model.is_empty() {
        return Err(ConfigError::MissingField("dut.model".to_string()));
    }
    if config.trace.vcd.as_deref() == Some("") {
        return Err(ConfigError::ValidationError(
            "trace.vcd must not be empty".to_string(),
        ));
    }
    Ok(())
}
