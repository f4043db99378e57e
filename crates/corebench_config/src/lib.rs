//! Parsing and validation of `corebench.toml` run configuration files.
//!
//! This crate reads the bench configuration and produces a strongly-typed
//! [`BenchConfig`], which [`resolve`] turns into the driver's
//! [`SimConfig`](corebench_sim::SimConfig).

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE_NAME};
pub use resolve::resolve;
pub use types::*;
