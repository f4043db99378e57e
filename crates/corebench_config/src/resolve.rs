//! Turning a parsed [`BenchConfig`] into a driver [`SimConfig`].

use std::path::Path;

use corebench_sim::{ResetWindow, SimConfig, TraceConfig};

use crate::error::ConfigError;
use crate::loader::validate_config;
use crate::types::BenchConfig;

/// Builds the driver configuration.
///
/// Relative waveform paths are taken relative to `base_dir`, normally the
/// directory holding the config file.
pub fn resolve(config: &BenchConfig, base_dir: &Path) -> Result<SimConfig, ConfigError> {
    validate_config(config)?;

    let max_ticks = u64::try_from(config.run.max_ticks)
        .map_err(|_| ConfigError::ValidationError("run.max_ticks must not be negative".into()))?;

    let reset_window = if config.reset.enabled {
        Some(
            ResetWindow::new(config.reset.start, config.reset.end)
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?,
        )
    } else {
        None
    };

    let vcd_path = config.trace.vcd.as_ref().map(|p| base_dir.join(p));

    Ok(SimConfig {
        max_ticks,
        reset_window,
        reset_edge: config.reset.edge,
        trace: TraceConfig {
            vcd_path,
            required: config.trace.required,
            text: config.trace.text,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;
    use corebench_sim::Edge;
    use std::path::PathBuf;

    #[test]
    fn defaults_resolve_to_sim_defaults() {
        let sim = resolve(&BenchConfig::default(), Path::new(".")).unwrap();
        let expected = SimConfig::default();
        assert_eq!(sim.max_ticks, expected.max_ticks);
        assert_eq!(sim.reset_window, expected.reset_window);
        assert_eq!(sim.reset_edge, expected.reset_edge);
        assert!(sim.trace.vcd_path.is_none());
    }

    #[test]
    fn disabled_reset_has_no_window() {
        let config = load_config_from_str("[reset]\nenabled = false\n").unwrap();
        let sim = resolve(&config, Path::new(".")).unwrap();
        assert!(sim.reset_window.is_none());
    }

    #[test]
    fn vcd_path_is_relative_to_base() {
        let config = load_config_from_str("[trace]\nvcd = \"out/core.vcd\"\n").unwrap();
        let sim = resolve(&config, Path::new("/bench")).unwrap();
        assert_eq!(sim.trace.vcd_path, Some(PathBuf::from("/bench/out/core.vcd")));
    }

    #[test]
    fn absolute_vcd_path_kept() {
        let config = load_config_from_str("[trace]\nvcd = \"/tmp/core.vcd\"\n").unwrap();
        let sim = resolve(&config, Path::new("/bench")).unwrap();
        assert_eq!(sim.trace.vcd_path, Some(PathBuf::from("/tmp/core.vcd")));
    }

    #[test]
    fn window_and_edge_carried_over() {
        let config =
            load_config_from_str("[reset]\nstart = 3\nend = 7\nedge = \"rising\"\n").unwrap();
        let sim = resolve(&config, Path::new(".")).unwrap();
        assert_eq!(sim.reset_window, Some(ResetWindow::new(3, 7).unwrap()));
        assert_eq!(sim.reset_edge, Edge::Rising);
    }

    #[test]
    fn model_name_does_not_affect_resolution() {
        let config = load_config_from_str("[dut]\nmodel = \"z80\"\n").unwrap();
        assert!(resolve(&config, Path::new(".")).is_ok());
    }

    #[test]
    fn invalid_values_rejected_even_if_built_by_hand() {
        let mut config = BenchConfig::default();
        config.run.max_ticks = -5;
        assert!(resolve(&config, Path::new(".")).is_err());
    }
}
