//! `corebench run`: simulate one model.
//!
//! Loads `corebench.toml` (if any), applies command-line overrides, builds
//! the model from its forwarded arguments, and runs the driver. Sample lines
//! go to stdout, the summary goes to stderr.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use corebench_config::BenchConfig;
use corebench_sim::models;
use corebench_sim::{Dut, Edge, ResetWindow, RunReport, SimConfig, StopReason, TextTrace};
use tracing::{debug, info};

use crate::{EdgeChoice, GlobalArgs, RunArgs, TextMode};

/// Runs the `corebench run` command. Returns exit code 0 on completion.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (bench, base_dir) = load_bench_config(global)?;
    let mut config = corebench_config::resolve(&bench, &base_dir)?;
    apply_overrides(&mut config, args)?;
    debug!(?config, base = %base_dir.display(), "resolved run configuration");

    let mut dut = build_dut(&bench, args.model.as_deref(), &args.dut_args)?;

    if !global.quiet {
        eprintln!(
            "   Simulating {} for up to {} ticks",
            dut.name(),
            config.max_ticks
        );
    }

    let report = corebench_sim::simulate(&mut dut, &config, io::stdout())?;

    if let Some(path) = &args.report {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &report)?;
    }

    if !global.quiet {
        print_summary(&report, &config);
    }
    Ok(0)
}

/// Loads the bench configuration and the directory relative paths resolve against.
pub(crate) fn load_bench_config(
    global: &GlobalArgs,
) -> Result<(BenchConfig, PathBuf), Box<dyn std::error::Error>> {
    match &global.config {
        Some(path) => {
            let config = corebench_config::load_config_file(path)?;
            let base = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            Ok((config, base))
        }
        None => {
            let cwd = std::env::current_dir()?;
            Ok((corebench_config::load_config(&cwd)?, cwd))
        }
    }
}

/// Builds the selected model. Forwarded arguments follow the configured ones.
pub(crate) fn build_dut(
    bench: &BenchConfig,
    model: Option<&str>,
    extra_args: &[String],
) -> Result<Box<dyn Dut>, Box<dyn std::error::Error>> {
    let name = model.unwrap_or(&bench.dut.model);
    let factory = models::factory(name).ok_or_else(|| {
        format!(
            "unknown DUT model '{name}' (available: {})",
            models::MODEL_NAMES.join(", ")
        )
    })?;
    let mut dut_args = bench.dut.args.clone();
    dut_args.extend(extra_args.iter().cloned());
    info!(model = name, args = ?dut_args, "building DUT");
    Ok(factory.build(&dut_args)?)
}

/// Applies command-line flags on top of the file configuration.
fn apply_overrides(config: &mut SimConfig, args: &RunArgs) -> Result<(), corebench_sim::SimError> {
    if let Some(max_ticks) = args.max_ticks {
        config.max_ticks = max_ticks;
    }
    if let Some(path) = &args.vcd {
        config.trace.vcd_path = Some(path.clone());
    }
    if args.trace_required {
        config.trace.required = true;
    }
    if let Some(mode) = args.text {
        config.trace.text = match mode {
            TextMode::Auto => TextTrace::Auto,
            TextMode::Always => TextTrace::Always,
            TextMode::Never => TextTrace::Never,
        };
    }
    if let Some(edge) = args.edge {
        config.reset_edge = match edge {
            EdgeChoice::Rising => Edge::Rising,
            EdgeChoice::Falling => Edge::Falling,
        };
    }
    if args.no_reset {
        config.reset_window = None;
    } else if args.reset_start.is_some() || args.reset_end.is_some() {
        let base = config.reset_window.unwrap_or_default();
        let start = args.reset_start.unwrap_or(base.start());
        let end = args.reset_end.unwrap_or(base.end());
        config.reset_window = Some(ResetWindow::new(start, end)?);
    }
    Ok(())
}

fn print_summary(report: &RunReport, config: &SimConfig) {
    let reason = match report.stop {
        StopReason::BudgetExhausted => "tick budget reached",
        StopReason::DutFinished => "model signalled completion",
    };
    eprintln!(
        "   Finished at tick {} ({reason}, {} rising edges)",
        report.final_time, report.rising_edges
    );
    match report.reset_released_at {
        Some(t) => eprintln!("   Reset released at tick {t}"),
        None => eprintln!("   Reset never released"),
    }
    if let Some(path) = &config.trace.vcd_path {
        if report.trace_errors.is_empty() {
            eprintln!("   Waveform: {}", path.display());
        }
    }
    for err in &report.trace_errors {
        eprintln!("   warning: trace degraded: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args() -> RunArgs {
        RunArgs::default()
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = SimConfig::default();
        let args = RunArgs {
            max_ticks: Some(7),
            vcd: Some(PathBuf::from("w.vcd")),
            trace_required: true,
            text: Some(TextMode::Never),
            edge: Some(EdgeChoice::Rising),
            ..args()
        };
        apply_overrides(&mut config, &args).unwrap();
        assert_eq!(config.max_ticks, 7);
        assert_eq!(config.trace.vcd_path, Some(PathBuf::from("w.vcd")));
        assert!(config.trace.required);
        assert_eq!(config.trace.text, TextTrace::Never);
        assert_eq!(config.reset_edge, Edge::Rising);
    }

    #[test]
    fn partial_window_override_keeps_other_bound() {
        let mut config = SimConfig::default();
        let args = RunArgs {
            reset_end: Some(30),
            ..args()
        };
        apply_overrides(&mut config, &args).unwrap();
        assert_eq!(config.reset_window, Some(ResetWindow::new(1, 30).unwrap()));
    }

    #[test]
    fn bad_window_override_rejected() {
        let mut config = SimConfig::default();
        let args = RunArgs {
            reset_start: Some(20),
            ..args()
        };
        assert!(apply_overrides(&mut config, &args).is_err());
    }

    #[test]
    fn no_reset_clears_window() {
        let mut config = SimConfig::default();
        let args = RunArgs {
            no_reset: true,
            ..args()
        };
        apply_overrides(&mut config, &args).unwrap();
        assert!(config.reset_window.is_none());
    }

    #[test]
    fn build_dut_appends_forwarded_args() {
        let bench = corebench_config::load_config_from_str(
            "[dut]\nargs = [\"+reset_vector=0x100\"]\n",
        )
        .unwrap();
        let dut = build_dut(&bench, None, &["+reset_vector=0x200".to_string()]).unwrap();
        // Forwarded args come last and win.
        assert_eq!(dut.read_probe(0), 0x200);
    }

    #[test]
    fn build_dut_unknown_model() {
        let err = build_dut(&BenchConfig::default(), Some("6502"), &[])
            .err()
            .unwrap();
        assert!(err.to_string().contains("unknown DUT model"));
    }

    #[test]
    fn run_end_to_end_with_config_file() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("corebench.toml");
        fs::write(
            &config_path,
            r#"
[run]
max_ticks = 40

[trace]
vcd = "out/core.vcd"

[dut]
args = ["+reset_vector=0xfffe"]
"#,
        )
        .unwrap();

        let report_path = tmp.path().join("report.json");
        let args = RunArgs {
            report: Some(report_path.clone()),
            ..args()
        };
        let global = GlobalArgs {
            quiet: true,
            config: Some(config_path),
        };

        let code = run(&args, &global).unwrap();
        assert_eq!(code, 0);

        let vcd = fs::read_to_string(tmp.path().join("out").join("core.vcd")).unwrap();
        assert!(vcd.contains("core_addr"));

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(report_path).unwrap()).unwrap();
        assert_eq!(report["ticks"], 40);
        assert_eq!(report["stop"], "budget_exhausted");
        assert_eq!(report["reset_released_at"], 10);
    }

    #[test]
    fn model_flag_overrides_unknown_file_model() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("corebench.toml");
        fs::write(
            &config_path,
            "[run]\nmax_ticks = 8\n[trace]\ntext = \"never\"\n[dut]\nmodel = \"z80\"\n",
        )
        .unwrap();
        let global = GlobalArgs {
            quiet: true,
            config: Some(config_path),
        };

        let err = run(&args(), &global).unwrap_err();
        assert!(err.to_string().contains("unknown DUT model 'z80'"));

        let args = RunArgs {
            model: Some("counter".to_string()),
            ..args()
        };
        assert_eq!(run(&args, &global).unwrap(), 0);
    }

    #[test]
    fn run_zero_budget_exits_zero() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("corebench.toml");
        fs::write(&config_path, "[run]\nmax_ticks = 0\n[trace]\ntext = \"never\"\n").unwrap();
        let global = GlobalArgs {
            quiet: true,
            config: Some(config_path),
        };
        assert_eq!(run(&args(), &global).unwrap(), 0);
    }

    #[test]
    fn run_surfaces_dut_failure() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("corebench.toml");
        fs::write(&config_path, "[trace]\ntext = \"never\"\n").unwrap();
        let global = GlobalArgs {
            quiet: true,
            config: Some(config_path),
        };
        let args = RunArgs {
            dut_args: vec!["+fail_at=42".to_string()],
            ..args()
        };
        let err = run(&args, &global).unwrap_err();
        assert!(err.to_string().contains("tick 42"));
    }
}
