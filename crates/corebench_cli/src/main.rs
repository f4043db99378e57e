//! corebench CLI: drive a hardware model with clock and reset and watch its address bus.
//!
//! Provides `corebench run` to simulate a model for a tick budget,
//! `corebench check` to validate a configuration without running it, and
//! `corebench models` to list the built-in models.

#![warn(missing_docs)]

mod check;
mod run;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// corebench, a cycle-accurate clock/reset driver for CPU core models.
#[derive(Parser, Debug)]
#[command(name = "corebench", version, about = "Cycle-accurate CPU core bench driver")]
pub struct Cli {
    /// Suppress all output except errors and the sample log.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Path to a `corebench.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a model until its tick budget is spent or it signals completion.
    Run(RunArgs),
    /// Validate the configuration and model arguments without simulating.
    Check(CheckArgs),
    /// List the built-in models.
    Models,
}

/// Arguments for `corebench run`.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Tick budget (overrides `run.max_ticks`).
    #[arg(long)]
    pub max_ticks: Option<u64>,

    /// Write a VCD waveform to this path.
    #[arg(long)]
    pub vcd: Option<PathBuf>,

    /// Fail the run if the trace cannot be written.
    #[arg(long)]
    pub trace_required: bool,

    /// When to write `Addr:` sample lines to stdout.
    #[arg(long, value_enum)]
    pub text: Option<TextMode>,

    /// Never release reset: drive it asserted for the whole run.
    #[arg(long, conflicts_with_all = ["reset_start", "reset_end"])]
    pub no_reset: bool,

    /// First tick with reset asserted.
    #[arg(long)]
    pub reset_start: Option<u64>,

    /// First tick with reset released.
    #[arg(long)]
    pub reset_end: Option<u64>,

    /// Clock edge on which reset is sampled.
    #[arg(long, value_enum)]
    pub edge: Option<EdgeChoice>,

    /// Built-in model to run (overrides `dut.model`).
    #[arg(short, long)]
    pub model: Option<String>,

    /// Write the run report as JSON to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Arguments forwarded to the model (after `--`).
    #[arg(last = true)]
    pub dut_args: Vec<String>,
}

/// Arguments for `corebench check`.
#[derive(Parser, Debug, Default)]
pub struct CheckArgs {
    /// Model to check instead of `dut.model`.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Arguments forwarded to the model (after `--`).
    #[arg(last = true)]
    pub dut_args: Vec<String>,
}

/// Text sample log policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TextMode {
    /// Only when no waveform is written.
    Auto,
    /// Always.
    Always,
    /// Never.
    Never,
}

/// Reset sampling edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EdgeChoice {
    /// 0 → 1.
    Rising,
    /// 1 → 0.
    Falling,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Optional path to a config file.
    pub config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let global = GlobalArgs {
        quiet: cli.quiet,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Run(ref args) => run::run(args, &global),
        Command::Check(ref args) => check::run(args, &global),
        Command::Models => {
            check::list_models();
            Ok(0)
        }
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Picks the log level from the flags; `RUST_LOG` wins when set.
fn log_level(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_logging(quiet: bool, verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(quiet, verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
