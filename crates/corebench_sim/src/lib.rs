//! Cycle-accurate clock/reset driver for evaluable hardware models.
//!
//! This crate steps a device under test (anything implementing [`Dut`]) in
//! lock-step with a discrete simulated-time counter. Each tick toggles the
//! clock, updates the active-low reset on the configured sampling edge,
//! evaluates the model once, and on rising edges forwards the model's probe
//! values to the configured trace sinks.
//!
//! # Usage
//!
//! ```ignore
//! use corebench_sim::{simulate, models::CounterCore, SimConfig};
//!
//! let mut core = CounterCore::new(0xfffe, 1);
//! let report = simulate(&mut core, &SimConfig::default(), std::io::stdout())?;
//! println!("stopped after {} ticks", report.ticks);
//! ```
//!
//! # Modules
//!
//! - `error`: Driver and trace sink error types
//! - `time`: Simulated-time counter
//! - `sequencer`: Clock toggling and edge-sampled reset
//! - `dut`: Device-under-test contract and run-scoped session guard
//! - `trace`: VCD, text, and null observation sinks
//! - `driver`: The evaluation loop
//! - `models`: Behavioural reference models

#![warn(missing_docs)]

pub mod driver;
pub mod dut;
pub mod error;
pub mod models;
pub mod sequencer;
pub mod time;
pub mod trace;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

pub use driver::{run, RunReport, RunState, StopReason};
pub use dut::{Dut, DutFactory, DutSession, PlusArgs, Probe};
pub use error::{DutError, SimError, TraceError};
pub use sequencer::{Edge, Pins, ResetWindow, Sequencer};
pub use time::{SimTime, TimeBase};
pub use trace::{NullSink, ObservationSample, SinkSet, TextSink, TraceSink, VcdSink};

/// When the text sample log is written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTrace {
    /// Only when no waveform file is being written.
    #[default]
    Auto,
    /// Always, alongside any waveform.
    Always,
    /// Never.
    Never,
}

/// Trace output settings.
#[derive(Debug, Clone, Default)]
pub struct TraceConfig {
    /// Optional path for a VCD waveform.
    pub vcd_path: Option<PathBuf>,
    /// Whether a trace failure aborts the run.
    pub required: bool,
    /// Text sample log policy.
    pub text: TextTrace,
}

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Tick budget. Zero runs no iterations.
    pub max_ticks: u64,
    /// Reset window. `None` leaves reset at its power-on (asserted) level.
    pub reset_window: Option<ResetWindow>,
    /// Clock edge on which reset is sampled.
    pub reset_edge: Edge,
    /// Trace output settings.
    pub trace: TraceConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_ticks: 1000,
            reset_window: Some(ResetWindow::DEFAULT),
            reset_edge: Edge::Falling,
            trace: TraceConfig::default(),
        }
    }
}

impl SimConfig {
    /// Checks the configuration. Called before a run touches the DUT.
    pub fn validate(&self) -> Result<(), SimError> {
        if let Some(window) = &self.reset_window {
            // Deserialized windows bypass the constructor check.
            ResetWindow::new(window.start(), window.end())?;
        }
        Ok(())
    }
}

/// Opens the sinks described by `trace`.
///
/// The text log goes to `text_out`. If an optional VCD file cannot be
/// created the failure is noted in the set and, under [`TextTrace::Auto`],
/// samples fall back to the text log.
pub fn open_sinks<W: Write + 'static>(
    trace: &TraceConfig,
    text_out: W,
) -> Result<SinkSet, SimError> {
    let mut sinks = SinkSet::new(trace.required);
    let mut have_waveform = false;

    if let Some(path) = &trace.vcd_path {
        let name = format!("vcd:{}", path.display());
        match create_file(path) {
            Ok(file) => {
                info!(path = %path.display(), "recording waveform");
                sinks.push(name, Box::new(VcdSink::new(BufWriter::new(file))));
                have_waveform = true;
            }
            Err(err) => sinks.report_open_failure(&name, TraceError::Io(err))?,
        }
    }

    let want_text = match trace.text {
        TextTrace::Always => true,
        TextTrace::Never => false,
        TextTrace::Auto => !have_waveform,
    };
    if want_text {
        sinks.push("text", Box::new(TextSink::new(text_out)));
    }
    Ok(sinks)
}

fn create_file(path: &std::path::Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    File::create(path)
}

/// High-level entry point: opens the configured sinks and runs `dut`.
///
/// The text sample log, when enabled, is written to `text_out`.
pub fn simulate<D: Dut + ?Sized, W: Write + 'static>(
    dut: &mut D,
    config: &SimConfig,
    text_out: W,
) -> Result<RunReport, SimError> {
    config.validate()?;
    let mut sinks = open_sinks(&config.trace, text_out)?;
    run(dut, config, &mut sinks)
}
