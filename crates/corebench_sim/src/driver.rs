//! The evaluation loop.
//!
//! One iteration is one tick: advance time, toggle the clock (updating reset
//! on the sampling edge), drive the DUT inputs, evaluate once, sample the
//! probes if the clock is high, then check for termination. The DUT is
//! finalized exactly once on every exit path, and trace sinks are closed
//! after that.

use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use crate::dut::{Dut, DutSession};
use crate::error::SimError;
use crate::sequencer::Sequencer;
use crate::time::{SimTime, TimeBase};
use crate::trace::{ObservationSample, SinkSet};
use crate::SimConfig;

/// Why the loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The tick budget was used up.
    BudgetExhausted,
    /// The DUT raised its completion flag.
    DutFinished,
}

/// Loop state. `Running → Stopped` happens once and never reverses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Iterations are still being executed.
    Running,
    /// The loop has exited.
    Stopped(StopReason),
}

/// Summary of a completed run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Iterations executed (equal to clock toggles).
    pub ticks: u64,
    /// Simulated time when the loop stopped.
    pub final_time: SimTime,
    /// What stopped the loop.
    pub stop: StopReason,
    /// Rising edges seen, which is the number of samples taken.
    pub rising_edges: u64,
    /// Tick at which reset was last released, if it was.
    pub reset_released_at: Option<SimTime>,
    /// Probe values from the final sample, if any sample was taken.
    pub last_sample: Option<ObservationSample>,
    /// Non-fatal trace sink failures.
    pub trace_errors: Vec<String>,
}

/// Runs `dut` under `config`, forwarding samples to `sinks`.
///
/// The configuration is checked before anything touches the DUT. Sinks are
/// declared before the first tick and closed after the DUT is finalized,
/// also when the run fails.
pub fn run<D: Dut + ?Sized>(
    dut: &mut D,
    config: &SimConfig,
    sinks: &mut SinkSet,
) -> Result<RunReport, SimError> {
    config.validate()?;

    let mut session = DutSession::new(dut);
    info!(
        dut = session.dut().name(),
        max_ticks = config.max_ticks,
        reset = ?config.reset_window,
        edge = %config.reset_edge,
        "starting run"
    );

    let outcome = sinks
        .declare(session.dut().name(), session.dut().probes())
        .and_then(|()| evaluation_loop(&mut session, config, sinks));

    session.finalize();
    drop(session);

    let closed = sinks.close();
    let mut report = match outcome {
        Ok(report) => report,
        Err(err) => {
            error!(error = %err, "run aborted");
            if let Err(close_err) = closed {
                warn!(error = %close_err, "trace sink also failed to close");
            }
            return Err(err);
        }
    };
    closed?;

    report.trace_errors = sinks.take_errors();
    info!(
        ticks = report.ticks,
        rising_edges = report.rising_edges,
        stop = ?report.stop,
        "run complete"
    );
    Ok(report)
}

fn evaluation_loop<D: Dut + ?Sized>(
    session: &mut DutSession<'_, D>,
    config: &SimConfig,
    sinks: &mut SinkSet,
) -> Result<RunReport, SimError> {
    let mut time = TimeBase::new();
    let mut sequencer = Sequencer::new(config.reset_window, config.reset_edge);

    let mut pins = sequencer.tick(time.current());
    session.drive(pins);
    session.evaluate(time.current())?;
    sinks.record_pins(time.current(), pins)?;

    let mut rising_edges = 0u64;
    let mut reset_released_at = None;
    let mut last_sample = None;
    let stop = loop {
        if let RunState::Stopped(reason) =
            termination(time.current(), config.max_ticks, session.dut())
        {
            break reason;
        }

        let now = time.advance()?;
        let was_in_reset = pins.in_reset();
        pins = sequencer.tick(now);
        session.drive(pins);
        session.evaluate(now)?;
        sinks.record_pins(now, pins)?;

        if was_in_reset && !pins.in_reset() {
            debug!(tick = now.ticks(), "reset released");
            reset_released_at = Some(now);
        }

        if pins.clock {
            rising_edges += 1;
            let dut = session.dut();
            let sample = ObservationSample {
                time: now,
                reset_n: pins.reset_n,
                values: dut
                    .probes()
                    .iter()
                    .enumerate()
                    .map(|(i, probe)| probe.mask(dut.read_probe(i)))
                    .collect(),
            };
            trace!(tick = now.ticks(), values = ?sample.values, "sample");
            sinks.record_sample(dut.probes(), &sample)?;
            last_sample = Some(sample);
        }
    };

    Ok(RunReport {
        ticks: sequencer.toggles(),
        final_time: time.current(),
        stop,
        rising_edges,
        reset_released_at,
        last_sample,
        trace_errors: Vec::new(),
    })
}

fn termination<D: Dut + ?Sized>(now: SimTime, max_ticks: u64, dut: &D) -> RunState {
    if dut.finished() {
        RunState::Stopped(StopReason::DutFinished)
    } else if now.ticks() >= max_ticks {
        RunState::Stopped(StopReason::BudgetExhausted)
    } else {
        RunState::Running
    }
}
