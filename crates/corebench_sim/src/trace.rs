//! Observation sinks.
//!
//! The [`TraceSink`] trait abstracts where rising-edge samples go.
//! [`VcdSink`] writes an IEEE 1364 Value Change Dump, [`TextSink`] writes
//! `Addr: 00ff` style lines, and [`NullSink`] drops everything. [`SinkSet`]
//! fans samples out to several sinks and applies the degrade policy: an
//! optional sink that fails is switched off and its error is kept for the
//! run report, a required sink that fails stops the run.

use std::io::Write;

use serde::Serialize;
use tracing::{debug, warn};

use crate::dut::Probe;
use crate::error::{SimError, TraceError};
use crate::sequencer::Pins;
use crate::time::SimTime;

/// Waveform name of the driven clock.
pub const CLOCK_SIGNAL: &str = "clk";
/// Waveform name of the driven active-low reset.
pub const RESET_SIGNAL: &str = "reset_n";

/// Probe values read after evaluation on a rising edge.
///
/// `values[i]` belongs to `probes[i]` of the DUT that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ObservationSample {
    /// Tick the sample was taken at.
    pub time: SimTime,
    /// Reset level at the time of the sample (`false` = asserted).
    pub reset_n: bool,
    /// Probe values, masked to probe width.
    pub values: Vec<u64>,
}

/// A destination for observation samples.
pub trait TraceSink {
    /// Declares the signals that will be recorded under `scope`.
    fn declare(&mut self, scope: &str, probes: &[Probe]) -> Result<(), TraceError>;

    /// Records the value of one declared signal at `time`.
    fn record(&mut self, time: SimTime, signal: &str, value: u64) -> Result<(), TraceError>;

    /// Flushes and closes the sink. Recording after close is an error.
    fn close(&mut self) -> Result<(), TraceError>;

    /// Records every value of `sample`, pairing `values[i]` with `probes[i]`.
    fn record_sample(
        &mut self,
        probes: &[Probe],
        sample: &ObservationSample,
    ) -> Result<(), TraceError> {
        for (probe, value) in probes.iter().zip(&sample.values) {
            self.record(sample.time, &probe.name, *value)?;
        }
        Ok(())
    }

    /// Records the driven clock and reset levels at `time`.
    ///
    /// Called every tick, falling edges included. Sinks that only log
    /// probe values keep the default, which ignores the pins.
    fn record_pins(&mut self, _time: SimTime, _pins: Pins) -> Result<(), TraceError> {
        Ok(())
    }
}

/// A sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn declare(&mut self, _scope: &str, _probes: &[Probe]) -> Result<(), TraceError> {
        Ok(())
    }

    fn record(&mut self, _time: SimTime, _signal: &str, _value: u64) -> Result<(), TraceError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), TraceError> {
        Ok(())
    }
}

/// Human-readable sample log: one `<label>: <hex>` line per recorded value.
pub struct TextSink<W: Write> {
    writer: W,
    probes: Vec<Probe>,
    closed: bool,
}

impl<W: Write> TextSink<W> {
    /// Creates a text sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            probes: Vec::new(),
            closed: false,
        }
    }
}

impl<W: Write> TraceSink for TextSink<W> {
    fn declare(&mut self, _scope: &str, probes: &[Probe]) -> Result<(), TraceError> {
        self.probes = probes.to_vec();
        Ok(())
    }

    fn record(&mut self, _time: SimTime, signal: &str, value: u64) -> Result<(), TraceError> {
        if self.closed {
            return Err(TraceError::Closed);
        }
        let probe = self
            .probes
            .iter()
            .find(|p| p.name == signal)
            .ok_or_else(|| TraceError::UnknownSignal(signal.to_string()))?;
        writeln!(
            self.writer,
            "{}: {:0width$x}",
            probe.label,
            value,
            width = probe.hex_digits()
        )?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TraceError> {
        self.closed = true;
        self.writer.flush()?;
        Ok(())
    }
}

/// One declared VCD variable.
struct VcdVar {
    name: String,
    code: String,
    width: u32,
    last: Option<u64>,
}

/// VCD (Value Change Dump) writer following IEEE 1364.
///
/// Every scope carries 1-bit `clk` and `reset_n` wires ahead of the DUT
/// probes. Only value changes are written; a sample that repeats the
/// previous value of a signal produces no output for it.
pub struct VcdSink<W: Write> {
    writer: W,
    timescale: String,
    vars: Vec<VcdVar>,
    header_written: bool,
    current_time: Option<SimTime>,
    closed: bool,
}

impl<W: Write> VcdSink<W> {
    /// Creates a VCD sink where one tick is one nanosecond.
    pub fn new(writer: W) -> Self {
        Self::with_timescale(writer, "1ns")
    }

    /// Creates a VCD sink with an explicit `$timescale` for one tick.
    pub fn with_timescale(writer: W, timescale: impl Into<String>) -> Self {
        Self {
            writer,
            timescale: timescale.into(),
            vars: Vec::new(),
            header_written: false,
            current_time: None,
            closed: false,
        }
    }

    fn write_header(&mut self) -> Result<(), TraceError> {
        writeln!(self.writer, "$version")?;
        writeln!(self.writer, "  corebench {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$timescale")?;
        writeln!(self.writer, "  {}", self.timescale)?;
        writeln!(self.writer, "$end")?;
        self.header_written = true;
        Ok(())
    }

    /// Generates a VCD identifier code from a sequential index.
    ///
    /// Uses printable ASCII starting at `!` (0x21); indices >= 94 spill
    /// into additional characters.
    fn make_id_code(index: usize) -> String {
        let mut result = String::new();
        let mut idx = index;
        loop {
            let c = (b'!' + (idx % 94) as u8) as char;
            result.push(c);
            idx /= 94;
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
        result
    }

    fn declare_var(&mut self, name: &str, width: u32) -> Result<(), TraceError> {
        let code = Self::make_id_code(self.vars.len());
        writeln!(self.writer, "$var wire {width} {code} {name} $end")?;
        self.vars.push(VcdVar {
            name: name.to_string(),
            code,
            width,
            last: None,
        });
        Ok(())
    }

    fn format_value(value: u64, width: u32) -> String {
        if width == 1 {
            let bit = if value & 1 == 1 { "1" } else { "0" };
            bit.to_string()
        } else {
            format!("b{:0width$b}", value, width = width as usize)
        }
    }
}

impl<W: Write> TraceSink for VcdSink<W> {
    fn declare(&mut self, scope: &str, probes: &[Probe]) -> Result<(), TraceError> {
        if !self.header_written {
            self.write_header()?;
        }
        writeln!(self.writer, "$scope module {scope} $end")?;
        self.declare_var(CLOCK_SIGNAL, 1)?;
        self.declare_var(RESET_SIGNAL, 1)?;
        for probe in probes {
            self.declare_var(&probe.name, probe.width)?;
        }
        writeln!(self.writer, "$upscope $end")?;
        Ok(())
    }

    fn record(&mut self, time: SimTime, signal: &str, value: u64) -> Result<(), TraceError> {
        if self.closed {
            return Err(TraceError::Closed);
        }
        let index = self
            .vars
            .iter()
            .position(|v| v.name == signal)
            .ok_or_else(|| TraceError::UnknownSignal(signal.to_string()))?;
        if self.vars[index].last == Some(value) {
            return Ok(());
        }

        if self.current_time != Some(time) {
            if self.current_time.is_none() {
                writeln!(self.writer, "$enddefinitions $end")?;
            }
            writeln!(self.writer, "#{time}")?;
            self.current_time = Some(time);
        }

        let var = &mut self.vars[index];
        var.last = Some(value);
        let val_str = Self::format_value(value, var.width);
        if var.width == 1 {
            writeln!(self.writer, "{val_str}{}", var.code)?;
        } else {
            writeln!(self.writer, "{val_str} {}", var.code)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), TraceError> {
        if self.closed {
            return Ok(());
        }
        if self.current_time.is_none() {
            if !self.header_written {
                self.write_header()?;
            }
            writeln!(self.writer, "$enddefinitions $end")?;
        }
        self.closed = true;
        self.writer.flush()?;
        Ok(())
    }

    fn record_pins(&mut self, time: SimTime, pins: Pins) -> Result<(), TraceError> {
        self.record(time, CLOCK_SIGNAL, u64::from(pins.clock))?;
        self.record(time, RESET_SIGNAL, u64::from(pins.reset_n))
    }
}

struct SinkEntry {
    name: String,
    sink: Box<dyn TraceSink>,
    active: bool,
}

/// Fan-out over any number of sinks with a shared failure policy.
///
/// An empty set behaves like [`NullSink`].
pub struct SinkSet {
    entries: Vec<SinkEntry>,
    required: bool,
    errors: Vec<String>,
}

impl SinkSet {
    /// Creates an empty set. With `required`, any sink failure is fatal.
    pub fn new(required: bool) -> Self {
        Self {
            entries: Vec::new(),
            required,
            errors: Vec::new(),
        }
    }

    /// Adds a sink under a display name.
    pub fn push(&mut self, name: impl Into<String>, sink: Box<dyn TraceSink>) {
        self.entries.push(SinkEntry {
            name: name.into(),
            sink,
            active: true,
        });
    }

    /// Notes a sink that could not even be opened.
    pub fn report_open_failure(&mut self, name: &str, err: TraceError) -> Result<(), SimError> {
        if self.required {
            return Err(err.into());
        }
        warn!(sink = name, error = %err, "trace sink unavailable, continuing without it");
        self.errors.push(format!("{name}: {err}"));
        Ok(())
    }

    /// Names of sinks still receiving samples.
    pub fn active(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.active)
            .map(|e| e.name.as_str())
            .collect()
    }

    /// Declares the DUT's probes to every active sink.
    pub fn declare(&mut self, scope: &str, probes: &[Probe]) -> Result<(), SimError> {
        self.each(|sink| sink.declare(scope, probes))
    }

    /// Forwards every value of `sample` to every active sink.
    pub fn record_sample(
        &mut self,
        probes: &[Probe],
        sample: &ObservationSample,
    ) -> Result<(), SimError> {
        self.each(|sink| sink.record_sample(probes, sample))
    }

    /// Forwards the driven pin levels to every active sink.
    pub fn record_pins(&mut self, time: SimTime, pins: Pins) -> Result<(), SimError> {
        self.each(|sink| sink.record_pins(time, pins))
    }

    /// Closes every sink, including ones switched off after a failure.
    pub fn close(&mut self) -> Result<(), SimError> {
        let mut first = None;
        for entry in &mut self.entries {
            if let Err(err) = entry.sink.close() {
                if entry.active {
                    warn!(sink = %entry.name, error = %err, "trace sink failed to close");
                    self.errors.push(format!("{}: {err}", entry.name));
                    if self.required && first.is_none() {
                        first = Some(err);
                    }
                }
            }
            entry.active = false;
        }
        match first {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Takes the trace errors collected so far.
    pub fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.errors)
    }

    fn each(
        &mut self,
        mut op: impl FnMut(&mut dyn TraceSink) -> Result<(), TraceError>,
    ) -> Result<(), SimError> {
        for entry in self.entries.iter_mut().filter(|e| e.active) {
            if let Err(err) = op(entry.sink.as_mut()) {
                if self.required {
                    return Err(err.into());
                }
                warn!(sink = %entry.name, error = %err, "trace sink failed, disabling it");
                debug!(sink = %entry.name, "remaining samples for this sink are dropped");
                self.errors.push(format!("{}: {err}", entry.name));
                entry.active = false;
            }
        }
        Ok(())
    }
}

impl Default for SinkSet {
    fn default() -> Self {
        Self::new(false)
    }
}
