//! The device-under-test contract.
//!
//! Any hardware model the driver can step implements [`Dut`]: two writable
//! input pins, a blocking `evaluate`, readable observation points, a
//! completion flag, and a teardown hook. [`DutSession`] scopes a DUT to one
//! run and guarantees the teardown hook fires exactly once.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{DutError, SimError};
use crate::sequencer::Pins;
use crate::time::SimTime;

/// An observation point exposed by a DUT.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Probe {
    /// Hierarchical signal name used in waveforms (e.g. `core_addr`).
    pub name: String,
    /// Short label used in the text log (e.g. `Addr`).
    pub label: String,
    /// Width in bits, 1..=64.
    pub width: u32,
}

impl Probe {
    /// Creates a probe.
    pub fn new(name: impl Into<String>, label: impl Into<String>, width: u32) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            width,
        }
    }

    /// Number of hex digits needed to show the full width.
    pub fn hex_digits(&self) -> usize {
        self.width.div_ceil(4).max(1) as usize
    }

    /// Masks `value` down to the probe width.
    pub fn mask(&self, value: u64) -> u64 {
        if self.width >= 64 {
            value
        } else {
            value & ((1u64 << self.width) - 1)
        }
    }
}

/// An evaluable hardware model.
///
/// The driver writes inputs with [`set_clock`](Dut::set_clock) and
/// [`set_reset_n`](Dut::set_reset_n), then calls [`evaluate`](Dut::evaluate)
/// with the current simulated time so time-dependent logic inside the model
/// resolves against the same tick the driver is on.
pub trait Dut {
    /// Instance name, used as the waveform scope.
    fn name(&self) -> &str;

    /// Drives the clock input.
    fn set_clock(&mut self, level: bool);

    /// Drives the active-low reset input.
    fn set_reset_n(&mut self, level: bool);

    /// Settles the model for the current inputs at time `now`.
    fn evaluate(&mut self, now: SimTime) -> Result<(), DutError>;

    /// The observation points this model exposes.
    fn probes(&self) -> &[Probe];

    /// Reads the current value of the probe at `index` in [`probes`](Dut::probes).
    fn read_probe(&self, index: usize) -> u64;

    /// Returns `true` once the model has signalled completion.
    fn finished(&self) -> bool {
        false
    }

    /// Releases model resources. Called exactly once per run.
    fn finalize(&mut self);
}

impl<D: Dut + ?Sized> Dut for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn set_clock(&mut self, level: bool) {
        (**self).set_clock(level);
    }

    fn set_reset_n(&mut self, level: bool) {
        (**self).set_reset_n(level);
    }

    fn evaluate(&mut self, now: SimTime) -> Result<(), DutError> {
        (**self).evaluate(now)
    }

    fn probes(&self) -> &[Probe] {
        (**self).probes()
    }

    fn read_probe(&self, index: usize) -> u64 {
        (**self).read_probe(index)
    }

    fn finished(&self) -> bool {
        (**self).finished()
    }

    fn finalize(&mut self) {
        (**self).finalize();
    }
}

/// Exclusive, run-scoped access to a DUT.
///
/// Creating a session drives the power-on pin levels. Dropping it finalizes
/// the DUT if [`finalize`](DutSession::finalize) has not been called, so
/// teardown happens on every exit path including `?` returns and panics.
pub struct DutSession<'a, D: Dut + ?Sized> {
    dut: &'a mut D,
    finalized: bool,
}

impl<'a, D: Dut + ?Sized> DutSession<'a, D> {
    /// Takes the DUT for the duration of a run and drives power-on levels.
    pub fn new(dut: &'a mut D) -> Self {
        dut.set_clock(Pins::POWER_ON.clock);
        dut.set_reset_n(Pins::POWER_ON.reset_n);
        Self {
            dut,
            finalized: false,
        }
    }

    /// Writes pin levels to the DUT inputs.
    pub fn drive(&mut self, pins: Pins) {
        self.dut.set_clock(pins.clock);
        self.dut.set_reset_n(pins.reset_n);
    }

    /// Evaluates the DUT, tagging failures with the simulated time.
    pub fn evaluate(&mut self, now: SimTime) -> Result<(), SimError> {
        self.dut
            .evaluate(now)
            .map_err(|e| SimError::DutEvaluation {
                time: now,
                reason: e.0,
            })
    }

    /// Shared access to the DUT.
    pub fn dut(&self) -> &D {
        self.dut
    }

    /// Finalizes the DUT. Further calls are no-ops.
    pub fn finalize(&mut self) {
        if !self.finalized {
            self.finalized = true;
            self.dut.finalize();
        }
    }

    /// Returns `true` if the DUT has been finalized.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl<D: Dut + ?Sized> Drop for DutSession<'_, D> {
    fn drop(&mut self) {
        self.finalize();
    }
}

/// Builds DUT instances from forwarded command-line arguments.
pub trait DutFactory {
    /// Model name used to select this factory.
    fn name(&self) -> &'static str;

    /// One-line description shown in listings.
    fn description(&self) -> &'static str;

    /// Constructs a DUT. Inputs start at clock low, reset asserted.
    fn build(&self, args: &[String]) -> Result<Box<dyn Dut>, SimError>;
}

/// Verilator-style `+key=value` / `+flag` arguments.
///
/// Arguments that do not start with `+` belong to somebody else and are
/// ignored.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PlusArgs {
    values: BTreeMap<String, Option<String>>,
}

impl PlusArgs {
    /// Collects plusargs from an argument list. Later occurrences win.
    pub fn parse(args: &[String]) -> Self {
        let mut values = BTreeMap::new();
        for arg in args {
            let Some(body) = arg.strip_prefix('+') else {
                continue;
            };
            match body.split_once('=') {
                Some((key, value)) => {
                    values.insert(key.to_string(), Some(value.to_string()));
                }
                None => {
                    values.insert(body.to_string(), None);
                }
            }
        }
        Self { values }
    }

    /// Raw string value of `+key=value`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_deref())
    }

    /// Numeric value of `+key=value`, decimal or `0x` hex.
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>, SimError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        parse_number(raw)
            .map(Some)
            .ok_or_else(|| SimError::DutConstruction(format!("+{key}={raw} is not a number")))
    }
}

fn parse_number(raw: &str) -> Option<u64> {
    let raw = raw.trim().replace('_', "");
    match raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting {
        finalized: u32,
        clock: bool,
        reset_n: bool,
        probes: Vec<Probe>,
    }

    impl Counting {
        fn new() -> Self {
            Self {
                finalized: 0,
                clock: true,
                reset_n: true,
                probes: vec![Probe::new("addr", "Addr", 16)],
            }
        }
    }

    impl Dut for Counting {
        fn name(&self) -> &str {
            "counting"
        }
        fn set_clock(&mut self, level: bool) {
            self.clock = level;
        }
        fn set_reset_n(&mut self, level: bool) {
            self.reset_n = level;
        }
        fn evaluate(&mut self, _now: SimTime) -> Result<(), DutError> {
            Ok(())
        }
        fn probes(&self) -> &[Probe] {
            &self.probes
        }
        fn read_probe(&self, _index: usize) -> u64 {
            0
        }
        fn finalize(&mut self) {
            self.finalized += 1;
        }
    }

    #[test]
    fn session_drives_power_on() {
        let mut dut = Counting::new();
        {
            let session = DutSession::new(&mut dut);
            assert!(!session.is_finalized());
        }
        assert!(!dut.clock);
        assert!(!dut.reset_n);
    }

    #[test]
    fn session_finalizes_once_on_drop() {
        let mut dut = Counting::new();
        {
            let mut session = DutSession::new(&mut dut);
            session.finalize();
            session.finalize();
        }
        assert_eq!(dut.finalized, 1);
    }

    #[test]
    fn session_finalizes_when_dropped_without_call() {
        let mut dut = Counting::new();
        drop(DutSession::new(&mut dut));
        assert_eq!(dut.finalized, 1);
    }

    #[test]
    fn boxed_dut_forwards() {
        let mut boxed: Box<dyn Dut> = Box::new(Counting::new());
        boxed.set_clock(true);
        assert_eq!(boxed.name(), "counting");
        assert_eq!(boxed.probes().len(), 1);
        assert!(!boxed.finished());
    }

    #[test]
    fn probe_hex_digits() {
        assert_eq!(Probe::new("a", "A", 16).hex_digits(), 4);
        assert_eq!(Probe::new("a", "A", 13).hex_digits(), 4);
        assert_eq!(Probe::new("a", "A", 1).hex_digits(), 1);
        assert_eq!(Probe::new("a", "A", 64).hex_digits(), 16);
    }

    #[test]
    fn probe_mask() {
        assert_eq!(Probe::new("a", "A", 16).mask(0x1_2345), 0x2345);
        assert_eq!(Probe::new("a", "A", 64).mask(u64::MAX), u64::MAX);
    }

    #[test]
    fn plusargs_parse() {
        let args: Vec<String> = ["+trace", "+reset_vector=0xFFFE", "-v", "+stride=2", "file.bin"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let plus = PlusArgs::parse(&args);
        // Bare flags carry no value; non-plus arguments are skipped.
        assert_eq!(plus.get("trace"), None);
        assert_eq!(plus.get("v"), None);
        assert_eq!(plus.get("stride"), Some("2"));
        assert_eq!(plus.get_u64("reset_vector").unwrap(), Some(0xfffe));
        assert_eq!(plus.get_u64("stride").unwrap(), Some(2));
        assert_eq!(plus.get_u64("missing").unwrap(), None);
    }

    #[test]
    fn plusargs_bad_number() {
        let plus = PlusArgs::parse(&["+stride=fast".to_string()]);
        assert!(matches!(
            plus.get_u64("stride"),
            Err(SimError::DutConstruction(_))
        ));
    }

    #[test]
    fn plusargs_last_wins() {
        let plus = PlusArgs::parse(&["+stride=1".to_string(), "+stride=3".to_string()]);
        assert_eq!(plus.get("stride"), Some("3"));
    }
}
