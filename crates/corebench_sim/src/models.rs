//! Behavioural DUT models.
//!
//! These stand in for a compiled hardware model so the driver can be run and
//! tested end to end. They model the observable address bus only.

use crate::dut::{Dut, DutFactory, PlusArgs, Probe};
use crate::error::{DutError, SimError};
use crate::sequencer::Pins;
use crate::time::SimTime;

/// Returns the built-in factory with the given model name.
pub fn factory(name: &str) -> Option<Box<dyn DutFactory>> {
    match name {
        "counter" => Some(Box::new(CounterCoreFactory)),
        _ => None,
    }
}

/// Names of all built-in models.
pub const MODEL_NAMES: &[&str] = &["counter"];

/// The address-bus probe every model here exposes.
fn addr_probe() -> Probe {
    Probe::new("core_addr", "Addr", 16)
}

/// A free-running fetch counter on a 16-bit address bus.
///
/// While reset is asserted the bus holds the reset vector. On every rising
/// clock edge out of reset the address advances by `stride`.
#[derive(Debug)]
pub struct CounterCore {
    pins: Pins,
    prev_clock: bool,
    addr: u16,
    reset_vector: u16,
    stride: u16,
    finish_at: Option<u16>,
    fail_at: Option<u64>,
    finished: bool,
    finalized: bool,
    probes: Vec<Probe>,
}

impl CounterCore {
    /// Creates a counter that restarts at `reset_vector` and steps by `stride`.
    pub fn new(reset_vector: u16, stride: u16) -> Self {
        Self {
            pins: Pins::POWER_ON,
            prev_clock: false,
            addr: reset_vector,
            reset_vector,
            stride,
            finish_at: None,
            fail_at: None,
            finished: false,
            finalized: false,
            probes: vec![addr_probe()],
        }
    }

    /// Raises completion once the bus reaches `addr`.
    pub fn with_finish_at(mut self, addr: u16) -> Self {
        self.finish_at = Some(addr);
        self
    }

    /// Fails evaluation at tick `tick`.
    pub fn with_fail_at(mut self, tick: u64) -> Self {
        self.fail_at = Some(tick);
        self
    }

    /// Builds a counter from plusargs:
    /// `+reset_vector=`, `+stride=`, `+finish_at=`, `+fail_at=`.
    pub fn from_plusargs(plus: &PlusArgs) -> Result<Self, SimError> {
        let reset_vector = narrow(plus, "reset_vector")?.unwrap_or(0);
        let stride = narrow(plus, "stride")?.unwrap_or(1);
        let mut core = Self::new(reset_vector, stride);
        core.finish_at = narrow(plus, "finish_at")?;
        core.fail_at = plus.get_u64("fail_at")?;
        Ok(core)
    }

    /// Current address on the bus.
    pub fn addr(&self) -> u16 {
        self.addr
    }

    /// Returns `true` once [`Dut::finalize`] has run.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

fn narrow(plus: &PlusArgs, key: &str) -> Result<Option<u16>, SimError> {
    plus.get_u64(key)?
        .map(|v| {
            u16::try_from(v).map_err(|_| {
                SimError::DutConstruction(format!("+{key}={v:#x} does not fit a 16-bit bus"))
            })
        })
        .transpose()
}

impl Dut for CounterCore {
    fn name(&self) -> &str {
        "counter_core"
    }

    fn set_clock(&mut self, level: bool) {
        self.pins.clock = level;
    }

    fn set_reset_n(&mut self, level: bool) {
        self.pins.reset_n = level;
    }

    fn evaluate(&mut self, now: SimTime) -> Result<(), DutError> {
        if self.fail_at == Some(now.ticks()) {
            return Err(DutError::new(format!("injected fault at tick {now}")));
        }
        let posedge = self.pins.clock && !self.prev_clock;
        self.prev_clock = self.pins.clock;

        if self.pins.in_reset() {
            self.addr = self.reset_vector;
        } else if posedge {
            self.addr = self.addr.wrapping_add(self.stride);
            if self.finish_at == Some(self.addr) {
                self.finished = true;
            }
        }
        Ok(())
    }

    fn probes(&self) -> &[Probe] {
        &self.probes
    }

    fn read_probe(&self, _index: usize) -> u64 {
        u64::from(self.addr)
    }

    fn finished(&self) -> bool {
        self.finished
    }

    fn finalize(&mut self) {
        self.finalized = true;
    }
}

/// Factory for [`CounterCore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterCoreFactory;

impl DutFactory for CounterCoreFactory {
    fn name(&self) -> &'static str {
        "counter"
    }

    fn description(&self) -> &'static str {
        "free-running 16-bit fetch counter (+reset_vector, +stride, +finish_at, +fail_at)"
    }

    fn build(&self, args: &[String]) -> Result<Box<dyn Dut>, SimError> {
        let plus = PlusArgs::parse(args);
        Ok(Box::new(CounterCore::from_plusargs(&plus)?))
    }
}

/// A DUT that replays a fixed address sequence and records what it saw.
///
/// The address presented after the k-th rising edge is `script[k % len]`.
/// Every call is logged so tests can check exactly how the driver used it.
#[derive(Debug)]
pub struct ScriptedDut {
    script: Vec<u64>,
    pins: Pins,
    prev_clock: bool,
    rising_edges: usize,
    addr: u64,
    fail_at: Option<SimTime>,
    finish_after: Option<usize>,
    probes: Vec<Probe>,
    /// Time and input levels of every `evaluate` call, in order.
    pub evaluations: Vec<(SimTime, Pins)>,
    /// Number of `finalize` calls.
    pub finalize_calls: u32,
}

impl ScriptedDut {
    /// Creates a scripted DUT. An empty script reads as zero.
    pub fn new(script: Vec<u64>) -> Self {
        Self {
            script,
            pins: Pins::POWER_ON,
            prev_clock: false,
            rising_edges: 0,
            addr: 0,
            fail_at: None,
            finish_after: None,
            probes: vec![addr_probe()],
            evaluations: Vec::new(),
            finalize_calls: 0,
        }
    }

    /// Fails the evaluation at `tick`.
    pub fn fail_at(mut self, tick: u64) -> Self {
        self.fail_at = Some(SimTime::from_ticks(tick));
        self
    }

    /// Signals completion after `edges` rising edges.
    pub fn finish_after(mut self, edges: usize) -> Self {
        self.finish_after = Some(edges);
        self
    }

    /// Number of rising edges seen so far.
    pub fn rising_edges(&self) -> usize {
        self.rising_edges
    }
}

impl Dut for ScriptedDut {
    fn name(&self) -> &str {
        "scripted"
    }

    fn set_clock(&mut self, level: bool) {
        self.pins.clock = level;
    }

    fn set_reset_n(&mut self, level: bool) {
        self.pins.reset_n = level;
    }

    fn evaluate(&mut self, now: SimTime) -> Result<(), DutError> {
        self.evaluations.push((now, self.pins));
        if self.fail_at == Some(now) {
            return Err(DutError::new("scripted failure"));
        }
        if self.pins.clock && !self.prev_clock {
            if !self.script.is_empty() {
                self.addr = self.script[self.rising_edges % self.script.len()];
            }
            self.rising_edges += 1;
        }
        self.prev_clock = self.pins.clock;
        Ok(())
    }

    fn probes(&self) -> &[Probe] {
        &self.probes
    }

    fn read_probe(&self, _index: usize) -> u64 {
        self.addr
    }

    fn finished(&self) -> bool {
        self.finish_after
            .is_some_and(|edges| self.rising_edges >= edges)
    }

    fn finalize(&mut self) {
        self.finalize_calls += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(dut: &mut dyn Dut, t: u64, clock: bool, reset_n: bool) {
        dut.set_clock(clock);
        dut.set_reset_n(reset_n);
        dut.evaluate(SimTime::from_ticks(t)).unwrap();
    }

    #[test]
    fn counter_holds_vector_in_reset() {
        let mut core = CounterCore::new(0xfffe, 1);
        step(&mut core, 1, true, false);
        step(&mut core, 2, false, false);
        step(&mut core, 3, true, false);
        assert_eq!(core.addr(), 0xfffe);
    }

    #[test]
    fn counter_advances_on_rising_edge_only() {
        let mut core = CounterCore::new(0x1000, 2);
        step(&mut core, 1, true, true);
        assert_eq!(core.addr(), 0x1002);
        step(&mut core, 2, false, true);
        assert_eq!(core.addr(), 0x1002);
        step(&mut core, 3, true, true);
        assert_eq!(core.addr(), 0x1004);
    }

    #[test]
    fn counter_wraps() {
        let mut core = CounterCore::new(0xffff, 1);
        step(&mut core, 1, true, true);
        assert_eq!(core.addr(), 0x0000);
    }

    #[test]
    fn counter_finish_at() {
        let mut core = CounterCore::new(0, 1).with_finish_at(2);
        step(&mut core, 1, true, true);
        assert!(!core.finished());
        step(&mut core, 2, false, true);
        step(&mut core, 3, true, true);
        assert!(core.finished());
    }

    #[test]
    fn counter_fail_at() {
        let mut core = CounterCore::new(0, 1).with_fail_at(3);
        assert!(core.evaluate(SimTime::from_ticks(2)).is_ok());
        let err = core.evaluate(SimTime::from_ticks(3)).unwrap_err();
        assert!(err.to_string().contains("tick 3"));
    }

    #[test]
    fn counter_from_plusargs() {
        let args: Vec<String> = vec!["+reset_vector=0xfffe".into(), "+stride=4".into()];
        let core = CounterCore::from_plusargs(&PlusArgs::parse(&args)).unwrap();
        assert_eq!(core.addr(), 0xfffe);
        assert_eq!(core.stride, 4);
    }

    #[test]
    fn counter_rejects_wide_vector() {
        let args = vec!["+reset_vector=0x10000".to_string()];
        assert!(matches!(
            CounterCore::from_plusargs(&PlusArgs::parse(&args)),
            Err(SimError::DutConstruction(_))
        ));
    }

    #[test]
    fn factory_lookup() {
        let f = factory("counter").unwrap();
        assert_eq!(f.name(), "counter");
        let dut = f.build(&["+reset_vector=0x100".to_string()]).unwrap();
        assert_eq!(dut.read_probe(0), 0x100);
        assert!(factory("m68k").is_none());
        assert!(MODEL_NAMES.contains(&"counter"));
    }

    #[test]
    fn scripted_replays_on_rising_edges() {
        let mut dut = ScriptedDut::new(vec![10, 20, 30]);
        let mut seen = Vec::new();
        for t in 1..=8u64 {
            step(&mut dut, t, t % 2 == 1, true);
            if t % 2 == 1 {
                seen.push(dut.read_probe(0));
            }
        }
        assert_eq!(seen, vec![10, 20, 30, 10]);
        assert_eq!(dut.rising_edges(), 4);
        assert_eq!(dut.evaluations.len(), 8);
    }

    #[test]
    fn scripted_finish_after() {
        let mut dut = ScriptedDut::new(vec![1]).finish_after(2);
        step(&mut dut, 1, true, true);
        assert!(!dut.finished());
        step(&mut dut, 2, false, true);
        step(&mut dut, 3, true, true);
        assert!(dut.finished());
    }
}
