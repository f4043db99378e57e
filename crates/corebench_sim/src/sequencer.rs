//! Clock and reset stimulus generation.
//!
//! The [`Sequencer`] toggles the clock once per tick and updates the
//! active-low reset only on the configured sampling edge, the way a
//! synchronous-reset flop sees it. Between qualifying edges the previous
//! reset level is held.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SimError;
use crate::time::SimTime;

/// A clock transition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    /// 0 → 1.
    Rising,
    /// 1 → 0.
    #[default]
    Falling,
}

impl Edge {
    /// Returns the edge that produced the given new clock level.
    pub fn producing(clock: bool) -> Self {
        if clock {
            Edge::Rising
        } else {
            Edge::Falling
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Rising => write!(f, "rising"),
            Edge::Falling => write!(f, "falling"),
        }
    }
}

/// Half-open tick interval `[start, end)` during which reset is asserted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetWindow {
    start: u64,
    end: u64,
}

impl ResetWindow {
    /// The window used when nothing else is configured: ticks 1 through 9.
    pub const DEFAULT: ResetWindow = ResetWindow { start: 1, end: 10 };

    /// Creates a window, rejecting empty or inverted intervals.
    pub fn new(start: u64, end: u64) -> Result<Self, SimError> {
        if start >= end {
            return Err(SimError::Configuration(format!(
                "reset window [{start}, {end}) is empty"
            )));
        }
        Ok(Self { start, end })
    }

    /// First tick with reset asserted.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// First tick after `start` with reset deasserted.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Returns `true` if `time` falls inside the window.
    pub fn contains(&self, time: SimTime) -> bool {
        (self.start..self.end).contains(&time.ticks())
    }
}

impl Default for ResetWindow {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Levels driven onto the DUT's input pins for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pins {
    /// Clock level.
    pub clock: bool,
    /// Active-low reset level: `false` means reset is asserted.
    pub reset_n: bool,
}

impl Pins {
    /// Power-on state: clock low, reset asserted.
    pub const POWER_ON: Pins = Pins {
        clock: false,
        reset_n: false,
    };

    /// Returns `true` if reset is asserted.
    pub fn in_reset(&self) -> bool {
        !self.reset_n
    }
}

/// Drives the clock and the active-low reset.
///
/// With no reset window the reset pin is never updated and stays at its
/// power-on (asserted) level for the whole run.
#[derive(Debug, Clone)]
pub struct Sequencer {
    pins: Pins,
    window: Option<ResetWindow>,
    edge: Edge,
    toggles: u64,
}

impl Sequencer {
    /// Creates a sequencer in the power-on state.
    pub fn new(window: Option<ResetWindow>, edge: Edge) -> Self {
        Self {
            pins: Pins::POWER_ON,
            window,
            edge,
            toggles: 0,
        }
    }

    /// Computes the pin levels for the tick at `now`.
    ///
    /// Time zero is the power-on state and does not toggle the clock.
    pub fn tick(&mut self, now: SimTime) -> Pins {
        if now == SimTime::ZERO {
            self.pins = Pins::POWER_ON;
            return self.pins;
        }

        self.pins.clock = !self.pins.clock;
        self.toggles += 1;

        if Edge::producing(self.pins.clock) == self.edge {
            if let Some(window) = &self.window {
                self.pins.reset_n = !window.contains(now);
            }
        }
        self.pins
    }

    /// Number of clock toggles since power-on.
    pub fn toggles(&self) -> u64 {
        self.toggles
    }
}
