//! Simulated time: a discrete tick counter owned by the evaluation loop.
//!
//! [`SimTime`] is a plain tick count. [`TimeBase`] owns the counter for the
//! duration of one run and is the only way to move it forward.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SimError;

/// A point in simulated time, measured in ticks since the start of the run.
///
/// One tick is one half clock period: every loop iteration advances time by
/// exactly one tick and toggles the clock once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(u64);

impl SimTime {
    /// Time zero, before the first iteration.
    pub const ZERO: SimTime = SimTime(0);

    /// Creates a time point from a raw tick count.
    pub fn from_ticks(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Returns the raw tick count.
    pub fn ticks(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The run-scoped simulated-time counter.
///
/// Starts at zero when the run starts, only moves forward, and is dropped
/// with the run.
#[derive(Debug, Default)]
pub struct TimeBase {
    now: SimTime,
}

impl TimeBase {
    /// Creates a time base at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances time by one tick and returns the new value.
    pub fn advance(&mut self) -> Result<SimTime, SimError> {
        let next = self.now.0.checked_add(1).ok_or(SimError::TimeOverflow)?;
        self.now = SimTime(next);
        Ok(self.now)
    }

    /// Returns the current time without advancing it.
    pub fn current(&self) -> SimTime {
        self.now
    }
}
