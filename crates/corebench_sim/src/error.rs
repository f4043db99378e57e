//! Error types for the simulation driver.
//!
//! [`SimError`] covers everything that can stop a run. [`TraceError`] is kept
//! separate because trace failures are only fatal when tracing is required.

use std::io;

use crate::time::SimTime;

/// Errors raised by a trace sink while opening, recording, or closing.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// The underlying writer failed.
    #[error("trace I/O error: {0}")]
    Io(#[from] io::Error),

    /// A value was recorded for a signal that was never declared.
    #[error("signal '{0}' was not declared to the trace sink")]
    UnknownSignal(String),

    /// The sink was written to after it had been closed.
    #[error("trace sink already closed")]
    Closed,
}

/// Errors that can occur while setting up or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The device under test reported an unrecoverable condition during `evaluate()`.
    #[error("DUT evaluation failed at tick {time}: {reason}")]
    DutEvaluation {
        /// Simulated time of the failing evaluation.
        time: SimTime,
        /// Description reported by the DUT.
        reason: String,
    },

    /// The DUT could not be constructed from the supplied arguments.
    #[error("DUT construction failed: {0}")]
    DutConstruction(String),

    /// The run configuration was rejected before the loop started.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The simulated-time counter would wrap.
    #[error("simulated time overflow")]
    TimeOverflow,

    /// A required trace sink failed.
    #[error(transparent)]
    TraceSink(#[from] TraceError),
}

/// A failure reported by a DUT from inside `evaluate()`.
///
/// The driver wraps it into [`SimError::DutEvaluation`] together with the
/// simulated time at which it happened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct DutError(pub String);

impl DutError {
    /// Creates a new DUT error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dut_evaluation_display() {
        let e = SimError::DutEvaluation {
            time: SimTime::from_ticks(42),
            reason: "bus fault".into(),
        };
        assert_eq!(e.to_string(), "DUT evaluation failed at tick 42: bus fault");
    }

    #[test]
    fn configuration_display() {
        let e = SimError::Configuration("reset window is empty".into());
        assert_eq!(e.to_string(), "invalid configuration: reset window is empty");
    }

    #[test]
    fn overflow_display() {
        assert_eq!(SimError::TimeOverflow.to_string(), "simulated time overflow");
    }

    #[test]
    fn trace_error_is_transparent() {
        let e = SimError::from(TraceError::UnknownSignal("core_addr".into()));
        assert_eq!(
            e.to_string(),
            "signal 'core_addr' was not declared to the trace sink"
        );
    }

    #[test]
    fn trace_io_display() {
        let e = TraceError::Io(io::Error::new(io::ErrorKind::NotFound, "no such dir"));
        assert!(e.to_string().starts_with("trace I/O error"));
    }

    #[test]
    fn dut_error_message() {
        assert_eq!(DutError::new("halted").to_string(), "halted");
    }
}
