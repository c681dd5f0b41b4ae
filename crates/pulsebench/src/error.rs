use crate::{SimTime, Tolerance};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A malformed configuration, rejected before any stimulus is applied.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("prescale must be a positive even integer, got {0}")]
    InvalidPrescale(u64),
    #[error("duty cycle must lie within [0, 1], got {0}")]
    InvalidDutyCycle(f64),
    #[error("data width must be between 1 and 32 bits, got {0}")]
    InvalidDataWidth(u64),
    #[error("clock period must be non-zero and representable in picoseconds, got {0} ns")]
    InvalidClockPeriod(u64),
    #[error("time limit of {0} us is not representable in picoseconds")]
    InvalidTimeLimit(u64),
    #[error("at least one cycle sample is required")]
    NoSamples,
    #[error("scenario matrix has no '{0}' values")]
    EmptyMatrix(&'static str),
    #[error("parameter '{0}' is not set")]
    MissingParameter(String),
    #[error("parameter '{name}' must be a non-negative integer, got {value}")]
    InvalidParameter { name: String, value: String },
    #[error("failed to read '{}': {message}", .path.display())]
    Read { path: PathBuf, message: String },
    #[error("failed to parse parameter file: {0}")]
    Parse(String),
}

/// The measured statistic a verification failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    MeanDuty,
    MeanPeriod,
    MeanLeftPad,
    MeanRightPad,
    WindowPulses,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quantity::MeanDuty => "mean duty cycle",
            Quantity::MeanPeriod => "mean period (ns)",
            Quantity::MeanLeftPad => "mean left pad (ns)",
            Quantity::MeanRightPad => "mean right pad (ns)",
            Quantity::WindowPulses => "window pulses",
        };
        f.write_str(name)
    }
}

/// A measured statistic outside the tolerance of its expected value.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{quantity}: measured {measured}, expected {expected} ({tolerance})")]
pub struct VerificationFailure {
    pub quantity: Quantity,
    pub measured: f64,
    pub expected: f64,
    pub tolerance: Tolerance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallReason {
    /// Nothing is left in the event queue.
    EndOfSimulation,
    /// The next event lies beyond the configured limit.
    TimeLimit(SimTime),
}

impl fmt::Display for StallReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StallReason::EndOfSimulation => write!(f, "no events left to simulate"),
            StallReason::TimeLimit(limit) => write!(f, "time limit of {} reached", limit),
        }
    }
}

#[derive(Error, Debug)]
pub enum BenchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("verification failed: {0}")]
    Verification(#[from] VerificationFailure),
    #[error("simulation stalled at {time}: {reason}")]
    Stall { time: SimTime, reason: StallReason },
    #[error("unknown signal '{0}'")]
    UnknownSignal(String),
    #[error("signal '{name}' redeclared with width {width}, previously {previous}")]
    SignalRedeclared {
        name: String,
        width: usize,
        previous: usize,
    },
    #[error("waveform dump failed: {0}")]
    Io(#[from] std::io::Error),
}
