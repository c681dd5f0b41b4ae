//! Timing conformance checks for clocked PWM pulse generators.
//!
//! A test flow drives reset, configuration and enable through a
//! [`Testbench`], samples the edges of `out` (and `window`) with async edge
//! waits, and compares the averaged duty cycle, period and window pads against
//! closed-form expectations. Flows run on a small discrete-event
//! [`Simulation`] kernel through [`run`].
//!
//! ```no_run
//! use pulsebench::{BenchConfig, RunSettings, ScenarioMatrix, Variant, reference_model, run_matrix};
//!
//! let config = BenchConfig::default();
//! let scenarios = ScenarioMatrix::from_config(&config, Variant::Window)?.scenarios()?;
//! let settings = RunSettings::from_bench(&config.bench)?;
//! let report = run_matrix(&scenarios, &settings, reference_model);
//! println!("{report}");
//! # Ok::<(), pulsebench::ConfigError>(())
//! ```

mod config;
mod device;
mod error;
mod executor;
mod measure;
mod oracle;
mod scenario;
mod scheduler;
mod signal;
mod simulation;
mod testbench;
mod time;
mod triggers;
mod vcd;

pub(crate) use fxhash::FxHashMap as HashMap;

pub use config::{
    BenchConfig, BenchSettings, Configuration, DEFAULT_CLOCK_PERIOD_NS, DEFAULT_DATA_WIDTH,
    DEFAULT_PADDING, DEFAULT_SAMPLES, MatrixSettings, Parameters,
};
pub use device::{Device, IOContext, Ports, PwmModel};
pub use error::{BenchError, ConfigError, Quantity, StallReason, VerificationFailure};
pub use executor::run;
pub use measure::{Accumulator, CycleSample, Means, WindowEdges, measure, measure_windowed};
pub use oracle::{
    ABS_TOLERANCE, DUTY_TOLERANCE, Expectation, PAD_TOLERANCE, PERIOD_TOLERANCE, Tolerance,
    WindowExpectation, expected_pad_ns, expected_period_ns, verify,
};
pub use scenario::{
    RunSettings, Scenario, ScenarioMatrix, ScenarioOutcome, ScenarioReport, TimeLimit, Variant,
    reference_model, run_matrix, run_scenario,
};
pub use signal::{Edge, NamedSignal, PortDirection, SignalRef, Transition};
pub use simulation::{ClockHandle, SimHandle, Simulation, SimulationBuilder, WaitId};
pub use testbench::{DISABLE_SETTLE, Testbench};
pub use time::{SimTime, TimeUnit};
pub use triggers::{Race, Trigger, first};
