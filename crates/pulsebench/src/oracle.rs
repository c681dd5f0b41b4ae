use crate::{Configuration, Means, Quantity, SimTime, VerificationFailure};
use serde::Serialize;
use std::fmt;

/// Absolute tolerance used alongside every relative tolerance.
pub const ABS_TOLERANCE: f64 = 1e-12;
/// Duty is coarse: quantization jitter dominates at small sample counts.
pub const DUTY_TOLERANCE: Tolerance = Tolerance::relative(0.1);
pub const PERIOD_TOLERANCE: Tolerance = Tolerance::relative(0.01);
pub const PAD_TOLERANCE: Tolerance = Tolerance::relative(0.01);

/// Accepts `measured` when `|measured - expected| <= max(rel * |expected|, abs)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tolerance {
    pub rel: f64,
    pub abs: f64,
}

impl Tolerance {
    pub const fn relative(rel: f64) -> Self {
        Self {
            rel,
            abs: ABS_TOLERANCE,
        }
    }

    pub fn accepts(&self, measured: f64, expected: f64) -> bool {
        (measured - expected).abs() <= (self.rel * expected.abs()).max(self.abs)
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rel {}, abs {:e}", self.rel, self.abs)
    }
}

/// What the window output is expected to do for a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum WindowExpectation {
    /// Padding 0 or no window output: nothing is checked.
    Unchecked,
    /// The padding does not fit inside the high phase; no window pulse.
    Suppressed,
    /// Both pads equal this many nanoseconds.
    Padded(f64),
}

/// Analytically derived values a correct device produces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Expectation {
    pub duty: f64,
    pub period_ns: f64,
    pub window: WindowExpectation,
}

/// Output period in nanoseconds.
///
/// The prescale is halved since the internal divider only advances on one
/// clock polarity; one period spans all `2^data_width` counter values.
pub fn expected_period_ns(clock_period: SimTime, prescale: u64, data_width: u32) -> f64 {
    clock_period.as_ns() * (prescale as f64 / 2.0) * 2f64.powi(data_width as i32)
}

/// Inset of the window edges from the `out` edges, in nanoseconds.
pub fn expected_pad_ns(clock_period: SimTime, prescale: u64, padding: u64) -> f64 {
    clock_period.as_ns() * (prescale as f64 / 2.0) * padding as f64
}

impl Expectation {
    /// The window is expected suppressed when `2 * padding` exceeds the
    /// real-valued `duty * (2^W - 1)`, not the rounded compare a device is
    /// programmed with. Where `2 * padding` lies between the two, a device
    /// whose window is empty once `2 * padding >= compare` fails with
    /// [`Quantity::WindowPulses`]: duty 0.197 at W = 8 gives 50.2 against a
    /// compare of 50, so padding 25 expects pads the device never produces.
    pub fn derive(config: &Configuration, clock_period: SimTime) -> Self {
        let window = match config.padding() {
            None | Some(0) => WindowExpectation::Unchecked,
            Some(padding) => {
                if 2.0 * padding as f64 > config.duty_cycle() * config.full_scale() as f64 {
                    WindowExpectation::Suppressed
                } else {
                    WindowExpectation::Padded(expected_pad_ns(
                        clock_period,
                        config.prescale(),
                        padding,
                    ))
                }
            }
        };
        Self {
            duty: config.duty_cycle(),
            period_ns: expected_period_ns(clock_period, config.prescale(), config.data_width()),
            window,
        }
    }
}

fn check(
    quantity: Quantity,
    measured: f64,
    expected: f64,
    tolerance: Tolerance,
) -> Result<(), VerificationFailure> {
    if tolerance.accepts(measured, expected) {
        Ok(())
    } else {
        Err(VerificationFailure {
            quantity,
            measured,
            expected,
            tolerance,
        })
    }
}

fn exact(quantity: Quantity, measured: usize, expected: usize) -> Result<(), VerificationFailure> {
    check(
        quantity,
        measured as f64,
        expected as f64,
        Tolerance { rel: 0.0, abs: 0.0 },
    )
}

/// Compares measured means against `expectation`, failing on the first
/// violated assertion.
pub fn verify(expectation: &Expectation, means: &Means) -> Result<(), VerificationFailure> {
    check(Quantity::MeanDuty, means.duty, expectation.duty, DUTY_TOLERANCE)?;
    check(
        Quantity::MeanPeriod,
        means.period_ns,
        expectation.period_ns,
        PERIOD_TOLERANCE,
    )?;
    match expectation.window {
        WindowExpectation::Unchecked => Ok(()),
        WindowExpectation::Suppressed => exact(Quantity::WindowPulses, means.windows, 0),
        WindowExpectation::Padded(pad_ns) => {
            exact(Quantity::WindowPulses, means.windows, means.samples)?;
            check(
                Quantity::MeanLeftPad,
                means.left_pad_ns.unwrap_or(f64::NAN),
                pad_ns,
                PAD_TOLERANCE,
            )?;
            check(
                Quantity::MeanRightPad,
                means.right_pad_ns.unwrap_or(f64::NAN),
                pad_ns,
                PAD_TOLERANCE,
            )
        }
    }
}
