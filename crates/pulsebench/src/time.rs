use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Units simulated time can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Ps,
    Ns,
    Us,
    Ms,
}

impl TimeUnit {
    /// Number of picoseconds in one unit.
    pub const fn picos(self) -> u64 {
        match self {
            TimeUnit::Ps => 1,
            TimeUnit::Ns => 1_000,
            TimeUnit::Us => 1_000_000,
            TimeUnit::Ms => 1_000_000_000,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Ps => "ps",
            TimeUnit::Ns => "ns",
            TimeUnit::Us => "us",
            TimeUnit::Ms => "ms",
        }
    }
}

/// Simulated time with picosecond resolution.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SimTime(u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    /// Panics if the value does not fit in picoseconds; see [`SimTime::checked_new`].
    pub const fn new(value: u64, unit: TimeUnit) -> Self {
        match Self::checked_new(value, unit) {
            Some(time) => time,
            None => panic!("simulated time overflow"),
        }
    }

    /// `None` if `value` units exceed the representable range.
    pub const fn checked_new(value: u64, unit: TimeUnit) -> Option<Self> {
        match value.checked_mul(unit.picos()) {
            Some(ps) => Some(SimTime(ps)),
            None => None,
        }
    }

    pub const fn from_ps(ps: u64) -> Self {
        SimTime(ps)
    }

    pub const fn from_ns(ns: u64) -> Self {
        Self::new(ns, TimeUnit::Ns)
    }

    pub const fn from_us(us: u64) -> Self {
        Self::new(us, TimeUnit::Us)
    }

    pub const fn as_ps(self) -> u64 {
        self.0
    }

    /// Converts to a (possibly fractional) number of `unit`s.
    pub fn as_unit(self, unit: TimeUnit) -> f64 {
        self.0 as f64 / unit.picos() as f64
    }

    pub fn as_ns(self) -> f64 {
        self.as_unit(TimeUnit::Ns)
    }

    /// Elapsed time since `earlier`, saturating at zero.
    pub fn since(self, earlier: SimTime) -> SimTime {
        SimTime(self.0.saturating_sub(earlier.0))
    }

    pub const fn halved(self) -> SimTime {
        SimTime(self.0 / 2)
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 + rhs.0)
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 - rhs.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Largest unit that represents the value exactly.
        let unit = [TimeUnit::Ms, TimeUnit::Us, TimeUnit::Ns]
            .into_iter()
            .find(|unit| self.0 != 0 && self.0 % unit.picos() == 0)
            .unwrap_or(TimeUnit::Ps);
        write!(f, "{} {}", self.0 / unit.picos(), unit.suffix())
    }
}
