use crate::{BenchError, Race, SimTime, Testbench, first};
use log::debug;
use serde::Serialize;

/// Edges of one `window` pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowEdges {
    pub rising: SimTime,
    pub falling: SimTime,
}

/// Timing of one full output period, rising edge to rising edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleSample {
    pub rising: SimTime,
    pub falling: SimTime,
    pub next_rising: SimTime,
    /// `None` when no window pulse occurred inside the high phase.
    pub window: Option<WindowEdges>,
}

impl CycleSample {
    pub fn period(&self) -> SimTime {
        self.next_rising.since(self.rising)
    }

    pub fn high_time(&self) -> SimTime {
        self.falling.since(self.rising)
    }

    pub fn duty(&self) -> f64 {
        self.high_time().as_ps() as f64 / self.period().as_ps() as f64
    }

    pub fn left_pad(&self) -> Option<SimTime> {
        self.window.map(|w| w.rising.since(self.rising))
    }

    pub fn right_pad(&self) -> Option<SimTime> {
        self.window.map(|w| self.falling.since(w.falling))
    }
}

/// Arithmetic means over an [`Accumulator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Means {
    pub samples: usize,
    pub duty: f64,
    pub period_ns: f64,
    /// Number of samples in which a window pulse was observed.
    pub windows: usize,
    /// Means over the samples with a window pulse; `None` if there were none.
    pub left_pad_ns: Option<f64>,
    pub right_pad_ns: Option<f64>,
}

/// Cycle samples in the order they were observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Accumulator {
    samples: Vec<CycleSample>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

impl Accumulator {
    pub fn push(&mut self, sample: CycleSample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[CycleSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn means(&self) -> Option<Means> {
        let samples = &self.samples;
        Some(Means {
            samples: samples.len(),
            duty: mean(samples.iter().map(CycleSample::duty))?,
            period_ns: mean(samples.iter().map(|s| s.period().as_ns()))?,
            windows: samples.iter().filter(|s| s.window.is_some()).count(),
            left_pad_ns: mean(samples.iter().filter_map(|s| s.left_pad()).map(SimTime::as_ns)),
            right_pad_ns: mean(samples.iter().filter_map(|s| s.right_pad()).map(SimTime::as_ns)),
        })
    }
}

/// Samples `count` periods of `out`.
///
/// The first rising edge after enabling is discarded since it can be delayed
/// by state from before the enable.
pub async fn measure(tb: &Testbench, count: usize) -> Result<Accumulator, BenchError> {
    let sim = tb.sim();
    let out = tb.out();
    let mut acc = Accumulator::default();

    sim.rising_edge(out).await;
    for _ in 0..count {
        let rising = sim.rising_edge(out).await;
        let falling = sim.falling_edge(out).await;
        let next_rising = sim.rising_edge(out).await;
        let sample = CycleSample {
            rising,
            falling,
            next_rising,
            window: None,
        };
        debug!(
            "cycle: period {}, high {}",
            sample.period(),
            sample.high_time()
        );
        acc.push(sample);
    }
    Ok(acc)
}

/// Samples `count` periods of `out` together with the `window` pulse inside
/// each high phase.
///
/// Whether the window rises before `out` falls is not known up front, so the
/// two edges are raced; if `out` falls first the window was suppressed.
pub async fn measure_windowed(tb: &Testbench, count: usize) -> Result<Accumulator, BenchError> {
    let sim = tb.sim();
    let out = tb.out();
    let window = tb.window()?;
    let mut acc = Accumulator::default();

    sim.rising_edge(out).await;
    for _ in 0..count {
        let rising = sim.rising_edge(out).await;
        let (falling, edges) =
            match first(sim.rising_edge(window), sim.falling_edge(out)).await {
                Race::First(window_rising) => {
                    let window_falling = sim.falling_edge(window).await;
                    let falling = sim.falling_edge(out).await;
                    let edges = WindowEdges {
                        rising: window_rising,
                        falling: window_falling,
                    };
                    (falling, Some(edges))
                }
                Race::Second(falling) => (falling, None),
            };
        let next_rising = sim.rising_edge(out).await;
        let sample = CycleSample {
            rising,
            falling,
            next_rising,
            window: edges,
        };
        match (sample.left_pad(), sample.right_pad()) {
            (Some(left), Some(right)) => debug!(
                "cycle: period {}, high {}, pads {} / {}",
                sample.period(),
                sample.high_time(),
                left,
                right
            ),
            _ => debug!(
                "cycle: period {}, high {}, no window",
                sample.period(),
                sample.high_time()
            ),
        }
        acc.push(sample);
    }
    Ok(acc)
}
