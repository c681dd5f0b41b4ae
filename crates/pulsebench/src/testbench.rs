use crate::{BenchError, ClockHandle, Configuration, SignalRef, SimHandle, SimTime};
use log::debug;

/// Settle time after deasserting `en`, before the next scenario may start.
pub const DISABLE_SETTLE: SimTime = SimTime::from_us(1);

#[derive(Debug, Clone, Copy)]
struct PwmSignals {
    clk: SignalRef,
    rst: SignalRef,
    en: SignalRef,
    prescale: SignalRef,
    compare: SignalRef,
    out: SignalRef,
    window: Option<SignalRef>,
}

/// Stimulus side of a test run: owns the clock and drives the inputs of the
/// pulse generator.
///
/// All waits are aligned to rising edges of `clk`; the driver never changes
/// an input between two edges except right after one has been observed.
#[derive(Debug)]
pub struct Testbench {
    sim: SimHandle,
    clock_period: SimTime,
    signals: PwmSignals,
    _clock: ClockHandle,
}

impl Testbench {
    /// Resolves the device ports and starts `clk` with the given period.
    ///
    /// The `window` port is optional; every other port must exist.
    pub fn new(sim: &SimHandle, clock_period: SimTime) -> Result<Self, BenchError> {
        let signals = PwmSignals {
            clk: sim.signal("clk")?,
            rst: sim.signal("rst")?,
            en: sim.signal("en")?,
            prescale: sim.signal("prescale")?,
            compare: sim.signal("compare")?,
            out: sim.signal("out")?,
            window: sim.signal("window").ok(),
        };
        let clock = sim.start_clock(signals.clk, clock_period);
        debug!("clock started on clk, period {}", clock_period);
        Ok(Self {
            sim: sim.clone(),
            clock_period,
            signals,
            _clock: clock,
        })
    }

    pub fn sim(&self) -> &SimHandle {
        &self.sim
    }

    pub fn clock_period(&self) -> SimTime {
        self.clock_period
    }

    pub fn out(&self) -> SignalRef {
        self.signals.out
    }

    pub fn window(&self) -> Result<SignalRef, BenchError> {
        self.signals
            .window
            .ok_or_else(|| BenchError::UnknownSignal("window".to_string()))
    }

    async fn clock_edges(&self, count: usize) {
        for _ in 0..count {
            self.sim.rising_edge(self.signals.clk).await;
        }
    }

    /// Pulses `rst` high for two clock edges, framed by one idle edge before
    /// and two after.
    pub async fn reset(&self) -> Result<(), BenchError> {
        let rst = self.signals.rst;
        self.sim.set(rst, 0)?;
        self.clock_edges(1).await;
        self.sim.set(rst, 1)?;
        self.clock_edges(2).await;
        self.sim.set(rst, 0)?;
        self.clock_edges(2).await;
        debug!("reset released at {}", self.sim.now());
        Ok(())
    }

    /// Writes `prescale` and the quantized comparator value.
    pub fn configure(&self, config: &Configuration) -> Result<(), BenchError> {
        let compare = config.compare_value();
        self.sim.set(self.signals.prescale, config.prescale())?;
        self.sim.set(self.signals.compare, compare)?;
        debug!(
            "configured prescale {}, compare {} (duty {})",
            config.prescale(),
            compare,
            config.duty_cycle()
        );
        Ok(())
    }

    /// Drives `en`. Disabling waits for the outputs to settle before returning.
    pub async fn enable(&self, on: bool) -> Result<(), BenchError> {
        self.sim.set(self.signals.en, u64::from(on))?;
        debug!("en={} at {}", u64::from(on), self.sim.now());
        if !on {
            self.sim.timer(DISABLE_SETTLE).await;
            self.clock_edges(1).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PwmModel, Simulation, run};

    #[test]
    fn test_reset_sequence_timing() {
        let sim = Simulation::builder().device(PwmModel::new(8)).build().unwrap();
        let tb = Testbench::new(&sim, SimTime::from_ns(10)).unwrap();
        let rst = sim.signal("rst").unwrap();
        let times = run(&sim, async {
            let rose = sim.rising_edge(rst);
            let (reset, rose) = futures::join!(tb.reset(), rose);
            reset?;
            Ok::<_, BenchError>((rose, sim.now()))
        })
        .unwrap();
        assert_eq!(times, (SimTime::ZERO, SimTime::from_ns(40)));
        assert_eq!(sim.get(rst), 0);
    }

    #[test]
    fn test_disable_waits_for_settle() {
        let sim = Simulation::builder()
            .device(PwmModel::windowed(8, 2))
            .build()
            .unwrap();
        let tb = Testbench::new(&sim, SimTime::from_ns(10)).unwrap();
        let done = run(&sim, async {
            tb.enable(true).await?;
            tb.enable(false).await?;
            Ok::<_, BenchError>(sim.now())
        })
        .unwrap();
        assert_eq!(done, SimTime::from_ns(1010));
        assert!(tb.window().is_ok());
    }

    #[test]
    fn test_window_missing_on_basic_device() {
        let sim = Simulation::builder().device(PwmModel::new(8)).build().unwrap();
        let tb = Testbench::new(&sim, SimTime::from_ns(10)).unwrap();
        assert!(matches!(tb.window(), Err(BenchError::UnknownSignal(name)) if name == "window"));
    }
}
