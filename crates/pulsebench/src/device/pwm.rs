use crate::config::validate_data_width;
use crate::{BenchError, Device, IOContext, Ports, SignalRef};

/// Width of the `prescale` input.
const PRESCALE_WIDTH: usize = 32;

#[derive(Debug, Clone, Copy)]
struct PwmPorts {
    rst: SignalRef,
    en: SignalRef,
    prescale: SignalRef,
    compare: SignalRef,
    out: SignalRef,
    window: Option<SignalRef>,
}

/// Behavioral model of the pulse generator.
///
/// A free-running `data_width`-bit counter advances once every `prescale / 2`
/// rising clock edges; `out` is high while the counter is below `compare`.
/// With a padding configured, `window` is high while the counter lies in
/// `[padding, compare - padding)`, i.e. inset by `padding` counts on both
/// sides of the high phase of `out`.
///
/// `rst` is active high and synchronous; deasserting `en` clears the counter
/// and holds both outputs low.
#[derive(Debug, Clone)]
pub struct PwmModel {
    name: String,
    data_width: u32,
    padding: Option<u64>,
    ports: Option<PwmPorts>,
    prescale_count: u64,
    counter: u64,
}

impl PwmModel {
    pub fn new(data_width: u32) -> Self {
        Self {
            name: "pwm".to_string(),
            data_width,
            padding: None,
            ports: None,
            prescale_count: 0,
            counter: 0,
        }
    }

    /// The variant with a `window` output inset by `padding` counter ticks.
    pub fn windowed(data_width: u32, padding: u64) -> Self {
        Self {
            name: "pwm_window".to_string(),
            padding: Some(padding),
            ..Self::new(data_width)
        }
    }

    pub fn data_width(&self) -> u32 {
        self.data_width
    }

    pub fn padding(&self) -> Option<u64> {
        self.padding
    }

    fn counter_mask(&self) -> u64 {
        (1u64 << self.data_width) - 1
    }

    fn clear(&mut self, io: &mut IOContext<'_>, ports: PwmPorts) {
        self.prescale_count = 0;
        self.counter = 0;
        io.set(ports.out, 0);
        if let Some(window) = ports.window {
            io.set(window, 0);
        }
    }
}

impl Device for PwmModel {
    fn name(&self) -> &str {
        &self.name
    }

    /// Fails for a data width outside `1..=32`.
    fn elaborate(&mut self, ports: &mut Ports<'_>) -> Result<SignalRef, BenchError> {
        validate_data_width(u64::from(self.data_width))?;
        let clk = ports.input("clk", 1)?;
        self.ports = Some(PwmPorts {
            rst: ports.input("rst", 1)?,
            en: ports.input("en", 1)?,
            prescale: ports.input("prescale", PRESCALE_WIDTH)?,
            compare: ports.input("compare", self.data_width as usize)?,
            out: ports.output("out", 1)?,
            window: match self.padding {
                Some(_) => Some(ports.output("window", 1)?),
                None => None,
            },
        });
        Ok(clk)
    }

    fn posedge(&mut self, io: &mut IOContext<'_>) {
        let Some(ports) = self.ports else {
            return;
        };
        if io.get(ports.rst) != 0 || io.get(ports.en) == 0 {
            self.clear(io, ports);
            return;
        }

        // The counter only advances on one clock polarity, hence prescale / 2.
        let ticks_per_count = (io.get(ports.prescale) / 2).max(1);
        self.prescale_count += 1;
        if self.prescale_count >= ticks_per_count {
            self.prescale_count = 0;
            self.counter = (self.counter + 1) & self.counter_mask();
        }

        let compare = io.get(ports.compare);
        io.set(ports.out, u64::from(self.counter < compare));
        if let (Some(window), Some(padding)) = (ports.window, self.padding) {
            let high = self.counter >= padding && self.counter < compare.saturating_sub(padding);
            io.set(window, u64::from(high));
        }
    }
}
