use crate::{BenchError, PortDirection, SignalRef, Transition, signal::SignalTable};

mod pwm;

pub use pwm::PwmModel;

/// A clocked device under test.
///
/// The simulation only knows a device through the ports it declares and the
/// outputs it drives on each rising edge of its clock.
pub trait Device {
    /// Instance name, used as the VCD scope.
    fn name(&self) -> &str;

    /// Declares all ports and returns the clock that drives [`Device::posedge`].
    fn elaborate(&mut self, ports: &mut Ports<'_>) -> Result<SignalRef, BenchError>;

    /// Evaluates sequential logic for one rising clock edge.
    fn posedge(&mut self, io: &mut IOContext<'_>);
}

/// Port declaration context handed to [`Device::elaborate`].
pub struct Ports<'a> {
    pub(crate) signals: &'a mut SignalTable,
}

impl Ports<'_> {
    pub fn input(&mut self, name: &str, width: usize) -> Result<SignalRef, BenchError> {
        self.signals.declare(name, width, PortDirection::Input)
    }

    pub fn output(&mut self, name: &str, width: usize) -> Result<SignalRef, BenchError> {
        self.signals.declare(name, width, PortDirection::Output)
    }
}

/// Signal access for a device while it evaluates a clock edge.
pub struct IOContext<'a> {
    pub(crate) signals: &'a mut SignalTable,
    pub(crate) changes: &'a mut Vec<Transition>,
}

impl IOContext<'_> {
    pub fn get(&self, signal: SignalRef) -> u64 {
        self.signals.get(signal)
    }

    pub fn set(&mut self, signal: SignalRef, val: u64) {
        if let Some(transition) = self.signals.set(signal, val) {
            self.changes.push(transition);
        }
    }
}
