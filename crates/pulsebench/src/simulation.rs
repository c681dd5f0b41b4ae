use crate::{
    BenchError, Device, Edge, HashMap, IOContext, NamedSignal, PortDirection, Ports, SignalRef,
    SimTime, StallReason, Transition,
    scheduler::{Action, ClockId, Scheduler},
    signal::SignalTable,
    triggers::Trigger,
    vcd::VcdWriter,
};
use log::{Level, log_enabled, trace};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::task::Waker;

/// Identifier of a registered wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WaitId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitKind {
    Edge { signal: SignalRef, edge: Edge },
    Timer,
}

#[derive(Debug)]
struct Waiter {
    kind: WaitKind,
    waker: Waker,
    fired: Option<SimTime>,
}

/// Outstanding edge and timer waits. Each registration resolves at most once.
#[derive(Debug, Default)]
pub(crate) struct Waiters {
    next_id: u64,
    pending: HashMap<WaitId, Waiter>,
}

impl Waiters {
    fn register(&mut self, kind: WaitKind, waker: Waker) -> WaitId {
        let id = WaitId(self.next_id);
        self.next_id += 1;
        self.pending.insert(
            id,
            Waiter {
                kind,
                waker,
                fired: None,
            },
        );
        id
    }

    /// Consumes the registration if it fired, otherwise refreshes its waker.
    fn poll(&mut self, id: WaitId, waker: &Waker) -> Option<SimTime> {
        let waiter = self.pending.get_mut(&id)?;
        match waiter.fired {
            Some(time) => {
                self.pending.remove(&id);
                Some(time)
            }
            None => {
                if !waiter.waker.will_wake(waker) {
                    waiter.waker = waker.clone();
                }
                None
            }
        }
    }

    fn cancel(&mut self, id: WaitId) {
        self.pending.remove(&id);
    }

    fn notify(&mut self, transitions: &[Transition], time: SimTime) {
        for waiter in self.pending.values_mut() {
            if waiter.fired.is_some() {
                continue;
            }
            let WaitKind::Edge { signal, edge } = waiter.kind else {
                continue;
            };
            if transitions
                .iter()
                .any(|t| t.signal == signal && edge.matches(t.old, t.new))
            {
                waiter.fired = Some(time);
                waiter.waker.wake_by_ref();
            }
        }
    }

    fn fire_timer(&mut self, id: WaitId, time: SimTime) {
        if let Some(waiter) = self.pending.get_mut(&id) {
            if waiter.kind == WaitKind::Timer && waiter.fired.is_none() {
                waiter.fired = Some(time);
                waiter.waker.wake_by_ref();
            }
        }
    }

    fn len(&self) -> usize {
        self.pending.len()
    }
}

struct BoundDevice {
    device: Box<dyn Device>,
    clock: SignalRef,
}

/// A timed, event-driven simulation of a single device.
///
/// Owns simulation time, periodic clocks, the signal table and all pending
/// waits. Shared with the test flow through [`SimHandle`].
pub struct Simulation {
    pub(crate) scheduler: Scheduler,
    pub(crate) signals: SignalTable,
    pub(crate) waiters: Waiters,
    device: Option<BoundDevice>,
    vcd_writer: Option<VcdWriter>,
    time_limit: Option<SimTime>,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("time", &self.scheduler.time)
            .field("pending_waits", &self.waiters.len())
            .finish()
    }
}

impl Simulation {
    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::default()
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> SimTime {
        self.scheduler.time
    }

    /// Returns the time of the next scheduled event, if any.
    pub fn next_event_time(&self) -> Option<SimTime> {
        self.scheduler.next_event_time()
    }

    /// Writes an input immediately and notifies waits on it at the current time.
    pub fn set(&mut self, signal: SignalRef, value: u64) -> Result<(), BenchError> {
        if let Some(transition) = self.signals.set(signal, value) {
            self.waiters.notify(&[transition], self.scheduler.time);
            self.dump()?;
        }
        Ok(())
    }

    pub fn get(&self, signal: SignalRef) -> u64 {
        self.signals.get(signal)
    }

    /// Advance time to the next scheduled event and process all events at that time.
    /// Returns the new simulation time, or None if no events are scheduled.
    pub fn step(&mut self) -> Result<Option<SimTime>, BenchError> {
        let Some(next_time) = self.scheduler.next_event_time() else {
            return Ok(None);
        };
        if let Some(limit) = self.time_limit {
            if next_time > limit {
                return Err(BenchError::Stall {
                    time: self.scheduler.time,
                    reason: StallReason::TimeLimit(limit),
                });
            }
        }
        let Some((current_time, events)) = self.scheduler.pop_all_at_next_time() else {
            return Ok(None);
        };
        self.scheduler.time = current_time;

        let mut changes = Vec::new();
        let mut timers = Vec::new();
        for ev in events {
            match ev.action {
                Action::Toggle { clock, next_val } => {
                    let Some(def) = self.scheduler.clock(clock) else {
                        continue;
                    };
                    let (signal, half_period) = (def.signal, def.period.halved());
                    if let Some(transition) = self.signals.set(signal, next_val) {
                        changes.push(transition);
                    }
                    self.scheduler.push(
                        current_time + half_period,
                        Action::Toggle {
                            clock,
                            next_val: 1 - next_val,
                        },
                    );
                }
                Action::Wake(id) => timers.push(id),
            }
        }

        // Sequential logic samples its inputs on the rising clock edge;
        // the outputs it drives change within the same time step.
        if let Some(bound) = self.device.as_mut() {
            let clocked = changes
                .iter()
                .any(|t| t.signal == bound.clock && Edge::Rising.matches(t.old, t.new));
            if clocked {
                let mut io = IOContext {
                    signals: &mut self.signals,
                    changes: &mut changes,
                };
                bound.device.posedge(&mut io);
            }
        }

        if log_enabled!(Level::Trace) {
            for transition in &changes {
                trace!(
                    "{}: {} {} -> {}",
                    current_time,
                    self.signals.name(transition.signal),
                    transition.old,
                    transition.new
                );
            }
        }
        self.waiters.notify(&changes, current_time);
        for id in timers {
            self.waiters.fire_timer(id, current_time);
        }

        self.dump()?;
        Ok(Some(current_time))
    }

    /// Advance time and run until `end_time` (inclusive).
    pub fn run_until(&mut self, end_time: SimTime) -> Result<(), BenchError> {
        while let Some(next_time) = self.scheduler.next_event_time() {
            if next_time > end_time {
                break;
            }
            self.step()?;
        }
        self.scheduler.time = self.scheduler.time.max(end_time);
        Ok(())
    }

    /// Returns all ports of the simulated device.
    pub fn named_signals(&self) -> Vec<NamedSignal> {
        self.signals.named_signals()
    }

    /// Number of waits that are registered and not yet consumed.
    pub fn pending_waits(&self) -> usize {
        self.waiters.len()
    }

    /// Captures changed signals into the VCD file, if one is configured.
    fn dump(&mut self) -> Result<(), BenchError> {
        if let Some(ref mut writer) = self.vcd_writer {
            let signals = &self.signals;
            writer.dump(self.scheduler.time, |signal| signals.get(signal))?;
        }
        Ok(())
    }
}

/// A fluent builder for a [`Simulation`].
#[derive(Default)]
pub struct SimulationBuilder {
    device: Option<Box<dyn Device>>,
    vcd_path: Option<PathBuf>,
    time_limit: Option<SimTime>,
}

impl SimulationBuilder {
    /// The device whose ports and clocked behavior are simulated.
    pub fn device<D: Device + 'static>(self, device: D) -> Self {
        self.boxed_device(Box::new(device))
    }

    pub fn boxed_device(mut self, device: Box<dyn Device>) -> Self {
        self.device = Some(device);
        self
    }

    /// Enable VCD dumping to the specified file.
    pub fn vcd<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.vcd_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Abort with [`StallReason::TimeLimit`] instead of simulating past `limit`.
    pub fn time_limit(mut self, limit: SimTime) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn build(self) -> Result<SimHandle, BenchError> {
        let mut signals = SignalTable::default();
        let mut scope = String::from("top");
        let device = match self.device {
            Some(mut device) => {
                let clock = device.elaborate(&mut Ports {
                    signals: &mut signals,
                })?;
                scope = device.name().to_string();
                Some(BoundDevice { device, clock })
            }
            None => None,
        };
        let vcd_writer = match self.vcd_path {
            Some(path) => Some(VcdWriter::new(path, &scope, &signals.named_signals())?),
            None => None,
        };
        Ok(SimHandle {
            inner: Rc::new(RefCell::new(Simulation {
                scheduler: Scheduler::new(),
                signals,
                waiters: Waiters::default(),
                device,
                vcd_writer,
                time_limit: self.time_limit,
            })),
        })
    }
}

/// Shared handle to a [`Simulation`], used by the test flow and its triggers.
///
/// The simulation is single-threaded; handles are cheap to clone but not `Send`.
#[derive(Clone)]
pub struct SimHandle {
    inner: Rc<RefCell<Simulation>>,
}

impl std::fmt::Debug for SimHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_borrow() {
            Ok(sim) => sim.fmt(f),
            Err(_) => f.write_str("Simulation { <busy> }"),
        }
    }
}

impl SimHandle {
    /// Resolves a port name into a [`SignalRef`].
    pub fn signal(&self, name: &str) -> Result<SignalRef, BenchError> {
        self.inner
            .borrow()
            .signals
            .lookup(name)
            .ok_or_else(|| BenchError::UnknownSignal(name.to_string()))
    }

    /// Declares an extra signal that no device drives, e.g. for a bare clock.
    pub fn declare(&self, name: &str, width: usize) -> Result<SignalRef, BenchError> {
        self.inner
            .borrow_mut()
            .signals
            .declare(name, width, PortDirection::Input)
    }

    pub fn now(&self) -> SimTime {
        self.inner.borrow().time()
    }

    pub fn get(&self, signal: SignalRef) -> u64 {
        self.inner.borrow().get(signal)
    }

    pub fn set(&self, signal: SignalRef, value: u64) -> Result<(), BenchError> {
        self.inner.borrow_mut().set(signal, value)
    }

    /// Starts a periodic clock on `signal`, first rising edge at the current time.
    /// The clock runs until the returned handle is stopped or dropped.
    pub fn start_clock(&self, signal: SignalRef, period: SimTime) -> ClockHandle {
        let clock = self
            .inner
            .borrow_mut()
            .scheduler
            .add_clock(signal, period, SimTime::ZERO);
        ClockHandle {
            sim: self.clone(),
            clock,
            period,
        }
    }

    /// Resolves on the next transition of `signal` in direction `edge`.
    pub fn edge(&self, signal: SignalRef, edge: Edge) -> Trigger {
        Trigger::new(self.clone(), WaitKind::Edge { signal, edge }, SimTime::ZERO)
    }

    pub fn rising_edge(&self, signal: SignalRef) -> Trigger {
        self.edge(signal, Edge::Rising)
    }

    pub fn falling_edge(&self, signal: SignalRef) -> Trigger {
        self.edge(signal, Edge::Falling)
    }

    /// Resolves once `duration` of simulated time has elapsed.
    pub fn timer(&self, duration: SimTime) -> Trigger {
        Trigger::new(self.clone(), WaitKind::Timer, duration)
    }

    pub fn step(&self) -> Result<Option<SimTime>, BenchError> {
        self.inner.borrow_mut().step()
    }

    pub fn run_until(&self, end_time: SimTime) -> Result<(), BenchError> {
        self.inner.borrow_mut().run_until(end_time)
    }

    pub fn next_event_time(&self) -> Option<SimTime> {
        self.inner.borrow().next_event_time()
    }

    pub fn named_signals(&self) -> Vec<NamedSignal> {
        self.inner.borrow().named_signals()
    }

    pub fn pending_waits(&self) -> usize {
        self.inner.borrow().pending_waits()
    }

    pub(crate) fn register_wait(
        &self,
        kind: WaitKind,
        duration: SimTime,
        waker: &Waker,
    ) -> WaitId {
        let mut sim = self.inner.borrow_mut();
        let id = sim.waiters.register(kind, waker.clone());
        if kind == WaitKind::Timer {
            let deadline = sim.scheduler.time + duration;
            sim.scheduler.push(deadline, Action::Wake(id));
        }
        id
    }

    pub(crate) fn poll_wait(&self, id: WaitId, waker: &Waker) -> Option<SimTime> {
        self.inner.borrow_mut().waiters.poll(id, waker)
    }

    /// Drops a registration. Tolerates being called while the simulation is
    /// borrowed, which only happens while it is being torn down.
    pub(crate) fn cancel_wait(&self, id: WaitId) {
        if let Ok(mut sim) = self.inner.try_borrow_mut() {
            sim.waiters.cancel(id);
        }
    }
}

/// Owner of a periodic clock. Dropping the handle stops the clock.
#[derive(Debug)]
pub struct ClockHandle {
    sim: SimHandle,
    clock: ClockId,
    period: SimTime,
}

impl ClockHandle {
    pub fn period(&self) -> SimTime {
        self.period
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for ClockHandle {
    fn drop(&mut self) {
        if let Ok(mut sim) = self.sim.inner.try_borrow_mut() {
            sim.scheduler.stop_clock(self.clock);
        }
    }
}
