use crate::{SignalRef, SimTime, simulation::WaitId};
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockId(pub(crate) usize);

#[derive(Debug, Clone)]
pub struct ClockDef {
    pub signal: SignalRef,
    pub period: SimTime,
    pub running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Drive a clock signal to `next_val` and schedule the opposite edge.
    Toggle { clock: ClockId, next_val: u64 },
    /// Resolve a pending timer wait.
    Wake(WaitId),
}

#[derive(Debug, Clone)]
pub struct SimEvent {
    pub time: SimTime,
    pub seq: u64,
    pub action: Action,
}

impl PartialEq for SimEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for SimEvent {}

impl PartialOrd for SimEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Earlier time has higher priority (BinaryHeap is a Max-Heap),
        // events at the same time keep insertion order.
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    pub(crate) time: SimTime,
    pub(crate) clocks: Vec<ClockDef>,
    pub(crate) event_queue: BinaryHeap<SimEvent>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_event_time(&self) -> Option<SimTime> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn push(&mut self, time: SimTime, action: Action) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.event_queue.push(SimEvent { time, seq, action });
    }

    pub fn pop_all_at_next_time(&mut self) -> Option<(SimTime, Vec<SimEvent>)> {
        let next_time = self.next_event_time()?;
        let mut events = Vec::new();
        while self
            .event_queue
            .peek()
            .is_some_and(|ev| ev.time == next_time)
        {
            if let Some(ev) = self.event_queue.pop() {
                events.push(ev);
            }
        }
        Some((next_time, events))
    }

    /// Registers a periodic clock whose first rising edge happens
    /// `initial_delay` after the current time.
    pub fn add_clock(
        &mut self,
        signal: SignalRef,
        period: SimTime,
        initial_delay: SimTime,
    ) -> ClockId {
        let clock = ClockId(self.clocks.len());
        self.clocks.push(ClockDef {
            signal,
            period,
            running: true,
        });
        self.push(
            self.time + initial_delay,
            Action::Toggle { clock, next_val: 1 },
        );
        clock
    }

    /// Stops rescheduling `clock`; already queued edges are discarded when popped.
    pub fn stop_clock(&mut self, clock: ClockId) {
        if let Some(def) = self.clocks.get_mut(clock.0) {
            def.running = false;
        }
    }

    pub fn clock(&self, clock: ClockId) -> Option<&ClockDef> {
        self.clocks.get(clock.0).filter(|def| def.running)
    }
}
