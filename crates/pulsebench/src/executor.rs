use crate::{BenchError, SimHandle, StallReason};
use futures::task::{self, ArcWake};
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

#[derive(Default)]
struct FlowWaker {
    woken: AtomicBool,
}

impl ArcWake for FlowWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.woken.store(true, Ordering::Release);
    }
}

/// Drives a test flow to completion.
///
/// The flow is polled once up front and again every time one of its waits
/// resolves. While it is suspended, the simulation is stepped. A simulation
/// that runs out of events (or past its time limit) before the flow completes
/// is reported as a stall.
pub fn run<T, F>(sim: &SimHandle, flow: F) -> Result<T, BenchError>
where
    F: Future<Output = Result<T, BenchError>>,
{
    let notify = Arc::new(FlowWaker::default());
    let waker = task::waker(notify.clone());
    let mut cx = Context::from_waker(&waker);
    let mut flow = pin!(flow);

    loop {
        notify.woken.store(false, Ordering::Release);
        if let Poll::Ready(result) = flow.as_mut().poll(&mut cx) {
            return result;
        }
        while !notify.woken.load(Ordering::Acquire) {
            if sim.step()?.is_none() {
                return Err(BenchError::Stall {
                    time: sim.now(),
                    reason: StallReason::EndOfSimulation,
                });
            }
        }
    }
}
