//! Suspension points of a test flow.
//!
//! A [`Trigger`] registers itself with the simulation on first poll and
//! resolves to the simulated time at which its condition occurred. Dropping
//! a pending trigger removes the registration, so a trigger that lost a
//! [`first`] race never fires into a later wait.

use crate::{
    SimHandle, SimTime,
    simulation::{WaitId, WaitKind},
};
use futures::future::{self, Either};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

#[must_use = "triggers do nothing unless awaited"]
pub struct Trigger {
    sim: SimHandle,
    kind: WaitKind,
    duration: SimTime,
    id: Option<WaitId>,
    done: bool,
}

impl Trigger {
    pub(crate) fn new(sim: SimHandle, kind: WaitKind, duration: SimTime) -> Self {
        Self {
            sim,
            kind,
            duration,
            id: None,
            done: false,
        }
    }
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trigger")
            .field("kind", &self.kind)
            .field("registered", &self.id.is_some())
            .finish()
    }
}

impl Future for Trigger {
    type Output = SimTime;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<SimTime> {
        let this = self.get_mut();
        assert!(!this.done, "trigger polled after completion");
        match this.id {
            None => {
                this.id = Some(this.sim.register_wait(this.kind, this.duration, cx.waker()));
                Poll::Pending
            }
            Some(id) => match this.sim.poll_wait(id, cx.waker()) {
                Some(time) => {
                    this.id = None;
                    this.done = true;
                    Poll::Ready(time)
                }
                None => Poll::Pending,
            },
        }
    }
}

impl Drop for Trigger {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.sim.cancel_wait(id);
        }
    }
}

/// Outcome of [`first`]: which of the two raced futures resolved, and its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Race<A, B> {
    First(A),
    Second(B),
}

/// Resolves with whichever of `a` and `b` completes first.
///
/// When both complete within the same simulation step, `a` wins. The losing
/// future is dropped before this returns.
pub async fn first<A, B>(a: A, b: B) -> Race<A::Output, B::Output>
where
    A: Future + Unpin,
    B: Future + Unpin,
{
    match future::select(a, b).await {
        Either::Left((output, _)) => Race::First(output),
        Either::Right((output, _)) => Race::Second(output),
    }
}
