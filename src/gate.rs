//! Readiness gate used to block `start` until the first refresh arrives.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A manually cleared, level-triggered signal with a bounded wait.
///
/// `signal` may be called from any thread. A signal raised after `clear` is
/// visible to every subsequent `wait` until the next `clear`, so a signal that
/// lands between `clear` and `wait` is never lost.
///
/// Every `clear` starts a new generation. `signal_generation` only takes
/// effect for the generation it was issued for, which keeps a late signal
/// from one start cycle out of the next.
#[derive(Debug, Default)]
pub struct ReadinessGate {
    state: Mutex<GateState>,
    cond: Condvar,
}

#[derive(Debug, Default)]
struct GateState {
    signaled: bool,
    generation: u64,
}

impl ReadinessGate {
    /// Create a gate in the not-ready state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to not-ready. Idempotent with respect to readiness.
    pub fn clear(&self) {
        self.arm();
    }

    /// Reset to not-ready and return the new generation.
    pub fn arm(&self) -> u64 {
        let mut state = self.state.lock();
        state.signaled = false;
        state.generation = state.generation.wrapping_add(1);
        state.generation
    }

    /// Mark ready and wake all waiters. Idempotent.
    pub fn signal(&self) {
        let mut state = self.state.lock();
        Self::set(&mut state, &self.cond);
    }

    /// Mark ready only if no `clear` happened since `generation` was armed.
    ///
    /// Returns false if the signal was stale.
    pub fn signal_generation(&self, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        Self::set(&mut state, &self.cond);
        true
    }

    fn set(state: &mut GateState, cond: &Condvar) {
        if !state.signaled {
            state.signaled = true;
            cond.notify_all();
        }
    }

    /// Current state without waiting.
    pub fn is_signaled(&self) -> bool {
        self.state.lock().signaled
    }

    /// Generation of the most recent `clear`/`arm`.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Block until signaled or `timeout` elapses.
    ///
    /// Returns true if the gate was signaled before the deadline.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();

        while !state.signaled {
            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(&mut state, deadline).timed_out() {
                        return state.signaled;
                    }
                }
                // Deadline overflowed Instant; treat as unbounded.
                None => self.cond.wait(&mut state),
            }
        }

        true
    }
}
