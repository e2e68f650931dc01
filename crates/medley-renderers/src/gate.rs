//! Readiness gate - the shared apply-stack for async-attaching backends
//!
//! Backends wrapping an asynchronously-loaded SDK must queue calls
//! issued before the SDK signals readiness and replay them, in original
//! order, once ready. The gate is a two-state machine: commands pushed
//! while pending are drained exactly once by the open transition;
//! afterwards every command runs immediately.

use parking_lot::Mutex;

enum GateState<C> {
    Pending(Vec<C>),
    Ready,
}

/// Ordered command queue drained on the pending-to-ready transition
pub struct ReadyGate<C> {
    state: Mutex<GateState<C>>,
}

impl<C> ReadyGate<C> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Pending(Vec::new())),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.lock(), GateState::Ready)
    }

    /// Number of commands waiting for the open transition
    pub fn pending(&self) -> usize {
        match &*self.state.lock() {
            GateState::Pending(queue) => queue.len(),
            GateState::Ready => 0,
        }
    }

    /// Run `apply` with `command` immediately when ready, otherwise
    /// queue the command for the open transition
    pub fn run_or_queue<F>(&self, command: C, apply: F)
    where
        F: FnOnce(C),
    {
        let mut state = self.state.lock();
        match &mut *state {
            GateState::Pending(queue) => queue.push(command),
            GateState::Ready => {
                drop(state);
                apply(command);
            }
        }
    }

    /// Transition to ready and replay queued commands in issuance
    /// order. Opening an already-open gate is a no-op.
    pub fn open<F>(&self, mut apply: F)
    where
        F: FnMut(C),
    {
        let drained = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, GateState::Ready) {
                GateState::Pending(queue) => queue,
                GateState::Ready => Vec::new(),
            }
        };
        for command in drained {
            apply(command);
        }
    }
}

impl<C> Default for ReadyGate<C> {
    fn default() -> Self {
        Self::new()
    }
}
