//! Completion primitives for callers of the dispatcher.
//!
//! - `CompletionEvent`: a resettable single-fire flag, for callback code
//!   that wants to block until "some" completion happened.
//! - `PendingTask`: a one-shot handle on a single submitted task.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use derivx_core::{ResultEnvelope, TaskerId};

/// Manual-reset event.
///
/// Reusing an event for a second task without `reset` makes the second wait
/// return immediately; that is the caller's responsibility.
#[derive(Debug, Default)]
pub struct CompletionEvent {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl CompletionEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        *self.flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cond.notify_all();
    }

    pub fn reset(&self) {
        *self.flag.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    pub fn is_set(&self) -> bool {
        *self.flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until set or `timeout` elapses; returns whether it was set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut flag = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        while !*flag {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            flag = self
                .cond
                .wait_timeout(flag, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    pub fn wait(&self) {
        let mut flag = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        while !*flag {
            flag = self.cond.wait(flag).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Result of waiting on a `PendingTask`.
#[derive(Debug)]
pub enum WaitOutcome {
    Completed(ResultEnvelope),
    /// The caller's timeout elapsed; the handle is returned to wait again.
    TimedOut(PendingTask),
}

impl WaitOutcome {
    pub fn completed(self) -> Option<ResultEnvelope> {
        match self {
            WaitOutcome::Completed(envelope) => Some(envelope),
            WaitOutcome::TimedOut(_) => None,
        }
    }
}

/// Handle on one submitted task, created by `Dispatcher::submit`.
///
/// Dropping the handle does not cancel the task; its reply is discarded.
#[derive(Debug)]
pub struct PendingTask {
    tasker_id: TaskerId,
    rx: Receiver<ResultEnvelope>,
}

impl PendingTask {
    pub(crate) fn new(tasker_id: TaskerId, rx: Receiver<ResultEnvelope>) -> Self {
        Self { tasker_id, rx }
    }

    pub fn tasker_id(&self) -> &TaskerId {
        &self.tasker_id
    }

    /// Wait up to `timeout`, independent of the descriptor's `timeout_wait`.
    pub fn wait(self, timeout: Duration) -> WaitOutcome {
        match self.rx.recv_timeout(timeout) {
            Ok(envelope) => WaitOutcome::Completed(envelope),
            Err(RecvTimeoutError::Timeout) => WaitOutcome::TimedOut(self),
            Err(RecvTimeoutError::Disconnected) => WaitOutcome::Completed(
                ResultEnvelope::abandoned().with_tasker_id(self.tasker_id),
            ),
        }
    }

    /// The reply if it already arrived.
    pub fn try_take(self) -> Result<ResultEnvelope, PendingTask> {
        match self.wait(Duration::ZERO) {
            WaitOutcome::Completed(envelope) => Ok(envelope),
            WaitOutcome::TimedOut(task) => Err(task),
        }
    }
}
