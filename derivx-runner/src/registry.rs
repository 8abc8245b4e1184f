//! Pending-task registry: the dispatcher's only shared mutable state.
//!
//! Each accepted task owns one entry holding its completion sink. Whoever
//! removes the entry first (the backend reply, a timed-out sync caller, or a
//! rejected submission) decides its fate, which is what makes delivery
//! exactly-once.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, error};

use derivx_core::{ResultEnvelope, TaskerId};

use crate::kernel::panic_message;

pub(crate) type Sink = Box<dyn FnOnce(ResultEnvelope) + Send>;

pub(crate) struct PendingEntry {
    pub plugin_id: String,
    pub method_id: u32,
    pub submitted_at: Instant,
    pub sink: Sink,
}

/// Snapshot of one outstanding task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutstandingTask {
    pub tasker_id: TaskerId,
    pub plugin_id: String,
    pub method_id: u32,
    pub age: Duration,
}

#[derive(Default)]
pub(crate) struct PendingRegistry {
    entries: Mutex<HashMap<TaskerId, PendingEntry>>,
}

impl PendingRegistry {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TaskerId, PendingEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, id: TaskerId, entry: PendingEntry) {
        self.lock().insert(id, entry);
    }

    pub fn take(&self, id: &TaskerId) -> Option<PendingEntry> {
        self.lock().remove(id)
    }

    pub fn contains(&self, id: &TaskerId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn snapshot(&self) -> Vec<OutstandingTask> {
        let now = Instant::now();
        let mut tasks: Vec<_> = self
            .lock()
            .iter()
            .map(|(id, e)| OutstandingTask {
                tasker_id: id.clone(),
                plugin_id: e.plugin_id.clone(),
                method_id: e.method_id,
                age: now.saturating_duration_since(e.submitted_at),
            })
            .collect();
        tasks.sort_by(|a, b| a.tasker_id.cmp(&b.tasker_id));
        tasks
    }

    /// Hand `envelope` to the task's sink, if the task is still pending.
    ///
    /// The lock is released before the sink runs. A panicking sink is
    /// logged and swallowed.
    pub fn complete(&self, id: &TaskerId, envelope: ResultEnvelope) {
        let Some(entry) = self.take(id) else {
            debug!(tasker_id = %id, "reply for a task nobody waits on; dropped");
            return;
        };
        debug!(
            tasker_id = %id,
            plugin = %entry.plugin_id,
            code = envelope.return_code(),
            elapsed_ms = entry.submitted_at.elapsed().as_millis() as u64,
            "task completed"
        );
        let sink = entry.sink;
        if let Err(panic) = catch_unwind(AssertUnwindSafe(move || sink(envelope))) {
            error!(
                tasker_id = %id,
                message = %panic_message(panic.as_ref()),
                "completion callback panicked"
            );
        }
    }
}
