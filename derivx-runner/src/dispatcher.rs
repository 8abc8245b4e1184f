//! Task dispatcher: synchronous, callback and handle-based submission.
//!
//! Every submission gets a fresh `TaskerId`, an entry in the pending
//! registry and a `Responder` wired back to that entry. The registry decides
//! which of the racing parties (backend reply, local timeout, rejection)
//! gets to finish the task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use derivx_core::{ResultEnvelope, SubmissionAck, TaskDescriptor, TaskerId};

use crate::backend::{BackendJob, ComputeBackend, Rejected, Responder};
use crate::completion::PendingTask;
use crate::registry::{OutstandingTask, PendingEntry, PendingRegistry, Sink};

pub struct Dispatcher {
    backend: Arc<dyn ComputeBackend>,
    registry: Arc<PendingRegistry>,
    seq: AtomicU64,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn ComputeBackend>) -> Self {
        Self {
            backend,
            registry: Arc::new(PendingRegistry::default()),
            seq: AtomicU64::new(0),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Run `task` and block until the backend replies or `timeout_wait`
    /// elapses.
    ///
    /// On timeout the backend keeps running the task; its late reply is
    /// discarded.
    pub fn execute_sync(&self, task: &TaskDescriptor) -> ResultEnvelope {
        let (tx, rx) = mpsc::channel();
        let id = match self.enqueue(task, Box::new(move |env| {
            let _ = tx.send(env);
        })) {
            Ok(id) => id,
            Err(rejected) => return rejected,
        };

        match rx.recv_timeout(task.timeout()) {
            Ok(envelope) => envelope,
            Err(RecvTimeoutError::Timeout) => {
                if self.registry.take(&id).is_none() {
                    // The reply won the race; it is already in the channel
                    // or being sent right now.
                    if let Ok(envelope) = rx.recv() {
                        return envelope;
                    }
                }
                warn!(
                    tasker_id = %id,
                    timeout_secs = task.timeout().as_secs(),
                    "sync task timed out"
                );
                ResultEnvelope::timeout(task.timeout()).with_tasker_id(id)
            }
            Err(RecvTimeoutError::Disconnected) => {
                ResultEnvelope::abandoned().with_tasker_id(id)
            }
        }
    }

    /// Submit `task` and return at once.
    ///
    /// `on_complete` runs exactly once, on a backend thread, if and only if
    /// this returns `Ok`. A panic inside it is caught and logged.
    pub fn execute_async(
        &self,
        task: &TaskDescriptor,
        on_complete: impl FnOnce(ResultEnvelope) + Send + 'static,
    ) -> Result<SubmissionAck, ResultEnvelope> {
        let tasker_id = self.enqueue(task, Box::new(on_complete))?;
        Ok(SubmissionAck { tasker_id })
    }

    /// Submit `task` and get a handle to wait on.
    pub fn submit(&self, task: &TaskDescriptor) -> Result<PendingTask, ResultEnvelope> {
        let (tx, rx) = mpsc::channel();
        let id = self.enqueue(task, Box::new(move |env| {
            let _ = tx.send(env);
        }))?;
        Ok(PendingTask::new(id, rx))
    }

    /// Number of accepted tasks still waiting for a reply.
    pub fn outstanding(&self) -> usize {
        self.registry.len()
    }

    pub fn is_outstanding(&self, id: &TaskerId) -> bool {
        self.registry.contains(id)
    }

    pub fn outstanding_tasks(&self) -> Vec<OutstandingTask> {
        self.registry.snapshot()
    }

    fn next_id(&self, task: &TaskDescriptor) -> TaskerId {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        TaskerId::from_sequence(seq, &task.payload_hash())
    }

    fn enqueue(&self, task: &TaskDescriptor, sink: Sink) -> Result<TaskerId, ResultEnvelope> {
        if let Err(e) = task.validate() {
            warn!(plugin = task.plugin_id(), error = %e, "invalid task descriptor");
            return Err(ResultEnvelope::rejected(e.to_string()));
        }

        let id = self.next_id(task);
        self.registry.insert(
            id.clone(),
            PendingEntry {
                plugin_id: task.plugin_id().to_string(),
                method_id: task.method_id(),
                submitted_at: Instant::now(),
                sink,
            },
        );

        let registry = Arc::clone(&self.registry);
        let reply_id = id.clone();
        let responder = Responder::new(id.clone(), move |env| registry.complete(&reply_id, env));
        let job = BackendJob {
            tasker_id: id.clone(),
            task: task.clone(),
            responder,
        };

        match self.backend.submit(job) {
            Ok(()) => {
                debug!(
                    tasker_id = %id,
                    backend = self.backend.name(),
                    plugin = task.plugin_id(),
                    method = task.method_id(),
                    "task submitted"
                );
                Ok(id)
            }
            Err(Rejected { reason, job }) => {
                job.responder.disarm();
                self.registry.take(&id);
                info!(tasker_id = %id, backend = self.backend.name(), %reason, "submission rejected");
                Err(ResultEnvelope::rejected(reason.to_string()).with_tasker_id(id))
            }
        }
    }
}
