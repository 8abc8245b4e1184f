//! Compute backend seam and the job handed across it.
//!
//! A `ComputeBackend` accepts `BackendJob`s and answers each one through the
//! job's `Responder`. The responder is the only way back to the caller:
//! completing it consumes it, and dropping it unanswered delivers an
//! `Abandoned` envelope, so every accepted job produces exactly one reply.

use std::fmt;

use thiserror::Error;
use tracing::warn;

use derivx_core::{ResultEnvelope, TaskDescriptor, TaskerId, ValidationError};

/// `common_args` does not carry a readable `rand_seed` list.
pub const CODE_BAD_ARGS: i32 = 400;
/// The job's deadline passed before a worker picked it up.
pub const CODE_DEADLINE_EXPIRED: i32 = 408;
/// The plugin id is not hosted by this backend.
pub const CODE_UNKNOWN_PLUGIN: i32 = 404;
/// `rand_seed` has more entries than the backend has compute units.
pub const CODE_TOO_MANY_SEEDS: i32 = 422;
/// The plugin panicked.
pub const CODE_PLUGIN_PANIC: i32 = 500;

/// Why a backend refused a job at submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no plugin registered as {0:?}")]
    UnknownPlugin(String),

    #[error("remote distribution is not available on this backend")]
    RemoteUnsupported,

    #[error("backend is shut down")]
    Stopped,

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// A refused job, handed back so its responder can be disarmed.
pub struct Rejected {
    pub reason: SubmitError,
    pub job: BackendJob,
}

impl Rejected {
    pub fn new(reason: SubmitError, job: BackendJob) -> Self {
        Self { reason, job }
    }
}

impl fmt::Debug for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("reason", &self.reason)
            .field("tasker_id", &self.job.tasker_id)
            .finish()
    }
}

type Deliver = Box<dyn FnOnce(ResultEnvelope) + Send>;
type Tap = Box<dyn FnOnce(&ResultEnvelope) + Send>;

/// One-shot reply channel of a job.
pub struct Responder {
    tasker_id: TaskerId,
    deliver: Option<Deliver>,
    taps: Vec<Tap>,
}

impl Responder {
    pub fn new(tasker_id: TaskerId, deliver: impl FnOnce(ResultEnvelope) + Send + 'static) -> Self {
        Self {
            tasker_id,
            deliver: Some(Box::new(deliver)),
            taps: Vec::new(),
        }
    }

    pub fn tasker_id(&self) -> &TaskerId {
        &self.tasker_id
    }

    /// Observe the final envelope before it is delivered.
    ///
    /// Taps run on the completing thread, in registration order.
    pub fn tap(&mut self, observer: impl FnOnce(&ResultEnvelope) + Send + 'static) {
        self.taps.push(Box::new(observer));
    }

    /// Deliver `envelope`, stamped with this job's tasker id.
    pub fn complete(mut self, envelope: ResultEnvelope) {
        self.finish(envelope);
    }

    /// Drop without delivering anything. Only for jobs that were never accepted.
    pub fn disarm(mut self) {
        self.deliver = None;
        self.taps.clear();
    }

    fn finish(&mut self, envelope: ResultEnvelope) {
        let Some(deliver) = self.deliver.take() else {
            return;
        };
        let envelope = envelope.with_tasker_id(self.tasker_id.clone());
        for tap in self.taps.drain(..) {
            tap(&envelope);
        }
        deliver(envelope);
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if self.deliver.is_some() {
            warn!(tasker_id = %self.tasker_id, "job dropped without a reply");
            self.finish(ResultEnvelope::abandoned());
        }
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("tasker_id", &self.tasker_id)
            .field("armed", &self.deliver.is_some())
            .finish()
    }
}

/// A task accepted for execution.
#[derive(Debug)]
pub struct BackendJob {
    pub tasker_id: TaskerId,
    pub task: TaskDescriptor,
    pub responder: Responder,
}

/// Anything that can run task descriptors.
///
/// `submit` must return quickly. On `Ok` the backend owns the job and must
/// eventually complete or drop its responder; on `Err` the job is handed
/// back untouched.
pub trait ComputeBackend: Send + Sync {
    fn submit(&self, job: BackendJob) -> Result<(), Rejected>;

    /// Short name for log lines.
    fn name(&self) -> &str {
        "backend"
    }
}
