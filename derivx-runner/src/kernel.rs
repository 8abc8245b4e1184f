//! Local compute kernel: a dispatch thread feeding a private rayon pool.
//!
//! Submissions travel over an `mpsc` channel to the dispatch thread, which
//! spawns each job on the kernel's own `rayon::ThreadPool` (never the global
//! one). Plugins run there; the job's responder is completed on the same pool
//! thread once the plugin has returned.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use derivx_core::{Distribution, ResultEnvelope};

use crate::backend::{
    BackendJob, ComputeBackend, Rejected, SubmitError, CODE_BAD_ARGS, CODE_DEADLINE_EXPIRED,
    CODE_PLUGIN_PANIC, CODE_TOO_MANY_SEEDS, CODE_UNKNOWN_PLUGIN,
};
use crate::plugin::PluginRegistry;
use crate::settings::KernelSettings;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("invalid kernel settings: {0}")]
    Settings(String),

    #[error("failed to spawn dispatch thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("failed to build kernel thread pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// A job on its way to the dispatch thread.
struct QueuedJob {
    job: BackendJob,
    deadline: Instant,
}

/// In-process backend hosting a set of plugins.
///
/// Create one per process and shut it down explicitly; dropping the kernel
/// also shuts it down. Jobs already handed to the pool still complete.
pub struct LocalKernel {
    tx: Mutex<Option<Sender<QueuedJob>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    plugins: Arc<PluginRegistry>,
    settings: KernelSettings,
}

impl LocalKernel {
    pub fn start(settings: KernelSettings, plugins: PluginRegistry) -> Result<Self, KernelError> {
        settings
            .check()
            .map_err(|e| KernelError::Settings(e.to_string()))?;
        let prefix = settings.thread_prefix.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.worker_threads)
            .thread_name(move |i| format!("{prefix}-pool-{i}"))
            .build()?;

        let plugins = Arc::new(plugins);
        let (tx, rx) = mpsc::channel();
        let loop_plugins = Arc::clone(&plugins);
        let compute_units = settings.worker_threads;
        let handle = thread::Builder::new()
            .name(format!("{}-dispatch", settings.thread_prefix))
            .spawn(move || dispatch_loop(rx, pool, loop_plugins, compute_units))?;

        info!(
            threads = settings.worker_threads,
            plugins = plugins.len(),
            "local kernel started"
        );
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
            plugins,
            settings,
        })
    }

    pub fn settings(&self) -> &KernelSettings {
        &self.settings
    }

    pub fn compute_units(&self) -> usize {
        self.settings.worker_threads
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn is_running(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stop accepting jobs and join the dispatch thread. Idempotent.
    pub fn shutdown(&self) {
        // Dropping the only sender ends the dispatch loop once the queue drains.
        drop(self.tx.lock().unwrap_or_else(PoisonError::into_inner).take());
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("kernel dispatch thread panicked");
            }
            info!("local kernel stopped");
        }
    }
}

impl Drop for LocalKernel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl ComputeBackend for LocalKernel {
    fn submit(&self, job: BackendJob) -> Result<(), Rejected> {
        if job.task.distribution() == Distribution::Remote {
            return Err(Rejected::new(SubmitError::RemoteUnsupported, job));
        }
        if !self.plugins.contains(job.task.plugin_id()) {
            let id = job.task.plugin_id().to_string();
            return Err(Rejected::new(SubmitError::UnknownPlugin(id), job));
        }
        if let Err(e) = job.task.validate() {
            return Err(Rejected::new(e.into(), job));
        }

        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            return Err(Rejected::new(SubmitError::Stopped, job));
        };
        let deadline = Instant::now() + job.task.timeout();
        tx.send(QueuedJob { job, deadline })
            .map_err(|mpsc::SendError(queued)| Rejected::new(SubmitError::Stopped, queued.job))
    }

    fn name(&self) -> &str {
        "local-kernel"
    }
}

fn dispatch_loop(
    rx: Receiver<QueuedJob>,
    pool: rayon::ThreadPool,
    plugins: Arc<PluginRegistry>,
    compute_units: usize,
) {
    while let Ok(QueuedJob { job, deadline }) = rx.recv() {
        let plugins = Arc::clone(&plugins);
        pool.spawn(move || run_job(job, deadline, &plugins, compute_units));
    }
    // Dropping the pool lets already spawned jobs finish.
    debug!("dispatch loop exited");
}

/// The part of `common_args` the kernel itself inspects.
#[derive(Deserialize)]
struct SeedProbe {
    #[serde(default)]
    rand_seed: Vec<u32>,
}

fn run_job(job: BackendJob, deadline: Instant, plugins: &PluginRegistry, compute_units: usize) {
    let BackendJob {
        tasker_id,
        task,
        responder,
    } = job;

    if Instant::now() >= deadline {
        warn!(%tasker_id, "deadline passed before start");
        responder.complete(ResultEnvelope::failure(
            CODE_DEADLINE_EXPIRED,
            format!("timeout_wait of {}s elapsed before the task started", task.timeout().as_secs()),
        ));
        return;
    }

    let seeds = match serde_json::from_str::<SeedProbe>(task.common_args()) {
        Ok(probe) => probe.rand_seed.len(),
        Err(e) => {
            warn!(%tasker_id, error = %e, "unreadable rand_seed");
            responder.complete(ResultEnvelope::failure(
                CODE_BAD_ARGS,
                format!("rand_seed is not a list of seeds: {e}"),
            ));
            return;
        }
    };
    if seeds > compute_units {
        responder.complete(ResultEnvelope::failure(
            CODE_TOO_MANY_SEEDS,
            format!("rand_seed has {seeds} entries but only {compute_units} compute units exist"),
        ));
        return;
    }

    let Some(plugin) = plugins.get(task.plugin_id()) else {
        responder.complete(ResultEnvelope::failure(
            CODE_UNKNOWN_PLUGIN,
            format!("no plugin registered as {:?}", task.plugin_id()),
        ));
        return;
    };

    let started = Instant::now();
    debug!(%tasker_id, plugin = task.plugin_id(), method = task.method_id(), "job started");
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        plugin.invoke(task.method_id(), task.common_args())
    }));
    let envelope = match outcome {
        Ok(Ok(data)) => ResultEnvelope::success(data),
        Ok(Err(failure)) => ResultEnvelope::failure(failure.code, failure.message),
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!(%tasker_id, %message, "plugin panicked");
            ResultEnvelope::failure(CODE_PLUGIN_PANIC, format!("plugin panicked: {message}"))
        }
    };
    info!(
        %tasker_id,
        code = envelope.return_code(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "job finished"
    );
    responder.complete(envelope);
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
