//! DerivX runner: task dispatch on top of `derivx-core`.
//!
//! This crate provides:
//! - The `ComputeBackend` seam and the job/responder pair handed across it
//! - `LocalKernel`, an in-process backend hosting pricing plugins on a
//!   private rayon pool
//! - `Dispatcher` with synchronous, callback and handle-based submission
//! - `CachedBackend`, an on-disk memoizing decorator
//! - CSV export of a result surface's reporting window

pub mod backend;
pub mod cache;
pub mod completion;
pub mod dispatcher;
pub mod export;
pub mod kernel;
pub mod logging;
pub mod plugin;
mod registry;
pub mod settings;

pub use backend::{
    BackendJob, ComputeBackend, Rejected, Responder, SubmitError, CODE_BAD_ARGS,
    CODE_DEADLINE_EXPIRED, CODE_PLUGIN_PANIC, CODE_TOO_MANY_SEEDS, CODE_UNKNOWN_PLUGIN,
};
pub use cache::{CacheKey, CachedBackend, CachedResult, ResultCache};
pub use completion::{CompletionEvent, PendingTask, WaitOutcome};
pub use dispatcher::Dispatcher;
pub use export::{window_csv, write_window_csv};
pub use kernel::{KernelError, LocalKernel};
pub use plugin::{FnPlugin, Plugin, PluginFailure, PluginRegistry};
pub use registry::OutstandingTask;
pub use settings::KernelSettings;
