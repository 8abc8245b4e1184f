//! Kernel settings, loaded from TOML.
//!
//! Every key is optional:
//!
//! ```toml
//! worker_threads = 8
//! thread_prefix = "derivx"
//! default_timeout_secs = 3600
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use derivx_core::task::DEFAULT_TIMEOUT_SECS;
use derivx_core::{DescriptorError, ProductConfig, TaskDescriptor, TaskMethod};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KernelSettings {
    /// Compute units: pool threads, and the cap on `rand_seed` entries.
    pub worker_threads: usize,
    /// Prefix of the dispatch thread and pool thread names.
    pub thread_prefix: String,
    /// `timeout_wait` of descriptors built through `descriptor`.
    pub default_timeout_secs: u64,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            worker_threads: rayon::current_num_threads(),
            thread_prefix: "derivx".to_string(),
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl KernelSettings {
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text).context("failed to parse kernel settings")?;
        settings.check()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read kernel settings: {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn with_worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = n;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// Descriptor for `config` carrying this kernel's default timeout.
    pub fn descriptor(
        &self,
        config: &ProductConfig,
        method: TaskMethod,
    ) -> Result<TaskDescriptor, DescriptorError> {
        TaskDescriptor::new(config, method).map(|task| task.with_timeout(self.default_timeout()))
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.worker_threads == 0 {
            bail!("worker_threads must be at least 1");
        }
        if self.default_timeout_secs == 0 {
            bail!("default_timeout_secs must be at least 1");
        }
        Ok(())
    }
}
