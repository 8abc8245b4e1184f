//! On-disk memoization of successful task results.
//!
//! `ResultCache` stores one JSON file per payload key; `CachedBackend` wraps
//! any `ComputeBackend` and answers repeated payloads from it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use derivx_core::{ResultEnvelope, TaskDescriptor};

use crate::backend::{BackendJob, ComputeBackend, Rejected};

/// BLAKE3 over plugin id, method id and `common_args`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_task(task: &TaskDescriptor) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(task.plugin_id().as_bytes());
        hasher.update(&[0]);
        hasher.update(&task.method_id().to_le_bytes());
        hasher.update(&[0]);
        hasher.update(task.common_args().as_bytes());
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What lands on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResult {
    pub key: CacheKey,
    pub plugin_id: String,
    pub method_id: u32,
    pub stored_at: DateTime<Utc>,
    pub envelope: ResultEnvelope,
}

/// Cache of successful envelopes, one `<key>.json` file each.
#[derive(Debug, Clone)]
pub struct ResultCache {
    cache_dir: PathBuf,
}

impl ResultCache {
    /// The directory is created if it doesn't exist.
    pub fn new(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;
        Ok(Self { cache_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entry_path(key).exists()
    }

    /// Returns `None` if nothing is cached under `key`.
    pub fn get(&self, key: &CacheKey) -> Result<Option<CachedResult>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path).context("Failed to read cached result")?;
        let cached: CachedResult =
            serde_json::from_str(&json).context("Failed to deserialize cached result")?;
        Ok(Some(cached))
    }

    /// Store a successful envelope for `task`. Failures are never cached.
    pub fn put(&self, task: &TaskDescriptor, envelope: &ResultEnvelope) -> Result<bool> {
        if !envelope.is_success() {
            return Ok(false);
        }
        let key = CacheKey::for_task(task);
        let cached = CachedResult {
            plugin_id: task.plugin_id().to_string(),
            method_id: task.method_id(),
            stored_at: Utc::now(),
            envelope: envelope.clone(),
            key: key.clone(),
        };
        let json = serde_json::to_string_pretty(&cached).context("Failed to serialize result")?;
        std::fs::write(self.entry_path(&key), json).context("Failed to write cached result")?;
        Ok(true)
    }

    pub fn remove(&self, key: &CacheKey) -> Result<()> {
        let path = self.entry_path(key);
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove cached result")?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        for path in self.entry_files()? {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entry_files()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn entry_files(&self) -> Result<Vec<PathBuf>> {
        Ok(std::fs::read_dir(&self.cache_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json")
            })
            .collect())
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(format!("{key}.json"))
    }
}

/// Backend decorator that answers repeated payloads from a `ResultCache`.
///
/// Hits reply on a fresh thread, never the submitting one. Misses go to the
/// inner backend; a successful reply is stored before it is delivered.
pub struct CachedBackend<B> {
    inner: B,
    cache: ResultCache,
}

impl<B: ComputeBackend> CachedBackend<B> {
    pub fn new(inner: B, cache: ResultCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn lookup(&self, task: &TaskDescriptor) -> Option<ResultEnvelope> {
        let key = CacheKey::for_task(task);
        match self.cache.get(&key) {
            Ok(hit) => hit.map(|cached| cached.envelope),
            Err(e) => {
                warn!(%key, error = %e, "unreadable cache entry ignored");
                None
            }
        }
    }
}

impl<B: ComputeBackend> ComputeBackend for CachedBackend<B> {
    fn submit(&self, mut job: BackendJob) -> Result<(), Rejected> {
        if let Some(envelope) = self.lookup(&job.task) {
            info!(tasker_id = %job.tasker_id, plugin = job.task.plugin_id(), "cache hit");
            let responder = job.responder;
            // On spawn failure the closure, and with it the responder, is
            // dropped, which replies `Abandoned`.
            if let Err(e) = thread::Builder::new()
                .name("derivx-cache-hit".into())
                .spawn(move || responder.complete(envelope))
            {
                warn!(error = %e, "failed to spawn cache reply thread");
            }
            return Ok(());
        }

        debug!(tasker_id = %job.tasker_id, plugin = job.task.plugin_id(), "cache miss");
        let cache = self.cache.clone();
        let task = job.task.clone();
        job.responder.tap(move |envelope| match cache.put(&task, envelope) {
            Ok(true) => debug!(key = %CacheKey::for_task(&task), "result cached"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "failed to cache result"),
        });
        self.inner.submit(job)
    }

    fn name(&self) -> &str {
        "cached"
    }
}
