//! Kernel-hosted pricing capabilities.
//!
//! A plugin is opaque: it receives a method id plus the canonical
//! `common_args` JSON and returns `result_data` text or a coded failure.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

/// Coded failure reported by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("plugin failure {code}: {message}")]
pub struct PluginFailure {
    pub code: i32,
    pub message: String,
}

impl PluginFailure {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

pub trait Plugin: Send + Sync {
    fn id(&self) -> &str;

    /// Run `method_id` on `common_args`. Called on a kernel pool thread.
    fn invoke(&self, method_id: u32, common_args: &str) -> Result<String, PluginFailure>;
}

type InvokeFn = dyn Fn(u32, &str) -> Result<String, PluginFailure> + Send + Sync;

/// Plugin backed by a closure.
pub struct FnPlugin {
    id: String,
    invoke: Box<InvokeFn>,
}

impl FnPlugin {
    pub fn new(
        id: impl Into<String>,
        invoke: impl Fn(u32, &str) -> Result<String, PluginFailure> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            invoke: Box::new(invoke),
        }
    }
}

impl Plugin for FnPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn invoke(&self, method_id: u32, common_args: &str) -> Result<String, PluginFailure> {
        (self.invoke)(method_id, common_args)
    }
}

/// Plugins by id. Built before the kernel starts, read-only afterwards.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `plugin` under its id, replacing any previous holder.
    pub fn register(&mut self, plugin: impl Plugin + 'static) -> &mut Self {
        self.plugins.insert(plugin.id().to_string(), Arc::new(plugin));
        self
    }

    pub fn with(mut self, plugin: impl Plugin + 'static) -> Self {
        self.register(plugin);
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.plugins.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
