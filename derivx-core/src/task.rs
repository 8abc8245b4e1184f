//! Task descriptor: which backend capability to run, on which payload.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{Greek, ProductConfig, ProductFamily};
use crate::error::{DescriptorError, ValidationError};
use crate::ids::PayloadHash;

/// Seconds a task may run before either side gives up on it.
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// Family-specific operation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskMethod {
    /// Snowball: solve the fair coupon.
    Coupon,
    /// Sharkfin: option price.
    Price,
    Payoff,
    Greeks,
}

impl TaskMethod {
    pub fn method_id(self) -> u32 {
        match self {
            TaskMethod::Coupon | TaskMethod::Price => 1,
            TaskMethod::Payoff => 2,
            TaskMethod::Greeks => 3,
        }
    }

    pub fn supports(self, family: ProductFamily) -> bool {
        match self {
            TaskMethod::Coupon => family == ProductFamily::Snowball,
            TaskMethod::Price => family == ProductFamily::Sharkfin,
            TaskMethod::Payoff | TaskMethod::Greeks => true,
        }
    }

    pub fn from_id(family: ProductFamily, method_id: u32) -> Option<Self> {
        match (family, method_id) {
            (ProductFamily::Snowball, 1) => Some(TaskMethod::Coupon),
            (ProductFamily::Sharkfin, 1) => Some(TaskMethod::Price),
            (_, 2) => Some(TaskMethod::Payoff),
            (_, 3) => Some(TaskMethod::Greeks),
            _ => None,
        }
    }
}

impl fmt::Display for TaskMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskMethod::Coupon => "coupon",
            TaskMethod::Price => "price",
            TaskMethod::Payoff => "payoff",
            TaskMethod::Greeks => "greeks",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for TaskMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coupon" => Ok(TaskMethod::Coupon),
            "price" => Ok(TaskMethod::Price),
            "payoff" => Ok(TaskMethod::Payoff),
            "greeks" => Ok(TaskMethod::Greeks),
            other => Err(format!(
                "unknown method {other:?} (expected coupon, price, payoff or greeks)"
            )),
        }
    }
}

/// Where the backend should run the task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Distribution {
    #[default]
    Local,
    Remote,
}

impl From<Distribution> for u8 {
    fn from(d: Distribution) -> u8 {
        match d {
            Distribution::Local => 0,
            Distribution::Remote => 1,
        }
    }
}

impl TryFrom<u8> for Distribution {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Distribution::Local),
            1 => Ok(Distribution::Remote),
            other => Err(format!("unknown distribute_type {other}")),
        }
    }
}

/// An immutable, serialized request.
///
/// `common_args` is the canonical configuration captured at construction;
/// later changes to the source configuration never reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    plugin_id: String,
    method_id: u32,
    distribute_type: Distribution,
    /// Seconds.
    timeout_wait: u64,
    common_args: String,
}

impl TaskDescriptor {
    /// Validate `config`, check it fits `method`, and serialize it.
    ///
    /// Addresses the family's default plugin, locally, with the default
    /// timeout; use the `with_*` builders to change those.
    pub fn new(config: &ProductConfig, method: TaskMethod) -> Result<Self, DescriptorError> {
        config.validate()?;
        let family = config.family();
        if !method.supports(family) {
            return Err(DescriptorError::MethodMismatch {
                method: method.to_string(),
                family: family.to_string(),
            });
        }
        match (method, config.calc_greek()) {
            (TaskMethod::Greeks, None) => return Err(DescriptorError::GreekMissing),
            (TaskMethod::Greeks, Some(_)) | (_, None) => {}
            (_, Some(greek)) => return Err(DescriptorError::GreekUnexpected { tag: greek.tag() }),
        }

        Ok(Self {
            plugin_id: family.plugin_id().to_string(),
            method_id: method.method_id(),
            distribute_type: Distribution::Local,
            timeout_wait: DEFAULT_TIMEOUT_SECS,
            common_args: config.to_canonical_json()?,
        })
    }

    /// Greeks descriptor for `greek`, leaving `config` untouched.
    pub fn greeks(config: &ProductConfig, greek: Greek) -> Result<Self, DescriptorError> {
        Self::new(&config.with_greek(Some(greek)), TaskMethod::Greeks)
    }

    /// Address a specific plugin variant of the same family.
    pub fn with_plugin(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_id = plugin_id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_wait = timeout.as_secs();
        self
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribute_type = distribution;
        self
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn method_id(&self) -> u32 {
        self.method_id
    }

    pub fn distribution(&self) -> Distribution {
        self.distribute_type
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_wait)
    }

    pub fn common_args(&self) -> &str {
        &self.common_args
    }

    pub fn family(&self) -> Option<ProductFamily> {
        ProductFamily::from_plugin_id(&self.plugin_id)
    }

    pub fn method(&self) -> Option<TaskMethod> {
        TaskMethod::from_id(self.family()?, self.method_id)
    }

    pub fn payload_hash(&self) -> PayloadHash {
        PayloadHash::from_bytes(self.common_args.as_bytes())
    }

    /// Decode `common_args` back into a configuration.
    pub fn config(&self) -> Result<ProductConfig, DescriptorError> {
        let family = self
            .family()
            .ok_or_else(|| DescriptorError::UnknownFamily(self.plugin_id.clone()))?;
        Ok(ProductConfig::parse(family, &self.common_args)?)
    }

    /// Wire-level checks for a descriptor that did not come from `new`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.plugin_id.trim().is_empty() {
            return Err(ValidationError::new("plugin_id", "must not be empty"));
        }
        if !(1..=3).contains(&self.method_id) {
            return Err(ValidationError::new(
                "method_id",
                format!("must be 1, 2 or 3, got {}", self.method_id),
            ));
        }
        if self.timeout_wait == 0 {
            return Err(ValidationError::new("timeout_wait", "must be > 0"));
        }
        match serde_json::from_str::<serde_json::Value>(&self.common_args) {
            Ok(serde_json::Value::Object(_)) => Ok(()),
            Ok(_) => Err(ValidationError::new("common_args", "must be a JSON object")),
            Err(e) => Err(ValidationError::new("common_args", e.to_string())),
        }
    }

    /// Wire JSON of the whole descriptor.
    pub fn to_args(&self) -> Result<String, DescriptorError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_args(text: &str) -> Result<Self, DescriptorError> {
        let task: Self = serde_json::from_str(text)?;
        task.validate()?;
        Ok(task)
    }
}
