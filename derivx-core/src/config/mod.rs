//! Product configuration: the full parameter record of one pricing request.
//!
//! - `ProductConfig`: closed set of families sharing `CommonTerms`.
//! - `validate()` / `violations()`: every invariant, checked in a fixed order.
//! - `to_canonical_json()`: the `common_args` payload; field order is
//!   declaration order, so equal records always produce equal bytes.
//! - `fingerprint()`: BLAKE3 of the canonical payload.

mod checks;
pub mod common;
pub mod presets;
pub mod sharkfin;
pub mod snowball;
pub mod wire;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ValidationError};
use crate::ids::PayloadHash;
use crate::surface::SurfaceShape;

pub use common::{
    CommonTerms, ContractTerms, EvaluationGrid, FinancingTerms, NaturalCalendar,
    PriceLimitStyle, RebateTerms, SimulationParams,
};
pub use sharkfin::{BarrierType, OptionStyle, SharkfinConfig};
pub use snowball::SnowballConfig;

/// Sensitivity selected through `calc_greek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Greek {
    Delta,
    Gamma,
    Vega,
    Theta,
    Rho,
}

impl Greek {
    pub const ALL: [Greek; 5] = [Greek::Delta, Greek::Gamma, Greek::Vega, Greek::Theta, Greek::Rho];

    pub fn tag(self) -> &'static str {
        match self {
            Greek::Delta => "d",
            Greek::Gamma => "g",
            Greek::Vega => "v",
            Greek::Theta => "t",
            Greek::Rho => "r",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.tag() == tag)
    }

    pub fn name(self) -> &'static str {
        match self {
            Greek::Delta => "delta",
            Greek::Gamma => "gamma",
            Greek::Vega => "vega",
            Greek::Theta => "theta",
            Greek::Rho => "rho",
        }
    }
}

impl FromStr for Greek {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s)
            .or_else(|| Self::ALL.into_iter().find(|g| g.name() == s))
            .ok_or_else(|| format!("unknown greek {s:?} (expected one of d, g, v, t, r)"))
    }
}

/// Product family, which also fixes the backend capability to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductFamily {
    Snowball,
    Sharkfin,
}

impl ProductFamily {
    /// Default plugin id for this family.
    pub fn plugin_id(self) -> &'static str {
        match self {
            ProductFamily::Snowball => "derivx_autocall_snowball",
            ProductFamily::Sharkfin => "derivx_barrier_sharkfin",
        }
    }

    /// Family served by a plugin id; accelerator variants share the prefix
    /// (`derivx_autocall_snowball_gpu`).
    pub fn from_plugin_id(plugin_id: &str) -> Option<Self> {
        [ProductFamily::Snowball, ProductFamily::Sharkfin]
            .into_iter()
            .find(|f| plugin_id.starts_with(f.plugin_id()))
    }
}

impl fmt::Display for ProductFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductFamily::Snowball => write!(f, "snowball"),
            ProductFamily::Sharkfin => write!(f, "sharkfin"),
        }
    }
}

impl FromStr for ProductFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "snowball" => Ok(ProductFamily::Snowball),
            "sharkfin" => Ok(ProductFamily::Sharkfin),
            other => Err(format!("unknown product family {other:?} (expected snowball or sharkfin)")),
        }
    }
}

/// Complete configuration of one product.
///
/// Serializes untagged: the family travels in the task descriptor's
/// `plugin_id`, not in the payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProductConfig {
    Snowball(SnowballConfig),
    Sharkfin(SharkfinConfig),
}

impl From<SnowballConfig> for ProductConfig {
    fn from(config: SnowballConfig) -> Self {
        ProductConfig::Snowball(config)
    }
}

impl From<SharkfinConfig> for ProductConfig {
    fn from(config: SharkfinConfig) -> Self {
        ProductConfig::Sharkfin(config)
    }
}

impl ProductConfig {
    /// All-zero record of a family.
    pub fn zeroed(family: ProductFamily) -> Self {
        match family {
            ProductFamily::Snowball => SnowballConfig::default().into(),
            ProductFamily::Sharkfin => SharkfinConfig::default().into(),
        }
    }

    /// Reference product of a family (see `presets`).
    pub fn reference(family: ProductFamily) -> Self {
        match family {
            ProductFamily::Snowball => presets::snowball().into(),
            ProductFamily::Sharkfin => presets::sharkfin_double().into(),
        }
    }

    pub fn family(&self) -> ProductFamily {
        match self {
            ProductConfig::Snowball(_) => ProductFamily::Snowball,
            ProductConfig::Sharkfin(_) => ProductFamily::Sharkfin,
        }
    }

    pub fn common(&self) -> &CommonTerms {
        match self {
            ProductConfig::Snowball(c) => &c.common,
            ProductConfig::Sharkfin(c) => &c.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut CommonTerms {
        match self {
            ProductConfig::Snowball(c) => &mut c.common,
            ProductConfig::Sharkfin(c) => &mut c.common,
        }
    }

    pub fn calc_greek(&self) -> Option<Greek> {
        self.common().evaluation.calc_greek
    }

    /// Copy of this record with a different greek selector.
    pub fn with_greek(&self, greek: Option<Greek>) -> Self {
        let mut copy = self.clone();
        copy.common_mut().evaluation.calc_greek = greek;
        copy
    }

    /// Every invariant violation, in check order.
    pub fn violations(&self) -> Vec<ValidationError> {
        let mut c = checks::Checks::default();
        match self {
            ProductConfig::Snowball(s) => s.check(&mut c),
            ProductConfig::Sharkfin(s) => s.check(&mut c),
        }
        c.into_vec()
    }

    /// First invariant violation, if any.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.violations().into_iter().next() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Canonical `common_args` payload.
    pub fn to_canonical_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Inverse of `to_canonical_json`; every field must be present.
    pub fn parse(family: ProductFamily, json: &str) -> Result<Self, ConfigError> {
        Ok(match family {
            ProductFamily::Snowball => ProductConfig::Snowball(serde_json::from_str(json)?),
            ProductFamily::Sharkfin => ProductConfig::Sharkfin(serde_json::from_str(json)?),
        })
    }

    /// Load a `.json` (wire form) or `.toml` (same flat keys) file.
    pub fn from_path(family: ProductFamily, path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::parse(family, &text),
            Some("toml") => Ok(match family {
                ProductFamily::Snowball => ProductConfig::Snowball(toml::from_str(&text)?),
                ProductFamily::Sharkfin => ProductConfig::Sharkfin(toml::from_str(&text)?),
            }),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    pub fn fingerprint(&self) -> Result<PayloadHash, ConfigError> {
        Ok(PayloadHash::from_bytes(self.to_canonical_json()?.as_bytes()))
    }

    /// Shape every grid result of this configuration must have.
    pub fn surface_shape(&self) -> SurfaceShape {
        let common = self.common();
        SurfaceShape {
            rows: common.evaluation.calc_price.len(),
            cols: common.simulation.runs_step as usize,
        }
    }
}

/// Most points `price_ladder` will produce.
pub const MAX_LADDER_POINTS: usize = 100_000;

/// Inclusive price ladder `low, low + gap, ..., high`.
///
/// Empty when the bounds are unordered or not finite, or when the ladder
/// would exceed `MAX_LADDER_POINTS`.
pub fn price_ladder(low: f64, high: f64, gap: f64) -> Vec<f64> {
    if !(gap > 0.0) || !(low <= high) {
        return Vec::new();
    }
    let steps = ((high - low) / gap + 1e-9).floor();
    if !(steps < MAX_LADDER_POINTS as f64) {
        return Vec::new();
    }
    (0..=steps as usize).map(|i| low + i as f64 * gap).collect()
}
