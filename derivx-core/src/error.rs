//! Error types shared by the configuration model and the task protocol.
//!
//! These are designed to be displayable in both CLI output and log lines.

use std::path::PathBuf;
use thiserror::Error;

/// A configuration or descriptor failed an invariant before submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid `{field}`: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors from loading or encoding a product configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported configuration file extension: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A task descriptor could not be built or failed its wire-form checks.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("method {method} is not offered by the {family} family")]
    MethodMismatch { method: String, family: String },

    #[error("greeks requested but calc_greek is unset")]
    GreekMissing,

    #[error("calc_greek {tag:?} is only meaningful with the greeks method")]
    GreekUnexpected { tag: &'static str },

    #[error("plugin {0:?} serves no known product family")]
    UnknownFamily(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("malformed task descriptor: {0}")]
    Wire(#[from] serde_json::Error),
}

/// A payload could not be read as a result surface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurfaceError {
    #[error("envelope carries no data (return_code {code})")]
    NotSuccess { code: i32 },

    #[error("result_data is not a numeric grid: {0}")]
    Malformed(String),

    #[error("row {row} has {len} columns, expected {expected}")]
    Ragged { row: usize, len: usize, expected: usize },

    #[error("surface is {rows}x{cols}, expected {expected_rows}x{expected_cols}")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },

    #[error("window [{from}, {end}) exceeds {cols} columns")]
    WindowOutOfRange { from: usize, end: usize, cols: usize },
}
