use serde::{Deserialize, Serialize};
use std::fmt;

/// Content hash of a canonical configuration payload (BLAKE3, hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayloadHash(pub String);

impl PayloadHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    /// First `n` hex characters, for log lines and tasker ids.
    pub fn short(&self, n: usize) -> &str {
        &self.0[..n.min(self.0.len())]
    }
}

impl fmt::Display for PayloadHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque correlation id handed back in an async acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskerId(pub String);

impl TaskerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Sequence number plus payload prefix, e.g. `00000042-3f9a1c0b2d4e`.
    pub fn from_sequence(seq: u64, payload: &PayloadHash) -> Self {
        Self(format!("{seq:08}-{}", payload.short(12)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
