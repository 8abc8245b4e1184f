//! Result envelope: the outcome of one task, from the backend or produced
//! locally when no backend answer can be had.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;
use crate::ids::TaskerId;
use crate::surface::{ResultSurface, SurfaceShape};

/// The caller gave up waiting for the backend.
pub const CODE_LOCAL_TIMEOUT: i32 = -1001;
/// The task never reached a backend worker.
pub const CODE_SUBMISSION_REJECTED: i32 = -1002;
/// The backend dropped the task without answering.
pub const CODE_ABANDONED: i32 = -1003;
/// Stand-in for a backend failure reported with code 0.
pub const CODE_UNSPECIFIED: i32 = -1;

/// Where an envelope came from. Local-only; never on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Success,
    BackendFailure,
    LocalTimeout,
    SubmissionRejected,
    Abandoned,
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnvelopeKind::Success => "success",
            EnvelopeKind::BackendFailure => "backend failure",
            EnvelopeKind::LocalTimeout => "local timeout",
            EnvelopeKind::SubmissionRejected => "submission rejected",
            EnvelopeKind::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

/// Outcome of a task. Exactly one of `return_info` / `result_data` is
/// meaningful, selected by `return_code == 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireEnvelope")]
pub struct ResultEnvelope {
    return_code: i32,
    return_info: String,
    result_data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tasker_id: Option<TaskerId>,
    #[serde(skip)]
    kind: EnvelopeKind,
}

#[derive(Deserialize)]
struct WireEnvelope {
    return_code: i32,
    #[serde(default)]
    return_info: String,
    #[serde(default)]
    result_data: String,
    #[serde(default)]
    tasker_id: Option<TaskerId>,
}

impl From<WireEnvelope> for ResultEnvelope {
    fn from(w: WireEnvelope) -> Self {
        let envelope = if w.return_code == 0 {
            Self::success(w.result_data)
        } else {
            Self::failure(w.return_code, w.return_info)
        };
        match w.tasker_id {
            Some(id) => envelope.with_tasker_id(id),
            None => envelope,
        }
    }
}

impl ResultEnvelope {
    pub fn success(data: impl Into<String>) -> Self {
        Self {
            return_code: 0,
            return_info: String::new(),
            result_data: data.into(),
            tasker_id: None,
            kind: EnvelopeKind::Success,
        }
    }

    /// Backend-reported failure. A zero `code` is replaced by
    /// `CODE_UNSPECIFIED` so the envelope can never read as a success.
    pub fn failure(code: i32, info: impl Into<String>) -> Self {
        let code = if code == 0 { CODE_UNSPECIFIED } else { code };
        Self::local(EnvelopeKind::BackendFailure, code, info.into())
    }

    pub fn timeout(after: Duration) -> Self {
        Self::local(
            EnvelopeKind::LocalTimeout,
            CODE_LOCAL_TIMEOUT,
            format!("no backend reply within {}s", after.as_secs_f64()),
        )
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::local(
            EnvelopeKind::SubmissionRejected,
            CODE_SUBMISSION_REJECTED,
            reason.into(),
        )
    }

    pub fn abandoned() -> Self {
        Self::local(
            EnvelopeKind::Abandoned,
            CODE_ABANDONED,
            "backend dropped the task without a reply".to_string(),
        )
    }

    fn local(kind: EnvelopeKind, code: i32, info: String) -> Self {
        Self {
            return_code: code,
            return_info: info,
            result_data: String::new(),
            tasker_id: None,
            kind,
        }
    }

    pub fn with_tasker_id(mut self, id: TaskerId) -> Self {
        self.tasker_id = Some(id);
        self
    }

    pub fn kind(&self) -> EnvelopeKind {
        self.kind
    }

    pub fn is_success(&self) -> bool {
        self.return_code == 0
    }

    pub fn return_code(&self) -> i32 {
        self.return_code
    }

    /// Diagnostic text; empty on success.
    pub fn return_info(&self) -> &str {
        &self.return_info
    }

    /// Payload, only for successful envelopes.
    pub fn result_data(&self) -> Option<&str> {
        self.is_success().then_some(self.result_data.as_str())
    }

    pub fn tasker_id(&self) -> Option<&TaskerId> {
        self.tasker_id.as_ref()
    }

    /// Decode the payload as a grid of `shape`.
    pub fn surface(&self, shape: SurfaceShape) -> Result<ResultSurface, SurfaceError> {
        match self.result_data() {
            Some(data) => ResultSurface::decode(data, shape),
            None => Err(SurfaceError::NotSuccess {
                code: self.return_code,
            }),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl fmt::Display for ResultEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            write!(f, "success ({} bytes)", self.result_data.len())
        } else {
            write!(f, "{} [{}]: {}", self.kind, self.return_code, self.return_info)
        }
    }
}

/// Acknowledgment of an accepted async submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionAck {
    pub tasker_id: TaskerId,
}
