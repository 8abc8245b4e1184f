//! DerivX Core: structured-product configuration, task descriptors, result envelopes.
//!
//! This crate holds the pure values exchanged with a pricing backend:
//! - Snowball and sharkfin configuration records with full invariant validation
//! - Canonical `common_args` serialization and its BLAKE3 fingerprint
//! - Task descriptors (plugin, method, distribution, timeout, payload)
//! - Result envelopes, including locally produced timeout/rejection envelopes
//! - Result surfaces decoded from successful payloads
//!
//! No threads live here; dispatching is `derivx-runner`'s job.

pub mod config;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod surface;
pub mod task;

pub use config::{Greek, ProductConfig, ProductFamily, SharkfinConfig, SnowballConfig};
pub use envelope::{EnvelopeKind, ResultEnvelope, SubmissionAck};
pub use error::{ConfigError, DescriptorError, SurfaceError, ValidationError};
pub use ids::{PayloadHash, TaskerId};
pub use surface::{ResultSurface, SurfaceShape, SurfaceWindow};
pub use task::{Distribution, TaskDescriptor, TaskMethod};
