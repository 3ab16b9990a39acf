//! Run-level errors.
//!
//! Only top-level setup problems surface as `TriageError`: bad caller input
//! and unusable configuration. Everything that goes wrong inside the scan
//! (per-candidate, per-record) is logged and absorbed so a single bad row
//! can never abort a batch; see the engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TriageError {
    /// Caller asked for a feature the configuration does not know. Rejected
    /// before any external call is made.
    #[error("unknown feature '{0}'")]
    UnknownFeature(String),

    /// The injected configuration is unusable (bad pattern, out-of-range
    /// threshold, missing routing data).
    #[error("invalid configuration: {0}")]
    Config(String),
}
