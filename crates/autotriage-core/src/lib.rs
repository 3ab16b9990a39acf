//! autotriage-core
//!
//! Core building blocks for automated triage of failing end-to-end test
//! executions: match each untriaged failure against a corpus of already
//! triaged ones (prefix bucket, fuzzy text, screenshot similarity) and
//! either link it to an existing tracker ticket or mint a new one, under a
//! creation throttle.
//!
//! # Module layout
//! - **domain**: failure records, triage decisions, identifiers, errors
//! - **config**: injected, versioned matching configuration
//! - **similarity**: text and image similarity scoring
//! - **engine**: candidate filter, status cache, throttle, match engine
//! - **ports**: interfaces to the external collaborators (results store,
//!   issue tracker, blob storage, webhook, embedding model, clock)
//! - **app**: run orchestration, write-back, summary counters
//! - **impls**: reauth decorator + in-memory adapters for dev and tests

pub mod app;
pub mod config;
pub mod domain;
pub mod engine;
pub mod impls;
pub mod ports;
pub mod similarity;

pub use app::{TriageRunner, TriageRunSummary, TriageWriter};
pub use config::{TextCompare, TriageConfig, TriageRoute};
pub use domain::{
    FailureRecord, RunUuid, ScanOutcome, TicketKey, TriageDecision, TriageError, TriageRunId,
    TriageSource, TriagedBy,
};
pub use engine::{EnginePorts, MatchEngine};
