//! Triage decisions: the match engine's per-record output.
//!
//! Each untriaged record moves PENDING -> CANDIDATE_SCAN -> {MATCHED,
//! UNMATCHED}; `ScanOutcome` captures the terminal states (plus the implicit
//! "excluded" terminal for records the scan never enters). Terminal states
//! with a decision feed the write-back path.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{RunUuid, TicketKey};
use super::record::TriagedBy;

/// Sentinel category labels stamped on freshly created tickets.
pub const UNKNOWN_L1: &str = "Unknown";
pub const UNDETERMINED_L2: &str = "Undetermined";

/// Confidence of an automated triage decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriageSource {
    /// Text similarity alone (lower confidence).
    SuggestionAutoTriage,
    /// Confirmed by both text and visual similarity, or a fresh ticket.
    AutoTriage,
}

impl TriageSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TriageSource::SuggestionAutoTriage => TriagedBy::SUGGESTION,
            TriageSource::AutoTriage => TriagedBy::AUTO,
        }
    }
}

impl From<TriageSource> for TriagedBy {
    fn from(source: TriageSource) -> Self {
        match source {
            TriageSource::SuggestionAutoTriage => TriagedBy::SuggestionAutoTriage,
            TriageSource::AutoTriage => TriagedBy::AutoTriage,
        }
    }
}

impl fmt::Display for TriageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

/// What the engine decided for one untriaged record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageDecision {
    pub run_uuid: RunUuid,
    pub matched: bool,

    /// Existing ticket (match) or freshly minted one (creation).
    pub ticket: TicketKey,

    pub triage_l1: String,
    pub triage_l2: String,
    pub source: TriageSource,
}

impl TriageDecision {
    /// A match against an existing candidate's ticket, copying its labels.
    /// Candidates missing labels fall back to the sentinels.
    pub fn matched(
        run_uuid: RunUuid,
        ticket: TicketKey,
        triage_l1: Option<String>,
        triage_l2: Option<String>,
        source: TriageSource,
    ) -> Self {
        Self {
            run_uuid,
            matched: true,
            ticket,
            triage_l1: triage_l1.unwrap_or_else(|| UNKNOWN_L1.to_string()),
            triage_l2: triage_l2.unwrap_or_else(|| UNDETERMINED_L2.to_string()),
            source,
        }
    }

    /// A freshly created ticket with sentinel labels.
    pub fn new_ticket(run_uuid: RunUuid, ticket: TicketKey) -> Self {
        Self {
            run_uuid,
            matched: false,
            ticket,
            triage_l1: UNKNOWN_L1.to_string(),
            triage_l2: UNDETERMINED_L2.to_string(),
            source: TriageSource::AutoTriage,
        }
    }
}

/// Terminal state of one record's scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// Skipped before scanning: infra noise or a statically excluded test.
    Excluded,

    /// First acceptable candidate matched.
    Matched(TriageDecision),

    /// No candidate matched; a new ticket was created under the cap.
    Created(TriageDecision),

    /// No candidate matched and the creation cap was reached; the record
    /// stays untriaged this run.
    Throttled,
}

impl ScanOutcome {
    pub fn decision(&self) -> Option<&TriageDecision> {
        match self {
            ScanOutcome::Matched(d) | ScanOutcome::Created(d) => Some(d),
            _ => None,
        }
    }
}
