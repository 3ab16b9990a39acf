//! Failure records as supplied by the test-results store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{RunUuid, TicketKey};

/// Who (or what) triaged a failure.
///
/// Serialized with the write-back wire names: `suggestion-auto-triage` for a
/// text-only match, `auto-triage` for a visually confirmed match or a fresh
/// ticket, anything else is a human identifier. Only meaningful on a triaged
/// record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TriagedBy {
    Unset,
    SuggestionAutoTriage,
    AutoTriage,
    Human(String),
}

impl TriagedBy {
    pub const SUGGESTION: &'static str = "suggestion-auto-triage";
    pub const AUTO: &'static str = "auto-triage";

    pub fn as_str(&self) -> &str {
        match self {
            TriagedBy::Unset => "",
            TriagedBy::SuggestionAutoTriage => Self::SUGGESTION,
            TriagedBy::AutoTriage => Self::AUTO,
            TriagedBy::Human(name) => name,
        }
    }

    pub fn is_automated(&self) -> bool {
        matches!(self, TriagedBy::SuggestionAutoTriage | TriagedBy::AutoTriage)
    }
}

impl From<String> for TriagedBy {
    fn from(s: String) -> Self {
        match s.as_str() {
            "" => TriagedBy::Unset,
            Self::SUGGESTION => TriagedBy::SuggestionAutoTriage,
            Self::AUTO => TriagedBy::AutoTriage,
            _ => TriagedBy::Human(s),
        }
    }
}

impl From<TriagedBy> for String {
    fn from(t: TriagedBy) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for TriagedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

/// One test execution's failure, read from the results store.
///
/// Records are immutable inputs to the pipeline: the engine never writes to
/// a record it was handed. Triage outcomes travel separately (as
/// `TriageDecision`) and land in the store via the write-back collaborator;
/// `with_triage` exists only to extend the in-memory candidate pool with a
/// freshly ticketed copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub run_uuid: RunUuid,
    pub test_method: String,
    pub test_suite_name: String,

    /// Free-text stack trace or message; may be empty.
    pub failure_reason: String,

    /// Opaque blob-store locator for a screenshot; may be empty.
    pub screenshot_ref: String,

    pub triage_l1: Option<String>,
    pub triage_l2: Option<String>,

    pub ticket: Option<TicketKey>,
    pub triaged_by: TriagedBy,

    /// Used for windowing queries upstream.
    pub created_at: DateTime<Utc>,
}

impl FailureRecord {
    /// An untriaged record with the fields every row carries.
    pub fn untriaged(
        run_uuid: RunUuid,
        test_method: impl Into<String>,
        test_suite_name: impl Into<String>,
        failure_reason: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_uuid,
            test_method: test_method.into(),
            test_suite_name: test_suite_name.into(),
            failure_reason: failure_reason.into(),
            screenshot_ref: String::new(),
            triage_l1: None,
            triage_l2: None,
            ticket: None,
            triaged_by: TriagedBy::Unset,
            created_at,
        }
    }

    /// A record is triaged iff it carries a non-empty ticket reference.
    pub fn is_triaged(&self) -> bool {
        self.ticket.as_ref().is_some_and(|k| !k.is_empty())
    }

    /// A triaged copy of this record, for prepending to the candidate pool
    /// after a new ticket is minted. The original is left untouched.
    pub fn with_triage(
        &self,
        ticket: TicketKey,
        triage_l1: impl Into<String>,
        triage_l2: impl Into<String>,
        triaged_by: TriagedBy,
    ) -> Self {
        let mut copy = self.clone();
        copy.ticket = Some(ticket);
        copy.triage_l1 = Some(triage_l1.into());
        copy.triage_l2 = Some(triage_l2.into());
        copy.triaged_by = triaged_by;
        copy
    }
}
