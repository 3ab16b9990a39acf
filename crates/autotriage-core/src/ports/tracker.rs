//! Issue tracker port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use thiserror::Error;

use crate::domain::TicketKey;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// The client's credentials lapsed mid-run. Callers go through the
    /// reauthenticating decorator, which refreshes once and retries once.
    #[error("tracker authentication expired")]
    AuthExpired,

    #[error("ticket {0} not found")]
    NotFound(TicketKey),

    #[error("tracker transport error: {0}")]
    Transport(String),

    #[error("malformed tracker response: {0}")]
    Malformed(String),
}

impl TrackerError {
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, TrackerError::AuthExpired)
    }
}

/// Point-in-time view of one ticket.
///
/// `key` is the canonical key at lookup time: asking for a merged or moved
/// ticket returns the snapshot under its latest key.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueSnapshot {
    pub key: TicketKey,
    pub status: String,
    pub resolved: bool,
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub description: String,
}

impl IssueSnapshot {
    pub fn is_closed(&self) -> bool {
        self.status.eq_ignore_ascii_case("closed")
    }
}

/// Fields for a ticket to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIssue {
    pub project: String,
    pub summary: String,
    pub description: String,
    pub issue_type: String,
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub components: Vec<String>,
    pub priority: String,
}

/// Partial update applied to an existing ticket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueUpdate {
    pub description: Option<String>,
    pub add_labels: Vec<String>,
}

/// Typed search filter; adapters translate this into their query language.
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    pub open_only: bool,
    pub unresolved_only: bool,
    pub created_within: Option<chrono::Duration>,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    pub labels: Vec<String>,
}

/// The issue tracker. Every call may fail with `AuthExpired`; see
/// `impls::reauth` for the retry policy wrapped around this trait.
#[async_trait]
pub trait TicketTracker: Send + Sync {
    async fn create_issue(&self, fields: &NewIssue) -> Result<TicketKey, TrackerError>;

    async fn get_issue(&self, key: &TicketKey) -> Result<IssueSnapshot, TrackerError>;

    async fn update_issue(&self, key: &TicketKey, update: &IssueUpdate)
    -> Result<(), TrackerError>;

    async fn add_attachment(&self, key: &TicketKey, file: &Path) -> Result<(), TrackerError>;

    async fn search_issues(
        &self,
        criteria: &SearchCriteria,
        max_results: usize,
    ) -> Result<Vec<IssueSnapshot>, TrackerError>;
}

/// Credential refresh for the tracker client.
#[async_trait]
pub trait TrackerAuth: Send + Sync {
    async fn refresh(&self) -> Result<(), TrackerError>;
}
