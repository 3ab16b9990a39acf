//! Reauthenticating tracker decorator.
//!
//! Tracker credentials expire mid-run. Policy: on an auth-expiry error,
//! refresh the credentials once and retry the same call exactly once. Any
//! other error, and any error on the retried call, propagates untouched.
//! The policy is this explicit wrapper type, so it is visible at wiring
//! time and testable in isolation.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::domain::TicketKey;
use crate::ports::tracker::{
    IssueSnapshot, IssueUpdate, NewIssue, SearchCriteria, TicketTracker, TrackerAuth, TrackerError,
};

/// Auth that has nothing to refresh, for adapters whose credentials cannot
/// expire (in-memory, tests).
pub struct NoopAuth;

#[async_trait]
impl TrackerAuth for NoopAuth {
    async fn refresh(&self) -> Result<(), TrackerError> {
        Ok(())
    }
}

pub struct ReauthTracker {
    inner: Arc<dyn TicketTracker>,
    auth: Arc<dyn TrackerAuth>,
}

impl ReauthTracker {
    pub fn new(inner: Arc<dyn TicketTracker>, auth: Arc<dyn TrackerAuth>) -> Self {
        Self { inner, auth }
    }

    async fn refresh(&self, call: &str) -> Result<(), TrackerError> {
        debug!(call, "tracker auth expired; refreshing and retrying once");
        self.auth.refresh().await
    }
}

#[async_trait]
impl TicketTracker for ReauthTracker {
    async fn create_issue(&self, fields: &NewIssue) -> Result<TicketKey, TrackerError> {
        match self.inner.create_issue(fields).await {
            Err(e) if e.is_auth_expired() => {
                self.refresh("create_issue").await?;
                self.inner.create_issue(fields).await
            }
            other => other,
        }
    }

    async fn get_issue(&self, key: &TicketKey) -> Result<IssueSnapshot, TrackerError> {
        match self.inner.get_issue(key).await {
            Err(e) if e.is_auth_expired() => {
                self.refresh("get_issue").await?;
                self.inner.get_issue(key).await
            }
            other => other,
        }
    }

    async fn update_issue(
        &self,
        key: &TicketKey,
        update: &IssueUpdate,
    ) -> Result<(), TrackerError> {
        match self.inner.update_issue(key, update).await {
            Err(e) if e.is_auth_expired() => {
                self.refresh("update_issue").await?;
                self.inner.update_issue(key, update).await
            }
            other => other,
        }
    }

    async fn add_attachment(&self, key: &TicketKey, file: &Path) -> Result<(), TrackerError> {
        match self.inner.add_attachment(key, file).await {
            Err(e) if e.is_auth_expired() => {
                self.refresh("add_attachment").await?;
                self.inner.add_attachment(key, file).await
            }
            other => other,
        }
    }

    async fn search_issues(
        &self,
        criteria: &SearchCriteria,
        max_results: usize,
    ) -> Result<Vec<IssueSnapshot>, TrackerError> {
        match self.inner.search_issues(criteria, max_results).await {
            Err(e) if e.is_auth_expired() => {
                self.refresh("search_issues").await?;
                self.inner.search_issues(criteria, max_results).await
            }
            other => other,
        }
    }
}
