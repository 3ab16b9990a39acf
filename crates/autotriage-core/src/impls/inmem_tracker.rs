//! In-memory issue tracker and ticket factory, for development and tests.
//!
//! State lives in one struct behind an async mutex; handles are cheap to
//! clone via `Arc`. Call counters are exposed so tests can assert how often
//! the pipeline actually hit the tracker.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::TriageRoute;
use crate::domain::{FailureRecord, TicketKey};
use crate::ports::clock::Clock;
use crate::ports::image_store::ImageStore;
use crate::ports::ticket_factory::TicketFactory;
use crate::ports::tracker::{
    IssueSnapshot, IssueUpdate, NewIssue, SearchCriteria, TicketTracker, TrackerError,
};

struct StoredIssue {
    snapshot: IssueSnapshot,
    assignee: Option<String>,
    reporter: Option<String>,
    attachments: Vec<PathBuf>,
}

#[derive(Default)]
struct TrackerState {
    issues: HashMap<TicketKey, StoredIssue>,
    /// Old key -> canonical key, for merged/moved tickets.
    aliases: HashMap<TicketKey, TicketKey>,
    /// Insertion order, so searches are deterministic.
    order: Vec<TicketKey>,
    next_id: u64,
    get_calls: usize,
    search_calls: usize,
    create_calls: usize,
}

pub struct InMemoryTracker {
    project: String,
    reporter: String,
    clock: Arc<dyn Clock>,
    state: Mutex<TrackerState>,
}

impl InMemoryTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            project: "TRIAGE".to_string(),
            reporter: "svc-triage-bot".to_string(),
            clock,
            state: Mutex::new(TrackerState {
                next_id: 1,
                ..TrackerState::default()
            }),
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_reporter(mut self, reporter: impl Into<String>) -> Self {
        self.reporter = reporter.into();
        self
    }

    /// Seed an existing ticket; returns its key.
    pub async fn seed_issue(&self, key: &str, status: &str) -> TicketKey {
        let key = TicketKey::new(key);
        let mut state = self.state.lock().await;
        let snapshot = IssueSnapshot {
            key: key.clone(),
            status: status.to_string(),
            resolved: false,
            labels: Vec::new(),
            created_at: self.clock.now(),
            description: String::new(),
        };
        state.order.push(key.clone());
        state.issues.insert(
            key.clone(),
            StoredIssue {
                snapshot,
                assignee: None,
                reporter: None,
                attachments: Vec::new(),
            },
        );
        key
    }

    pub async fn set_status(&self, key: &str, status: &str) {
        let key = TicketKey::new(key);
        let mut state = self.state.lock().await;
        if let Some(issue) = state.issues.get_mut(&key) {
            issue.snapshot.status = status.to_string();
        }
    }

    /// Register `old` as a moved/merged alias of `canonical`.
    pub async fn add_alias(&self, old: &str, canonical: &str) {
        let mut state = self.state.lock().await;
        state
            .aliases
            .insert(TicketKey::new(old), TicketKey::new(canonical));
    }

    pub async fn get_issue_calls(&self) -> usize {
        self.state.lock().await.get_calls
    }

    pub async fn search_calls(&self) -> usize {
        self.state.lock().await.search_calls
    }

    pub async fn create_calls(&self) -> usize {
        self.state.lock().await.create_calls
    }

    pub async fn attachment_count(&self, key: &TicketKey) -> usize {
        let state = self.state.lock().await;
        let canonical = Self::canonical(&state, key);
        state
            .issues
            .get(&canonical)
            .map(|i| i.attachments.len())
            .unwrap_or(0)
    }

    fn canonical(state: &TrackerState, key: &TicketKey) -> TicketKey {
        state.aliases.get(key).cloned().unwrap_or_else(|| key.clone())
    }

    fn matches(
        issue: &StoredIssue,
        criteria: &SearchCriteria,
        now: chrono::DateTime<chrono::Utc>,
    ) -> bool {
        if criteria.open_only && !issue.snapshot.status.eq_ignore_ascii_case("open") {
            return false;
        }
        if criteria.unresolved_only && issue.snapshot.resolved {
            return false;
        }
        if let Some(window) = criteria.created_within
            && issue.snapshot.created_at < now - window
        {
            return false;
        }
        if let Some(assignee) = &criteria.assignee
            && issue.assignee.as_deref() != Some(assignee.as_str())
        {
            return false;
        }
        if let Some(reporter) = &criteria.reporter
            && issue.reporter.as_deref() != Some(reporter.as_str())
        {
            return false;
        }
        criteria
            .labels
            .iter()
            .all(|l| issue.snapshot.labels.contains(l))
    }
}

#[async_trait]
impl TicketTracker for InMemoryTracker {
    async fn create_issue(&self, fields: &NewIssue) -> Result<TicketKey, TrackerError> {
        let mut state = self.state.lock().await;
        state.create_calls += 1;
        let key = TicketKey::new(format!("{}-{}", self.project, state.next_id));
        state.next_id += 1;

        let snapshot = IssueSnapshot {
            key: key.clone(),
            status: "Open".to_string(),
            resolved: false,
            labels: fields.labels.clone(),
            created_at: self.clock.now(),
            description: fields.description.clone(),
        };
        state.order.push(key.clone());
        state.issues.insert(
            key.clone(),
            StoredIssue {
                snapshot,
                assignee: fields.assignee.clone(),
                reporter: Some(self.reporter.clone()),
                attachments: Vec::new(),
            },
        );
        Ok(key)
    }

    async fn get_issue(&self, key: &TicketKey) -> Result<IssueSnapshot, TrackerError> {
        let mut state = self.state.lock().await;
        state.get_calls += 1;
        let canonical = Self::canonical(&state, key);
        state
            .issues
            .get(&canonical)
            .map(|issue| issue.snapshot.clone())
            .ok_or_else(|| TrackerError::NotFound(key.clone()))
    }

    async fn update_issue(
        &self,
        key: &TicketKey,
        update: &IssueUpdate,
    ) -> Result<(), TrackerError> {
        let mut state = self.state.lock().await;
        let canonical = Self::canonical(&state, key);
        let issue = state
            .issues
            .get_mut(&canonical)
            .ok_or_else(|| TrackerError::NotFound(key.clone()))?;
        if let Some(description) = &update.description {
            issue.snapshot.description = description.clone();
        }
        issue.snapshot.labels.extend(update.add_labels.iter().cloned());
        Ok(())
    }

    async fn add_attachment(&self, key: &TicketKey, file: &Path) -> Result<(), TrackerError> {
        let mut state = self.state.lock().await;
        let canonical = Self::canonical(&state, key);
        let issue = state
            .issues
            .get_mut(&canonical)
            .ok_or_else(|| TrackerError::NotFound(key.clone()))?;
        issue.attachments.push(file.to_path_buf());
        Ok(())
    }

    async fn search_issues(
        &self,
        criteria: &SearchCriteria,
        max_results: usize,
    ) -> Result<Vec<IssueSnapshot>, TrackerError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.search_calls += 1;

        let mut found = Vec::new();
        for key in &state.order {
            if found.len() >= max_results {
                break;
            }
            if let Some(issue) = state.issues.get(key)
                && Self::matches(issue, criteria, now)
            {
                found.push(issue.snapshot.clone());
            }
        }
        Ok(found)
    }
}

/// Ticket factory over any tracker: formats a minimal summary/description,
/// creates the ticket, and attaches the screenshot when one can be fetched.
pub struct InMemoryTicketFactory {
    tracker: Arc<dyn TicketTracker>,
    images: Arc<dyn ImageStore>,
    image_dir: PathBuf,
    project: String,
}

impl InMemoryTicketFactory {
    pub fn new(tracker: Arc<dyn TicketTracker>, images: Arc<dyn ImageStore>) -> Self {
        Self {
            tracker,
            images,
            image_dir: PathBuf::from("ticket-images"),
            project: "TRIAGE".to_string(),
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    fn summary_for(failure: &FailureRecord) -> String {
        let reason: String = failure.failure_reason.chars().take(100).collect();
        let one_line = reason.split_whitespace().collect::<Vec<_>>().join(" ");
        let head = if one_line.is_empty() {
            "No failure reason available"
        } else {
            one_line.as_str()
        };
        format!("[E2E][{}] - {}", failure.test_suite_name, head)
    }
}

#[async_trait]
impl TicketFactory for InMemoryTicketFactory {
    async fn create_for(
        &self,
        failure: &FailureRecord,
        route: Option<&TriageRoute>,
    ) -> Result<TicketKey, TrackerError> {
        let fields = NewIssue {
            project: self.project.clone(),
            summary: Self::summary_for(failure),
            description: format!(
                "Run: {}\nTest: {}\n\n{}",
                failure.run_uuid, failure.test_method, failure.failure_reason
            ),
            issue_type: "Bug".to_string(),
            assignee: route.map(|r| r.assignee.clone()),
            labels: route.map(|r| vec![r.label.clone()]).unwrap_or_default(),
            components: Vec::new(),
            priority: "P1".to_string(),
        };
        let key = self.tracker.create_issue(&fields).await?;

        if !failure.screenshot_ref.is_empty() {
            let fetched = self
                .images
                .fetch_image(
                    &failure.screenshot_ref,
                    &self.image_dir,
                    &format!("{}.png", failure.run_uuid),
                )
                .await;
            if let Some(local) = fetched {
                self.tracker.add_attachment(&key, &local).await?;
                self.tracker
                    .update_issue(
                        &key,
                        &IssueUpdate {
                            description: Some(format!("{}\n\n!snapshot.png!", fields.description)),
                            add_labels: Vec::new(),
                        },
                    )
                    .await?;
            }
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RunUuid;
    use crate::impls::inmem_store::StaticImageStore;
    use crate::ports::clock::FixedClock;
    use chrono::Utc;

    fn tracker() -> (Arc<InMemoryTracker>, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        (Arc::new(InMemoryTracker::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn created_issues_are_open_and_searchable() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let tracker = InMemoryTracker::new(clock).with_reporter("svc-bot");
        let key = tracker
            .create_issue(&NewIssue {
                project: "TRIAGE".to_string(),
                summary: "boom".to_string(),
                description: String::new(),
                issue_type: "Bug".to_string(),
                assignee: Some("team-a".to_string()),
                labels: vec!["#E2E".to_string()],
                components: Vec::new(),
                priority: "P1".to_string(),
            })
            .await
            .unwrap();

        let snapshot = tracker.get_issue(&key).await.unwrap();
        assert_eq!(snapshot.status, "Open");

        let criteria = SearchCriteria {
            open_only: true,
            unresolved_only: true,
            assignee: Some("team-a".to_string()),
            reporter: Some("svc-bot".to_string()),
            labels: vec!["#E2E".to_string()],
            ..SearchCriteria::default()
        };
        let found = tracker.search_issues(&criteria, 50).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, key);
    }

    #[tokio::test]
    async fn search_window_excludes_old_issues() {
        let (tracker, clock) = tracker();
        tracker.seed_issue("TRIAGE-9", "Open").await;
        clock.advance(chrono::Duration::hours(30));

        let criteria = SearchCriteria {
            created_within: Some(chrono::Duration::hours(23)),
            ..SearchCriteria::default()
        };
        let found = tracker.search_issues(&criteria, 50).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn aliases_resolve_to_the_canonical_key() {
        let (tracker, _clock) = tracker();
        tracker.seed_issue("NEW-1", "Open").await;
        tracker.add_alias("OLD-1", "NEW-1").await;

        let snapshot = tracker.get_issue(&TicketKey::new("OLD-1")).await.unwrap();
        assert_eq!(snapshot.key, TicketKey::new("NEW-1"));
    }

    #[tokio::test]
    async fn unknown_keys_are_not_found() {
        let (tracker, _clock) = tracker();
        let err = tracker.get_issue(&TicketKey::new("NOPE-1")).await;
        assert!(matches!(err, Err(TrackerError::NotFound(_))));
    }

    #[tokio::test]
    async fn factory_attaches_screenshot_when_available() {
        let (tracker, _clock) = tracker();
        let images = Arc::new(StaticImageStore::new());
        images.add_ref("blob://shot-1").await;

        let factory = InMemoryTicketFactory::new(tracker.clone(), images);
        let mut failure = FailureRecord::untriaged(
            RunUuid::new("r1"),
            "CartTest/testAdd",
            "CartTest",
            "boom at Cart.java:5",
            Utc::now(),
        );
        failure.screenshot_ref = "blob://shot-1".to_string();

        let key = factory.create_for(&failure, None).await.unwrap();
        assert_eq!(tracker.attachment_count(&key).await, 1);
    }

    #[tokio::test]
    async fn factory_summary_collapses_the_reason_to_one_line() {
        let failure = FailureRecord::untriaged(
            RunUuid::new("r1"),
            "CartTest/testAdd",
            "CartTest",
            "line one\nline two",
            Utc::now(),
        );
        assert_eq!(
            InMemoryTicketFactory::summary_for(&failure),
            "[E2E][CartTest] - line one line two"
        );
    }
}
