//! Injected triage configuration.
//!
//! Everything the matching pipeline treats as data lives here: similarity
//! thresholds, the candidate-filter prefix length, the creation throttle,
//! exclusion lists, and the feature routing table. The whole struct is
//! deserializable and versioned so deployments can ship new exclusions or
//! routes without touching the matching logic, and tests can inject exactly
//! the shape they need.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::domain::{FailureRecord, TicketKey, TriageError};

/// Routing metadata for one feature: who owns its new tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageRoute {
    /// Assignee for newly created tickets, also part of the throttle filter.
    pub assignee: String,

    /// Tracker label stamped on (and searched for) this feature's tickets.
    pub label: String,
}

/// How two failure reasons are compared textually.
///
/// The two variants correspond to the two historical call sites: comparing
/// a fixed-length prefix of the raw reason, or comparing everything before
/// a marker substring (typically the first source-file suffix, so the
/// comparison sees the exception text but not the volatile frame tail).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum TextCompare {
    TruncatedFull { max_chars: usize, threshold: u32 },
    BeforeMarker { marker: String, threshold: u32 },
}

impl Default for TextCompare {
    fn default() -> Self {
        TextCompare::TruncatedFull {
            max_chars: 300,
            threshold: 96,
        }
    }
}

impl TextCompare {
    pub fn threshold(&self) -> u32 {
        match self {
            TextCompare::TruncatedFull { threshold, .. } => *threshold,
            TextCompare::BeforeMarker { threshold, .. } => *threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Bumped whenever the shipped exclusion/routing data changes.
    pub version: u32,

    /// Feature names the runner accepts; anything else is rejected before
    /// external calls are made.
    pub features: Vec<String>,

    /// Feature name -> routing metadata.
    pub routes: HashMap<String, TriageRoute>,

    /// Reporter identity of the bot account, part of the throttle filter.
    pub reporter: String,

    /// Candidate-filter bucket width, in characters.
    pub prefix_len: usize,

    pub text_compare: TextCompare,

    /// Cosine-similarity threshold for screenshot comparison, in (0, 1].
    pub image_threshold: f32,

    /// Top-level failure category that marks infrastructure noise.
    pub infra_category: String,

    /// Tickets whose key contains this marker are infra tickets and are
    /// never reused as match targets.
    pub infra_ticket_marker: String,

    /// Known-flaky or deprecated tests that must never auto-generate
    /// tickets.
    pub excluded_tests: HashSet<String>,

    /// Tickets treated as actionable without a status lookup.
    pub pinned_tickets: HashSet<TicketKey>,

    /// Maximum bot-created tickets inside the throttle window.
    pub ticket_cap: usize,

    /// Throttle window, slightly under a day so the limit behaves like a
    /// calendar-day cap without midnight edge effects.
    pub throttle_window_hours: i64,

    /// Page size for throttle searches.
    pub search_max_results: usize,

    /// Fire the notification webhook when this many untriaged records
    /// remain in the batch.
    pub notify_remaining: usize,

    /// How far back the triaged candidate pool reaches.
    pub triaged_window_hours: i64,

    /// Stack-frame pattern for failure-location extraction.
    pub location_frame_pattern: String,

    /// Bundle-readiness polling: fixed sleep between checks.
    pub poll_interval_secs: u64,

    /// Bundle-readiness polling: overall wall-clock ceiling.
    pub poll_ceiling_secs: u64,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            version: 1,
            features: Vec::new(),
            routes: HashMap::new(),
            reporter: "svc-triage-bot".to_string(),
            prefix_len: 25,
            text_compare: TextCompare::default(),
            image_threshold: 0.93,
            infra_category: "infra".to_string(),
            infra_ticket_marker: "INFRA".to_string(),
            excluded_tests: HashSet::new(),
            pinned_tickets: HashSet::new(),
            ticket_cap: 65,
            throttle_window_hours: 23,
            search_max_results: 50,
            notify_remaining: 10,
            triaged_window_hours: 15 * 24,
            location_frame_pattern: r"(?m)^\s*at \S+\(\S+:\d+\)".to_string(),
            poll_interval_secs: 120,
            poll_ceiling_secs: 20 * 60 * 60,
        }
    }
}

impl TriageConfig {
    pub fn from_json(json: &str) -> Result<Self, TriageError> {
        let config: TriageConfig =
            serde_json::from_str(json).map_err(|e| TriageError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Fail-fast sanity check, run once at wiring time.
    pub fn validate(&self) -> Result<(), TriageError> {
        if self.prefix_len == 0 {
            return Err(TriageError::Config("prefix_len must be positive".into()));
        }
        if !(0.0 < self.image_threshold && self.image_threshold <= 1.0) {
            return Err(TriageError::Config(format!(
                "image_threshold {} outside (0, 1]",
                self.image_threshold
            )));
        }
        if self.text_compare.threshold() > 100 {
            return Err(TriageError::Config(format!(
                "text threshold {} outside [0, 100]",
                self.text_compare.threshold()
            )));
        }
        if self.throttle_window_hours <= 0 {
            return Err(TriageError::Config(
                "throttle_window_hours must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn known_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    pub fn route_for(&self, feature: &str) -> Option<&TriageRoute> {
        self.routes.get(feature)
    }

    /// Records excluded from triage entirely: infrastructure noise, or a
    /// test on the static exclusion list.
    pub fn is_excluded(&self, record: &FailureRecord) -> bool {
        let infra = record
            .triage_l1
            .as_deref()
            .is_some_and(|l1| l1.eq_ignore_ascii_case(&self.infra_category));
        infra || self.excluded_tests.contains(&record.test_method)
    }

    pub fn throttle_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.throttle_window_hours)
    }

    pub fn triaged_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.triaged_window_hours)
    }
}
