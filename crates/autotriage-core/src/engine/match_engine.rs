//! The match engine: the per-record scan loop.
//!
//! Each untriaged record runs PENDING -> CANDIDATE_SCAN -> {MATCHED,
//! UNMATCHED}. The scan filters the triaged pool to a prefix bucket, walks
//! it in supplied order, and takes the first acceptable candidate, not the
//! best-scoring one. Candidate order comes from the upstream query and is
//! never re-sorted; re-sorting changes outcomes.
//!
//! Inputs are immutable. Ticket-key resolution results live in a per-run
//! map on the side, so a candidate reused across several records in the
//! batch is resolved once and its record stays untouched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::app::status::TriageRunSummary;
use crate::app::writer::TriageWriter;
use crate::config::{TextCompare, TriageConfig};
use crate::domain::{
    FailureRecord, LocationExtractor, ScanOutcome, TicketKey, TriageDecision, TriageError,
    TriageRunId, TriageSource, TriagedBy, UNDETERMINED_L2, UNKNOWN_L1,
};
use crate::engine::filter;
use crate::engine::status_cache::TicketStatusCache;
use crate::engine::throttle::TicketThrottle;
use crate::ports::embedder::ImageEmbedder;
use crate::ports::image_store::ImageStore;
use crate::ports::notifier::Notifier;
use crate::ports::results_store::TriageWriteBack;
use crate::ports::ticket_factory::TicketFactory;
use crate::ports::tracker::{TicketTracker, TrackerError};
use crate::similarity::{self, ImageSimilarity};

/// Collaborators the engine is wired with.
pub struct EnginePorts {
    pub tracker: Arc<dyn TicketTracker>,
    pub factory: Arc<dyn TicketFactory>,
    pub images: Arc<dyn ImageStore>,
    pub embedder: Arc<dyn ImageEmbedder>,
    pub notifier: Arc<dyn Notifier>,
    pub write_back: Arc<dyn TriageWriteBack>,
}

/// Mutable per-run scan state, created for one batch and dropped with it.
struct RunState {
    /// Raw ticket key -> canonical key (None when resolution failed).
    resolved: HashMap<TicketKey, Option<TicketKey>>,
    cache: TicketStatusCache,
}

pub struct MatchEngine {
    config: TriageConfig,
    tracker: Arc<dyn TicketTracker>,
    factory: Arc<dyn TicketFactory>,
    images: Arc<dyn ImageStore>,
    scorer: ImageSimilarity,
    notifier: Arc<dyn Notifier>,
    writer: TriageWriter,
    throttle: TicketThrottle,
    locations: LocationExtractor,
    image_dir: PathBuf,
}

impl MatchEngine {
    pub fn new(config: TriageConfig, ports: EnginePorts) -> Result<Self, TriageError> {
        config.validate()?;
        let locations = LocationExtractor::new(&config.location_frame_pattern)?;
        let throttle = TicketThrottle::new(
            config.ticket_cap,
            config.throttle_window(),
            config.search_max_results,
        );
        Ok(Self {
            scorer: ImageSimilarity::new(ports.embedder),
            writer: TriageWriter::new(ports.write_back),
            tracker: ports.tracker,
            factory: ports.factory,
            images: ports.images,
            notifier: ports.notifier,
            throttle,
            locations,
            image_dir: PathBuf::from("triage-images"),
            config,
        })
    }

    pub fn with_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_dir = dir.into();
        self
    }

    /// Triage one batch. `untriaged` is scanned in the supplied order;
    /// `triaged` seeds the candidate pool and grows (at the front) as new
    /// tickets are minted, so later records in the batch can match them.
    pub async fn run(
        &self,
        feature: &str,
        untriaged: Vec<FailureRecord>,
        triaged: Vec<FailureRecord>,
    ) -> TriageRunSummary {
        let run_id = TriageRunId::generate();
        let total = untriaged.len();
        info!(
            run = %run_id,
            feature,
            untriaged = total,
            pool = triaged.len(),
            "starting triage run"
        );

        let mut pool = triaged;
        let mut state = RunState {
            resolved: HashMap::new(),
            cache: TicketStatusCache::new(self.config.pinned_tickets.iter().cloned()),
        };
        let mut summary = TriageRunSummary::default();
        let mut notified = false;

        for (idx, failure) in untriaged.iter().enumerate() {
            if !notified && total - idx <= self.config.notify_remaining {
                self.notifier.notify(feature).await;
                notified = true;
            }

            let outcome = self
                .triage_record(feature, failure, &mut pool, &mut state, &mut summary)
                .await;
            summary.record(&outcome);
        }

        info!(
            run = %run_id,
            matched = summary.matched(),
            created = summary.created,
            throttled = summary.throttled,
            excluded = summary.excluded,
            "triage run finished"
        );
        summary
    }

    async fn triage_record(
        &self,
        feature: &str,
        failure: &FailureRecord,
        pool: &mut Vec<FailureRecord>,
        state: &mut RunState,
        summary: &mut TriageRunSummary,
    ) -> ScanOutcome {
        if self.config.is_excluded(failure) {
            debug!(run = %failure.run_uuid, "excluded from triage");
            return ScanOutcome::Excluded;
        }

        // Missing screenshot degrades the scan to text-only.
        let screenshot = self.fetch_screenshot(failure).await;

        if let Some(decision) = self
            .find_match(failure, screenshot.as_deref(), pool, state, summary)
            .await
        {
            self.writer.apply(&decision).await;
            return ScanOutcome::Matched(decision);
        }

        let route = self.config.route_for(feature);
        if !self
            .throttle
            .under_cap(self.tracker.as_ref(), route, &self.config.reporter)
            .await
        {
            info!(run = %failure.run_uuid, "creation cap reached; leaving untriaged");
            return ScanOutcome::Throttled;
        }

        match self.factory.create_for(failure, route).await {
            Ok(ticket) => {
                let decision = TriageDecision::new_ticket(failure.run_uuid.clone(), ticket.clone());
                self.writer.apply(&decision).await;
                pool.insert(
                    0,
                    failure.with_triage(ticket, UNKNOWN_L1, UNDETERMINED_L2, TriagedBy::AutoTriage),
                );
                ScanOutcome::Created(decision)
            }
            Err(e) => {
                // Creation trouble is isolated to this record.
                warn!(run = %failure.run_uuid, error = %e, "ticket creation failed");
                summary.errors += 1;
                ScanOutcome::Throttled
            }
        }
    }

    /// First acceptable candidate wins; errors scoring one candidate skip
    /// it and the scan moves on.
    async fn find_match(
        &self,
        failure: &FailureRecord,
        screenshot: Option<&Path>,
        pool: &[FailureRecord],
        state: &mut RunState,
        summary: &mut TriageRunSummary,
    ) -> Option<TriageDecision> {
        for idx in filter::narrow(pool, failure, self.config.prefix_len) {
            let candidate = &pool[idx];
            match self
                .scan_candidate(failure, screenshot, candidate, state)
                .await
            {
                Ok(Some(decision)) => return Some(decision),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        run = %failure.run_uuid,
                        candidate = %candidate.run_uuid,
                        error = %e,
                        "candidate scan failed; skipping candidate"
                    );
                    summary.errors += 1;
                }
            }
        }
        None
    }

    async fn scan_candidate(
        &self,
        failure: &FailureRecord,
        screenshot: Option<&Path>,
        candidate: &FailureRecord,
        state: &mut RunState,
    ) -> Result<Option<TriageDecision>, TrackerError> {
        let Some(raw_key) = candidate.ticket.as_ref().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };

        // Infra tickets are never reused as match targets.
        if raw_key.as_str().contains(&self.config.infra_ticket_marker) {
            return Ok(None);
        }

        let Some(ticket) = self.resolve_key(raw_key, state).await? else {
            return Ok(None);
        };

        if !state.cache.resolve(self.tracker.as_ref(), &ticket).await {
            return Ok(None);
        }

        if !self.text_criterion(failure, candidate) {
            return Ok(None);
        }

        let mut source = TriageSource::SuggestionAutoTriage;
        if let Some(ours) = screenshot {
            if let Some(theirs) = self.fetch_screenshot(candidate).await {
                if self
                    .scorer
                    .images_similar(ours, &theirs, self.config.image_threshold)
                    .await
                {
                    source = TriageSource::AutoTriage;
                }
            }
        }

        Ok(Some(TriageDecision::matched(
            failure.run_uuid.clone(),
            ticket,
            candidate.triage_l1.clone(),
            candidate.triage_l2.clone(),
            source,
        )))
    }

    /// Canonical (latest) key for a candidate's ticket; tickets get merged
    /// and moved, so the raw key from the pool may be stale. Memoized per
    /// run; a failed resolution is memoized too so the next record does not
    /// repeat the lookup.
    async fn resolve_key(
        &self,
        raw_key: &TicketKey,
        state: &mut RunState,
    ) -> Result<Option<TicketKey>, TrackerError> {
        if let Some(known) = state.resolved.get(raw_key) {
            return Ok(known.clone());
        }
        match self.tracker.get_issue(raw_key).await {
            Ok(snapshot) => {
                state
                    .resolved
                    .insert(raw_key.clone(), Some(snapshot.key.clone()));
                Ok(Some(snapshot.key))
            }
            Err(e) => {
                state.resolved.insert(raw_key.clone(), None);
                Err(e)
            }
        }
    }

    /// Text criterion: fuzzy similarity under the configured strategy, or
    /// equality of the extracted failure-location tokens. Records whose
    /// locations fail to extract can only match on similarity.
    fn text_criterion(&self, failure: &FailureRecord, candidate: &FailureRecord) -> bool {
        let similar = match &self.config.text_compare {
            TextCompare::TruncatedFull {
                max_chars,
                threshold,
            } => similarity::text_similar(
                &truncate_chars(&candidate.failure_reason, *max_chars),
                &truncate_chars(&failure.failure_reason, *max_chars),
                *threshold,
            ),
            TextCompare::BeforeMarker { marker, threshold } => similarity::text_similar(
                &before_marker(&candidate.failure_reason, marker),
                &before_marker(&failure.failure_reason, marker),
                *threshold,
            ),
        };
        if similar {
            return true;
        }

        match (
            self.locations.extract(&candidate.failure_reason),
            self.locations.extract(&failure.failure_reason),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    async fn fetch_screenshot(&self, record: &FailureRecord) -> Option<PathBuf> {
        if record.screenshot_ref.is_empty() {
            return None;
        }
        self.images
            .fetch_image(
                &record.screenshot_ref,
                &self.image_dir,
                &format!("{}.png", record.run_uuid),
            )
            .await
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Everything before the first (case-insensitive) occurrence of `marker`.
/// Without the marker, the head of the string stands in so comparison still
/// sees the exception text.
fn before_marker(s: &str, marker: &str) -> String {
    let lower = s.to_lowercase();
    match lower.find(&marker.to_lowercase()) {
        Some(pos) => {
            let head_chars = lower[..pos].chars().count();
            s.chars().take(head_chars).collect()
        }
        None => truncate_chars(s, 100),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TriageRoute;
    use crate::domain::RunUuid;
    use crate::impls::inmem_store::{
        RecordingNotifier, RecordingWriteBack, StaticEmbedder, StaticImageStore,
    };
    use crate::impls::inmem_tracker::{InMemoryTicketFactory, InMemoryTracker};
    use crate::ports::clock::FixedClock;
    use chrono::Utc;

    struct Harness {
        engine: MatchEngine,
        tracker: Arc<InMemoryTracker>,
        images: Arc<StaticImageStore>,
        embedder: Arc<StaticEmbedder>,
        notifier: Arc<RecordingNotifier>,
        write_back: Arc<RecordingWriteBack>,
    }

    fn config() -> TriageConfig {
        let mut config = TriageConfig::default();
        config.features = vec!["checkout".to_string()];
        config.routes.insert(
            "checkout".to_string(),
            TriageRoute {
                assignee: "team-checkout".to_string(),
                label: "#E2ECheckout".to_string(),
            },
        );
        config
    }

    fn harness(config: TriageConfig) -> Harness {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let tracker = Arc::new(InMemoryTracker::new(clock));
        let images = Arc::new(StaticImageStore::new());
        let embedder = Arc::new(StaticEmbedder::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let write_back = Arc::new(RecordingWriteBack::new());
        let factory = Arc::new(InMemoryTicketFactory::new(tracker.clone(), images.clone()));

        let engine = MatchEngine::new(
            config,
            EnginePorts {
                tracker: tracker.clone(),
                factory,
                images: images.clone(),
                embedder: embedder.clone(),
                notifier: notifier.clone(),
                write_back: write_back.clone(),
            },
        )
        .unwrap();

        Harness {
            engine,
            tracker,
            images,
            embedder,
            notifier,
            write_back,
        }
    }

    fn failure(run: &str, reason: &str) -> FailureRecord {
        FailureRecord::untriaged(RunUuid::new(run), "CartTest/testAdd", "CartTest", reason, Utc::now())
    }

    fn candidate(run: &str, reason: &str, ticket: &str) -> FailureRecord {
        failure(run, reason).with_triage(
            TicketKey::new(ticket),
            "Product",
            "Checkout",
            TriagedBy::Human("jsmith".to_string()),
        )
    }

    const NPE: &str = "NullPointerException at Foo.java:12";

    #[tokio::test]
    async fn text_only_match_is_a_suggestion() {
        let h = harness(config());
        h.tracker.seed_issue("ABC-1", "Open").await;

        let summary = h
            .engine
            .run(
                "checkout",
                vec![failure("r1", NPE)],
                vec![candidate("c1", NPE, "ABC-1")],
            )
            .await;

        assert_eq!(summary.matched_suggested, 1);
        let update = h.write_back.update_for(&RunUuid::new("r1")).await.unwrap();
        assert_eq!(update.ticket, TicketKey::new("ABC-1"));
        assert_eq!(update.triage_l1, "Product");
        assert_eq!(update.triage_l2, "Checkout");
        assert_eq!(update.triaged_by, TriagedBy::SuggestionAutoTriage);
    }

    #[tokio::test]
    async fn visual_confirmation_upgrades_the_source() {
        let h = harness(config());
        h.tracker.seed_issue("ABC-1", "Open").await;
        h.images.add_ref("blob://r1").await;
        h.images.add_ref("blob://c1").await;
        h.embedder.set_vector("r1.png", vec![1.0, 0.0, 0.1]).await;
        h.embedder.set_vector("c1.png", vec![1.0, 0.0, 0.1]).await;

        let mut current = failure("r1", NPE);
        current.screenshot_ref = "blob://r1".to_string();
        let mut prior = candidate("c1", NPE, "ABC-1");
        prior.screenshot_ref = "blob://c1".to_string();

        let summary = h.engine.run("checkout", vec![current], vec![prior]).await;

        assert_eq!(summary.matched_confirmed, 1);
        let update = h.write_back.update_for(&RunUuid::new("r1")).await.unwrap();
        assert_eq!(update.triaged_by, TriagedBy::AutoTriage);
    }

    #[tokio::test]
    async fn dissimilar_screenshots_stay_a_suggestion() {
        let h = harness(config());
        h.tracker.seed_issue("ABC-1", "Open").await;
        h.images.add_ref("blob://r1").await;
        h.images.add_ref("blob://c1").await;
        h.embedder.set_vector("r1.png", vec![1.0, 0.0]).await;
        h.embedder.set_vector("c1.png", vec![0.0, 1.0]).await;

        let mut current = failure("r1", NPE);
        current.screenshot_ref = "blob://r1".to_string();
        let mut prior = candidate("c1", NPE, "ABC-1");
        prior.screenshot_ref = "blob://c1".to_string();

        let summary = h.engine.run("checkout", vec![current], vec![prior]).await;
        assert_eq!(summary.matched_suggested, 1);
    }

    #[tokio::test]
    async fn first_acceptable_candidate_wins_not_the_best() {
        let h = harness(config());
        h.tracker.seed_issue("ABC-0", "Closed").await;
        h.tracker.seed_issue("ABC-2", "Open").await;
        h.tracker.seed_issue("ABC-3", "Open").await;

        let pool = vec![
            candidate("c0", NPE, "INFRA-7"), // infra marker, skipped
            candidate("c1", NPE, "ABC-0"),   // closed, skipped
            candidate("c2", NPE, "ABC-2"),   // first acceptable
            candidate("c3", NPE, "ABC-3"),   // equally similar, must not win
        ];

        h.engine.run("checkout", vec![failure("r1", NPE)], pool).await;

        let update = h.write_back.update_for(&RunUuid::new("r1")).await.unwrap();
        assert_eq!(update.ticket, TicketKey::new("ABC-2"));
    }

    #[tokio::test]
    async fn before_marker_strategy_compares_the_reason_head() {
        let mut config = config();
        config.text_compare = TextCompare::BeforeMarker {
            marker: ".java".to_string(),
            threshold: 95,
        };
        let h = harness(config);
        h.tracker.seed_issue("ABC-1", "Open").await;

        // Identical up to the first source-file suffix, diverging after it.
        let reason_a = "Timeout waiting for cart badge\n\tat shop.CartPage.open(CartPage.java:90)";
        let reason_b = "Timeout waiting for cart badge\n\tat shop.CartPage.open(CartPage.java:95)";

        let summary = h
            .engine
            .run(
                "checkout",
                vec![failure("r1", reason_a)],
                vec![candidate("c1", reason_b, "ABC-1")],
            )
            .await;

        assert_eq!(summary.matched_suggested, 1);
    }

    #[tokio::test]
    async fn location_equality_matches_when_fuzzy_text_does_not() {
        let h = harness(config());
        h.tracker.seed_issue("ABC-1", "Open").await;

        // Same file:line, very different messages; share no 25-char prefix
        // either, so pin the pool reason's prefix to the current one.
        let reason_a = "Expected cart badge, found nothing\n\tat com.shop.CartPage.badge(CartPage.java:88)";
        let reason_b = "Expected cart badge, found 3 items after retry storm and a very different tail\n\tat com.shop.CartPage.badge(CartPage.java:88)";

        let summary = h
            .engine
            .run(
                "checkout",
                vec![failure("r1", reason_a)],
                vec![candidate("c1", reason_b, "ABC-1")],
            )
            .await;

        assert_eq!(summary.matched(), 1);
    }

    #[tokio::test]
    async fn empty_pool_under_cap_creates_a_ticket_with_sentinels() {
        let h = harness(config());

        let summary = h
            .engine
            .run("checkout", vec![failure("r1", NPE)], Vec::new())
            .await;

        assert_eq!(summary.created, 1);
        assert_eq!(h.tracker.create_calls().await, 1);
        let update = h.write_back.update_for(&RunUuid::new("r1")).await.unwrap();
        assert_eq!(update.triage_l1, "Unknown");
        assert_eq!(update.triage_l2, "Undetermined");
        assert_eq!(update.triaged_by, TriagedBy::AutoTriage);
    }

    #[tokio::test]
    async fn at_cap_nothing_is_created_or_written_back() {
        let mut config = config();
        config.ticket_cap = 0;
        let h = harness(config);

        let summary = h
            .engine
            .run("checkout", vec![failure("r1", NPE)], Vec::new())
            .await;

        assert_eq!(summary.throttled, 1);
        assert_eq!(h.tracker.create_calls().await, 0);
        assert_eq!(h.write_back.call_count().await, 0);
    }

    #[tokio::test]
    async fn created_ticket_joins_the_pool_for_later_records() {
        let h = harness(config());

        let summary = h
            .engine
            .run(
                "checkout",
                vec![failure("r1", NPE), failure("r2", NPE)],
                Vec::new(),
            )
            .await;

        assert_eq!(summary.created, 1);
        assert_eq!(summary.matched_suggested, 1);
        assert_eq!(h.tracker.create_calls().await, 1);

        let first = h.write_back.update_for(&RunUuid::new("r1")).await.unwrap();
        let second = h.write_back.update_for(&RunUuid::new("r2")).await.unwrap();
        assert_eq!(first.ticket, second.ticket);
    }

    #[tokio::test]
    async fn infra_noise_and_excluded_tests_never_reach_the_tracker() {
        let mut config = config();
        config
            .excluded_tests
            .insert("CartTest/testAdd".to_string());
        let h = harness(config);

        let mut infra = failure("r1", NPE);
        infra.test_method = "OtherTest/testOther".to_string();
        infra.triage_l1 = Some("Infra".to_string());
        let excluded = failure("r2", NPE);

        let summary = h
            .engine
            .run("checkout", vec![infra, excluded], Vec::new())
            .await;

        assert_eq!(summary.excluded, 2);
        assert_eq!(h.tracker.create_calls().await, 0);
        assert_eq!(h.write_back.call_count().await, 0);
    }

    #[tokio::test]
    async fn a_broken_candidate_does_not_abort_the_scan() {
        let h = harness(config());
        h.tracker.seed_issue("ABC-2", "Open").await;

        let pool = vec![
            candidate("c1", NPE, "GONE-1"), // unresolvable key
            candidate("c2", NPE, "ABC-2"),
        ];

        let summary = h.engine.run("checkout", vec![failure("r1", NPE)], pool).await;

        assert_eq!(summary.matched(), 1);
        assert_eq!(summary.errors, 1);
        let update = h.write_back.update_for(&RunUuid::new("r1")).await.unwrap();
        assert_eq!(update.ticket, TicketKey::new("ABC-2"));
    }

    #[tokio::test]
    async fn stale_keys_resolve_once_per_run_via_the_side_map() {
        let h = harness(config());
        h.tracker.seed_issue("NEW-1", "Open").await;
        h.tracker.add_alias("OLD-1", "NEW-1").await;

        let pool = vec![candidate("c1", NPE, "OLD-1")];
        h.engine
            .run(
                "checkout",
                vec![failure("r1", NPE), failure("r2", NPE)],
                pool,
            )
            .await;

        let first = h.write_back.update_for(&RunUuid::new("r1")).await.unwrap();
        let second = h.write_back.update_for(&RunUuid::new("r2")).await.unwrap();
        assert_eq!(first.ticket, TicketKey::new("NEW-1"));
        assert_eq!(second.ticket, TicketKey::new("NEW-1"));

        // One resolution for OLD-1 plus one status lookup for NEW-1: the
        // second record reuses both per-run maps.
        assert_eq!(h.tracker.get_issue_calls().await, 2);
    }

    #[tokio::test]
    async fn notification_fires_once_when_the_batch_is_nearly_done() {
        let h = harness(config());
        h.tracker.seed_issue("ABC-1", "Open").await;

        h.engine
            .run(
                "checkout",
                vec![failure("r1", NPE), failure("r2", NPE)],
                vec![candidate("c1", NPE, "ABC-1")],
            )
            .await;

        assert_eq!(h.notifier.notifications().await, vec!["checkout".to_string()]);
    }
}
