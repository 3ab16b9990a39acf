//! Run orchestration: input validation, bundle polling, fetch, engine run.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::app::status::TriageRunSummary;
use crate::config::TriageConfig;
use crate::domain::TriageError;
use crate::engine::MatchEngine;
use crate::ports::bundle_status::BundleStatusStore;
use crate::ports::results_store::ResultsStore;

pub struct TriageRunner {
    config: TriageConfig,
    engine: MatchEngine,
    store: Arc<dyn ResultsStore>,
    bundles: Arc<dyn BundleStatusStore>,
}

impl TriageRunner {
    pub fn new(
        config: TriageConfig,
        engine: MatchEngine,
        store: Arc<dyn ResultsStore>,
        bundles: Arc<dyn BundleStatusStore>,
    ) -> Self {
        Self {
            config,
            engine,
            store,
            bundles,
        }
    }

    /// Triage one feature's untriaged batch.
    ///
    /// Unknown feature names are rejected before any external call. Setup
    /// failures surface here; everything inside the batch is absorbed by
    /// the engine.
    pub async fn run_feature(&self, feature: &str) -> Result<TriageRunSummary, TriageError> {
        if !self.config.known_feature(feature) {
            return Err(TriageError::UnknownFeature(feature.to_string()));
        }

        let window = self.config.triaged_window();
        let mut pool = self.store.triaged_failures(window).await;
        if pool.len() < 2 {
            // A near-empty corpus is usually a flaky first query, not a
            // quiet fortnight; ask once more before scanning against it.
            pool = self.store.triaged_failures(window).await;
        }
        let batch = self.store.untriaged_failures(feature).await;
        info!(feature, untriaged = batch.len(), pool = pool.len(), "inputs fetched");

        Ok(self.engine.run(feature, batch, pool).await)
    }

    /// Wait for a bundle to finish reporting: bounded polling with a fixed
    /// sleep interval and an overall wall-clock ceiling, after which the
    /// last observed (possibly negative) status is returned rather than
    /// blocking indefinitely.
    pub async fn await_bundle_ready(&self, bundle: &str, min_progress: u32) -> bool {
        let interval = Duration::from_secs(self.config.poll_interval_secs);
        let deadline = Instant::now() + Duration::from_secs(self.config.poll_ceiling_secs);

        let mut ready = self.bundles.bundle_ready(bundle, min_progress).await;
        while !ready {
            if Instant::now() >= deadline {
                warn!(bundle, "bundle readiness ceiling reached; giving up");
                break;
            }
            debug!(bundle, "bundle not ready; waiting");
            sleep(interval).await;
            ready = self.bundles.bundle_ready(bundle, min_progress).await;
        }
        ready
    }
}
