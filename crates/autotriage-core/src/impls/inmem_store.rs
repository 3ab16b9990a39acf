//! In-memory adapters for the remaining collaborator ports.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::domain::{FailureRecord, RunUuid};
use crate::ports::bundle_status::BundleStatusStore;
use crate::ports::embedder::{EmbedError, ImageEmbedder};
use crate::ports::image_store::ImageStore;
use crate::ports::notifier::Notifier;
use crate::ports::results_store::{ResultsStore, TriageUpdate, TriageWriteBack};

#[derive(Default)]
struct ResultsState {
    untriaged: HashMap<String, Vec<FailureRecord>>,
    triaged: Vec<FailureRecord>,
    untriaged_calls: usize,
    triaged_calls: usize,
}

/// Seedable results store. Unknown features yield an empty batch, matching
/// the port's never-error contract.
#[derive(Default)]
pub struct InMemoryResultsStore {
    state: Mutex<ResultsState>,
}

impl InMemoryResultsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_untriaged(&self, feature: &str, records: Vec<FailureRecord>) {
        self.state
            .lock()
            .await
            .untriaged
            .insert(feature.to_string(), records);
    }

    pub async fn seed_triaged(&self, records: Vec<FailureRecord>) {
        self.state.lock().await.triaged = records;
    }

    pub async fn untriaged_calls(&self) -> usize {
        self.state.lock().await.untriaged_calls
    }

    pub async fn triaged_calls(&self) -> usize {
        self.state.lock().await.triaged_calls
    }
}

#[async_trait]
impl ResultsStore for InMemoryResultsStore {
    async fn untriaged_failures(&self, feature: &str) -> Vec<FailureRecord> {
        let mut state = self.state.lock().await;
        state.untriaged_calls += 1;
        state.untriaged.get(feature).cloned().unwrap_or_default()
    }

    async fn triaged_failures(&self, _window: chrono::Duration) -> Vec<FailureRecord> {
        let mut state = self.state.lock().await;
        state.triaged_calls += 1;
        state.triaged.clone()
    }
}

#[derive(Default)]
struct WriteBackState {
    calls: Vec<TriageUpdate>,
    by_run: HashMap<RunUuid, TriageUpdate>,
}

/// Write-back recorder: keeps the raw call log and the keyed end state, so
/// tests can check both call counts and idempotence.
#[derive(Default)]
pub struct RecordingWriteBack {
    state: Mutex<WriteBackState>,
}

impl RecordingWriteBack {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn call_count(&self) -> usize {
        self.state.lock().await.calls.len()
    }

    pub async fn persisted(&self) -> HashMap<RunUuid, TriageUpdate> {
        self.state.lock().await.by_run.clone()
    }

    pub async fn update_for(&self, run_uuid: &RunUuid) -> Option<TriageUpdate> {
        self.state.lock().await.by_run.get(run_uuid).cloned()
    }
}

#[async_trait]
impl TriageWriteBack for RecordingWriteBack {
    async fn record_triage(&self, update: &TriageUpdate) {
        let mut state = self.state.lock().await;
        state.calls.push(update.clone());
        state.by_run.insert(update.run_uuid.clone(), update.clone());
    }
}

/// Image store that "fetches" any seeded locator without touching disk: the
/// returned path is `local_dir/filename`, which pairs with `StaticEmbedder`
/// keying vectors by filename.
#[derive(Default)]
pub struct StaticImageStore {
    refs: Mutex<HashSet<String>>,
}

impl StaticImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_ref(&self, remote_ref: &str) {
        self.refs.lock().await.insert(remote_ref.to_string());
    }
}

#[async_trait]
impl ImageStore for StaticImageStore {
    async fn fetch_image(
        &self,
        remote_ref: &str,
        local_dir: &Path,
        filename: &str,
    ) -> Option<PathBuf> {
        if remote_ref.is_empty() || !self.refs.lock().await.contains(remote_ref) {
            return None;
        }
        Some(local_dir.join(filename))
    }
}

/// Embedder with canned vectors keyed by filename.
#[derive(Default)]
pub struct StaticEmbedder {
    vectors: Mutex<HashMap<String, Vec<f32>>>,
}

impl StaticEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_vector(&self, filename: &str, vector: Vec<f32>) {
        self.vectors
            .lock()
            .await
            .insert(filename.to_string(), vector);
    }
}

#[async_trait]
impl ImageEmbedder for StaticEmbedder {
    async fn embed(&self, image: &Path) -> Result<Vec<f32>, EmbedError> {
        let name = image
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| EmbedError::Load(image.display().to_string()))?;
        self.vectors
            .lock()
            .await
            .get(&name)
            .cloned()
            .ok_or(EmbedError::Load(name))
    }
}

/// Notifier that remembers what it was asked to announce.
#[derive(Default)]
pub struct RecordingNotifier {
    notified: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn notifications(&self) -> Vec<String> {
        self.notified.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, feature: &str) {
        self.notified.lock().await.push(feature.to_string());
    }
}

/// Bundle status that reports ready after a scripted number of not-ready
/// polls. `u32::MAX` never becomes ready.
pub struct ScriptedBundleStatus {
    ready_after: u32,
    polls: Mutex<u32>,
}

impl ScriptedBundleStatus {
    pub fn new(ready_after: u32) -> Self {
        Self {
            ready_after,
            polls: Mutex::new(0),
        }
    }

    pub async fn poll_count(&self) -> u32 {
        *self.polls.lock().await
    }
}

#[async_trait]
impl BundleStatusStore for ScriptedBundleStatus {
    async fn bundle_ready(&self, _bundle: &str, _min_progress: u32) -> bool {
        let mut polls = self.polls.lock().await;
        *polls += 1;
        self.ready_after != u32::MAX && *polls > self.ready_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TicketKey, TriagedBy};
    use chrono::Utc;

    #[tokio::test]
    async fn unknown_feature_yields_an_empty_batch() {
        let store = InMemoryResultsStore::new();
        assert!(store.untriaged_failures("nope").await.is_empty());
        assert_eq!(store.untriaged_calls().await, 1);
    }

    #[tokio::test]
    async fn seeded_batches_come_back_in_order() {
        let store = InMemoryResultsStore::new();
        let a = FailureRecord::untriaged(RunUuid::new("a"), "T/a", "T", "x", Utc::now());
        let b = FailureRecord::untriaged(RunUuid::new("b"), "T/b", "T", "y", Utc::now());
        store.seed_untriaged("checkout", vec![a.clone(), b.clone()]).await;

        let got = store.untriaged_failures("checkout").await;
        assert_eq!(got, vec![a, b]);
    }

    #[tokio::test]
    async fn write_back_keeps_calls_and_keyed_state() {
        let sink = RecordingWriteBack::new();
        let update = TriageUpdate {
            run_uuid: RunUuid::new("r1"),
            triage_l1: "Unknown".to_string(),
            triage_l2: "Undetermined".to_string(),
            ticket: TicketKey::new("ABC-1"),
            triaged_by: TriagedBy::AutoTriage,
        };
        sink.record_triage(&update).await;
        sink.record_triage(&update).await;

        assert_eq!(sink.call_count().await, 2);
        assert_eq!(sink.persisted().await.len(), 1);
    }

    #[tokio::test]
    async fn image_store_only_serves_seeded_refs() {
        let images = StaticImageStore::new();
        images.add_ref("blob://a").await;

        let dir = Path::new("imgs");
        assert_eq!(
            images.fetch_image("blob://a", dir, "a.png").await,
            Some(PathBuf::from("imgs/a.png"))
        );
        assert!(images.fetch_image("blob://b", dir, "b.png").await.is_none());
        assert!(images.fetch_image("", dir, "c.png").await.is_none());
    }

    #[tokio::test]
    async fn scripted_bundle_becomes_ready_after_n_polls() {
        let bundles = ScriptedBundleStatus::new(2);
        assert!(!bundles.bundle_ready("nightly", 0).await);
        assert!(!bundles.bundle_ready("nightly", 0).await);
        assert!(bundles.bundle_ready("nightly", 0).await);
    }
}
