//! Development demo: wires the in-memory adapters to the triage pipeline
//! and runs one batch end to end.

use std::sync::Arc;

use chrono::Utc;

use autotriage_core::app::TriageRunner;
use autotriage_core::config::{TriageConfig, TriageRoute};
use autotriage_core::domain::{FailureRecord, RunUuid, TicketKey, TriagedBy};
use autotriage_core::engine::{EnginePorts, MatchEngine};
use autotriage_core::impls::{
    InMemoryResultsStore, InMemoryTicketFactory, InMemoryTracker, NoopAuth, RecordingNotifier,
    RecordingWriteBack, ReauthTracker, ScriptedBundleStatus, StaticEmbedder, StaticImageStore,
};
use autotriage_core::ports::clock::SystemClock;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // (A) Configuration: one feature with a route, defaults elsewhere.
    let mut config = TriageConfig::default();
    config.features = vec!["checkout".to_string()];
    config.routes.insert(
        "checkout".to_string(),
        TriageRoute {
            assignee: "team-checkout".to_string(),
            label: "#E2ECheckout".to_string(),
        },
    );

    // (B) In-memory collaborators.
    let clock = Arc::new(SystemClock);
    let tracker = Arc::new(InMemoryTracker::new(clock).with_project("SHOP"));
    let images = Arc::new(StaticImageStore::new());
    let embedder = Arc::new(StaticEmbedder::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let write_back = Arc::new(RecordingWriteBack::new());
    let factory = Arc::new(
        InMemoryTicketFactory::new(tracker.clone(), images.clone()).with_project("SHOP"),
    );
    let store = Arc::new(InMemoryResultsStore::new());
    let bundles = Arc::new(ScriptedBundleStatus::new(0));

    // (C) Sample data: one failure that matches a triaged candidate, one
    // novel failure that will mint a ticket, one infra record that is
    // skipped.
    let npe = "NullPointerException\n\tat com.shop.CartPage.open(CartPage.java:88)";
    let existing = tracker.seed_issue("SHOP-101", "Open").await;

    let candidate = FailureRecord::untriaged(
        RunUuid::new("prior-run"),
        "CartTest/testOpen",
        "CartTest",
        npe,
        Utc::now(),
    )
    .with_triage(
        TicketKey::new(existing.as_str()),
        "Product",
        "Cart",
        TriagedBy::Human("jsmith".to_string()),
    );
    store.seed_triaged(vec![candidate]).await;

    let mut infra = FailureRecord::untriaged(
        RunUuid::new("run-3"),
        "HealthTest/testPing",
        "HealthTest",
        "device allocation failed",
        Utc::now(),
    );
    infra.triage_l1 = Some("infra".to_string());

    store
        .seed_untriaged(
            "checkout",
            vec![
                FailureRecord::untriaged(
                    RunUuid::new("run-1"),
                    "CartTest/testOpen",
                    "CartTest",
                    npe,
                    Utc::now(),
                ),
                FailureRecord::untriaged(
                    RunUuid::new("run-2"),
                    "CheckoutTest/testPay",
                    "CheckoutTest",
                    "Timeout waiting for payment sheet",
                    Utc::now(),
                ),
                infra,
            ],
        )
        .await;

    // (D) Wire the engine (tracker behind the reauth policy, as production
    // wiring would) and run the batch.
    let reauth = Arc::new(ReauthTracker::new(tracker.clone(), Arc::new(NoopAuth)));
    let engine = MatchEngine::new(
        config.clone(),
        EnginePorts {
            tracker: reauth,
            factory,
            images,
            embedder,
            notifier: notifier.clone(),
            write_back: write_back.clone(),
        },
    )
    .expect("valid demo configuration");
    let runner = TriageRunner::new(config, engine, store, bundles);

    tracing::info!("running demo triage batch");
    let ready = runner.await_bundle_ready("nightly", 0).await;
    println!("bundle ready: {ready}");

    let summary = runner.run_feature("checkout").await.expect("known feature");
    println!(
        "summary: {}",
        serde_json::to_string_pretty(&summary).expect("serializable summary")
    );

    for (run, update) in write_back.persisted().await {
        println!(
            "write-back: run={} ticket={} by={}",
            run, update.ticket, update.triaged_by
        );
    }
    println!("notified: {:?}", notifier.notifications().await);
}
