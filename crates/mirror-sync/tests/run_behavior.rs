//! Run-level behavior: dry runs, failure isolation, sessions, abort.

use mirror_sync::{Credentials, SyncConfig, SyncEngine, SyncSummary};
use mirror_test_utils::{FakeRemote, RecordedCall, attachments, entities, time};
use std::sync::Arc;

fn engine(source: &FakeRemote, replica: &FakeRemote, workers: usize) -> SyncEngine {
    let config = SyncConfig::new(
        Credentials::new("harvester", "source-pw"),
        Credentials::new("harvester", "replica-pw"),
    )
    .with_workers(workers);
    SyncEngine::new(Arc::new(source.clone()), Arc::new(replica.clone()), config)
}

async fn run(
    engine: &SyncEngine,
    refs: Vec<mirror_data::EntityRef>,
    dry_run: bool,
) -> SyncSummary {
    engine
        .synchronize(refs, time::last_sync(), dry_run)
        .await
        .unwrap()
}

fn seed_mixed(source: &FakeRemote, replica: &FakeRemote) {
    source.seed_attachments("S-1", attachments::snapshot(&[("a.txt", 3)]));
    source.seed_attachments("P-1", attachments::snapshot(&[("b.txt", 1)]));
    replica.seed_attachments("P-1", attachments::snapshot(&[("b.txt", 1), ("stale.txt", 2)]));
}

#[tokio::test]
async fn dry_run_mutates_nothing_but_counts_everything() {
    let source = FakeRemote::new();
    let replica = FakeRemote::new();
    seed_mixed(&source, &replica);

    let dry = run(
        &engine(&source, &replica, 2),
        vec![entities::sample("S-1"), entities::project("P-1")],
        true,
    )
    .await;

    assert!(replica.write_calls().is_empty());
    assert!(replica.attachments("P-1").contains("stale.txt"));

    // A real run over the same input counts identically.
    let source2 = FakeRemote::new();
    let replica2 = FakeRemote::new();
    seed_mixed(&source2, &replica2);
    let real = run(
        &engine(&source2, &replica2, 2),
        vec![entities::sample("S-1"), entities::project("P-1")],
        false,
    )
    .await;

    assert_eq!(dry.added(), real.added());
    assert_eq!(dry.updated(), real.updated());
    assert_eq!(dry.deleted(), real.deleted());
    assert_eq!(dry.added(), 1);
    assert_eq!(dry.deleted(), 1);
    assert!(!replica2.attachments("P-1").contains("stale.txt"));
}

#[tokio::test]
async fn failing_entity_never_stops_its_siblings() {
    let source = FakeRemote::new();
    let replica = FakeRemote::new();
    source.seed_attachments("S-OK", attachments::snapshot(&[("a.txt", 1)]));
    source.seed_attachments("S-BAD", attachments::snapshot(&[("b.txt", 1)]));
    replica.fail_writes_for("S-BAD");

    let summary = run(
        &engine(&source, &replica, 1),
        vec![entities::sample("S-BAD"), entities::sample("S-OK")],
        false,
    )
    .await;

    // The failing entity is registered, contributes no counters, and the
    // sibling scheduled after it still converged.
    assert_eq!(summary.not_registered(), vec!["sample:S-BAD".to_string()]);
    assert_eq!(summary.added(), 1);
    assert!(replica.attachments("S-OK").contains("a.txt"));
    assert!(!replica.attachments("S-BAD").contains("b.txt"));
}

#[tokio::test]
async fn incomplete_chain_fails_the_entity_not_the_run() {
    let source = FakeRemote::new();
    let replica = FakeRemote::new();
    // Head claims version 3 but version 2 was never materialized.
    let gappy = mirror_data::AttachmentHistory::new(vec![
        attachments::version("a.txt", 1),
        attachments::version("a.txt", 3),
    ])
    .unwrap();
    source.seed_attachments(
        "S-GAP",
        mirror_data::AttachmentSnapshot::from_histories([gappy]),
    );
    source.seed_attachments("S-OK", attachments::snapshot(&[("b.txt", 1)]));

    let summary = run(
        &engine(&source, &replica, 1),
        vec![entities::sample("S-GAP"), entities::sample("S-OK")],
        false,
    )
    .await;

    assert_eq!(summary.not_registered(), vec!["sample:S-GAP".to_string()]);
    assert_eq!(summary.added(), 1);
    // Nothing partial reached the replica: no version without its
    // predecessors.
    assert!(replica.attachments("S-GAP").is_empty());
}

#[tokio::test]
async fn every_worker_session_is_released() {
    let source = FakeRemote::new();
    let replica = FakeRemote::new();
    for i in 0..6 {
        source.seed_attachments(
            &format!("S-{i}"),
            attachments::snapshot(&[("a.txt", 1)]),
        );
    }

    let refs: Vec<_> = (0..6).map(|i| entities::sample(&format!("S-{i}"))).collect();
    let summary = run(&engine(&source, &replica, 3), refs, false).await;

    assert_eq!(summary.added(), 6);
    assert_eq!(source.open_session_count(), 0);
    assert_eq!(replica.open_session_count(), 0);

    // Each worker opened exactly one session per store.
    let logins = source
        .calls()
        .iter()
        .filter(|c| matches!(c, RecordedCall::Login { .. }))
        .count();
    assert_eq!(logins, 3);
}

#[tokio::test]
async fn rejected_login_surfaces_as_run_error() {
    let source = FakeRemote::new();
    let replica = FakeRemote::new();
    source.seed_attachments("S-1", attachments::snapshot(&[("a.txt", 1)]));
    source.reject_logins();

    let result = engine(&source, &replica, 2)
        .synchronize(vec![entities::sample("S-1")], time::last_sync(), false)
        .await;

    assert!(result.is_err());
    // The replica side never acquired a session either way.
    assert_eq!(replica.open_session_count(), 0);
}

#[tokio::test]
async fn replica_login_failure_releases_the_source_session() {
    let source = FakeRemote::new();
    let replica = FakeRemote::new();
    source.seed_attachments("S-1", attachments::snapshot(&[("a.txt", 1)]));
    replica.reject_logins();

    let result = engine(&source, &replica, 1)
        .synchronize(vec![entities::sample("S-1")], time::last_sync(), false)
        .await;

    assert!(result.is_err());
    assert_eq!(source.open_session_count(), 0);
}

#[tokio::test]
async fn abort_before_start_schedules_no_units() {
    let source = FakeRemote::new();
    let replica = FakeRemote::new();
    source.seed_attachments("S-1", attachments::snapshot(&[("a.txt", 1)]));

    let engine = engine(&source, &replica, 1);
    engine.abort_trigger().send_replace(true);

    let summary = run(&engine, vec![entities::sample("S-1")], false).await;

    assert_eq!(summary.added(), 0);
    assert!(!source
        .calls()
        .iter()
        .any(|c| matches!(c, RecordedCall::ListAttachments { .. })));
    // Sessions were still opened and released cleanly.
    assert_eq!(source.open_session_count(), 0);
}

#[tokio::test]
async fn empty_batch_is_a_clean_noop() {
    let source = FakeRemote::new();
    let replica = FakeRemote::new();

    let summary = run(&engine(&source, &replica, 4), Vec::new(), false).await;

    assert_eq!(summary.added(), 0);
    assert!(!summary.has_failures());
    assert!(source.calls().is_empty());
}
