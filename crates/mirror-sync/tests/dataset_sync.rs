//! End-to-end data-set reconciliation against the in-memory fake stores.

use mirror_sync::{Credentials, SyncConfig, SyncEngine, SyncSummary};
use mirror_test_utils::{FakeRemote, RecordedCall, datasets, entities, time};
use std::sync::Arc;

fn engine(source: &FakeRemote, replica: &FakeRemote) -> SyncEngine {
    let config = SyncConfig::new(
        Credentials::new("harvester", "source-pw"),
        Credentials::new("harvester", "replica-pw"),
    )
    .with_workers(2);
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

#[tokio::test]
async fn absent_data_set_is_downloaded_then_registered() {
    let source = FakeRemote::new();
    let replica = FakeRemote::new();
    let record = datasets::record(
        "DS-1",
        &[("organism", "yeast")],
        &[("raw/plate_1.csv", 5), ("raw/plate_2.csv", 7)],
    );
    source.seed_data_set(record);
    source.seed_file("DS-1", "raw/plate_1.csv", b"1,2,3");
    source.seed_file("DS-1", "raw/plate_2.csv", b"4,5,6,7");

    let summary = run(&engine(&source, &replica), vec![entities::data_set("DS-1")], false).await;

    assert_eq!(summary.added(), 1);
    assert!(!summary.has_failures());

    // The payload was staged before registration: the register call saw
    // every manifest file on disk.
    let register = replica
        .calls()
        .into_iter()
        .find_map(|c| match c {
            RecordedCall::RegisterDataSet { code, staged_files } => Some((code, staged_files)),
            _ => None,
        })
        .expect("register call recorded");
    assert_eq!(register.0, "DS-1");
    assert_eq!(
        register.1,
        vec!["raw/plate_1.csv".to_string(), "raw/plate_2.csv".to_string()]
    );

    let registered = replica.data_set("DS-1").unwrap();
    assert_eq!(registered.properties["organism"], "yeast");
}

#[tokio::test]
async fn present_data_set_updates_metadata_without_downloading() {
    let source = FakeRemote::new();
    let replica = FakeRemote::new();
    source.seed_data_set(datasets::record(
        "DS-2",
        &[("organism", "yeast"), ("strain", "BY4741")],
        &[("raw/data.bin", 9)],
    ));
    replica.seed_data_set(datasets::record(
        "DS-2",
        &[("organism", "e.coli"), ("obsolete", "x")],
        &[("raw/data.bin", 9)],
    ));

    let summary = run(&engine(&source, &replica), vec![entities::data_set("DS-2")], false).await;

    assert_eq!(summary.updated(), 1);
    assert!(!source
        .calls()
        .iter()
        .any(|c| matches!(c, RecordedCall::DownloadFiles { .. })));

    // Every incoming property set, the stale one explicitly cleared.
    let update = replica
        .calls()
        .into_iter()
        .find_map(|c| match c {
            RecordedCall::UpdateDataSet { properties, .. } => Some(properties),
            _ => None,
        })
        .expect("update call recorded");
    assert_eq!(update["organism"], "yeast");
    assert_eq!(update["strain"], "BY4741");
    assert_eq!(update["obsolete"], "");

    let updated = replica.data_set("DS-2").unwrap();
    assert_eq!(updated.properties.get("organism").unwrap(), "yeast");
    assert!(!updated.properties.contains_key("obsolete"));
}

#[tokio::test]
async fn convergent_data_set_is_untouched_on_the_next_run() {
    let source = FakeRemote::new();
    let replica = FakeRemote::new();
    source.seed_data_set(datasets::record("DS-3", &[("a", "1")], &[]));
    replica.seed_data_set(datasets::record("DS-3", &[("a", "0")], &[]));

    let engine = engine(&source, &replica);
    let first = run(&engine, vec![entities::data_set("DS-3")], false).await;
    assert_eq!(first.updated(), 1);

    let writes_after_first = replica.write_calls().len();
    let second = run(&engine, vec![entities::data_set("DS-3")], false).await;
    assert_eq!(second.updated(), 0);
    assert_eq!(replica.write_calls().len(), writes_after_first);
}

#[tokio::test]
async fn dry_run_reports_transitions_without_any_mutation() {
    let source = FakeRemote::new();
    let replica = FakeRemote::new();
    source.seed_data_set(datasets::record("DS-NEW", &[], &[("f.bin", 1)]));
    source.seed_file("DS-NEW", "f.bin", b"x");
    source.seed_data_set(datasets::record("DS-UPD", &[("k", "new")], &[]));
    replica.seed_data_set(datasets::record("DS-UPD", &[("k", "old")], &[]));

    let summary = run(
        &engine(&source, &replica),
        vec![entities::data_set("DS-NEW"), entities::data_set("DS-UPD")],
        true,
    )
    .await;

    assert_eq!(summary.added(), 1);
    assert_eq!(summary.updated(), 1);
    assert!(replica.write_calls().is_empty());
    assert!(!source
        .calls()
        .iter()
        .any(|c| matches!(c, RecordedCall::DownloadFiles { .. })));
    assert!(replica.data_set("DS-NEW").is_none());
}

#[tokio::test]
async fn malformed_manifest_is_rejected_before_any_download() {
    let source = FakeRemote::new();
    let replica = FakeRemote::new();
    let mut record = datasets::record("DS-BAD", &[], &[]);
    record.manifest = mirror_data::FileManifest::new(vec![mirror_data::ManifestEntry {
        path: "../escape".to_string(),
        directory: false,
        size: Some(1),
        checksum_crc32: None,
    }]);
    source.seed_data_set(record);

    let summary = run(&engine(&source, &replica), vec![entities::data_set("DS-BAD")], false).await;

    assert_eq!(summary.not_registered(), vec!["dataset:DS-BAD".to_string()]);
    assert_eq!(summary.added(), 0);
    assert!(!source
        .calls()
        .iter()
        .any(|c| matches!(c, RecordedCall::DownloadFiles { .. })));
    assert!(replica.data_set("DS-BAD").is_none());
}

#[tokio::test]
async fn corrupt_download_fails_before_registration() {
    let source = FakeRemote::new();
    let replica = FakeRemote::new();

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(b"expected-bytes");
    let checksum = hasher.finalize();

    let mut record = datasets::record("DS-CRC", &[], &[]);
    record.manifest = mirror_data::FileManifest::new(vec![mirror_data::ManifestEntry {
        path: "f.bin".to_string(),
        directory: false,
        size: Some(14),
        checksum_crc32: Some(checksum),
    }]);
    source.seed_data_set(record);
    source.seed_file("DS-CRC", "f.bin", b"tampered-bytes");

    let summary = run(&engine(&source, &replica), vec![entities::data_set("DS-CRC")], false).await;

    assert_eq!(summary.not_registered(), vec!["dataset:DS-CRC".to_string()]);
    assert!(replica.data_set("DS-CRC").is_none());
    assert!(!replica
        .calls()
        .iter()
        .any(|c| matches!(c, RecordedCall::RegisterDataSet { .. })));
}

#[tokio::test]
async fn vanished_data_set_fails_only_itself() {
    let source = FakeRemote::new();
    let replica = FakeRemote::new();
    source.seed_data_set(datasets::record("DS-OK", &[("a", "1")], &[]));
    // DS-GONE listed in the change feed but unknown to the source store.

    let summary = run(
        &engine(&source, &replica),
        vec![entities::data_set("DS-GONE"), entities::data_set("DS-OK")],
        false,
    )
    .await;

    assert_eq!(summary.not_registered(), vec!["dataset:DS-GONE".to_string()]);
    assert_eq!(summary.added(), 1);
    assert!(replica.data_set("DS-OK").is_some());
}

#[tokio::test]
async fn failing_registration_is_isolated_per_record() {
    let source = FakeRemote::new();
    let replica = FakeRemote::new();
    source.seed_data_set(datasets::record("DS-A", &[], &[("a.bin", 1)]));
    source.seed_file("DS-A", "a.bin", b"a");
    source.seed_data_set(datasets::record("DS-B", &[], &[("b.bin", 1)]));
    source.seed_file("DS-B", "b.bin", b"b");
    replica.fail_writes_for("DS-A");

    let summary = run(
        &engine(&source, &replica),
        vec![entities::data_set("DS-A"), entities::data_set("DS-B")],
        false,
    )
    .await;

    assert_eq!(summary.not_registered(), vec!["dataset:DS-A".to_string()]);
    assert_eq!(summary.added(), 1);
    assert!(replica.data_set("DS-A").is_none());
    assert!(replica.data_set("DS-B").is_some());
}
