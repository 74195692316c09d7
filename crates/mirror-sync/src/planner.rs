//! Per-entity reconciliation planning.
//!
//! Compares the source and replica attachment snapshots of one entity and
//! produces the ordered change list the appliers execute. Pure; all I/O has
//! already happened in the snapshot fetch.

use chrono::{DateTime, Utc};
use mirror_data::{AttachmentChange, AttachmentSnapshot};

/// Computes the change list for one entity.
///
/// Decision per file present on the source:
///
/// - absent from the replica → add-chain from version 1;
/// - source head behind the replica head → replace (the replica is somehow
///   ahead of the authority; full delete-and-retransfer, deliberately not
///   collapsed into a metadata patch);
/// - heads equal but the source head was re-registered after `last_sync` →
///   replace (same version number can hide different content);
/// - heads equal, only title/description differ → metadata patch, no
///   content transfer; `None` compares equal only to `None`, never to `""`;
/// - heads equal, nothing differs → no change;
/// - source head ahead → add-chain from the replica head + 1.
///
/// Files only the replica holds are deleted, after all source-driven
/// changes. Add-chains materialize oldest-first so an interrupted apply
/// never leaves a version on the replica without its predecessors.
pub fn plan(
    source: &AttachmentSnapshot,
    replica: &AttachmentSnapshot,
    last_sync: DateTime<Utc>,
) -> Vec<AttachmentChange> {
    let mut changes = Vec::new();

    for (file_name, source_history) in &source.files {
        let source_head = source_history.head();
        match replica.get(file_name) {
            None => changes.push(AttachmentChange::AddChain {
                file_name: file_name.clone(),
                from_version: 1,
            }),
            Some(replica_history) => {
                let replica_head = replica_history.head();
                if source_head.version < replica_head.version {
                    changes.push(AttachmentChange::Replace {
                        file_name: file_name.clone(),
                    });
                } else if source_head.version == replica_head.version {
                    if source_head.registration_date > last_sync {
                        changes.push(AttachmentChange::Replace {
                            file_name: file_name.clone(),
                        });
                    } else if source_head.title != replica_head.title
                        || source_head.description != replica_head.description
                    {
                        changes.push(AttachmentChange::PatchMetadata {
                            file_name: file_name.clone(),
                            title: source_head.title.clone(),
                            description: source_head.description.clone(),
                        });
                    }
                } else {
                    changes.push(AttachmentChange::AddChain {
                        file_name: file_name.clone(),
                        from_version: replica_head.version + 1,
                    });
                }
            }
        }
    }

    for file_name in replica.files.keys() {
        if !source.contains(file_name) {
            changes.push(AttachmentChange::Delete {
                file_name: file_name.clone(),
            });
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::TimeZone;
    use mirror_data::{AttachmentHistory, AttachmentVersion};
    use rstest::rstest;

    fn last_sync() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn before_sync() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn after_sync() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
    }

    fn version_at(
        file_name: &str,
        version: u32,
        title: Option<&str>,
        description: Option<&str>,
        registered: DateTime<Utc>,
    ) -> AttachmentVersion {
        AttachmentVersion {
            file_name: file_name.to_string(),
            version,
            title: title.map(Into::into),
            description: description.map(Into::into),
            content: Some(Bytes::from(format!("{file_name}-v{version}"))),
            registration_date: registered,
        }
    }

    fn snapshot_of(chains: &[(&str, u32)]) -> AttachmentSnapshot {
        AttachmentSnapshot::from_histories(chains.iter().map(|(name, head)| {
            AttachmentHistory::new(
                (1..=*head)
                    .map(|v| version_at(name, v, None, None, before_sync()))
                    .collect(),
            )
            .unwrap()
        }))
    }

    #[test]
    fn new_file_becomes_add_chain_from_one() {
        let source = snapshot_of(&[("a.txt", 3)]);
        let replica = AttachmentSnapshot::empty();
        assert_eq!(
            plan(&source, &replica, last_sync()),
            vec![AttachmentChange::AddChain {
                file_name: "a.txt".into(),
                from_version: 1,
            }]
        );
    }

    #[test]
    fn source_ahead_becomes_tail_chain() {
        let source = snapshot_of(&[("a.txt", 5)]);
        let replica = snapshot_of(&[("a.txt", 2)]);
        assert_eq!(
            plan(&source, &replica, last_sync()),
            vec![AttachmentChange::AddChain {
                file_name: "a.txt".into(),
                from_version: 3,
            }]
        );
    }

    #[test]
    fn replica_ahead_is_corrected_by_replace() {
        let source = snapshot_of(&[("a.txt", 2)]);
        let replica = snapshot_of(&[("a.txt", 4)]);
        assert_eq!(
            plan(&source, &replica, last_sync()),
            vec![AttachmentChange::Replace {
                file_name: "a.txt".into(),
            }]
        );
    }

    #[test]
    fn reregistered_head_forces_replace_not_patch() {
        // Equal versions, but the source head is newer than the last sync:
        // content may differ under the same version number.
        let source = AttachmentSnapshot::from_histories([AttachmentHistory::new(vec![
            version_at("a.txt", 1, Some("new"), None, after_sync()),
        ])
        .unwrap()]);
        let replica = AttachmentSnapshot::from_histories([AttachmentHistory::new(vec![
            version_at("a.txt", 1, Some("old"), None, before_sync()),
        ])
        .unwrap()]);
        assert_eq!(
            plan(&source, &replica, last_sync()),
            vec![AttachmentChange::Replace {
                file_name: "a.txt".into(),
            }]
        );
    }

    #[rstest]
    #[case(Some("A"), Some("B"), None, None)] // title differs
    #[case(None, None, Some("x"), Some("y"))] // description differs
    #[case(Some(""), None, None, None)] // empty string is not None
    fn metadata_drift_becomes_patch(
        #[case] source_title: Option<&str>,
        #[case] replica_title: Option<&str>,
        #[case] source_description: Option<&str>,
        #[case] replica_description: Option<&str>,
    ) {
        let source = AttachmentSnapshot::from_histories([AttachmentHistory::new(vec![
            version_at("a.txt", 2, source_title, source_description, before_sync()),
            version_at("a.txt", 1, None, None, before_sync()),
        ])
        .unwrap()]);
        let replica = AttachmentSnapshot::from_histories([AttachmentHistory::new(vec![
            version_at("a.txt", 2, replica_title, replica_description, before_sync()),
            version_at("a.txt", 1, None, None, before_sync()),
        ])
        .unwrap()]);

        assert_eq!(
            plan(&source, &replica, last_sync()),
            vec![AttachmentChange::PatchMetadata {
                file_name: "a.txt".into(),
                title: source_title.map(Into::into),
                description: source_description.map(Into::into),
            }]
        );
    }

    #[test]
    fn identical_sides_plan_nothing() {
        let source = snapshot_of(&[("a.txt", 2), ("b.txt", 1)]);
        let replica = snapshot_of(&[("a.txt", 2), ("b.txt", 1)]);
        assert!(plan(&source, &replica, last_sync()).is_empty());
    }

    #[test]
    fn replica_only_files_are_deleted_last() {
        let source = snapshot_of(&[("kept.txt", 1)]);
        let mut replica = snapshot_of(&[("kept.txt", 1)]);
        replica.files.extend(snapshot_of(&[("gone.txt", 2)]).files);

        let source_with_new = {
            let mut s = source.clone();
            s.files.extend(snapshot_of(&[("new.txt", 1)]).files);
            s
        };

        let changes = plan(&source_with_new, &replica, last_sync());
        assert_eq!(
            changes,
            vec![
                AttachmentChange::AddChain {
                    file_name: "new.txt".into(),
                    from_version: 1,
                },
                AttachmentChange::Delete {
                    file_name: "gone.txt".into(),
                },
            ]
        );
    }
}
