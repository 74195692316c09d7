//! Versioned attachments and reconciliation plan items.
//!
//! The data source presents attachment history as a head object with a
//! `previous version` back-reference. On this side the chain is materialized
//! into an arena ([`AttachmentHistory`]): a vector of versions sorted
//! oldest-first whose last element is the head. A gap in the fetched history
//! is then a plain contiguity check instead of a dangling reference.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Error, Result};

/// One historical version of one named attachment file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentVersion {
    /// File name the version belongs to.
    pub file_name: String,
    /// Version number, starting at 1.
    pub version: u32,
    /// Optional title. `None` and `""` are distinct values.
    pub title: Option<String>,
    /// Optional description. `None` and `""` are distinct values.
    pub description: Option<String>,
    /// File content. `None` when the fetch did not request content.
    pub content: Option<Bytes>,
    /// When this version was registered on its store.
    pub registration_date: DateTime<Utc>,
}

/// Materialized version history of one attachment file, oldest first.
///
/// The arena holds whatever run of versions the remote fetch produced. A
/// fully materialized history covers `1..=head`; an under-materialized one is
/// detected by the chain walker when it needs versions the arena lacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentHistory {
    versions: Vec<AttachmentVersion>,
}

impl AttachmentHistory {
    /// Builds a history from fetched versions.
    ///
    /// Versions are sorted ascending. Rejects an empty set, a version number
    /// of 0, duplicates, and mixed file names.
    pub fn new(mut versions: Vec<AttachmentVersion>) -> Result<Self> {
        let Some(first) = versions.first() else {
            return Err(Error::EmptyHistory {
                file_name: String::new(),
            });
        };
        let file_name = first.file_name.clone();

        versions.sort_by_key(|v| v.version);
        for (i, v) in versions.iter().enumerate() {
            if v.file_name != file_name {
                return Err(Error::MixedFileNames {
                    expected: file_name,
                    got: v.file_name.clone(),
                });
            }
            if v.version == 0 {
                return Err(Error::InvalidVersion {
                    file_name: v.file_name.clone(),
                    version: v.version,
                });
            }
            if i > 0 && versions[i - 1].version == v.version {
                return Err(Error::DuplicateVersion {
                    file_name: v.file_name.clone(),
                    version: v.version,
                });
            }
        }
        Ok(Self { versions })
    }

    /// File name this history belongs to.
    pub fn file_name(&self) -> &str {
        &self.versions[0].file_name
    }

    /// The newest version (the head of the original back-reference chain).
    pub fn head(&self) -> &AttachmentVersion {
        self.versions.last().expect("history is never empty")
    }

    /// Version number of the head.
    pub fn head_version(&self) -> u32 {
        self.head().version
    }

    /// All materialized versions, oldest first.
    pub fn versions(&self) -> &[AttachmentVersion] {
        &self.versions
    }

    /// Looks up one version by number.
    pub fn get(&self, version: u32) -> Option<&AttachmentVersion> {
        self.versions.iter().find(|v| v.version == version)
    }
}

/// Attachment state of one entity on one side (source or replica).
///
/// Built fresh per entity per run and never persisted. `BTreeMap` keeps plan
/// output deterministic across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentSnapshot {
    /// Latest known history per file name.
    pub files: BTreeMap<String, AttachmentHistory>,
}

impl AttachmentSnapshot {
    /// Empty snapshot (an entity with no attachments).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot from per-file histories.
    pub fn from_histories(histories: impl IntoIterator<Item = AttachmentHistory>) -> Self {
        Self {
            files: histories
                .into_iter()
                .map(|h| (h.file_name().to_string(), h))
                .collect(),
        }
    }

    pub fn get(&self, file_name: &str) -> Option<&AttachmentHistory> {
        self.files.get(file_name)
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.files.contains_key(file_name)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Which summary counter a change advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCategory {
    Added,
    Updated,
    Deleted,
}

/// One planned change to one attachment file on the replica.
///
/// Variants are the four planner decisions. The counter mapping is part of
/// the decision identity: one change advances exactly one counter, however
/// many versions it materializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttachmentChange {
    /// Append versions `from_version..=source head`, oldest first.
    AddChain { file_name: String, from_version: u32 },
    /// Delete the replica file, then re-add the full chain from version 1.
    ///
    /// Correction path for a replica that is ahead of the source, or whose
    /// head was re-registered after the last sync. Forces full content
    /// re-transfer; never collapsed into a metadata patch.
    Replace { file_name: String },
    /// Rewrite title/description of the head version in place. No content
    /// moves.
    PatchMetadata {
        file_name: String,
        title: Option<String>,
        description: Option<String>,
    },
    /// Remove a file the source no longer has.
    Delete { file_name: String },
}

impl AttachmentChange {
    /// File name the change applies to.
    pub fn file_name(&self) -> &str {
        match self {
            AttachmentChange::AddChain { file_name, .. }
            | AttachmentChange::Replace { file_name }
            | AttachmentChange::PatchMetadata { file_name, .. }
            | AttachmentChange::Delete { file_name } => file_name,
        }
    }

    /// Summary counter this change advances.
    pub fn category(&self) -> ChangeCategory {
        match self {
            AttachmentChange::AddChain { .. } => ChangeCategory::Added,
            AttachmentChange::Replace { .. } | AttachmentChange::PatchMetadata { .. } => {
                ChangeCategory::Updated
            }
            AttachmentChange::Delete { .. } => ChangeCategory::Deleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn version(file_name: &str, version: u32) -> AttachmentVersion {
        AttachmentVersion {
            file_name: file_name.to_string(),
            version,
            title: None,
            description: None,
            content: Some(Bytes::from(format!("{file_name}-v{version}"))),
            registration_date: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn history_sorts_versions_oldest_first() {
        let h = AttachmentHistory::new(vec![
            version("a.txt", 3),
            version("a.txt", 1),
            version("a.txt", 2),
        ])
        .unwrap();
        let numbers: Vec<u32> = h.versions().iter().map(|v| v.version).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(h.head_version(), 3);
    }

    #[test]
    fn history_rejects_duplicates_and_zero() {
        let err = AttachmentHistory::new(vec![version("a.txt", 2), version("a.txt", 2)])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateVersion { version: 2, .. }));

        let err = AttachmentHistory::new(vec![version("a.txt", 0)]).unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { version: 0, .. }));
    }

    #[test]
    fn history_rejects_mixed_file_names() {
        let err = AttachmentHistory::new(vec![version("a.txt", 1), version("b.txt", 2)])
            .unwrap_err();
        assert!(matches!(err, Error::MixedFileNames { .. }));
    }

    #[test]
    fn change_category_mapping() {
        let add = AttachmentChange::AddChain {
            file_name: "a".into(),
            from_version: 1,
        };
        let replace = AttachmentChange::Replace {
            file_name: "a".into(),
        };
        let patch = AttachmentChange::PatchMetadata {
            file_name: "a".into(),
            title: Some("t".into()),
            description: None,
        };
        let delete = AttachmentChange::Delete {
            file_name: "a".into(),
        };
        assert_eq!(add.category(), ChangeCategory::Added);
        assert_eq!(replace.category(), ChangeCategory::Updated);
        assert_eq!(patch.category(), ChangeCategory::Updated);
        assert_eq!(delete.category(), ChangeCategory::Deleted);
    }
}
