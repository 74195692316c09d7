//! Entity references for the records mirrored from the data source.

use serde::{Deserialize, Serialize};

/// Kind of a mirrored record.
///
/// Projects, experiments and samples carry versioned attachments; data sets
/// carry a bulk file payload and are reconciled by [`DataSetRecord`] instead.
///
/// [`DataSetRecord`]: crate::DataSetRecord
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Project,
    Experiment,
    Sample,
    DataSet,
}

impl EntityKind {
    /// Stable lowercase name, used in logs and failure keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Experiment => "experiment",
            EntityKind::Sample => "sample",
            EntityKind::DataSet => "dataset",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to one mirrored record, as produced by the remote change feed.
///
/// Immutable for the duration of a synchronization run. Identity is
/// `(kind, perm_id)`; the human-readable `identifier` is carried for logs and
/// reports only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRef {
    /// Kind of the referenced record.
    pub kind: EntityKind,
    /// Permanent, store-assigned identifier.
    pub perm_id: String,
    /// Human-readable identifier (e.g. `/SPACE/PROJECT/SAMPLE`).
    pub identifier: String,
    /// Change-feed assertion that the record has attachments.
    ///
    /// When `false`, the source-side attachment fetch is skipped entirely;
    /// the replica-side fetch still runs so that stale replica attachments
    /// surface as deletions.
    pub has_attachments_hint: bool,
}

impl EntityRef {
    /// Creates a reference with the attachment hint set.
    pub fn new(
        kind: EntityKind,
        perm_id: impl Into<String>,
        identifier: impl Into<String>,
        has_attachments_hint: bool,
    ) -> Self {
        Self {
            kind,
            perm_id: perm_id.into(),
            identifier: identifier.into(),
            has_attachments_hint,
        }
    }

    /// Failure-registry key: `kind:perm_id`.
    pub fn failure_key(&self) -> String {
        format!("{}:{}", self.kind, self.perm_id)
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.perm_id == other.perm_id
    }
}

impl Eq for EntityRef {}

impl std::hash::Hash for EntityRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.perm_id.hash(state);
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.perm_id, self.identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_ignores_identifier_and_hint() {
        let a = EntityRef::new(EntityKind::Sample, "S-1", "/LAB/S1", true);
        let b = EntityRef::new(EntityKind::Sample, "S-1", "/LAB/S1-RENAMED", false);
        assert_eq!(a, b);

        let c = EntityRef::new(EntityKind::Project, "S-1", "/LAB/S1", true);
        assert_ne!(a, c);
    }

    #[test]
    fn failure_key_includes_kind() {
        let r = EntityRef::new(EntityKind::Experiment, "E-9", "/LAB/P/E9", true);
        assert_eq!(r.failure_key(), "experiment:E-9");
    }

    #[test]
    fn kind_serializes_in_store_notation() {
        assert_eq!(
            serde_json::to_string(&EntityKind::DataSet).unwrap(),
            "\"DATA_SET\""
        );
        let kind: EntityKind = serde_json::from_str("\"SAMPLE\"").unwrap();
        assert_eq!(kind, EntityKind::Sample);
    }
}
