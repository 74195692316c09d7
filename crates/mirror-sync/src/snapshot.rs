//! Snapshot fetching for a batch of entities.

use mirror_client::{FetchOptions, ReadApi, SessionToken};
use mirror_data::{AttachmentSnapshot, EntityRef};
use std::collections::HashMap;
use tracing::debug;

use crate::Result;

/// Which store a snapshot describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The remote authoritative instance being mirrored.
    Source,
    /// The local mirror instance being kept consistent.
    Replica,
}

/// Fetches per-entity attachment snapshots from one side.
pub struct SnapshotFetcher<'a> {
    api: &'a dyn ReadApi,
    token: &'a SessionToken,
    side: Side,
}

impl<'a> SnapshotFetcher<'a> {
    pub fn new(api: &'a dyn ReadApi, token: &'a SessionToken, side: Side) -> Self {
        Self { api, token, side }
    }

    /// Fetches snapshots for `refs`, keyed by perm id.
    ///
    /// On the source side, entities whose change feed already asserted "no
    /// attachments" are not fetched at all. The replica side always fetches:
    /// the replica may hold attachments for an entity whose source
    /// attachments were all removed, and those must surface as deletions.
    ///
    /// Every requested entity is present in the result; entities that were
    /// skipped, or that the store does not know, map to an empty snapshot.
    /// Options always ask for content plus full history so chain walking
    /// does not run into missing links under normal operation.
    pub async fn fetch(&self, refs: &[EntityRef]) -> Result<HashMap<String, AttachmentSnapshot>> {
        let wanted: Vec<EntityRef> = match self.side {
            Side::Source => refs
                .iter()
                .filter(|r| r.has_attachments_hint)
                .cloned()
                .collect(),
            Side::Replica => refs.to_vec(),
        };

        let mut snapshots = if wanted.is_empty() {
            HashMap::new()
        } else {
            self.api
                .list_attachments(self.token, &wanted, FetchOptions::full())
                .await?
        };

        for entity in refs {
            snapshots.entry(entity.perm_id.clone()).or_default();
        }
        debug!(
            side = ?self.side,
            requested = refs.len(),
            fetched = wanted.len(),
            "snapshots fetched"
        );
        Ok(snapshots)
    }
}
