//! Change application strategies.
//!
//! Both strategies walk the same planner output and honor `dry_run`: the
//! remote write is skipped but the plan is still walked and counted, so an
//! operator can preview the volume of pending changes.

use mirror_client::{AttachmentUpdateOp, SessionToken, WriteApi};
use mirror_data::{AttachmentChange, AttachmentSnapshot, EntityRef};
use tracing::debug;

use crate::chain;
use crate::summary::{ChangeTally, SyncSummary};
use crate::{Error, Result};

/// Flattens one plan item into wire operations, materializing add-chains
/// through the chain walker. Order within the result is the apply order:
/// delete before add on replace, adds oldest-first.
fn ops_for_change(
    source: &AttachmentSnapshot,
    change: &AttachmentChange,
) -> Result<Vec<AttachmentUpdateOp>> {
    match change {
        AttachmentChange::AddChain {
            file_name,
            from_version,
        } => {
            let history = source
                .get(file_name)
                .ok_or_else(|| Error::MissingSourceHistory {
                    file_name: file_name.clone(),
                })?;
            Ok(chain::walk(history, *from_version)?
                .iter()
                .cloned()
                .map(AttachmentUpdateOp::Add)
                .collect())
        }
        AttachmentChange::Replace { file_name } => {
            let history = source
                .get(file_name)
                .ok_or_else(|| Error::MissingSourceHistory {
                    file_name: file_name.clone(),
                })?;
            let mut ops = vec![AttachmentUpdateOp::Delete {
                file_name: file_name.clone(),
            }];
            ops.extend(
                chain::walk(history, 1)?
                    .iter()
                    .cloned()
                    .map(AttachmentUpdateOp::Add),
            );
            Ok(ops)
        }
        AttachmentChange::PatchMetadata {
            file_name,
            title,
            description,
        } => Ok(vec![AttachmentUpdateOp::Patch {
            file_name: file_name.clone(),
            title: title.clone(),
            description: description.clone(),
        }]),
        AttachmentChange::Delete { file_name } => Ok(vec![AttachmentUpdateOp::Delete {
            file_name: file_name.clone(),
        }]),
    }
}

/// Applies changes one remote call per operation, in plan order.
///
/// The strategy for independently processed entities: a worker owns the
/// entity end to end and nothing else batches behind it.
pub struct ImmediateApplier<'a> {
    replica: &'a dyn WriteApi,
    token: &'a SessionToken,
    dry_run: bool,
}

impl<'a> ImmediateApplier<'a> {
    pub fn new(replica: &'a dyn WriteApi, token: &'a SessionToken, dry_run: bool) -> Self {
        Self {
            replica,
            token,
            dry_run,
        }
    }

    /// Applies one entity's whole plan.
    ///
    /// On success the entity's tally is merged into `summary`. On error
    /// nothing is merged; the caller records the entity in the failure
    /// registry.
    pub async fn apply(
        &self,
        entity: &EntityRef,
        source: &AttachmentSnapshot,
        changes: &[AttachmentChange],
        summary: &SyncSummary,
    ) -> Result<()> {
        let mut tally = ChangeTally::default();
        for change in changes {
            let ops = ops_for_change(source, change)?;
            if !self.dry_run {
                for op in &ops {
                    self.issue(entity, op).await?;
                }
            }
            tally.record(change.category());
        }
        debug!(entity = %entity, changes = changes.len(), dry_run = self.dry_run, "plan applied");
        summary.merge(tally);
        Ok(())
    }

    async fn issue(&self, entity: &EntityRef, op: &AttachmentUpdateOp) -> Result<()> {
        match op {
            AttachmentUpdateOp::Add(version) => {
                self.replica
                    .add_attachment_version(self.token, entity, version)
                    .await?
            }
            AttachmentUpdateOp::Delete { file_name } => {
                self.replica
                    .delete_attachment(self.token, entity, file_name)
                    .await?
            }
            AttachmentUpdateOp::Patch {
                file_name,
                title,
                description,
            } => {
                self.replica
                    .patch_attachment(
                        self.token,
                        entity,
                        file_name,
                        title.as_deref(),
                        description.as_deref(),
                    )
                    .await?
            }
        }
        Ok(())
    }
}

/// One entity's staged update, waiting for the batch flush.
struct PendingUpdate {
    entity: EntityRef,
    ops: Vec<AttachmentUpdateOp>,
    tally: ChangeTally,
}

/// Accumulates updates for a homogeneous batch and issues exactly one
/// remote call per entity at flush time.
///
/// Minimizes round-trips when the caller already holds a whole batch of one
/// entity kind. Per-entity failure isolation still holds: a failing flush
/// call marks only its own entity.
pub struct BatchedApplier<'a> {
    replica: &'a dyn WriteApi,
    token: &'a SessionToken,
    dry_run: bool,
    pending: Vec<PendingUpdate>,
}

impl<'a> BatchedApplier<'a> {
    pub fn new(replica: &'a dyn WriteApi, token: &'a SessionToken, dry_run: bool) -> Self {
        Self {
            replica,
            token,
            dry_run,
            pending: Vec::new(),
        }
    }

    /// Stages one entity's plan. Chain materialization happens here, so a
    /// short chain fails the entity before anything is sent.
    pub fn stage(
        &mut self,
        entity: &EntityRef,
        source: &AttachmentSnapshot,
        changes: &[AttachmentChange],
    ) -> Result<()> {
        let mut ops = Vec::new();
        let mut tally = ChangeTally::default();
        for change in changes {
            ops.extend(ops_for_change(source, change)?);
            tally.record(change.category());
        }
        self.pending.push(PendingUpdate {
            entity: entity.clone(),
            ops,
            tally,
        });
        Ok(())
    }

    /// Number of entities staged so far.
    pub fn staged(&self) -> usize {
        self.pending.len()
    }

    /// Issues one update call per staged entity and merges the tallies of
    /// the entities that succeeded.
    ///
    /// Returns the entities whose update failed, with their errors; the
    /// caller feeds them to the failure registry.
    pub async fn flush(self, summary: &SyncSummary) -> Vec<(EntityRef, Error)> {
        let mut failed = Vec::new();
        for update in self.pending {
            if update.ops.is_empty() && update.tally == ChangeTally::default() {
                continue;
            }
            if !self.dry_run {
                if let Err(e) = self
                    .replica
                    .apply_attachment_update(self.token, &update.entity, &update.ops)
                    .await
                {
                    failed.push((update.entity, Error::Remote(e)));
                    continue;
                }
            }
            debug!(entity = %update.entity, ops = update.ops.len(), dry_run = self.dry_run, "batched update applied");
            summary.merge(update.tally);
        }
        failed
    }
}
