//! Run orchestration: worker pool, sessions, abort, summary lifecycle.

use chrono::{DateTime, Utc};
use mirror_client::{Remote, SessionToken};
use mirror_data::{AttachmentSnapshot, EntityRef};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use crate::apply::{BatchedApplier, ImmediateApplier};
use crate::dataset::{DataSetReconciler, DataSetTransition};
use crate::dispatch::{self, WorkUnit};
use crate::planner;
use crate::snapshot::{Side, SnapshotFetcher};
use crate::summary::{ChangeTally, SyncSummary};
use crate::{Error, Result};

/// Login credentials for one store.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

/// How attachment changes reach the replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyStrategy {
    /// One remote call per operation; entities processed independently in
    /// parallel.
    #[default]
    PerEntity,
    /// One update call per entity, issued at the end of each homogeneous
    /// kind group.
    Batched,
}

/// Engine configuration for one or more runs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Bounded worker pool size.
    pub workers: usize,
    /// Attachment apply strategy.
    pub strategy: ApplyStrategy,
    /// Source store login.
    pub source_credentials: Credentials,
    /// Replica store login.
    pub replica_credentials: Credentials,
}

impl SyncConfig {
    pub fn new(source_credentials: Credentials, replica_credentials: Credentials) -> Self {
        Self {
            workers: 4,
            strategy: ApplyStrategy::default(),
            source_credentials,
            replica_credentials,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_strategy(mut self, strategy: ApplyStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// State shared by every worker of one run.
struct RunShared {
    source: Arc<dyn Remote>,
    replica: Arc<dyn Remote>,
    queue: Mutex<VecDeque<WorkUnit>>,
    summary: Arc<SyncSummary>,
    staging_root: PathBuf,
    last_sync: DateTime<Utc>,
    dry_run: bool,
}

/// The reconciliation engine.
///
/// Owns the two store facades and the run configuration; one engine value
/// can execute any number of runs. A run-level abort signal stops workers
/// from taking new units while units already in flight run to completion.
pub struct SyncEngine {
    source: Arc<dyn Remote>,
    replica: Arc<dyn Remote>,
    config: SyncConfig,
    abort: Arc<watch::Sender<bool>>,
}

impl SyncEngine {
    pub fn new(source: Arc<dyn Remote>, replica: Arc<dyn Remote>, config: SyncConfig) -> Self {
        let (abort, _) = watch::channel(false);
        Self {
            source,
            replica,
            config,
            abort: Arc::new(abort),
        }
    }

    /// Handle the caller can use to abort the run from another task.
    pub fn abort_trigger(&self) -> Arc<watch::Sender<bool>> {
        self.abort.clone()
    }

    /// Runs one synchronization over `refs`.
    ///
    /// Entities are reconciled independently; a failing entity lands in the
    /// summary's failure registry without stopping its siblings. With
    /// `dry_run` no replica mutation and no payload download happens, but
    /// the summary counts what a real run would have changed.
    ///
    /// Returns an error only when no worker could open its sessions; once
    /// any worker runs, the outcome is always a summary.
    pub async fn synchronize(
        &self,
        refs: Vec<EntityRef>,
        last_sync: DateTime<Utc>,
        dry_run: bool,
    ) -> Result<SyncSummary> {
        let groups = dispatch::partition(&refs);
        let units = match self.config.strategy {
            ApplyStrategy::PerEntity => groups.into_entity_units(),
            ApplyStrategy::Batched => groups.into_batched_units(),
        };
        info!(
            entities = refs.len(),
            units = units.len(),
            dry_run,
            "synchronization run starting"
        );

        let summary = Arc::new(SyncSummary::new());
        if units.is_empty() {
            return Ok(self.detach(summary));
        }

        // Run-scoped staging root; data sets stage payloads into per-code
        // subdirectories. Deleted when the run ends.
        let staging = tempfile::tempdir()?;

        let worker_count = self.config.workers.max(1).min(units.len());
        let shared = Arc::new(RunShared {
            source: self.source.clone(),
            replica: self.replica.clone(),
            queue: Mutex::new(units.into()),
            summary: summary.clone(),
            staging_root: staging.path().to_path_buf(),
            last_sync,
            dry_run,
        });

        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let shared = shared.clone();
            let config = self.config.clone();
            let abort_rx = self.abort.subscribe();
            handles.push(tokio::spawn(async move {
                Self::run_worker(worker_id, shared, config, abort_rx).await
            }));
        }

        let mut worker_errors = Vec::new();
        let mut any_worker_ran = false;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => any_worker_ran = true,
                Ok(Err(e)) => {
                    warn!(error = %e, "worker could not open its sessions");
                    worker_errors.push(e);
                }
                Err(e) => {
                    error!(error = %e, "worker task panicked");
                }
            }
        }

        if !any_worker_ran {
            if let Some(first) = worker_errors.into_iter().next() {
                return Err(first);
            }
        }

        drop(shared);
        let summary = self.detach(summary);
        info!(
            added = summary.added(),
            updated = summary.updated(),
            deleted = summary.deleted(),
            failed = summary.failure_count(),
            "synchronization run finished"
        );
        Ok(summary)
    }

    fn detach(&self, summary: Arc<SyncSummary>) -> SyncSummary {
        Arc::try_unwrap(summary).unwrap_or_else(|shared| shared.detached_copy())
    }

    /// One worker: opens its own sessions, drains the queue, releases the
    /// sessions on every exit path.
    ///
    /// The remote facade is not assumed safe to share a session across
    /// threads, so each worker logs in for itself once and owns the tokens
    /// for its lifetime.
    async fn run_worker(
        worker_id: usize,
        shared: Arc<RunShared>,
        config: SyncConfig,
        abort_rx: watch::Receiver<bool>,
    ) -> Result<()> {
        let source_token = shared
            .source
            .login(
                &config.source_credentials.user,
                &config.source_credentials.password,
            )
            .await?;
        let replica_token = match shared
            .replica
            .login(
                &config.replica_credentials.user,
                &config.replica_credentials.password,
            )
            .await
        {
            Ok(token) => token,
            Err(e) => {
                // Release the half-acquired session before surfacing.
                Self::release(&shared, source_token, None).await;
                return Err(e.into());
            }
        };
        debug!(worker_id, "worker sessions open");

        Self::worker_loop(&shared, &source_token, &replica_token, abort_rx).await;

        Self::release(&shared, source_token, Some(replica_token)).await;
        debug!(worker_id, "worker done");
        Ok(())
    }

    async fn release(
        shared: &RunShared,
        source_token: SessionToken,
        replica_token: Option<SessionToken>,
    ) {
        if let Err(e) = shared.source.logout(source_token).await {
            warn!(error = %e, "source session logout failed");
        }
        if let Some(token) = replica_token {
            if let Err(e) = shared.replica.logout(token).await {
                warn!(error = %e, "replica session logout failed");
            }
        }
    }

    /// Takes units until the queue is empty or an abort is signaled.
    /// Per-entity errors never escape this loop.
    async fn worker_loop(
        shared: &RunShared,
        source_token: &SessionToken,
        replica_token: &SessionToken,
        abort_rx: watch::Receiver<bool>,
    ) {
        loop {
            if *abort_rx.borrow() {
                info!("abort signaled; no further units scheduled");
                break;
            }
            let unit = shared.queue.lock().await.pop_front();
            let Some(unit) = unit else { break };
            Self::process_unit(shared, source_token, replica_token, unit).await;
        }
    }

    async fn process_unit(
        shared: &RunShared,
        source_token: &SessionToken,
        replica_token: &SessionToken,
        unit: WorkUnit,
    ) {
        match unit {
            WorkUnit::Attachments(entity) => {
                let result =
                    Self::reconcile_attachments(shared, source_token, replica_token, &entity)
                        .await;
                if let Err(error) = result {
                    Self::register_failure(shared, &entity, &error);
                }
            }
            WorkUnit::AttachmentBatch(kind, group) => {
                debug!(%kind, entities = group.len(), "reconciling kind group");
                Self::reconcile_batch(shared, source_token, replica_token, &group).await;
            }
            WorkUnit::DataSet(entity) => {
                let reconciler = DataSetReconciler::new(
                    shared.source.as_ref(),
                    source_token,
                    shared.replica.as_ref(),
                    replica_token,
                    &shared.staging_root,
                    shared.dry_run,
                );
                match reconciler.reconcile(&entity.perm_id).await {
                    Ok(transition) => {
                        let mut tally = ChangeTally::default();
                        match transition {
                            DataSetTransition::Registered => tally.added += 1,
                            DataSetTransition::Updated => tally.updated += 1,
                            DataSetTransition::Unchanged => {}
                        }
                        shared.summary.merge(tally);
                    }
                    Err(error) => Self::register_failure(shared, &entity, &error),
                }
            }
        }
    }

    /// Fetch, plan and apply for one attachment-carrying entity.
    async fn reconcile_attachments(
        shared: &RunShared,
        source_token: &SessionToken,
        replica_token: &SessionToken,
        entity: &EntityRef,
    ) -> Result<()> {
        let refs = std::slice::from_ref(entity);
        let (mut source_snapshots, mut replica_snapshots) =
            Self::fetch_both_sides(shared, source_token, replica_token, refs).await?;

        let source_snapshot = source_snapshots
            .remove(&entity.perm_id)
            .unwrap_or_default();
        let replica_snapshot = replica_snapshots
            .remove(&entity.perm_id)
            .unwrap_or_default();

        let changes = planner::plan(&source_snapshot, &replica_snapshot, shared.last_sync);
        if changes.is_empty() {
            debug!(entity = %entity, "already convergent");
            return Ok(());
        }

        ImmediateApplier::new(shared.replica.as_ref(), replica_token, shared.dry_run)
            .apply(entity, &source_snapshot, &changes, &shared.summary)
            .await
    }

    /// Fetch once per side for a whole kind group, then stage every entity
    /// and flush one update call per entity.
    async fn reconcile_batch(
        shared: &RunShared,
        source_token: &SessionToken,
        replica_token: &SessionToken,
        group: &[EntityRef],
    ) {
        let fetched =
            Self::fetch_both_sides(shared, source_token, replica_token, group).await;
        let (mut source_snapshots, mut replica_snapshots) = match fetched {
            Ok(snapshots) => snapshots,
            Err(error) => {
                // The group shares one fetch; losing it fails every member.
                for entity in group {
                    Self::register_failure(shared, entity, &error);
                }
                return;
            }
        };

        let mut applier = BatchedApplier::new(
            shared.replica.as_ref(),
            replica_token,
            shared.dry_run,
        );
        for entity in group {
            let source_snapshot = source_snapshots
                .remove(&entity.perm_id)
                .unwrap_or_default();
            let replica_snapshot = replica_snapshots
                .remove(&entity.perm_id)
                .unwrap_or_default();
            let changes = planner::plan(&source_snapshot, &replica_snapshot, shared.last_sync);
            if changes.is_empty() {
                continue;
            }
            if let Err(error) = applier.stage(entity, &source_snapshot, &changes) {
                Self::register_failure(shared, entity, &error);
            }
        }

        for (entity, error) in applier.flush(&shared.summary).await {
            Self::register_failure(shared, &entity, &error);
        }
    }

    async fn fetch_both_sides(
        shared: &RunShared,
        source_token: &SessionToken,
        replica_token: &SessionToken,
        refs: &[EntityRef],
    ) -> Result<(
        HashMap<String, AttachmentSnapshot>,
        HashMap<String, AttachmentSnapshot>,
    )> {
        let source_snapshots =
            SnapshotFetcher::new(shared.source.as_ref(), source_token, Side::Source)
                .fetch(refs)
                .await?;
        let replica_snapshots =
            SnapshotFetcher::new(shared.replica.as_ref(), replica_token, Side::Replica)
                .fetch(refs)
                .await?;
        Ok((source_snapshots, replica_snapshots))
    }

    /// Records a failed entity. A registry that cannot take the record is
    /// itself a hard error, logged but never fatal to the run.
    fn register_failure(shared: &RunShared, entity: &EntityRef, error: &Error) {
        warn!(entity = %entity, %error, "entity failed");
        if !shared.summary.record_failure(entity) {
            error!(
                entity = %entity,
                "failure registry unavailable; failure could not be recorded"
            );
        }
    }
}
