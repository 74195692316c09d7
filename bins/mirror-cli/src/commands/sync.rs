//! The sync command: one full reconciliation run.

use chrono::{DateTime, Utc};
use mirror_client::{Auth, HttpRemote, ReadApi};
use mirror_data::EntityKind;
use mirror_sync::{ApplyStrategy, Credentials, SyncConfig, SyncEngine};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::MirrorConfig;
use crate::report;
use crate::state::MirrorState;

pub struct SyncArgs {
    /// Compute and count, mutate nothing.
    pub dry_run: bool,
    /// Override the reconcile-from timestamp.
    pub since: Option<DateTime<Utc>>,
    /// Restrict the run to these kinds.
    pub kinds: Option<Vec<EntityKind>>,
}

/// Runs one synchronization.
///
/// Exits with an error when any entity failed, so schedulers notice partial
/// runs; the summary is printed either way.
pub async fn run(config: MirrorConfig, state_path: &Path, args: SyncArgs) -> anyhow::Result<()> {
    let source = Arc::new(HttpRemote::new(config.source_url()));
    let replica = Arc::new(HttpRemote::new(config.replica_url()));

    let mut state = MirrorState::load_or_default(state_path)?;
    let since = args.since.unwrap_or_else(|| state.sync_floor());
    let run_started = Utc::now();

    // The change feed uses its own short-lived session; workers open their
    // own later.
    let token = source
        .login(&config.source.user, &config.source.password)
        .await?;
    let listed = source.list_changed_entities(&token, since).await;
    if let Err(e) = source.logout(token).await {
        warn!(error = %e, "change-feed session logout failed");
    }
    let mut refs = listed?;

    if let Some(kinds) = &args.kinds {
        refs.retain(|r| kinds.contains(&r.kind));
    }
    info!(entities = refs.len(), %since, "change feed listed");
    if refs.is_empty() {
        println!("Nothing to reconcile since {since}.");
        return Ok(());
    }

    let strategy = match config.sync.strategy.as_str() {
        "batched" => ApplyStrategy::Batched,
        _ => ApplyStrategy::PerEntity,
    };
    let engine_config = SyncConfig::new(
        Credentials::new(&config.source.user, &config.source.password),
        Credentials::new(&config.replica.user, &config.replica.password),
    )
    .with_workers(config.sync.workers)
    .with_strategy(strategy);
    let engine = SyncEngine::new(source, replica, engine_config);

    // Ctrl-C stops scheduling new entities; in-flight ones finish.
    let trigger = engine.abort_trigger();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("abort requested; letting in-flight entities finish");
            trigger.send_replace(true);
        }
    });

    let summary = engine.synchronize(refs, since, args.dry_run).await?;
    report::print_summary(&summary, args.dry_run);

    if !args.dry_run && !summary.has_failures() {
        // Only advance the floor when everything reconciled; failed
        // entities stay visible to the next run.
        state.last_sync = Some(run_started);
        state.save(state_path)?;
    }

    if summary.has_failures() {
        anyhow::bail!(
            "{} entities could not be reconciled",
            summary.failure_count()
        );
    }
    Ok(())
}
