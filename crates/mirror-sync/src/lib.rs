//! Versioned-entity reconciliation engine for the labmirror harvester.
//!
//! Keeps the attachment state and data-set records of a replica store
//! convergent with an authoritative source store. One synchronization run
//! fetches per-entity snapshots from both sides, plans per-file changes,
//! applies them through the replica's write API, and reports a
//! [`SyncSummary`] with per-entity failure isolation.

pub mod apply;
pub mod chain;
pub mod dataset;
pub mod dispatch;
pub mod engine;
pub mod planner;
pub mod snapshot;
pub mod summary;

mod error;

pub use apply::{BatchedApplier, ImmediateApplier};
pub use dataset::{DataSetReconciler, DataSetTransition};
pub use dispatch::WorkUnit;
pub use engine::{ApplyStrategy, Credentials, SyncConfig, SyncEngine};
pub use error::Error;
pub use snapshot::{Side, SnapshotFetcher};
pub use summary::{ChangeTally, SyncSummary};

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
