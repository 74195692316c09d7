//! Error types for reconciliation.
//!
//! Errors are caught at the per-entity boundary: a failing entity lands in
//! the run's failure registry and never stops its siblings.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The fetched version history has a gap below the head.
    ///
    /// The remote fetch did not materialize enough history to walk an
    /// add-chain. Surfaced instead of truncating: appending a partial chain
    /// would desynchronize version numbering on the replica.
    #[error("version chain of {file_name} is incomplete: version {missing_version} not materialized")]
    ChainIncomplete {
        file_name: String,
        missing_version: u32,
    },

    /// Walk lower bound outside `1..=head`.
    #[error("invalid walk bound for {file_name}: from {from_version}, head {head_version}")]
    InvalidWalkBound {
        file_name: String,
        from_version: u32,
        head_version: u32,
    },

    /// A plan references a file the source snapshot no longer holds.
    #[error("plan out of sync: no source history for {file_name}")]
    MissingSourceHistory { file_name: String },

    /// A data-set unit references a code the source cannot resolve.
    #[error("data set {code} not found on the source store")]
    DataSetVanished { code: String },

    /// A staged payload file does not match its manifest checksum.
    #[error("checksum mismatch for {path}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        path: String,
        expected: u32,
        actual: u32,
    },

    /// Remote call failed. Terminal for the current entity; no retry here.
    #[error("remote: {0}")]
    Remote(#[from] mirror_client::Error),

    /// Payload failed domain validation before any mutating call.
    #[error("validation: {0}")]
    Validation(#[from] mirror_data::Error),

    /// Staging-directory I/O failed.
    #[error("staging: {0}")]
    Staging(#[from] std::io::Error),
}
