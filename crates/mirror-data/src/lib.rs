//! Domain model for the labmirror reconciliation engine.
//!
//! This crate holds the value types shared by the sync engine and the remote
//! client facade: entity references, versioned attachments and their
//! snapshots, reconciliation plan items, and data-set records with their file
//! manifests. Everything here is plain data with no I/O.

pub mod attachment;
pub mod dataset;
pub mod entity;

mod error;

pub use attachment::{
    AttachmentChange, AttachmentHistory, AttachmentSnapshot, AttachmentVersion, ChangeCategory,
};
pub use dataset::{DataSetKind, DataSetRecord, FileManifest, ManifestEntry};
pub use entity::{EntityKind, EntityRef};
pub use error::Error;

/// Result type for domain validation.
pub type Result<T> = std::result::Result<T, Error>;
