//! Attachment factories.
//!
//! Content is derived deterministically from file name and version number so
//! tests can assert what moved without carrying fixtures around.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use mirror_data::{AttachmentHistory, AttachmentSnapshot, AttachmentVersion};

use crate::time;

/// Deterministic content for one version.
pub fn content_for(file_name: &str, version: u32) -> Bytes {
    Bytes::from(format!("{file_name}::v{version}"))
}

/// One version registered before the reference last-sync timestamp.
pub fn version(file_name: &str, number: u32) -> AttachmentVersion {
    version_registered_at(file_name, number, time::before_sync())
}

/// One version with an explicit registration date.
pub fn version_registered_at(
    file_name: &str,
    number: u32,
    registered: DateTime<Utc>,
) -> AttachmentVersion {
    AttachmentVersion {
        file_name: file_name.to_string(),
        version: number,
        title: None,
        description: None,
        content: Some(content_for(file_name, number)),
        registration_date: registered,
    }
}

/// A fully materialized chain `1..=head`.
pub fn chain(file_name: &str, head: u32) -> AttachmentHistory {
    AttachmentHistory::new((1..=head).map(|v| version(file_name, v)).collect())
        .expect("factory chain is well formed")
}

/// A snapshot holding one fully materialized chain per `(file_name, head)`.
pub fn snapshot(chains: &[(&str, u32)]) -> AttachmentSnapshot {
    AttachmentSnapshot::from_histories(chains.iter().map(|(name, head)| chain(name, *head)))
}
