//! Port traits the engine reconciles through.
//!
//! Split by concern so test doubles only implement what a test observes:
//! [`ReadApi`] for snapshots, [`WriteApi`] for replica mutations,
//! [`FileTransfer`] for bulk payload download, [`Auth`] for session
//! lifecycle. [`Remote`] bundles all four for callers that hold one
//! connection per store.

use async_trait::async_trait;
use mirror_data::{
    AttachmentSnapshot, AttachmentVersion, DataSetRecord, EntityRef, FileManifest,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use crate::Result;

/// Options for an attachment snapshot fetch.
///
/// The engine always fetches with both flags set so the planner can walk
/// full version chains without a second round-trip; partial fetches exist
/// for diagnostic tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Materialize file content for every version.
    pub with_content: bool,
    /// Materialize the full version history, not just the head.
    pub with_history: bool,
}

impl FetchOptions {
    /// Content plus full history. What a reconciliation run uses.
    pub fn full() -> Self {
        Self {
            with_content: true,
            with_history: true,
        }
    }
}

/// An authenticated session with one store.
///
/// Obtained from [`Auth::login`], surrendered with [`Auth::logout`]. The
/// token value never appears in logs or `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// One operation of a batched attachment-list update.
///
/// The wire-level counterpart of a plan item: add-chains and replaces are
/// already flattened into per-version adds, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentUpdateOp {
    /// Append one version. Content is present.
    Add(AttachmentVersion),
    /// Remove a file with its whole history.
    Delete { file_name: String },
    /// Rewrite head title/description in place.
    Patch {
        file_name: String,
        title: Option<String>,
        description: Option<String>,
    },
}

/// Read access to one store.
#[async_trait]
pub trait ReadApi: Send + Sync {
    /// Entities the store reports as changed since `since`.
    ///
    /// The feed also asserts per entity whether it carries attachments;
    /// that assertion becomes [`EntityRef::has_attachments_hint`].
    async fn list_changed_entities(
        &self,
        token: &SessionToken,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<EntityRef>>;

    /// Fetches the attachment snapshot of each listed entity.
    ///
    /// Returns a map keyed by `perm_id`. Entities without attachments map to
    /// an empty snapshot; entities unknown to the store are absent from the
    /// map.
    async fn list_attachments(
        &self,
        token: &SessionToken,
        refs: &[EntityRef],
        options: FetchOptions,
    ) -> Result<HashMap<String, AttachmentSnapshot>>;

    /// Fetches one data-set record by code, `None` when the store has no
    /// record under that code.
    async fn get_data_set(
        &self,
        token: &SessionToken,
        code: &str,
    ) -> Result<Option<DataSetRecord>>;

    /// Current property map of one data set.
    async fn list_properties(
        &self,
        token: &SessionToken,
        code: &str,
    ) -> Result<BTreeMap<String, String>>;
}

/// Write access to the replica store.
#[async_trait]
pub trait WriteApi: Send + Sync {
    /// Applies a whole attachment-list update in one call.
    ///
    /// Operations execute in list order on the store side.
    async fn apply_attachment_update(
        &self,
        token: &SessionToken,
        entity: &EntityRef,
        ops: &[AttachmentUpdateOp],
    ) -> Result<()>;

    /// Appends one attachment version.
    async fn add_attachment_version(
        &self,
        token: &SessionToken,
        entity: &EntityRef,
        version: &AttachmentVersion,
    ) -> Result<()>;

    /// Removes one attachment file with its whole history.
    async fn delete_attachment(
        &self,
        token: &SessionToken,
        entity: &EntityRef,
        file_name: &str,
    ) -> Result<()>;

    /// Rewrites title/description of the head version.
    async fn patch_attachment(
        &self,
        token: &SessionToken,
        entity: &EntityRef,
        file_name: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<()>;

    /// Registers a new data set: metadata, linkage, properties, and the
    /// staged payload files under `staged_dir`.
    async fn register_data_set(
        &self,
        token: &SessionToken,
        record: &DataSetRecord,
        staged_dir: &Path,
    ) -> Result<()>;

    /// Updates metadata of an existing data set.
    ///
    /// Every property in `properties` is set verbatim, including empty
    /// values, which the store treats as an explicit clear. Parents are only
    /// touched when `parents` is `Some`.
    async fn update_data_set(
        &self,
        token: &SessionToken,
        code: &str,
        properties: &BTreeMap<String, String>,
        parents: Option<&BTreeSet<String>>,
    ) -> Result<()>;
}

/// Bulk file download from the source store.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Downloads every file of `manifest` for data set `code` into
    /// `dest_dir`, recreating the manifest's relative layout.
    async fn download_files(
        &self,
        token: &SessionToken,
        code: &str,
        manifest: &FileManifest,
        dest_dir: &Path,
    ) -> Result<()>;
}

/// Session lifecycle of one store.
#[async_trait]
pub trait Auth: Send + Sync {
    /// Opens an authenticated session.
    async fn login(&self, user: &str, password: &str) -> Result<SessionToken>;

    /// Surrenders a session. Idempotent on the store side.
    async fn logout(&self, token: SessionToken) -> Result<()>;
}

/// Everything the engine needs from one store.
pub trait Remote: ReadApi + WriteApi + FileTransfer + Auth {}

impl<T: ReadApi + WriteApi + FileTransfer + Auth> Remote for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_debug_is_redacted() {
        let token = SessionToken::new("secret-abc");
        assert_eq!(format!("{token:?}"), "SessionToken(..)");
        assert_eq!(token.as_str(), "secret-abc");
    }
}
