//! Whole data-set reconciliation.
//!
//! Data sets are add-or-update records: metadata plus a bulk file payload.
//! Unlike attachments there is no version chain; the `code` decides whether
//! a record is registered from scratch or has its metadata synchronized in
//! place. Payload files are only ever transferred on first registration.

use mirror_client::{Remote, SessionToken};
use mirror_data::DataSetRecord;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{Error, Result};

/// Which transition a reconciliation fired (or would have fired, on a dry
/// run).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSetTransition {
    /// absent → present: payload downloaded, record registered.
    Registered,
    /// present → present: metadata synchronized, no file transfer.
    Updated,
    /// present → present with identical metadata: nothing to do.
    Unchanged,
}

/// Reconciles one data-set record between source and replica.
pub struct DataSetReconciler<'a> {
    source: &'a dyn Remote,
    source_token: &'a SessionToken,
    replica: &'a dyn Remote,
    replica_token: &'a SessionToken,
    /// Run-scoped staging root; each data set stages into its own
    /// code-named subdirectory.
    staging_root: &'a Path,
    dry_run: bool,
}

impl<'a> DataSetReconciler<'a> {
    pub fn new(
        source: &'a dyn Remote,
        source_token: &'a SessionToken,
        replica: &'a dyn Remote,
        replica_token: &'a SessionToken,
        staging_root: &'a Path,
        dry_run: bool,
    ) -> Self {
        Self {
            source,
            source_token,
            replica,
            replica_token,
            staging_root,
            dry_run,
        }
    }

    /// Reconciles the data set with the given code.
    ///
    /// Any error aborts only this record's transition; the caller records
    /// the failure and moves on.
    pub async fn reconcile(&self, code: &str) -> Result<DataSetTransition> {
        let incoming = self
            .source
            .get_data_set(self.source_token, code)
            .await?
            .ok_or_else(|| Error::DataSetVanished {
                code: code.to_string(),
            })?;

        match self.replica.get_data_set(self.replica_token, code).await? {
            None => self.register(&incoming).await,
            Some(existing) => self.update(&incoming, &existing).await,
        }
    }

    /// absent → present.
    ///
    /// The manifest is validated before anything mutates; a malformed
    /// manifest never costs a download.
    async fn register(&self, incoming: &DataSetRecord) -> Result<DataSetTransition> {
        incoming.manifest.validate()?;

        let staged = self.staging_dir(&incoming.code);
        if self.dry_run {
            info!(code = %incoming.code, "dry run: would register data set");
            return Ok(DataSetTransition::Registered);
        }

        tokio::fs::create_dir_all(&staged).await?;
        self.source
            .download_files(
                self.source_token,
                &incoming.code,
                &incoming.manifest,
                &staged,
            )
            .await?;
        verify_staged(&incoming.manifest, &staged).await?;
        self.replica
            .register_data_set(self.replica_token, incoming, &staged)
            .await?;
        info!(
            code = %incoming.code,
            files = incoming.manifest.file_paths().count(),
            bytes = incoming.manifest.total_size(),
            "data set registered"
        );
        Ok(DataSetTransition::Registered)
    }

    /// present → present. Never re-downloads content.
    ///
    /// Every incoming property is set; every replica property absent from
    /// the incoming set is explicitly cleared to an empty value. A property
    /// is never silently left stale.
    async fn update(
        &self,
        incoming: &DataSetRecord,
        existing: &DataSetRecord,
    ) -> Result<DataSetTransition> {
        let replica_properties = self
            .replica
            .list_properties(self.replica_token, &incoming.code)
            .await?;

        let mut properties: BTreeMap<String, String> = incoming.properties.clone();
        for stale in replica_properties.keys() {
            if !incoming.properties.contains_key(stale) {
                properties.insert(stale.clone(), String::new());
            }
        }

        let parents = (!incoming.parents.is_empty()).then_some(&incoming.parents);

        let parents_unchanged = parents.is_none() || incoming.parents == existing.parents;
        if properties == replica_properties && parents_unchanged {
            debug!(code = %incoming.code, "data set metadata already convergent");
            return Ok(DataSetTransition::Unchanged);
        }

        if self.dry_run {
            info!(code = %incoming.code, "dry run: would update data set metadata");
            return Ok(DataSetTransition::Updated);
        }

        self.replica
            .update_data_set(self.replica_token, &incoming.code, &properties, parents)
            .await?;
        info!(code = %incoming.code, properties = properties.len(), "data set metadata updated");
        Ok(DataSetTransition::Updated)
    }

    fn staging_dir(&self, code: &str) -> PathBuf {
        self.staging_root.join(code)
    }
}

/// Verifies staged payload files against the manifest's CRC32 checksums,
/// where the store provided them. A corrupt transfer fails the record
/// before registration.
async fn verify_staged(manifest: &mirror_data::FileManifest, staged: &Path) -> Result<()> {
    for entry in &manifest.entries {
        let Some(expected) = entry.checksum_crc32 else {
            continue;
        };
        let bytes = tokio::fs::read(staged.join(&entry.path)).await?;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&bytes);
        let actual = hasher.finalize();
        if actual != expected {
            return Err(Error::ChecksumMismatch {
                path: entry.path.clone(),
                expected,
                actual,
            });
        }
    }
    Ok(())
}
