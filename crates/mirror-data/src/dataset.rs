//! Data-set records and their file manifests.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Component;

use crate::{Error, Result};

/// Storage kind of a data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSetKind {
    /// Files held in managed storage.
    Physical,
    /// Groups other data sets, no payload of its own.
    Container,
    /// Points at externally managed files.
    Link,
}

/// One entry of a data-set file manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the data-set root.
    pub path: String,
    /// Whether the entry is a directory.
    pub directory: bool,
    /// File size in bytes. Must be absent on directory entries.
    pub size: Option<u64>,
    /// CRC32 checksum of the file content, when the store computed one.
    pub checksum_crc32: Option<u32>,
}

/// File payload listing of one data set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileManifest {
    pub entries: Vec<ManifestEntry>,
}

impl FileManifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// Validates the manifest before any mutating call is issued.
    ///
    /// Rejects absolute paths, paths that traverse outside the data-set root,
    /// duplicate paths, and directory entries carrying a size.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for entry in &self.entries {
            let path = std::path::Path::new(&entry.path);
            if path.is_absolute() || entry.path.is_empty() {
                return Err(Error::ManifestPathNotRelative {
                    path: entry.path.clone(),
                });
            }
            // Reject any `..` no matter where it sits; depth bookkeeping is
            // not worth the ambiguity it buys.
            if path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
            {
                return Err(Error::ManifestPathEscapes {
                    path: entry.path.clone(),
                });
            }
            if entry.directory && entry.size.is_some() {
                return Err(Error::DirectoryWithSize {
                    path: entry.path.clone(),
                });
            }
            if !seen.insert(entry.path.as_str()) {
                return Err(Error::DuplicateManifestPath {
                    path: entry.path.clone(),
                });
            }
        }
        Ok(())
    }

    /// Paths of the file (non-directory) entries.
    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.directory)
            .map(|e| e.path.as_str())
    }

    /// Total declared payload size in bytes.
    pub fn total_size(&self) -> u64 {
        self.entries.iter().filter_map(|e| e.size).sum()
    }
}

/// A whole data-set record: metadata plus bulk file payload listing.
///
/// `code` is the immutable natural key; it decides add vs. update and is
/// never reassigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSetRecord {
    /// Store-wide unique code.
    pub code: String,
    /// Storage kind.
    pub kind: DataSetKind,
    /// Identifier of the owning sample, if sample-bound.
    pub sample: Option<String>,
    /// Identifier of the owning experiment, if experiment-bound.
    pub experiment: Option<String>,
    /// Property name → value.
    pub properties: BTreeMap<String, String>,
    /// Codes of parent data sets.
    pub parents: BTreeSet<String>,
    /// File payload listing.
    pub manifest: FileManifest,
}

impl DataSetRecord {
    /// Minimal physical record with no linkage, no properties, no payload.
    pub fn physical(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            kind: DataSetKind::Physical,
            sample: None,
            experiment: None,
            properties: BTreeMap::new(),
            parents: BTreeSet::new(),
            manifest: FileManifest::default(),
        }
    }
}
