//! Error types for domain validation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid entity reference: {0}")]
    InvalidEntity(String),

    #[error("attachment history for {file_name} is empty")]
    EmptyHistory { file_name: String },

    #[error("attachment {file_name} has duplicate version {version}")]
    DuplicateVersion { file_name: String, version: u32 },

    #[error("attachment {file_name} has invalid version {version} (versions start at 1)")]
    InvalidVersion { file_name: String, version: u32 },

    #[error("attachment history mixes file names: expected {expected}, got {got}")]
    MixedFileNames { expected: String, got: String },

    #[error("manifest path is not relative: {path}")]
    ManifestPathNotRelative { path: String },

    #[error("manifest path escapes the data-set root: {path}")]
    ManifestPathEscapes { path: String },

    #[error("manifest lists {path} twice")]
    DuplicateManifestPath { path: String },

    #[error("directory entry {path} carries a file size")]
    DirectoryWithSize { path: String },
}
