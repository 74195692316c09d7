//! Wire types for the JSON/HTTP store API.
//!
//! Content bytes travel base64-encoded. Conversions into domain types live
//! here so [`HttpRemote`](crate::HttpRemote) stays plain request plumbing.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use mirror_data::{
    AttachmentHistory, AttachmentSnapshot, AttachmentVersion, DataSetKind, DataSetRecord,
    EntityKind, FileManifest, ManifestEntry,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::ports::AttachmentUpdateOp;
use crate::{Error, Result};

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub user: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Error body the store attaches to non-success statuses.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    pub entities: Vec<ChangedEntityDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedEntityDto {
    pub kind: EntityKind,
    pub perm_id: String,
    pub identifier: String,
    pub has_attachments: bool,
}

impl From<ChangedEntityDto> for mirror_data::EntityRef {
    fn from(dto: ChangedEntityDto) -> Self {
        mirror_data::EntityRef::new(dto.kind, dto.perm_id, dto.identifier, dto.has_attachments)
    }
}

#[derive(Debug, Serialize)]
pub struct AttachmentListRequest {
    pub entities: Vec<EntityKeyDto>,
    pub with_content: bool,
    pub with_history: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityKeyDto {
    pub kind: EntityKind,
    pub perm_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentListResponse {
    /// perm_id → attachment files.
    pub entities: HashMap<String, Vec<AttachmentFileDto>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentFileDto {
    pub file_name: String,
    /// Whatever run of versions the store materialized, any order.
    pub versions: Vec<AttachmentVersionDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentVersionDto {
    pub file_name: String,
    pub version: u32,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Base64-encoded content, absent when not requested.
    pub content: Option<String>,
    pub registration_date: DateTime<Utc>,
}

impl AttachmentVersionDto {
    pub fn from_domain(version: &AttachmentVersion) -> Self {
        Self {
            file_name: version.file_name.clone(),
            version: version.version,
            title: version.title.clone(),
            description: version.description.clone(),
            content: version.content.as_ref().map(|c| BASE64.encode(c)),
            registration_date: version.registration_date,
        }
    }

    pub fn into_domain(self, endpoint: &str) -> Result<AttachmentVersion> {
        let content = self
            .content
            .map(|encoded| {
                BASE64.decode(encoded).map_err(|e| Error::Decode {
                    endpoint: endpoint.to_string(),
                    message: format!("content of {} v{}: {e}", self.file_name, self.version),
                })
            })
            .transpose()?
            .map(Bytes::from);
        Ok(AttachmentVersion {
            file_name: self.file_name,
            version: self.version,
            title: self.title,
            description: self.description,
            content,
            registration_date: self.registration_date,
        })
    }
}

/// Builds a domain snapshot out of one entity's wire files.
pub fn snapshot_from_files(
    files: Vec<AttachmentFileDto>,
    endpoint: &str,
) -> Result<AttachmentSnapshot> {
    let mut histories = Vec::with_capacity(files.len());
    for file in files {
        let versions = file
            .versions
            .into_iter()
            .map(|v| v.into_domain(endpoint))
            .collect::<Result<Vec<_>>>()?;
        histories.push(AttachmentHistory::new(versions)?);
    }
    Ok(AttachmentSnapshot::from_histories(histories))
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum UpdateOpDto {
    Add { version: AttachmentVersionDto },
    Delete { file_name: String },
    Patch {
        file_name: String,
        title: Option<String>,
        description: Option<String>,
    },
}

impl UpdateOpDto {
    pub fn from_op(op: &AttachmentUpdateOp) -> Self {
        match op {
            AttachmentUpdateOp::Add(version) => UpdateOpDto::Add {
                version: AttachmentVersionDto::from_domain(version),
            },
            AttachmentUpdateOp::Delete { file_name } => UpdateOpDto::Delete {
                file_name: file_name.clone(),
            },
            AttachmentUpdateOp::Patch {
                file_name,
                title,
                description,
            } => UpdateOpDto::Patch {
                file_name: file_name.clone(),
                title: title.clone(),
                description: description.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttachmentUpdateRequest {
    pub ops: Vec<UpdateOpDto>,
}

#[derive(Debug, Serialize)]
pub struct PatchAttachmentRequest<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntryDto {
    pub path: String,
    pub directory: bool,
    pub size: Option<u64>,
    pub checksum_crc32: Option<u32>,
}

impl From<ManifestEntryDto> for ManifestEntry {
    fn from(dto: ManifestEntryDto) -> Self {
        ManifestEntry {
            path: dto.path,
            directory: dto.directory,
            size: dto.size,
            checksum_crc32: dto.checksum_crc32,
        }
    }
}

impl From<&ManifestEntry> for ManifestEntryDto {
    fn from(entry: &ManifestEntry) -> Self {
        ManifestEntryDto {
            path: entry.path.clone(),
            directory: entry.directory,
            size: entry.size,
            checksum_crc32: entry.checksum_crc32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSetDto {
    pub code: String,
    pub kind: DataSetKind,
    pub sample: Option<String>,
    pub experiment: Option<String>,
    pub properties: BTreeMap<String, String>,
    pub parents: BTreeSet<String>,
    pub manifest: Vec<ManifestEntryDto>,
}

impl From<DataSetDto> for DataSetRecord {
    fn from(dto: DataSetDto) -> Self {
        DataSetRecord {
            code: dto.code,
            kind: dto.kind,
            sample: dto.sample,
            experiment: dto.experiment,
            properties: dto.properties,
            parents: dto.parents,
            manifest: FileManifest::new(dto.manifest.into_iter().map(Into::into).collect()),
        }
    }
}

impl From<&DataSetRecord> for DataSetDto {
    fn from(record: &DataSetRecord) -> Self {
        DataSetDto {
            code: record.code.clone(),
            kind: record.kind,
            sample: record.sample.clone(),
            experiment: record.experiment.clone(),
            properties: record.properties.clone(),
            parents: record.parents.clone(),
            manifest: record.manifest.entries.iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateDataSetRequest<'a> {
    pub properties: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<&'a BTreeSet<String>>,
}

#[derive(Debug, Deserialize)]
pub struct PropertiesResponse {
    pub properties: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn content_round_trips_through_base64() {
        let version = AttachmentVersion {
            file_name: "a.txt".into(),
            version: 2,
            title: Some("A".into()),
            description: None,
            content: Some(Bytes::from_static(b"\x00\x01binary")),
            registration_date: Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap(),
        };
        let dto = AttachmentVersionDto::from_domain(&version);
        assert_eq!(dto.content.as_deref(), Some("AAFiaW5hcnk="));
        let back = dto.into_domain("/test").unwrap();
        assert_eq!(back, version);
    }

    #[test]
    fn bad_base64_is_a_decode_error() {
        let dto = AttachmentVersionDto {
            file_name: "a.txt".into(),
            version: 1,
            title: None,
            description: None,
            content: Some("not base64!!!".into()),
            registration_date: Utc::now(),
        };
        assert!(matches!(
            dto.into_domain("/test"),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn update_op_serializes_with_tag() {
        let dto = UpdateOpDto::Delete {
            file_name: "old.pdf".into(),
        };
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["op"], "delete");
        assert_eq!(json["file_name"], "old.pdf");
    }
}
