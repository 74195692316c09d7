//! In-memory fake store implementing every client port.
//!
//! The fake is a *working* store: writes mutate its state, so running the
//! engine twice against the same fake exercises real convergence, not
//! canned responses. Every port call is recorded in order for call-order
//! and dry-run assertions.

use async_trait::async_trait;
use mirror_client::{
    AttachmentUpdateOp, Auth, Error, FetchOptions, FileTransfer, ReadApi, Result, SessionToken,
    WriteApi,
};
use mirror_data::{
    AttachmentHistory, AttachmentSnapshot, AttachmentVersion, DataSetRecord, EntityRef,
    FileManifest,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// One recorded port call, in issue order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Login {
        user: String,
    },
    Logout,
    ListChangedEntities {
        since: chrono::DateTime<chrono::Utc>,
    },
    ListAttachments {
        perm_ids: Vec<String>,
        with_content: bool,
        with_history: bool,
    },
    AddVersion {
        perm_id: String,
        file_name: String,
        version: u32,
    },
    DeleteAttachment {
        perm_id: String,
        file_name: String,
    },
    PatchAttachment {
        perm_id: String,
        file_name: String,
        title: Option<String>,
        description: Option<String>,
    },
    ApplyUpdate {
        perm_id: String,
        ops: usize,
    },
    GetDataSet {
        code: String,
    },
    ListProperties {
        code: String,
    },
    RegisterDataSet {
        code: String,
        staged_files: Vec<String>,
    },
    UpdateDataSet {
        code: String,
        properties: BTreeMap<String, String>,
        parents: Option<BTreeSet<String>>,
    },
    DownloadFiles {
        code: String,
    },
}

impl RecordedCall {
    /// Whether the call mutates store state. Dry-run tests assert zero of
    /// these.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            RecordedCall::AddVersion { .. }
                | RecordedCall::DeleteAttachment { .. }
                | RecordedCall::PatchAttachment { .. }
                | RecordedCall::ApplyUpdate { .. }
                | RecordedCall::RegisterDataSet { .. }
                | RecordedCall::UpdateDataSet { .. }
        )
    }
}

#[derive(Default)]
struct FakeState {
    change_feed: Vec<EntityRef>,
    attachments: HashMap<String, AttachmentSnapshot>,
    data_sets: HashMap<String, DataSetRecord>,
    /// (code, relative path) → payload bytes served by `download_files`.
    payload: HashMap<(String, String), Vec<u8>>,
    calls: Vec<RecordedCall>,
    next_session: u32,
    open_sessions: HashSet<String>,
    reject_logins: bool,
    failing_writes: HashSet<String>,
}

/// In-memory store double. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct FakeRemote {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Seeding ---

    /// Appends an entity to the change feed served by
    /// `list_changed_entities`.
    pub fn seed_changed_entity(&self, entity: EntityRef) {
        self.lock().change_feed.push(entity);
    }

    pub fn seed_attachments(&self, perm_id: &str, snapshot: AttachmentSnapshot) {
        self.lock().attachments.insert(perm_id.to_string(), snapshot);
    }

    pub fn seed_data_set(&self, record: DataSetRecord) {
        self.lock().data_sets.insert(record.code.clone(), record);
    }

    pub fn seed_file(&self, code: &str, path: &str, bytes: &[u8]) {
        self.lock()
            .payload
            .insert((code.to_string(), path.to_string()), bytes.to_vec());
    }

    // --- Failure injection ---

    /// Every subsequent login is rejected.
    pub fn reject_logins(&self) {
        self.lock().reject_logins = true;
    }

    /// Writes touching this perm id (or data-set code) fail with a server
    /// error.
    pub fn fail_writes_for(&self, perm_id: &str) {
        self.lock().failing_writes.insert(perm_id.to_string());
    }

    // --- Inspection ---

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn write_calls(&self) -> Vec<RecordedCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_write())
            .cloned()
            .collect()
    }

    pub fn attachments(&self, perm_id: &str) -> AttachmentSnapshot {
        self.lock()
            .attachments
            .get(perm_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn data_set(&self, code: &str) -> Option<DataSetRecord> {
        self.lock().data_sets.get(code).cloned()
    }

    /// Sessions opened but never surrendered. Zero after a clean run.
    pub fn open_session_count(&self) -> usize {
        self.lock().open_sessions.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake store lock")
    }

    fn injected_failure(entity: &str) -> Error {
        Error::Status {
            status: 500,
            endpoint: format!("fake:{entity}"),
            message: "injected write failure".to_string(),
        }
    }

    fn apply_op(
        snapshot: &mut AttachmentSnapshot,
        op: &AttachmentUpdateOp,
    ) {
        match op {
            AttachmentUpdateOp::Add(version) => {
                let mut versions: Vec<AttachmentVersion> = snapshot
                    .get(&version.file_name)
                    .map(|h| h.versions().to_vec())
                    .unwrap_or_default();
                versions.push(version.clone());
                let history =
                    AttachmentHistory::new(versions).expect("fake store keeps chains well formed");
                snapshot
                    .files
                    .insert(version.file_name.clone(), history);
            }
            AttachmentUpdateOp::Delete { file_name } => {
                snapshot.files.remove(file_name);
            }
            AttachmentUpdateOp::Patch {
                file_name,
                title,
                description,
            } => {
                if let Some(history) = snapshot.get(file_name) {
                    let mut versions = history.versions().to_vec();
                    if let Some(head) = versions.last_mut() {
                        head.title = title.clone();
                        head.description = description.clone();
                    }
                    let history = AttachmentHistory::new(versions)
                        .expect("fake store keeps chains well formed");
                    snapshot.files.insert(file_name.clone(), history);
                }
            }
        }
    }
}

#[async_trait]
impl Auth for FakeRemote {
    async fn login(&self, user: &str, _password: &str) -> Result<SessionToken> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::Login {
            user: user.to_string(),
        });
        if state.reject_logins {
            return Err(Error::AuthRejected {
                user: user.to_string(),
            });
        }
        state.next_session += 1;
        let token = format!("fake-session-{}", state.next_session);
        state.open_sessions.insert(token.clone());
        Ok(SessionToken::new(token))
    }

    async fn logout(&self, token: SessionToken) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::Logout);
        state.open_sessions.remove(token.as_str());
        Ok(())
    }
}

#[async_trait]
impl ReadApi for FakeRemote {
    async fn list_changed_entities(
        &self,
        _token: &SessionToken,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<EntityRef>> {
        let mut state = self.lock();
        state
            .calls
            .push(RecordedCall::ListChangedEntities { since });
        Ok(state.change_feed.clone())
    }

    async fn list_attachments(
        &self,
        _token: &SessionToken,
        refs: &[EntityRef],
        options: FetchOptions,
    ) -> Result<HashMap<String, AttachmentSnapshot>> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::ListAttachments {
            perm_ids: refs.iter().map(|r| r.perm_id.clone()).collect(),
            with_content: options.with_content,
            with_history: options.with_history,
        });
        Ok(refs
            .iter()
            .filter_map(|r| {
                state
                    .attachments
                    .get(&r.perm_id)
                    .map(|s| (r.perm_id.clone(), s.clone()))
            })
            .collect())
    }

    async fn get_data_set(
        &self,
        _token: &SessionToken,
        code: &str,
    ) -> Result<Option<DataSetRecord>> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::GetDataSet {
            code: code.to_string(),
        });
        Ok(state.data_sets.get(code).cloned())
    }

    async fn list_properties(
        &self,
        _token: &SessionToken,
        code: &str,
    ) -> Result<BTreeMap<String, String>> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::ListProperties {
            code: code.to_string(),
        });
        Ok(state
            .data_sets
            .get(code)
            .map(|r| r.properties.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl WriteApi for FakeRemote {
    async fn apply_attachment_update(
        &self,
        _token: &SessionToken,
        entity: &EntityRef,
        ops: &[AttachmentUpdateOp],
    ) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::ApplyUpdate {
            perm_id: entity.perm_id.clone(),
            ops: ops.len(),
        });
        if state.failing_writes.contains(&entity.perm_id) {
            return Err(Self::injected_failure(&entity.perm_id));
        }
        let snapshot = state
            .attachments
            .entry(entity.perm_id.clone())
            .or_default();
        for op in ops {
            Self::apply_op(snapshot, op);
        }
        Ok(())
    }

    async fn add_attachment_version(
        &self,
        _token: &SessionToken,
        entity: &EntityRef,
        version: &AttachmentVersion,
    ) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::AddVersion {
            perm_id: entity.perm_id.clone(),
            file_name: version.file_name.clone(),
            version: version.version,
        });
        if state.failing_writes.contains(&entity.perm_id) {
            return Err(Self::injected_failure(&entity.perm_id));
        }
        let snapshot = state
            .attachments
            .entry(entity.perm_id.clone())
            .or_default();
        Self::apply_op(snapshot, &AttachmentUpdateOp::Add(version.clone()));
        Ok(())
    }

    async fn delete_attachment(
        &self,
        _token: &SessionToken,
        entity: &EntityRef,
        file_name: &str,
    ) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::DeleteAttachment {
            perm_id: entity.perm_id.clone(),
            file_name: file_name.to_string(),
        });
        if state.failing_writes.contains(&entity.perm_id) {
            return Err(Self::injected_failure(&entity.perm_id));
        }
        if let Some(snapshot) = state.attachments.get_mut(&entity.perm_id) {
            Self::apply_op(
                snapshot,
                &AttachmentUpdateOp::Delete {
                    file_name: file_name.to_string(),
                },
            );
        }
        Ok(())
    }

    async fn patch_attachment(
        &self,
        _token: &SessionToken,
        entity: &EntityRef,
        file_name: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::PatchAttachment {
            perm_id: entity.perm_id.clone(),
            file_name: file_name.to_string(),
            title: title.map(Into::into),
            description: description.map(Into::into),
        });
        if state.failing_writes.contains(&entity.perm_id) {
            return Err(Self::injected_failure(&entity.perm_id));
        }
        if let Some(snapshot) = state.attachments.get_mut(&entity.perm_id) {
            Self::apply_op(
                snapshot,
                &AttachmentUpdateOp::Patch {
                    file_name: file_name.to_string(),
                    title: title.map(Into::into),
                    description: description.map(Into::into),
                },
            );
        }
        Ok(())
    }

    async fn register_data_set(
        &self,
        _token: &SessionToken,
        record: &DataSetRecord,
        staged_dir: &Path,
    ) -> Result<()> {
        // Capture which payload files were actually staged, proving the
        // download ran before registration.
        let mut staged_files: Vec<String> = record
            .manifest
            .file_paths()
            .filter(|path| staged_dir.join(path).is_file())
            .map(str::to_string)
            .collect();
        staged_files.sort();

        let mut state = self.lock();
        state.calls.push(RecordedCall::RegisterDataSet {
            code: record.code.clone(),
            staged_files,
        });
        if state.failing_writes.contains(&record.code) {
            return Err(Self::injected_failure(&record.code));
        }
        state.data_sets.insert(record.code.clone(), record.clone());
        Ok(())
    }

    async fn update_data_set(
        &self,
        _token: &SessionToken,
        code: &str,
        properties: &BTreeMap<String, String>,
        parents: Option<&BTreeSet<String>>,
    ) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::UpdateDataSet {
            code: code.to_string(),
            properties: properties.clone(),
            parents: parents.cloned(),
        });
        if state.failing_writes.contains(code) {
            return Err(Self::injected_failure(code));
        }
        if let Some(record) = state.data_sets.get_mut(code) {
            for (name, value) in properties {
                // An empty value is an explicit clear.
                if value.is_empty() {
                    record.properties.remove(name);
                } else {
                    record.properties.insert(name.clone(), value.clone());
                }
            }
            if let Some(parents) = parents {
                record.parents = parents.clone();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl FileTransfer for FakeRemote {
    async fn download_files(
        &self,
        _token: &SessionToken,
        code: &str,
        manifest: &FileManifest,
        dest_dir: &Path,
    ) -> Result<()> {
        let payload: Vec<(String, Vec<u8>)> = {
            let mut state = self.lock();
            state.calls.push(RecordedCall::DownloadFiles {
                code: code.to_string(),
            });
            manifest
                .file_paths()
                .map(|path| {
                    let bytes = state
                        .payload
                        .get(&(code.to_string(), path.to_string()))
                        .cloned()
                        .unwrap_or_default();
                    (path.to_string(), bytes)
                })
                .collect()
        };
        for (path, bytes) in payload {
            let target = dest_dir.join(&path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, bytes)?;
        }
        Ok(())
    }
}
