//! In-memory backend.
//!
//! Reproduces the remote store's data model closely enough to exercise the
//! adapter: names match case-insensitively, duplicate names are allowed,
//! objects may have several parents, list results are paginated, and
//! native documents cannot be downloaded.

use crate::backend::{Backend, ListRequest, ObjectPage, UploadSession, UploadStatus, UploadTarget};
use crate::error::{Error, Result};
use crate::object::{
    Channel, ObjectMetadata, ObjectRecord, Permission, ROOT_ID, SHARING_ROLES,
};
use crate::path;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Page size the remote store uses for list calls by default.
pub const DEFAULT_PAGE_SIZE: usize = 100;

const DEFAULT_UPLOAD_CHUNK: usize = 256 * 1024;
const OWNER_EMAIL: &str = "owner@example.com";

#[derive(Debug, Clone)]
struct StoredObject {
    record: ObjectRecord,
    content: Vec<u8>,
}

/// Backend calls observed so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub get: usize,
    pub uploads: usize,
}

struct State {
    // ids are zero-padded counters, so map order is creation order
    objects: BTreeMap<String, StoredObject>,
    next_id: u64,
    page_size: usize,
    chunk_size: usize,
    last_time: DateTime<Utc>,
    fail_uploads: bool,
    fail_downloads: bool,
    calls: CallCounts,
}

/// Object store held entirely in memory.
#[derive(Clone)]
pub struct MemoryBackend(Arc<Mutex<State>>);

impl Default for MemoryBackend {
    fn default() -> Self {
        let mut state = State {
            objects: BTreeMap::new(),
            next_id: 0,
            page_size: DEFAULT_PAGE_SIZE,
            chunk_size: DEFAULT_UPLOAD_CHUNK,
            last_time: DateTime::<Utc>::MIN_UTC,
            fail_uploads: false,
            fail_downloads: false,
            calls: CallCounts::default(),
        };
        let now = state.now();
        let mut root = ObjectRecord::synthetic_root();
        root.name = "My Drive".to_string();
        root.created_time = Some(now);
        root.modified_time = Some(now);
        root.permissions = vec![owner_permission()];
        state.objects.insert(
            ROOT_ID.to_string(),
            StoredObject {
                record: root,
                content: Vec::new(),
            },
        );
        Self(Arc::new(Mutex::new(state)))
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects returned per list page.
    pub async fn set_page_size(&self, page_size: usize) {
        self.0.lock().await.page_size = page_size.max(1);
    }

    /// Bytes transferred per upload poll.
    pub async fn set_chunk_size(&self, chunk_size: usize) {
        self.0.lock().await.chunk_size = chunk_size.max(1);
    }

    /// Makes every upload chunk fail with a server error.
    pub async fn set_fail_uploads(&self, fail: bool) {
        self.0.lock().await.fail_uploads = fail;
    }

    /// Makes every download and export fail with a server error.
    pub async fn set_fail_downloads(&self, fail: bool) {
        self.0.lock().await.fail_downloads = fail;
    }

    pub async fn calls(&self) -> CallCounts {
        self.0.lock().await.calls
    }

    /// Stores a record as-is, bypassing every check. Used to build states the
    /// adapter itself never produces (duplicate names, native documents).
    pub async fn insert_raw(&self, record: ObjectRecord, content: Vec<u8>) {
        let mut state = self.0.lock().await;
        state
            .objects
            .insert(record.id.clone(), StoredObject { record, content });
    }

    /// Raw content of an object, bypassing download restrictions.
    pub async fn content(&self, id: &str) -> Option<Vec<u8>> {
        self.0
            .lock()
            .await
            .objects
            .get(id)
            .map(|stored| stored.content.clone())
    }

    pub async fn object_count(&self) -> usize {
        self.0.lock().await.objects.len()
    }
}

fn owner_permission() -> Permission {
    let mut permission = Permission::user("owner", OWNER_EMAIL);
    permission.id = Some("owner".to_string());
    permission
}

fn not_found(id: &str) -> Error {
    Error::api(404, format!("File not found: {id}"))
}

fn md5_hex(content: &[u8]) -> String {
    hex::encode(Md5::digest(content))
}

/// Content type the store infers for uploads without an explicit one.
fn guess_mime_type(name: &str) -> &'static str {
    match path::extension(name).to_lowercase().as_str() {
        ".txt" => "text/plain",
        ".csv" => "text/csv",
        ".json" => "application/json",
        ".html" | ".htm" => "text/html",
        ".pdf" => "application/pdf",
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

fn merge_app_properties(record: &mut ObjectRecord, changes: &BTreeMap<String, Option<String>>) {
    let mut props = record.app_properties.take().unwrap_or_default();
    for (key, value) in changes {
        match value {
            Some(value) => {
                props.insert(key.clone(), value.clone());
            }
            None => {
                props.remove(key);
            }
        }
    }
    record.app_properties = if props.is_empty() { None } else { Some(props) };
}

impl State {
    /// Strictly increasing millisecond clock.
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now().trunc_subsecs(3);
        if now <= self.last_time {
            now = self.last_time + Duration::milliseconds(1);
        }
        self.last_time = now;
        now
    }

    fn new_id(&mut self) -> String {
        self.next_id += 1;
        format!("obj{:08}", self.next_id)
    }

    fn record(&self, id: &str) -> Result<&ObjectRecord> {
        self.objects
            .get(id)
            .map(|stored| &stored.record)
            .ok_or_else(|| not_found(id))
    }

    fn check_parents(&self, parents: &[String]) -> Result<()> {
        for parent in parents {
            if !self.record(parent)?.is_folder() {
                return Err(Error::api(400, format!("Parent is not a folder: {parent}")));
            }
        }
        Ok(())
    }

    fn list(&mut self, request: &ListRequest) -> Result<ObjectPage> {
        self.calls.list += 1;
        let offset = match &request.page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| Error::api(400, format!("Invalid page token: {token}")))?,
            None => 0,
        };
        let matching: Vec<&ObjectRecord> = self
            .objects
            .values()
            .map(|stored| &stored.record)
            .filter(|record| record.id != ROOT_ID && request.query.matches(record))
            .collect();
        let end = (offset + self.page_size).min(matching.len());
        let objects = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|record| (*record).clone())
            .collect();
        let next_page_token = if end < matching.len() {
            Some(end.to_string())
        } else {
            None
        };
        Ok(ObjectPage {
            objects,
            next_page_token,
        })
    }

    fn create(&mut self, metadata: &ObjectMetadata, content: Vec<u8>) -> Result<ObjectRecord> {
        let parents = metadata
            .parents
            .clone()
            .unwrap_or_else(|| vec![ROOT_ID.to_string()]);
        self.check_parents(&parents)?;

        let name = metadata.name.clone().unwrap_or_else(|| "Untitled".to_string());
        let mime_type = metadata
            .mime_type
            .clone()
            .unwrap_or_else(|| guess_mime_type(&name).to_string());
        let now = self.now();
        let mut record = ObjectRecord::synthetic_root();
        record.id = self.new_id();
        record.name = name;
        record.mime_type = mime_type;
        record.parents = parents;
        record.created_time = Some(metadata.created_time.unwrap_or(now));
        record.modified_time = Some(metadata.modified_time.unwrap_or(now));
        record.permissions = vec![owner_permission()];
        record.content_hints = metadata.content_hints.clone();
        if let Some(changes) = &metadata.app_properties {
            merge_app_properties(&mut record, changes);
        }
        if let Some(details) = &metadata.shortcut_details {
            let mut details = details.clone();
            details.target_mime_type = Some(self.record(&details.target_id)?.mime_type.clone());
            record.shortcut_details = Some(details);
        }
        if !record.is_native_document() && !record.is_folder() && !record.is_shortcut() {
            record.size = Some(content.len() as u64);
            record.md5_checksum = Some(md5_hex(&content));
        }

        self.objects.insert(
            record.id.clone(),
            StoredObject {
                record: record.clone(),
                content,
            },
        );
        Ok(record)
    }

    fn update(
        &mut self,
        id: &str,
        metadata: &ObjectMetadata,
        add_parents: &[String],
        remove_parents: &[String],
        content: Option<Vec<u8>>,
    ) -> Result<ObjectRecord> {
        self.record(id)?;
        self.check_parents(add_parents)?;
        let now = self.now();
        let stored = self.objects.get_mut(id).ok_or_else(|| not_found(id))?;
        let record = &mut stored.record;

        record.parents.retain(|p| !remove_parents.contains(p));
        for parent in add_parents {
            if !record.parents.contains(parent) {
                record.parents.push(parent.clone());
            }
        }
        if let Some(name) = &metadata.name {
            record.name = name.clone();
        }
        if let Some(hints) = &metadata.content_hints {
            record.content_hints = Some(hints.clone());
        }
        if let Some(changes) = &metadata.app_properties {
            merge_app_properties(record, changes);
        }
        if let Some(content) = content {
            record.size = Some(content.len() as u64);
            record.md5_checksum = Some(md5_hex(&content));
            record.modified_time = Some(now);
            stored.content = content;
        }
        if let Some(modified) = metadata.modified_time {
            stored.record.modified_time = Some(modified);
        }
        Ok(stored.record.clone())
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        self.record(id)?;
        let mut pending = vec![id.to_string()];
        while let Some(current) = pending.pop() {
            self.objects.remove(&current);
            let orphans: Vec<String> = self
                .objects
                .values()
                .filter(|stored| stored.record.parents.iter().any(|p| *p == current))
                .map(|stored| stored.record.id.clone())
                .collect();
            for orphan in orphans {
                let stored = match self.objects.get_mut(&orphan) {
                    Some(stored) => stored,
                    None => continue,
                };
                stored.record.parents.retain(|p| *p != current);
                if stored.record.parents.is_empty() {
                    pending.push(orphan);
                }
            }
        }
        Ok(())
    }

    fn copy(&mut self, id: &str, metadata: &ObjectMetadata) -> Result<ObjectRecord> {
        let source = self.objects.get(id).cloned().ok_or_else(|| not_found(id))?;
        if source.record.is_folder() {
            return Err(Error::api(403, "Folders cannot be copied"));
        }
        let copy_metadata = ObjectMetadata {
            name: Some(
                metadata
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("Copy of {}", source.record.name)),
            ),
            mime_type: Some(source.record.mime_type.clone()),
            parents: Some(
                metadata
                    .parents
                    .clone()
                    .unwrap_or_else(|| source.record.parents.clone()),
            ),
            app_properties: source.record.app_properties.as_ref().map(|props| {
                props
                    .iter()
                    .map(|(k, v)| (k.clone(), Some(v.clone())))
                    .collect()
            }),
            ..Default::default()
        };
        self.create(&copy_metadata, source.content)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn list(&self, request: &ListRequest) -> Result<ObjectPage> {
        self.0.lock().await.list(request)
    }

    async fn get(&self, id: &str) -> Result<ObjectRecord> {
        let mut state = self.0.lock().await;
        state.calls.get += 1;
        state.record(id).cloned()
    }

    async fn create(&self, metadata: &ObjectMetadata) -> Result<ObjectRecord> {
        self.0.lock().await.create(metadata, Vec::new())
    }

    async fn update(
        &self,
        id: &str,
        metadata: &ObjectMetadata,
        add_parents: &[String],
        remove_parents: &[String],
    ) -> Result<ObjectRecord> {
        self.0
            .lock()
            .await
            .update(id, metadata, add_parents, remove_parents, None)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.0.lock().await.delete(id)
    }

    async fn copy(&self, id: &str, metadata: &ObjectMetadata) -> Result<ObjectRecord> {
        self.0.lock().await.copy(id, metadata)
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>> {
        let state = self.0.lock().await;
        if state.fail_downloads {
            return Err(Error::api(500, "backendError: download rejected"));
        }
        let stored = state.objects.get(id).ok_or_else(|| not_found(id))?;
        if stored.record.is_native_document() || stored.record.is_folder() {
            return Err(Error::api(
                403,
                "fileNotDownloadable: Only files with binary content can be downloaded",
            ));
        }
        Ok(stored.content.clone())
    }

    async fn export(&self, id: &str, mime_type: &str) -> Result<Vec<u8>> {
        let state = self.0.lock().await;
        if state.fail_downloads {
            return Err(Error::api(500, "backendError: download rejected"));
        }
        let stored = state.objects.get(id).ok_or_else(|| not_found(id))?;
        if !stored.record.is_native_document() {
            return Err(Error::api(
                403,
                format!("fileNotExportable: cannot export {} as {mime_type}", stored.record.mime_type),
            ));
        }
        Ok(stored.content.clone())
    }

    async fn create_permission(&self, id: &str, permission: &Permission) -> Result<Permission> {
        if !SHARING_ROLES.contains(&permission.role.as_str()) {
            return Err(Error::api(400, format!("Invalid role: {}", permission.role)));
        }
        let mut state = self.0.lock().await;
        let permission_id = state.new_id();
        let stored = state.objects.get_mut(id).ok_or_else(|| not_found(id))?;
        let mut permission = permission.clone();
        permission.id = Some(permission_id);
        stored.record.permissions.push(permission.clone());
        Ok(permission)
    }

    async fn watch(&self, id: &str, channel: &Channel) -> Result<Channel> {
        let mut state = self.0.lock().await;
        state.record(id)?;
        let expiration = (state.now() + Duration::hours(1)).timestamp_millis();
        let mut channel = channel.clone();
        channel.resource_id = Some(id.to_string());
        channel.expiration = Some(expiration.to_string());
        Ok(channel)
    }

    async fn start_upload(
        &self,
        target: UploadTarget,
        content: Vec<u8>,
    ) -> Result<Box<dyn UploadSession>> {
        let mut state = self.0.lock().await;
        state.calls.uploads += 1;
        match &target {
            UploadTarget::Create(metadata) => {
                if let Some(parents) = &metadata.parents {
                    state.check_parents(parents)?;
                }
            }
            UploadTarget::Update { id, .. } => {
                state.record(id)?;
            }
        }
        Ok(Box::new(MemoryUpload {
            state: self.0.clone(),
            chunk_size: state.chunk_size,
            target,
            content,
            sent: 0,
        }))
    }
}

/// Upload session that moves `chunk_size` bytes per poll and commits the
/// object when the last chunk arrives.
struct MemoryUpload {
    state: Arc<Mutex<State>>,
    chunk_size: usize,
    target: UploadTarget,
    content: Vec<u8>,
    sent: usize,
}

#[async_trait]
impl UploadSession for MemoryUpload {
    async fn next_chunk(&mut self) -> Result<UploadStatus> {
        let mut state = self.state.lock().await;
        if state.fail_uploads {
            return Err(Error::api(500, "backendError: upload chunk rejected"));
        }
        let total = self.content.len();
        self.sent = (self.sent + self.chunk_size).min(total);
        if self.sent < total {
            return Ok(UploadStatus::InProgress {
                sent: self.sent as u64,
                total: total as u64,
            });
        }
        let content = std::mem::take(&mut self.content);
        let record = match &self.target {
            UploadTarget::Create(metadata) => state.create(metadata, content)?,
            UploadTarget::Update { id, metadata } => {
                state.update(id, metadata, &[], &[], Some(content))?
            }
        };
        Ok(UploadStatus::Complete(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;

    #[tokio::test]
    async fn test_pagination() {
        let backend = MemoryBackend::new();
        backend.set_page_size(2).await;
        for name in ["a", "b", "c", "d", "e"] {
            backend
                .create(&ObjectMetadata::child(name, ROOT_ID))
                .await
                .unwrap();
        }
        let mut request = ListRequest::new(Query::children_of(ROOT_ID), None);
        let first = backend.list(&request).await.unwrap();
        assert_eq!(first.objects.len(), 2);
        assert_eq!(first.next_page_token.as_deref(), Some("2"));

        request.page_token = Some("4".to_string());
        let last = backend.list(&request).await.unwrap();
        assert_eq!(last.objects.len(), 1);
        assert_eq!(last.objects[0].name, "e");
        assert_eq!(last.next_page_token, None);
    }

    #[tokio::test]
    async fn test_create_checks_parent() {
        let backend = MemoryBackend::new();
        let err = backend
            .create(&ObjectMetadata::folder("x", "missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api { status: 404, .. }));

        let file = backend
            .create(&ObjectMetadata::child("file.txt", ROOT_ID))
            .await
            .unwrap();
        assert_eq!(file.mime_type, "text/plain");
        assert_eq!(file.size, Some(0));
        let err = backend
            .create(&ObjectMetadata::folder("x", file.id))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_chunked_upload() {
        let backend = MemoryBackend::new();
        backend.set_chunk_size(4).await;
        let mut session = backend
            .start_upload(
                UploadTarget::Create(ObjectMetadata::child("f.bin", ROOT_ID)),
                b"0123456789".to_vec(),
            )
            .await
            .unwrap();
        assert_eq!(
            session.next_chunk().await.unwrap(),
            UploadStatus::InProgress { sent: 4, total: 10 }
        );
        assert_eq!(
            session.next_chunk().await.unwrap(),
            UploadStatus::InProgress { sent: 8, total: 10 }
        );
        let record = match session.next_chunk().await.unwrap() {
            UploadStatus::Complete(record) => record,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(record.size, Some(10));
        assert_eq!(record.md5_checksum.as_deref(), Some(md5_hex(b"0123456789").as_str()));
        assert_eq!(backend.content(&record.id).await.unwrap(), b"0123456789");
    }

    #[tokio::test]
    async fn test_delete_removes_descendants() {
        let backend = MemoryBackend::new();
        let dir = backend
            .create(&ObjectMetadata::folder("dir", ROOT_ID))
            .await
            .unwrap();
        let _child = backend
            .create(&ObjectMetadata::child("child", dir.id.clone()))
            .await
            .unwrap();
        let before = backend.object_count().await;
        backend.delete(&dir.id).await.unwrap();
        assert_eq!(backend.object_count().await, before - 2);
    }

    #[tokio::test]
    async fn test_app_property_merge() {
        let backend = MemoryBackend::new();
        let file = backend
            .create(&ObjectMetadata::child("f", ROOT_ID))
            .await
            .unwrap();
        let set = ObjectMetadata {
            app_properties: Some(BTreeMap::from([
                ("a".to_string(), Some("1".to_string())),
                ("b".to_string(), Some("2".to_string())),
            ])),
            ..Default::default()
        };
        backend.update(&file.id, &set, &[], &[]).await.unwrap();
        let unset = ObjectMetadata {
            app_properties: Some(BTreeMap::from([("a".to_string(), None)])),
            ..Default::default()
        };
        let record = backend.update(&file.id, &unset, &[], &[]).await.unwrap();
        assert_eq!(
            record.app_properties,
            Some(BTreeMap::from([("b".to_string(), "2".to_string())]))
        );
    }
}
