mod staging;

use crate::backend::{Backend, ListRequest, ObjectPage, UploadSession, UploadTarget};
use crate::error::Result;
use crate::fs::DriveFs;
use crate::memory::MemoryBackend;
use crate::object::{Channel, ObjectMetadata, ObjectRecord, Permission};
use async_trait::async_trait;

/// A filesystem over a fresh memory backend, plus a handle on the backend
/// for seeding and inspection.
pub(crate) fn new_fs() -> (DriveFs, MemoryBackend) {
    let backend = MemoryBackend::new();
    (DriveFs::with_backend(backend.clone()), backend)
}

/// A live record for seeding states the facade never creates itself.
pub(crate) fn raw_record(id: &str, name: &str, mime_type: &str, parent: &str) -> ObjectRecord {
    let mut record = ObjectRecord::synthetic_root();
    record.id = id.to_string();
    record.name = name.to_string();
    record.mime_type = mime_type.to_string();
    record.parents = vec![parent.to_string()];
    record
}

/// Delegates to a [`MemoryBackend`] but answers the first page of every
/// listing with no objects and a continuation token, as the remote store
/// is allowed to.
pub(crate) struct EmptyFirstPage(pub(crate) MemoryBackend);

#[async_trait]
impl Backend for EmptyFirstPage {
    async fn list(&self, request: &ListRequest) -> Result<ObjectPage> {
        if request.page_token.is_none() {
            return Ok(ObjectPage {
                objects: Vec::new(),
                next_page_token: Some("0".to_string()),
            });
        }
        self.0.list(request).await
    }

    async fn get(&self, id: &str) -> Result<ObjectRecord> {
        self.0.get(id).await
    }

    async fn create(&self, metadata: &ObjectMetadata) -> Result<ObjectRecord> {
        self.0.create(metadata).await
    }

    async fn update(
        &self,
        id: &str,
        metadata: &ObjectMetadata,
        add_parents: &[String],
        remove_parents: &[String],
    ) -> Result<ObjectRecord> {
        self.0.update(id, metadata, add_parents, remove_parents).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.0.delete(id).await
    }

    async fn copy(&self, id: &str, metadata: &ObjectMetadata) -> Result<ObjectRecord> {
        self.0.copy(id, metadata).await
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>> {
        self.0.download(id).await
    }

    async fn export(&self, id: &str, mime_type: &str) -> Result<Vec<u8>> {
        self.0.export(id, mime_type).await
    }

    async fn create_permission(&self, id: &str, permission: &Permission) -> Result<Permission> {
        self.0.create_permission(id, permission).await
    }

    async fn watch(&self, id: &str, channel: &Channel) -> Result<Channel> {
        self.0.watch(id, channel).await
    }

    async fn start_upload(
        &self,
        target: UploadTarget,
        content: Vec<u8>,
    ) -> Result<Box<dyn UploadSession>> {
        self.0.start_upload(target, content).await
    }
}
