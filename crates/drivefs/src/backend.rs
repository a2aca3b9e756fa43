//! Remote object store seam.

use crate::error::Result;
use crate::object::{Channel, ObjectMetadata, ObjectRecord, Permission};
use crate::query::Query;
use async_trait::async_trait;

/// One list call: a query, the continuation token of the previous page, and
/// an optional shared-drive scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub query: Query,
    pub page_token: Option<String>,
    pub drive_id: Option<String>,
}

impl ListRequest {
    pub fn new(query: Query, drive_id: Option<String>) -> Self {
        Self {
            query,
            page_token: None,
            drive_id,
        }
    }
}

/// One page of list results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectPage {
    pub objects: Vec<ObjectRecord>,
    pub next_page_token: Option<String>,
}

/// Destination of a content upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadTarget {
    /// Create a new object with the given metadata.
    Create(ObjectMetadata),
    /// Replace the content of an existing object.
    Update { id: String, metadata: ObjectMetadata },
}

/// Progress reported by one poll of an upload session.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadStatus {
    InProgress { sent: u64, total: u64 },
    Complete(ObjectRecord),
}

/// A resumable upload in flight. Each call transfers at most one chunk.
#[async_trait]
pub trait UploadSession: Send {
    async fn next_chunk(&mut self) -> Result<UploadStatus>;
}

/// Object query and mutation capability of the remote store.
///
/// Implementations perform no path logic; every call addresses objects by
/// identifier or by query.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list(&self, request: &ListRequest) -> Result<ObjectPage>;

    async fn get(&self, id: &str) -> Result<ObjectRecord>;

    /// Creates an object without content (folders, shortcuts).
    async fn create(&self, metadata: &ObjectMetadata) -> Result<ObjectRecord>;

    /// Patches metadata; `add_parents` / `remove_parents` re-link the object.
    async fn update(
        &self,
        id: &str,
        metadata: &ObjectMetadata,
        add_parents: &[String],
        remove_parents: &[String],
    ) -> Result<ObjectRecord>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Server-side copy; `metadata` overrides name and parents of the copy.
    async fn copy(&self, id: &str, metadata: &ObjectMetadata) -> Result<ObjectRecord>;

    async fn download(&self, id: &str) -> Result<Vec<u8>>;

    /// Converts a native document to `mime_type`.
    async fn export(&self, id: &str, mime_type: &str) -> Result<Vec<u8>>;

    async fn create_permission(&self, id: &str, permission: &Permission) -> Result<Permission>;

    async fn watch(&self, id: &str, channel: &Channel) -> Result<Channel>;

    /// Opens a resumable upload of `content` to `target`.
    async fn start_upload(
        &self,
        target: UploadTarget,
        content: Vec<u8>,
    ) -> Result<Box<dyn UploadSession>>;
}
