//! Resumable uploads.
//!
//! A session is opened with a metadata-only POST (new object) or PATCH
//! (existing object) carrying `uploadType=resumable`; the `Location` header
//! of the response is the session URI. Content is then PUT in chunks with a
//! `Content-Range` header. The server answers 308 with a `Range` header while
//! bytes are missing and 200/201 with the object once the upload completes.

use super::client::{Connection, endpoint};
use crate::backend::{UploadSession, UploadStatus, UploadTarget};
use crate::error::{Error, Result};
use crate::object::{OBJECT_FIELDS, ObjectRecord};
use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{CONTENT_RANGE, LOCATION, RANGE};
use std::sync::Arc;

/// Status used by the upload protocol for "resume incomplete".
const RESUME_INCOMPLETE: u16 = 308;

pub(crate) struct HttpUpload {
    conn: Arc<Connection>,
    session_uri: String,
    content: Vec<u8>,
    sent: usize,
}

/// `Content-Range` value for the chunk `[start, end)` of `total` bytes.
pub(crate) fn content_range(start: usize, end: usize, total: usize) -> String {
    if total == 0 {
        "bytes */0".to_string()
    } else {
        format!("bytes {}-{}/{total}", start, end - 1)
    }
}

/// Bytes the server holds according to a 308 `Range` header (`bytes=0-N`).
/// A range reaching past the `total` bytes of the upload is an error.
pub(crate) fn committed_bytes(range: Option<&str>, total: usize) -> Result<usize> {
    let Some(range) = range else {
        return Ok(0);
    };
    let committed = range
        .rsplit('-')
        .next()
        .and_then(|last| last.trim().parse::<usize>().ok())
        .map(|last| last + 1)
        .ok_or_else(|| Error::api(RESUME_INCOMPLETE, format!("Malformed Range header: {range}")))?;
    if committed > total {
        return Err(Error::api(
            RESUME_INCOMPLETE,
            format!("Range header {range} exceeds upload of {total} bytes"),
        ));
    }
    Ok(committed)
}

impl HttpUpload {
    pub(crate) async fn start(
        conn: Arc<Connection>,
        target: UploadTarget,
        content: Vec<u8>,
    ) -> Result<Self> {
        let params = [
            ("uploadType", "resumable"),
            ("fields", OBJECT_FIELDS),
            ("supportsAllDrives", "true"),
        ];
        let (method, url, metadata) = match &target {
            UploadTarget::Create(metadata) => (
                Method::POST,
                endpoint(&conn.upload_url, &["files"], &params)?,
                metadata,
            ),
            UploadTarget::Update { id, metadata } => (
                Method::PATCH,
                endpoint(&conn.upload_url, &["files", id.as_str()], &params)?,
                metadata,
            ),
        };
        let length = content.len().to_string();
        let response = conn
            .send(|client| {
                client
                    .request(method.clone(), url.clone())
                    .header("X-Upload-Content-Length", length.as_str())
                    .json(metadata)
            })
            .await?;
        let session_uri = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Error::api(response.status().as_u16(), "upload session has no Location"))?
            .to_string();

        Ok(Self {
            conn,
            session_uri,
            content,
            sent: 0,
        })
    }
}

#[async_trait]
impl UploadSession for HttpUpload {
    async fn next_chunk(&mut self) -> Result<UploadStatus> {
        let total = self.content.len();
        let start = self.sent;
        let end = (start + self.conn.chunk_size).min(total);
        let range = content_range(start, end, total);
        let chunk = &self.content[start..end];
        let uri = self.session_uri.as_str();

        let response = self
            .conn
            .send_with(
                |client| {
                    client
                        .put(uri)
                        .header(CONTENT_RANGE, range.as_str())
                        .body(chunk.to_vec())
                },
                |status| status.is_success() || status.as_u16() == RESUME_INCOMPLETE,
            )
            .await?;

        if response.status().as_u16() == RESUME_INCOMPLETE {
            let range = response
                .headers()
                .get(RANGE)
                .and_then(|value| value.to_str().ok());
            self.sent = committed_bytes(range, total)?;
            return Ok(UploadStatus::InProgress {
                sent: self.sent as u64,
                total: total as u64,
            });
        }
        let record: ObjectRecord = response.json().await?;
        Ok(UploadStatus::Complete(record))
    }
}
