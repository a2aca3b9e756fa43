//! Upload-on-close file handles.
//!
//! A [`StagedFile`] buffers one open/close cycle in a local scratch file.
//! Reads, writes and seeks never touch the backend; the remote object is
//! written exactly once, by [`StagedFile::close`].

use crate::backend::{UploadSession, UploadStatus, UploadTarget};
use crate::error::{Error, Result};
use crate::fs::Inner;
use crate::mode::Mode;
use crate::object::{ObjectMetadata, ObjectRecord};
use crate::path;
use chrono::{DateTime, SubsecRound, Utc};
use diagnostics::*;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Consecutive polls without progress before an upload is abandoned.
const MAX_STALLED_POLLS: usize = 8;

/// Options accepted by `openbin`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenOptions {
    /// Created time recorded when the close creates a new object.
    pub created_time: Option<DateTime<Utc>>,
}

impl OpenOptions {
    #[must_use]
    pub fn created_time(mut self, created: DateTime<Utc>) -> Self {
        self.created_time = Some(created);
        self
    }
}

/// Open handle on a remote file, backed by a local scratch copy.
pub struct StagedFile {
    inner: Arc<Inner>,
    path: String,
    mode: Mode,
    parent_id: String,
    existing: Option<ObjectRecord>,
    created_time: Option<DateTime<Utc>>,
    scratch: Option<NamedTempFile>,
}

impl StagedFile {
    /// Allocates the scratch file and, when the mode needs the current
    /// content, downloads it. Called with the filesystem lock held.
    pub(crate) async fn open(
        inner: Arc<Inner>,
        path: String,
        mode: Mode,
        parent: &ObjectRecord,
        existing: Option<ObjectRecord>,
        options: &OpenOptions,
    ) -> Result<Self> {
        let suffix = path::extension(&path);
        let mut scratch = tempfile::Builder::new()
            .prefix("drivefs-")
            .suffix(&suffix)
            .tempfile()?;

        if let Some(record) = &existing {
            if (mode.reading() || mode.appending()) && !mode.truncate() {
                let content = inner
                    .backend
                    .download(&record.id)
                    .await
                    .map_err(|e| Error::operation_failed(&path, e))?;
                let size = content.len();
                let local = scratch.path().display().to_string();
                debug!("populated {local} with {size} bytes", local: local, size: size);
                let file = scratch.as_file_mut();
                file.write_all(&content)?;
                if mode.appending() {
                    file.seek(SeekFrom::End(0))?;
                } else {
                    file.seek(SeekFrom::Start(0))?;
                }
            }
        }

        Ok(Self {
            inner,
            path,
            mode,
            parent_id: parent.id.clone(),
            existing,
            created_time: options.created_time,
            scratch: Some(scratch),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Location of the scratch file while the handle is open.
    pub fn local_path(&self) -> Option<&Path> {
        self.scratch.as_ref().map(NamedTempFile::path)
    }

    fn file(&mut self) -> io::Result<&mut std::fs::File> {
        self.scratch
            .as_mut()
            .map(NamedTempFile::as_file_mut)
            .ok_or_else(|| io::Error::other("file is closed"))
    }

    /// Uploads the content if the handle is writable, then deletes the
    /// scratch file. The scratch file is removed even when the upload fails.
    pub async fn close(mut self) -> Result<()> {
        let Some(mut scratch) = self.scratch.take() else {
            return Ok(());
        };
        let result = if self.mode.writing() {
            self.upload(&mut scratch).await
        } else {
            Ok(())
        };
        if let Err(e) = scratch.close() {
            let path = self.path.as_str();
            let error = e.to_string();
            warn!("failed to delete scratch file for {path}: {error}", path: path, error: error);
        }
        result
    }

    async fn upload(&self, scratch: &mut NamedTempFile) -> Result<()> {
        let mut content = Vec::new();
        let file = scratch.as_file_mut();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut content)?;

        let now = Utc::now().trunc_subsecs(3);
        let target = match &self.existing {
            Some(record) => UploadTarget::Update {
                id: record.id.clone(),
                metadata: ObjectMetadata {
                    modified_time: Some(now),
                    ..Default::default()
                },
            },
            None => UploadTarget::Create(ObjectMetadata {
                name: Some(path::basename(&self.path)),
                parents: Some(vec![self.parent_id.clone()]),
                created_time: Some(self.created_time.unwrap_or(now)),
                modified_time: Some(now),
                ..Default::default()
            }),
        };

        let _guard = self.inner.lock.lock().await;
        let path = self.path.as_str();
        let size = content.len();
        info!("uploading {size} bytes to {path}", size: size, path: path);
        let record = async {
            let mut session = self.inner.backend.start_upload(target, content).await?;
            finish_upload(session.as_mut()).await
        }
        .await
        .map_err(|e| Error::operation_failed(&self.path, e))?;
        let id = record.id.as_str();
        debug!("upload of {path} complete as {id}", path: path, id: id);
        Ok(())
    }
}

/// Polls a session until the backend reports the finished object.
async fn finish_upload(session: &mut dyn UploadSession) -> Result<ObjectRecord> {
    let mut last_sent = None;
    let mut stalled = 0;
    loop {
        match session.next_chunk().await? {
            UploadStatus::Complete(record) => return Ok(record),
            UploadStatus::InProgress { sent, total } => {
                debug!("upload progress {sent}/{total}", sent: sent, total: total);
                if last_sent == Some(sent) {
                    stalled += 1;
                    if stalled >= MAX_STALLED_POLLS {
                        return Err(Error::api(
                            0,
                            format!("upload stalled at {sent} of {total} bytes"),
                        ));
                    }
                } else {
                    stalled = 0;
                    last_sent = Some(sent);
                }
            }
        }
    }
}

impl Read for StagedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.mode.reading() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "file not open for reading",
            ));
        }
        self.file()?.read(buf)
    }
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.mode.writing() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "file not open for writing",
            ));
        }
        let append = self.mode.appending();
        let file = self.file()?;
        if append {
            file.seek(SeekFrom::End(0))?;
        }
        file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }
}

impl Seek for StagedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file()?.seek(pos)
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.scratch.is_some() && self.mode.writing() {
            let path = self.path.as_str();
            warn!("handle for {path} dropped without close, discarding changes", path: path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::memory::MemoryBackend;
    use crate::object::ROOT_ID;

    struct StuckUpload;

    #[async_trait::async_trait]
    impl UploadSession for StuckUpload {
        async fn next_chunk(&mut self) -> Result<UploadStatus> {
            Ok(UploadStatus::InProgress { sent: 3, total: 10 })
        }
    }

    #[tokio::test]
    async fn test_stalled_upload_fails() {
        let err = finish_upload(&mut StuckUpload).await.unwrap_err();
        assert!(err.to_string().contains("stalled"));
    }

    #[tokio::test]
    async fn test_finish_upload_completes() {
        let backend = MemoryBackend::new();
        backend.set_chunk_size(2).await;
        let mut session = backend
            .start_upload(
                UploadTarget::Create(ObjectMetadata::child("a.txt", ROOT_ID)),
                b"hello".to_vec(),
            )
            .await
            .unwrap();
        let record = finish_upload(session.as_mut()).await.unwrap();
        assert_eq!(record.size, Some(5));
    }

    #[test]
    fn test_open_options() {
        let created = Utc::now();
        assert_eq!(
            OpenOptions::default().created_time(created).created_time,
            Some(created)
        );
    }
}
