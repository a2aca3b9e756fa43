//! Directory-scoped views of a [`DriveFs`].

use crate::error::Result;
use crate::fs::DriveFs;
use crate::info::{Info, InfoUpdate};
use crate::path;
use crate::staged::{OpenOptions, StagedFile};
use std::io::Write;
use std::ops::Range;

/// A [`DriveFs`] restricted to one folder. Paths are relative to that
/// folder and cannot climb out of it. Shares the parent's lock.
#[derive(Clone)]
pub struct SubDriveFs {
    fs: DriveFs,
    base: String,
}

impl SubDriveFs {
    pub(crate) fn new(fs: DriveFs, base: String) -> Self {
        Self { fs, base }
    }

    /// Absolute path of the folder this view is rooted at.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The whole filesystem this view belongs to.
    pub fn parent_fs(&self) -> &DriveFs {
        &self.fs
    }

    /// Maps a path inside the view to a path on the parent filesystem.
    pub fn delegate_path(&self, path: &str) -> Result<String> {
        path::check_path(path)?;
        let segments = path::segments(path)?;
        Ok(path::join(&self.base, segments.join("/")))
    }

    pub async fn getinfo(&self, path: &str) -> Result<Info> {
        self.fs.getinfo(&self.delegate_path(path)?).await
    }

    pub async fn setinfo(&self, path: &str, update: &InfoUpdate) -> Result<()> {
        self.fs.setinfo(&self.delegate_path(path)?, update).await
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        self.fs.exists(&self.delegate_path(path)?).await
    }

    pub async fn isdir(&self, path: &str) -> Result<bool> {
        self.fs.isdir(&self.delegate_path(path)?).await
    }

    pub async fn isfile(&self, path: &str) -> Result<bool> {
        self.fs.isfile(&self.delegate_path(path)?).await
    }

    pub async fn makedir(&self, path: &str, recreate: bool) -> Result<SubDriveFs> {
        self.fs.makedir(&self.delegate_path(path)?, recreate).await
    }

    pub async fn makedirs(&self, path: &str, recreate: bool) -> Result<SubDriveFs> {
        self.fs.makedirs(&self.delegate_path(path)?, recreate).await
    }

    pub async fn openbin(&self, path: &str, mode: &str, options: OpenOptions) -> Result<StagedFile> {
        self.fs.openbin(&self.delegate_path(path)?, mode, options).await
    }

    pub async fn open(&self, path: &str, mode: &str) -> Result<StagedFile> {
        self.fs.open(&self.delegate_path(path)?, mode).await
    }

    pub async fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        self.fs.read_bytes(&self.delegate_path(path)?).await
    }

    pub async fn write_bytes(&self, path: &str, content: &[u8]) -> Result<()> {
        self.fs.write_bytes(&self.delegate_path(path)?, content).await
    }

    pub async fn remove(&self, path: &str) -> Result<()> {
        self.fs.remove(&self.delegate_path(path)?).await
    }

    pub async fn removedir(&self, path: &str) -> Result<()> {
        self.fs.removedir(&self.delegate_path(path)?).await
    }

    pub async fn removetree(&self, path: &str) -> Result<()> {
        self.fs.removetree(&self.delegate_path(path)?).await
    }

    pub async fn opendir(&self, path: &str) -> Result<SubDriveFs> {
        self.fs.opendir(&self.delegate_path(path)?).await
    }

    pub async fn scandir(&self, path: &str, page: Option<Range<usize>>) -> Result<Vec<Info>> {
        self.fs.scandir(&self.delegate_path(path)?, page).await
    }

    pub async fn listdir(&self, path: &str) -> Result<Vec<String>> {
        self.fs.listdir(&self.delegate_path(path)?).await
    }

    pub async fn copy(&self, src: &str, dst: &str, overwrite: bool) -> Result<()> {
        let (src, dst) = (self.delegate_path(src)?, self.delegate_path(dst)?);
        self.fs.copy(&src, &dst, overwrite).await
    }

    pub async fn move_file(&self, src: &str, dst: &str, overwrite: bool) -> Result<()> {
        let (src, dst) = (self.delegate_path(src)?, self.delegate_path(dst)?);
        self.fs.move_file(&src, &dst, overwrite).await
    }

    pub async fn download<W>(&self, path: &str, writer: &mut W, mime_type: Option<&str>) -> Result<()>
    where
        W: Write + Send + ?Sized,
    {
        self.fs
            .download(&self.delegate_path(path)?, writer, mime_type)
            .await
    }

    pub async fn share(&self, path: &str, email: Option<&str>, role: &str) -> Result<String> {
        self.fs.share(&self.delegate_path(path)?, email, role).await
    }

    pub async fn geturl(&self, path: &str) -> Result<String> {
        self.fs.geturl(&self.delegate_path(path)?).await
    }

    pub async fn hasurl(&self, path: &str) -> Result<bool> {
        self.fs.hasurl(&self.delegate_path(path)?).await
    }
}
