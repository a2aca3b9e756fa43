//! Filesystem facade.
//!
//! [`DriveFs`] exposes a conventional directory tree over the backend's
//! object graph. Every public operation validates its paths, takes the
//! instance's single lock, and re-resolves from the root; nothing is cached
//! between calls.

use crate::backend::Backend;
use crate::config::DriveConfig;
use crate::error::{Error, Result};
use crate::http::HttpBackend;
use crate::info::{Info, InfoUpdate};
use crate::mode::Mode;
use crate::object::{
    Channel, ObjectMetadata, ObjectRecord, Permission, SHARING_ROLES, SHARING_URL,
    SHORTCUT_MIME_TYPE, ShortcutDetails,
};
use crate::path;
use crate::query::Query;
use crate::resolver::{PathChain, Resolver};
use crate::staged::{OpenOptions, StagedFile};
use crate::subfs::SubDriveFs;
use diagnostics::*;
use std::io::{Read, Write};
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::Mutex;

/// State shared by a filesystem, its clones, sub-views and open handles.
pub(crate) struct Inner {
    pub(crate) backend: Arc<dyn Backend>,
    root_id: Option<String>,
    drive_id: Option<String>,
    pub(crate) lock: Mutex<()>,
}

/// A directory tree on the remote object store.
#[derive(Clone)]
pub struct DriveFs {
    inner: Arc<Inner>,
}

/// The parent folder of a resolved path, or the error a missing or
/// non-folder parent implies.
fn parent_folder<'c>(chain: &'c PathChain, path: &str) -> Result<&'c ObjectRecord> {
    match chain.parent() {
        Some(parent) if parent.is_folder() => Ok(parent),
        Some(_) => Err(Error::directory_expected(path::dirname(path))),
        None => Err(Error::not_found(path::dirname(path))),
    }
}

fn existing<'c>(chain: &'c PathChain, path: &str) -> Result<&'c ObjectRecord> {
    chain.target().ok_or_else(|| Error::not_found(path))
}

fn sharing_url(id: &str) -> String {
    format!("{SHARING_URL}{id}")
}

impl DriveFs {
    /// Filesystem over an arbitrary backend, scoped by the root and drive
    /// settings of `config`.
    pub fn new(backend: Arc<dyn Backend>, config: &DriveConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                root_id: config.root_id.clone(),
                drive_id: config.drive_id.clone(),
                lock: Mutex::new(()),
            }),
        }
    }

    /// Filesystem over a backend with the default root.
    pub fn with_backend<B: Backend + 'static>(backend: B) -> Self {
        Self::new(Arc::new(backend), &DriveConfig::default())
    }

    /// Connects to the remote store over HTTP.
    pub fn connect(config: DriveConfig) -> Result<Self> {
        config.validate()?;
        let backend = HttpBackend::new(&config)?;
        Ok(Self::new(Arc::new(backend), &config))
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.inner.backend
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(
            self.inner.backend.as_ref(),
            self.inner.root_id.as_deref(),
            self.inner.drive_id.as_deref(),
        )
    }

    async fn resolve(&self, path: &str) -> Result<PathChain> {
        self.resolver().resolve(path).await
    }

    fn subfs(&self, path: &str) -> Result<SubDriveFs> {
        Ok(SubDriveFs::new(self.clone(), path::normalize(path)?))
    }

    pub async fn getinfo(&self, path: &str) -> Result<Info> {
        path::check_path(path)?;
        let _guard = self.inner.lock.lock().await;
        let chain = self.resolve(path).await?;
        let mut info = Info::from(existing(&chain, path)?);
        if chain.is_root() {
            info.basic.name = String::new();
        }
        Ok(info)
    }

    /// Applies the writable subset of the info namespaces.
    pub async fn setinfo(&self, path: &str, update: &InfoUpdate) -> Result<()> {
        path::check_path(path)?;
        let _guard = self.inner.lock.lock().await;
        let chain = self.resolve(path).await?;
        let record = existing(&chain, path)?;
        if update.is_empty() {
            return Ok(());
        }
        self.inner
            .backend
            .update(&record.id, &update.to_metadata(), &[], &[])
            .await?;
        debug!("updated info of {path}", path: path);
        Ok(())
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        path::check_path(path)?;
        let _guard = self.inner.lock.lock().await;
        Ok(self.resolver().item(path).await?.is_some())
    }

    pub async fn isdir(&self, path: &str) -> Result<bool> {
        path::check_path(path)?;
        let _guard = self.inner.lock.lock().await;
        let item = self.resolver().item(path).await?;
        Ok(item.is_some_and(|record| record.is_folder()))
    }

    pub async fn isfile(&self, path: &str) -> Result<bool> {
        path::check_path(path)?;
        let _guard = self.inner.lock.lock().await;
        let item = self.resolver().item(path).await?;
        Ok(item.is_some_and(|record| !record.is_folder()))
    }

    /// Creates one folder. With `recreate`, an existing folder is returned
    /// instead of failing.
    pub async fn makedir(&self, path: &str, recreate: bool) -> Result<SubDriveFs> {
        path::check_path(path)?;
        let _guard = self.inner.lock.lock().await;
        let chain = self.resolve(path).await?;
        if let Some(record) = chain.target() {
            if recreate && record.is_folder() {
                return self.subfs(path);
            }
            return Err(Error::directory_exists(path));
        }
        let parent = parent_folder(&chain, path)?;
        let folder = self
            .inner
            .backend
            .create(&ObjectMetadata::folder(chain.name(), parent.id.clone()))
            .await?;
        let id = folder.id.as_str();
        info!("created folder {path} as {id}", path: path, id: id);
        self.subfs(path)
    }

    /// Creates a folder and any missing ancestors.
    pub async fn makedirs(&self, path: &str, recreate: bool) -> Result<SubDriveFs> {
        path::check_path(path)?;
        let _guard = self.inner.lock.lock().await;
        let chain = self.resolve(path).await?;
        if let Some(record) = chain.target() {
            if recreate && record.is_folder() {
                return self.subfs(path);
            }
            return Err(Error::directory_exists(path));
        }
        let (prefix, deepest) = chain.deepest();
        if !deepest.is_folder() {
            return Err(Error::directory_expected(prefix));
        }
        let mut parent_id = deepest.id.clone();
        let mut current = prefix.to_string();
        for name in chain.unresolved() {
            current = path::join(&current, name);
            let folder = self
                .inner
                .backend
                .create(&ObjectMetadata::folder(name.clone(), parent_id))
                .await?;
            let created = current.as_str();
            info!("created folder {created}", created: created);
            parent_id = folder.id;
        }
        self.subfs(path)
    }

    /// Opens a staged handle. `mode` follows the usual `r`/`w`/`a`/`x`
    /// conventions with optional `+`, `b` and `t`.
    pub async fn openbin(&self, path: &str, mode: &str, options: OpenOptions) -> Result<StagedFile> {
        path::check_path(path)?;
        let parsed: Mode = mode.parse()?;
        let _guard = self.inner.lock.lock().await;
        let chain = self.resolve(path).await?;
        if chain.is_root() {
            return Err(Error::file_expected(path));
        }
        match chain.target() {
            Some(record) if record.is_folder() => return Err(Error::file_expected(path)),
            Some(_) if parsed.exclusive() => return Err(Error::file_exists(path)),
            None if !parsed.create() => return Err(Error::not_found(path)),
            _ => {}
        }
        let parent = parent_folder(&chain, path)?;
        debug!("opening {path} with mode {mode}", path: path, mode: mode);
        StagedFile::open(
            self.inner.clone(),
            chain.path(),
            parsed,
            parent,
            chain.target().cloned(),
            &options,
        )
        .await
    }

    /// Opens with default options.
    pub async fn open(&self, path: &str, mode: &str) -> Result<StagedFile> {
        self.openbin(path, mode, OpenOptions::default()).await
    }

    /// Reads a whole file.
    pub async fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let mut file = self.open(path, "rb").await?;
        let mut content = Vec::new();
        let read = file.read_to_end(&mut content);
        file.close().await?;
        read?;
        Ok(content)
    }

    /// Replaces a file's content, creating the file if needed.
    pub async fn write_bytes(&self, path: &str, content: &[u8]) -> Result<()> {
        let mut file = self.open(path, "wb").await?;
        file.write_all(content)?;
        file.close().await
    }

    pub async fn remove(&self, path: &str) -> Result<()> {
        path::check_path(path)?;
        if path::is_root(path) {
            return Err(Error::remove_root(path));
        }
        let _guard = self.inner.lock.lock().await;
        let chain = self.resolve(path).await?;
        let record = existing(&chain, path)?;
        if record.is_folder() {
            return Err(Error::file_expected(path));
        }
        self.inner.backend.delete(&record.id).await?;
        info!("removed {path}", path: path);
        Ok(())
    }

    /// Removes an empty folder.
    pub async fn removedir(&self, path: &str) -> Result<()> {
        path::check_path(path)?;
        if path::is_root(path) {
            return Err(Error::remove_root(path));
        }
        let _guard = self.inner.lock.lock().await;
        let chain = self.resolve(path).await?;
        let record = existing(&chain, path)?;
        if !record.is_folder() {
            return Err(Error::directory_expected(path));
        }
        if self.resolver().has_children(&record.id).await? {
            return Err(Error::directory_not_empty(path));
        }
        self.inner.backend.delete(&record.id).await?;
        info!("removed folder {path}", path: path);
        Ok(())
    }

    /// Removes a folder's contents depth-first, then the folder itself.
    /// On the root only the contents are removed.
    pub async fn removetree(&self, path: &str) -> Result<()> {
        path::check_path(path)?;
        let _guard = self.inner.lock.lock().await;
        let chain = self.resolve(path).await?;
        let record = existing(&chain, path)?;
        if !record.is_folder() {
            return Err(Error::directory_expected(path));
        }

        let resolver = self.resolver();
        let mut pending = vec![record.id.clone()];
        let mut folders = Vec::new();
        let mut files = 0usize;
        while let Some(folder_id) = pending.pop() {
            for child in resolver.children(&folder_id).await? {
                if child.is_folder() {
                    pending.push(child.id.clone());
                    folders.push(child.id);
                } else {
                    self.inner.backend.delete(&child.id).await?;
                    files += 1;
                }
            }
        }
        // subfolders are discovered after their parents
        for folder_id in folders.iter().rev() {
            self.inner.backend.delete(folder_id).await?;
        }
        if !chain.is_root() {
            self.inner.backend.delete(&record.id).await?;
        }
        let count = folders.len();
        info!("removed tree {path}: {files} files, {count} folders", path: path, files: files, count: count);
        Ok(())
    }

    /// A view rooted at an existing folder.
    pub async fn opendir(&self, path: &str) -> Result<SubDriveFs> {
        path::check_path(path)?;
        let _guard = self.inner.lock.lock().await;
        let chain = self.resolve(path).await?;
        if !existing(&chain, path)?.is_folder() {
            return Err(Error::directory_expected(path));
        }
        self.subfs(path)
    }

    /// Info for every child of a folder, optionally restricted to a range
    /// of the listing.
    pub async fn scandir(&self, path: &str, page: Option<Range<usize>>) -> Result<Vec<Info>> {
        path::check_path(path)?;
        let _guard = self.inner.lock.lock().await;
        let chain = self.resolve(path).await?;
        let record = existing(&chain, path)?;
        if !record.is_folder() {
            return Err(Error::directory_expected(path));
        }
        let children = self.resolver().children(&record.id).await?;
        let infos = children.iter().map(Info::from);
        Ok(match page {
            Some(range) => infos
                .skip(range.start)
                .take(range.end.saturating_sub(range.start))
                .collect(),
            None => infos.collect(),
        })
    }

    /// Names of every child of a folder.
    pub async fn listdir(&self, path: &str) -> Result<Vec<String>> {
        Ok(self
            .scandir(path, None)
            .await?
            .into_iter()
            .map(|info| info.basic.name)
            .collect())
    }

    /// Server-side copy of a file.
    pub async fn copy(&self, src: &str, dst: &str, overwrite: bool) -> Result<()> {
        path::check_path(src)?;
        path::check_path(dst)?;
        let _guard = self.inner.lock.lock().await;
        let src_chain = self.resolve(src).await?;
        let source = existing(&src_chain, src)?;
        if source.is_folder() {
            return Err(Error::file_expected(src));
        }
        let dst_chain = self.resolve(dst).await?;
        let replaced = match dst_chain.target() {
            Some(_) if !overwrite => return Err(Error::destination_exists(dst)),
            Some(record) if record.is_folder() => return Err(Error::file_expected(dst)),
            target => target,
        };
        let dst_parent = parent_folder(&dst_chain, dst)?;

        let metadata = ObjectMetadata {
            name: Some(dst_chain.name().to_string()),
            parents: Some(vec![dst_parent.id.clone()]),
            ..Default::default()
        };
        let copy = self.inner.backend.copy(&source.id, &metadata).await?;
        if let Some(old) = replaced {
            self.inner.backend.delete(&old.id).await?;
        }
        let id = copy.id.as_str();
        info!("copied {src} to {dst} as {id}", src: src, dst: dst, id: id);
        Ok(())
    }

    /// Moves a file by re-linking and renaming it in one update.
    pub async fn move_file(&self, src: &str, dst: &str, overwrite: bool) -> Result<()> {
        path::check_path(src)?;
        path::check_path(dst)?;
        let _guard = self.inner.lock.lock().await;
        let src_chain = self.resolve(src).await?;
        let source = existing(&src_chain, src)?;
        if source.is_folder() {
            return Err(Error::file_expected(src));
        }
        let src_parent = parent_folder(&src_chain, src)?;
        let dst_chain = self.resolve(dst).await?;
        let dst_parent = parent_folder(&dst_chain, dst)?;
        if let Some(target) = dst_chain.target() {
            if target.id != source.id {
                if !overwrite {
                    return Err(Error::destination_exists(dst));
                }
                if target.is_folder() {
                    return Err(Error::file_expected(dst));
                }
                self.inner.backend.delete(&target.id).await?;
            }
        }

        let metadata = ObjectMetadata {
            name: Some(dst_chain.name().to_string()),
            ..Default::default()
        };
        let (add, remove) = if src_parent.id == dst_parent.id {
            (Vec::new(), Vec::new())
        } else {
            (vec![dst_parent.id.clone()], vec![src_parent.id.clone()])
        };
        self.inner
            .backend
            .update(&source.id, &metadata, &add, &remove)
            .await?;
        info!("moved {src} to {dst}", src: src, dst: dst);
        Ok(())
    }

    /// Grants `role` to `email`, or to anyone with the link when no email is
    /// given, and returns the sharing URL.
    pub async fn share(&self, path: &str, email: Option<&str>, role: &str) -> Result<String> {
        path::check_path(path)?;
        if !SHARING_ROLES.contains(&role) {
            return Err(Error::UnsupportedRole(role.to_string()));
        }
        let _guard = self.inner.lock.lock().await;
        let chain = self.resolve(path).await?;
        let record = existing(&chain, path)?;
        let permission = match email {
            Some(email) => Permission::user(role, email),
            None => Permission::anyone(role),
        };
        self.inner
            .backend
            .create_permission(&record.id, &permission)
            .await?;
        info!("shared {path} as {role}", path: path, role: role);
        Ok(sharing_url(&record.id))
    }

    /// Sharing URL of a shared object.
    pub async fn geturl(&self, path: &str) -> Result<String> {
        path::check_path(path)?;
        let _guard = self.inner.lock.lock().await;
        let chain = self.resolve(path).await?;
        let info = Info::from(existing(&chain, path)?);
        if !info.is_shared() {
            return Err(Error::no_url(path, "object is not shared"));
        }
        Ok(sharing_url(info.id()))
    }

    pub async fn hasurl(&self, path: &str) -> Result<bool> {
        match self.geturl(path).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_) | Error::NoUrl { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Writes a file's content to `writer`. Native documents have no
    /// content of their own and are exported as `mime_type`.
    pub async fn download<W>(&self, path: &str, writer: &mut W, mime_type: Option<&str>) -> Result<()>
    where
        W: Write + Send + ?Sized,
    {
        path::check_path(path)?;
        let _guard = self.inner.lock.lock().await;
        let chain = self.resolve(path).await?;
        let record = existing(&chain, path)?;
        if record.is_folder() {
            return Err(Error::file_expected(path));
        }
        let content = if record.is_native_document() {
            let Some(mime_type) = mime_type else {
                return Err(Error::operation_failed(
                    path,
                    format!("{} must be exported with a mime type", record.mime_type),
                ));
            };
            self.inner.backend.export(&record.id, mime_type).await
        } else {
            self.inner.backend.download(&record.id).await
        }
        .map_err(|e| Error::operation_failed(path, e))?;
        writer.write_all(&content)?;
        Ok(())
    }

    /// Creates a shortcut at `path` pointing at the file at `target`.
    pub async fn add_shortcut(&self, path: &str, target: &str) -> Result<()> {
        path::check_path(path)?;
        path::check_path(target)?;
        let _guard = self.inner.lock.lock().await;
        let target_chain = self.resolve(target).await?;
        let target_record = existing(&target_chain, target)?;
        if target_record.is_folder() {
            return Err(Error::file_expected(target));
        }
        let chain = self.resolve(path).await?;
        if chain.target().is_some() {
            return Err(Error::destination_exists(path));
        }
        let parent = parent_folder(&chain, path)?;
        let metadata = ObjectMetadata {
            name: Some(chain.name().to_string()),
            mime_type: Some(SHORTCUT_MIME_TYPE.to_string()),
            parents: Some(vec![parent.id.clone()]),
            shortcut_details: Some(ShortcutDetails {
                target_id: target_record.id.clone(),
                target_mime_type: None,
            }),
            ..Default::default()
        };
        self.inner.backend.create(&metadata).await?;
        info!("added shortcut {path} to {target}", path: path, target: target);
        Ok(())
    }

    /// Every live object matching `query`, wherever it is linked.
    pub async fn search(&self, query: Query) -> Result<Vec<Info>> {
        let query = if query.mentions_trashed() {
            query
        } else {
            Query::Trashed(false).and(query)
        };
        let _guard = self.inner.lock.lock().await;
        let records = self.resolver().list_all(query).await?;
        Ok(records.iter().map(Info::from).collect())
    }

    /// Registers a web-hook channel for changes to a file.
    pub async fn watch(&self, path: &str, address: &str, channel_id: &str) -> Result<Channel> {
        path::check_path(path)?;
        let _guard = self.inner.lock.lock().await;
        let chain = self.resolve(path).await?;
        let record = existing(&chain, path)?;
        if record.is_folder() {
            return Err(Error::file_expected(path));
        }
        let channel = self
            .inner
            .backend
            .watch(&record.id, &Channel::web_hook(channel_id, address))
            .await?;
        info!("watching {path} on {address}", path: path, address: address);
        Ok(channel)
    }
}
