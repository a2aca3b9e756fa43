//! Path-to-object resolution.
//!
//! The backend stores a graph of named objects, not a tree. The resolver
//! walks a path one segment at a time, issuing a single child lookup per
//! segment, and refuses to guess when a parent holds two live children with
//! the same (case-insensitive) name.

use crate::backend::{Backend, ListRequest};
use crate::error::{Error, Result};
use crate::object::ObjectRecord;
use crate::path;
use crate::query::Query;
use diagnostics::*;

/// Records resolved from the root towards a target, keyed by prefix path.
///
/// Resolution stops at the first missing segment, so a chain may be shorter
/// than the path it was built from.
#[derive(Debug, Clone)]
pub struct PathChain {
    segments: Vec<String>,
    entries: Vec<(String, ObjectRecord)>,
}

impl PathChain {
    /// Normalized path that was resolved.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when every segment was found.
    pub fn is_complete(&self) -> bool {
        self.entries.len() == self.segments.len() + 1
    }

    pub fn root(&self) -> &ObjectRecord {
        &self.entries[0].1
    }

    /// The object named by the full path, if it exists.
    pub fn target(&self) -> Option<&ObjectRecord> {
        if self.is_complete() {
            self.entries.last().map(|(_, record)| record)
        } else {
            None
        }
    }

    /// The parent folder of the full path, if it exists. `None` for the root.
    pub fn parent(&self) -> Option<&ObjectRecord> {
        if self.segments.is_empty() {
            return None;
        }
        self.entries
            .get(self.segments.len() - 1)
            .map(|(_, record)| record)
    }

    /// Record resolved for a normalized prefix path such as `/a/b`.
    pub fn get(&self, prefix: &str) -> Option<&ObjectRecord> {
        self.entries
            .iter()
            .find(|(key, _)| key == prefix)
            .map(|(_, record)| record)
    }

    /// Deepest record found, with its prefix path.
    pub fn deepest(&self) -> (&str, &ObjectRecord) {
        let (prefix, record) = &self.entries[self.entries.len() - 1];
        (prefix, record)
    }

    /// Segments below the deepest record that were not found.
    pub fn unresolved(&self) -> &[String] {
        &self.segments[self.entries.len() - 1..]
    }

    /// The final segment name, empty for the root.
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }
}

/// Walks paths against a backend.
pub struct Resolver<'a> {
    backend: &'a dyn Backend,
    root_id: Option<&'a str>,
    drive_id: Option<&'a str>,
}

impl<'a> Resolver<'a> {
    pub fn new(backend: &'a dyn Backend, root_id: Option<&'a str>, drive_id: Option<&'a str>) -> Self {
        Self {
            backend,
            root_id,
            drive_id,
        }
    }

    /// The root folder. Without an alternate root this is the synthetic
    /// marker record and costs no backend call.
    pub async fn root(&self) -> Result<ObjectRecord> {
        match self.root_id {
            None => Ok(ObjectRecord::synthetic_root()),
            Some(id) => self.backend.get(id).await,
        }
    }

    /// Looks up one live child by name.
    pub async fn child_by_name(&self, parent_id: &str, name: &str) -> Result<Option<ObjectRecord>> {
        let mut objects = self.list_all(Query::child_named(parent_id, name)).await?;
        match objects.len() {
            0 => Ok(None),
            1 => Ok(objects.pop()),
            _ => Err(Error::consistency(parent_id, name)),
        }
    }

    /// Lists every live child of a folder, draining all pages.
    pub async fn children(&self, parent_id: &str) -> Result<Vec<ObjectRecord>> {
        self.list_all(Query::children_of(parent_id)).await
    }

    /// True if a folder has at least one live child. Pages are read until
    /// one holds an object, since an empty page may still carry a token.
    pub async fn has_children(&self, parent_id: &str) -> Result<bool> {
        let mut request = ListRequest::new(
            Query::children_of(parent_id),
            self.drive_id.map(str::to_string),
        );
        loop {
            let page = self.backend.list(&request).await?;
            if !page.objects.is_empty() {
                return Ok(true);
            }
            match page.next_page_token {
                Some(token) => request.page_token = Some(token),
                None => return Ok(false),
            }
        }
    }

    /// Runs a query to completion, concatenating all pages.
    pub async fn list_all(&self, query: Query) -> Result<Vec<ObjectRecord>> {
        let mut request = ListRequest::new(query, self.drive_id.map(str::to_string));
        let mut objects = Vec::new();
        let mut pages = 0usize;
        loop {
            let page = self.backend.list(&request).await?;
            pages += 1;
            objects.extend(page.objects);
            match page.next_page_token {
                Some(token) => request.page_token = Some(token),
                None => break,
            }
        }
        let count = objects.len();
        debug!("list drained {pages} pages with {count} objects", pages: pages, count: count);
        Ok(objects)
    }

    /// Resolves a path into the chain of records from the root.
    pub async fn resolve(&self, path: &str) -> Result<PathChain> {
        let segments = path::segments(path)?;
        let mut entries = Vec::with_capacity(segments.len() + 1);
        entries.push(("/".to_string(), self.root().await?));

        let mut prefix = String::new();
        for name in &segments {
            let parent_id = match entries.last() {
                Some((_, parent)) if parent.is_folder() => parent.id.clone(),
                _ => break,
            };
            match self.child_by_name(&parent_id, name).await? {
                Some(child) => {
                    prefix.push('/');
                    prefix.push_str(name);
                    entries.push((prefix.clone(), child));
                }
                None => break,
            }
        }
        Ok(PathChain { segments, entries })
    }

    /// The record a path names, if any.
    pub async fn item(&self, path: &str) -> Result<Option<ObjectRecord>> {
        Ok(self.resolve(path).await?.target().cloned())
    }
}
