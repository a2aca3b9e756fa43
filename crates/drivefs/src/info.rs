//! Filesystem info records projected from backend objects.

use crate::object::{ContentHints, ObjectMetadata, ObjectRecord, Permission};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Key of the MD5 digest in [`Info::hashes`].
pub const MD5: &str = "MD5";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Directory,
    File,
}

/// `basic` namespace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Basic {
    pub name: String,
    pub is_dir: bool,
}

/// `details` namespace. The backend never reports access or
/// metadata-change times, so those are always `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Details {
    pub accessed: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub metadata_changed: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
}

/// `sharing` namespace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sharing {
    pub id: String,
    pub permissions: Vec<Permission>,
    pub is_shared: bool,
}

/// Backend-specific `google` namespace.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleInfo {
    pub mime_type: String,
    pub indexable_text: Option<String>,
    pub app_properties: Option<BTreeMap<String, String>>,
    pub is_shortcut: bool,
    pub shortcut_target: Option<String>,
}

/// Read model of one path. Built per call, never cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Info {
    pub basic: Basic,
    pub details: Details,
    pub sharing: Sharing,
    pub hashes: BTreeMap<String, String>,
    pub google: GoogleInfo,
}

impl Info {
    pub fn name(&self) -> &str {
        &self.basic.name
    }

    pub fn is_dir(&self) -> bool {
        self.basic.is_dir
    }

    pub fn is_file(&self) -> bool {
        !self.basic.is_dir
    }

    pub fn size(&self) -> Option<u64> {
        self.details.size
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.details.created
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.details.modified
    }

    /// Created time as epoch seconds.
    pub fn created_epoch(&self) -> Option<i64> {
        self.details.created.map(|t| t.timestamp())
    }

    /// Modified time as epoch seconds.
    pub fn modified_epoch(&self) -> Option<i64> {
        self.details.modified.map(|t| t.timestamp())
    }

    pub fn id(&self) -> &str {
        &self.sharing.id
    }

    pub fn is_shared(&self) -> bool {
        self.sharing.is_shared
    }

    pub fn md5(&self) -> Option<&str> {
        self.hashes.get(MD5).map(String::as_str)
    }

    pub fn app_properties(&self) -> Option<&BTreeMap<String, String>> {
        self.google.app_properties.as_ref()
    }

    pub fn is_shortcut(&self) -> bool {
        self.google.is_shortcut
    }
}

impl From<&ObjectRecord> for Info {
    fn from(record: &ObjectRecord) -> Self {
        let is_dir = record.is_folder();

        let mut hashes = BTreeMap::new();
        if let Some(md5) = &record.md5_checksum {
            hashes.insert(MD5.to_string(), md5.clone());
        }

        Info {
            basic: Basic {
                name: record.name.clone(),
                is_dir,
            },
            details: Details {
                accessed: None,
                created: record.created_time,
                metadata_changed: None,
                modified: record.modified_time,
                // native documents report no size; keep it absent, not zero
                size: if is_dir { None } else { record.size },
                resource_type: if is_dir {
                    ResourceType::Directory
                } else {
                    ResourceType::File
                },
            },
            sharing: Sharing {
                id: record.id.clone(),
                permissions: record.permissions.clone(),
                is_shared: record.permissions.len() > 1,
            },
            hashes,
            google: GoogleInfo {
                mime_type: record.mime_type.clone(),
                indexable_text: record
                    .content_hints
                    .as_ref()
                    .and_then(|hints| hints.indexable_text.clone()),
                app_properties: record
                    .app_properties
                    .clone()
                    .filter(|props| !props.is_empty()),
                is_shortcut: record.is_shortcut(),
                shortcut_target: record
                    .shortcut_details
                    .as_ref()
                    .map(|details| details.target_id.clone()),
            },
        }
    }
}

/// Writable subset of [`Info`] accepted by `setinfo`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoUpdate {
    pub modified: Option<DateTime<Utc>>,
    pub indexable_text: Option<String>,
    /// `None` values remove the key; keys not mentioned are left alone.
    pub app_properties: Option<BTreeMap<String, Option<String>>>,
}

impl InfoUpdate {
    #[must_use]
    pub fn modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    #[must_use]
    pub fn indexable_text<S: Into<String>>(mut self, text: S) -> Self {
        self.indexable_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn app_property<K: Into<String>>(mut self, key: K, value: Option<String>) -> Self {
        self.app_properties
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.modified.is_none() && self.indexable_text.is_none() && self.app_properties.is_none()
    }

    pub(crate) fn to_metadata(&self) -> ObjectMetadata {
        ObjectMetadata {
            modified_time: self.modified,
            content_hints: self.indexable_text.as_ref().map(|text| ContentHints {
                indexable_text: Some(text.clone()),
            }),
            app_properties: self.app_properties.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{FOLDER_MIME_TYPE, ShortcutDetails};
    use chrono::TimeZone;

    fn file_record() -> ObjectRecord {
        let mut record = ObjectRecord::synthetic_root();
        record.id = "f1".to_string();
        record.name = "data.bin".to_string();
        record.mime_type = "application/octet-stream".to_string();
        record.created_time = Some(Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap());
        record.modified_time = Some(Utc.with_ymd_and_hms(2021, 1, 2, 3, 4, 5).unwrap());
        record.size = Some(42);
        record.md5_checksum = Some("abc".to_string());
        record
    }

    #[test]
    fn test_file_projection() {
        let info = Info::from(&file_record());
        assert_eq!(info.name(), "data.bin");
        assert!(info.is_file());
        assert_eq!(info.size(), Some(42));
        assert_eq!(info.details.resource_type, ResourceType::File);
        assert_eq!(info.details.accessed, None);
        assert_eq!(info.details.metadata_changed, None);
        assert_eq!(info.md5(), Some("abc"));
        assert_eq!(info.created_epoch(), Some(1_577_934_245));
        assert_eq!(info.id(), "f1");
        assert!(!info.is_shared());
        assert_eq!(info.app_properties(), None);
        assert!(!info.is_shortcut());
    }

    #[test]
    fn test_folder_and_root_projection() {
        let mut record = file_record();
        record.mime_type = FOLDER_MIME_TYPE.to_string();
        record.size = Some(0);
        let info = Info::from(&record);
        assert!(info.is_dir());
        assert_eq!(info.size(), None);

        let root = Info::from(&ObjectRecord::synthetic_root());
        assert!(root.is_dir());
        assert_eq!(root.created(), None);
        assert_eq!(root.modified(), None);
        assert_eq!(root.id(), "root");
    }

    #[test]
    fn test_native_document_has_no_size() {
        let mut record = file_record();
        record.mime_type = "application/vnd.google-apps.document".to_string();
        record.size = None;
        let info = Info::from(&record);
        assert!(info.is_file());
        assert_eq!(info.size(), None);
    }

    #[test]
    fn test_sharing_and_extensions() {
        let mut record = file_record();
        record.permissions = vec![
            Permission::user("owner", "me@example.com"),
            Permission::anyone("reader"),
        ];
        record.mime_type = crate::object::SHORTCUT_MIME_TYPE.to_string();
        record.shortcut_details = Some(ShortcutDetails {
            target_id: "t1".to_string(),
            target_mime_type: None,
        });
        record.app_properties = Some(BTreeMap::from([("k".to_string(), "v".to_string())]));
        let info = Info::from(&record);
        assert!(info.is_shared());
        assert!(info.is_shortcut());
        assert_eq!(info.google.shortcut_target.as_deref(), Some("t1"));
        assert_eq!(
            info.app_properties().and_then(|p| p.get("k")).map(String::as_str),
            Some("v")
        );
    }

    #[test]
    fn test_update_to_metadata() {
        let update = InfoUpdate::default()
            .indexable_text("<author>someone</author>")
            .app_property("a", None);
        let metadata = update.to_metadata();
        assert_eq!(metadata.name, None);
        assert_eq!(metadata.modified_time, None);
        assert_eq!(
            metadata.content_hints.and_then(|h| h.indexable_text).as_deref(),
            Some("<author>someone</author>")
        );
        assert_eq!(
            metadata.app_properties,
            Some(BTreeMap::from([("a".to_string(), None)]))
        );
        assert!(InfoUpdate::default().is_empty());
    }
}
