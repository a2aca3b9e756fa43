//! Backend object records and mutation bodies.
//!
//! Field names follow the backend's JSON wire format (camelCase).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known identifier of the backend's own root folder.
pub const ROOT_ID: &str = "root";

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
pub const SHORTCUT_MIME_TYPE: &str = "application/vnd.google-apps.shortcut";

/// Prefix shared by every backend-native type (documents, folders, shortcuts).
pub const NATIVE_MIME_PREFIX: &str = "application/vnd.google-apps.";

/// Prefix of the URL returned for shared objects.
pub const SHARING_URL: &str = "https://drive.google.com/open?id=";

/// Roles accepted when creating a permission.
pub const SHARING_ROLES: &[&str] = &[
    "reader",
    "writer",
    "commenter",
    "fileOrganizer",
    "organizer",
    "owner",
];

/// Fields requested for every object record.
pub const OBJECT_FIELDS: &str = "id,mimeType,kind,name,parents,createdTime,modifiedTime,size,\
permissions,md5Checksum,appProperties,contentHints/indexableText,shortcutDetails,trashed";

/// One file, folder or shortcut as the backend reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRecord {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub mime_type: String,

    #[serde(default)]
    pub parents: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,

    /// Content length; absent for folders and backend-native documents.
    #[serde(default, with = "int64_string", skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default)]
    pub permissions: Vec<Permission>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5_checksum: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_properties: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hints: Option<ContentHints>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortcut_details: Option<ShortcutDetails>,

    #[serde(default)]
    pub trashed: bool,
}

impl ObjectRecord {
    /// The synthetic root used when no alternate root is configured.
    pub fn synthetic_root() -> Self {
        Self {
            id: ROOT_ID.to_string(),
            name: String::new(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            parents: Vec::new(),
            created_time: None,
            modified_time: None,
            size: None,
            permissions: Vec::new(),
            md5_checksum: None,
            app_properties: None,
            content_hints: None,
            shortcut_details: None,
            trashed: false,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    pub fn is_shortcut(&self) -> bool {
        self.mime_type == SHORTCUT_MIME_TYPE
    }

    /// Native documents (spreadsheets, docs, ...) have no downloadable
    /// content and must be exported.
    pub fn is_native_document(&self) -> bool {
        self.mime_type.starts_with(NATIVE_MIME_PREFIX) && !self.is_folder() && !self.is_shortcut()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexable_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortcutDetails {
    pub target_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_mime_type: Option<String>,
}

/// Access grant on an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub role: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

impl Permission {
    /// Grant for a single user account.
    pub fn user<R: Into<String>, E: Into<String>>(role: R, email: E) -> Self {
        Self {
            id: None,
            role: role.into(),
            kind: "user".to_string(),
            email_address: Some(email.into()),
        }
    }

    /// Grant for anyone holding the link.
    pub fn anyone<R: Into<String>>(role: R) -> Self {
        Self {
            id: None,
            role: role.into(),
            kind: "anyone".to_string(),
            email_address: None,
        }
    }
}

/// Push-notification channel registered with `watch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: String,

    pub address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
}

impl Channel {
    pub fn web_hook<I: Into<String>, A: Into<String>>(id: I, address: A) -> Self {
        Self {
            id: id.into(),
            kind: "web_hook".to_string(),
            address: address.into(),
            resource_id: None,
            expiration: None,
        }
    }
}

/// Body of a create, update or copy call. Unset fields are left alone.
///
/// An app property mapped to `None` is serialized as `null`, which removes
/// the key on the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_properties: Option<BTreeMap<String, Option<String>>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hints: Option<ContentHints>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortcut_details: Option<ShortcutDetails>,
}

impl ObjectMetadata {
    /// Metadata for a new object named `name` under `parent_id`.
    pub fn child<N: Into<String>, P: Into<String>>(name: N, parent_id: P) -> Self {
        Self {
            name: Some(name.into()),
            parents: Some(vec![parent_id.into()]),
            ..Default::default()
        }
    }

    /// Metadata for a new folder named `name` under `parent_id`.
    pub fn folder<N: Into<String>, P: Into<String>>(name: N, parent_id: P) -> Self {
        Self {
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            ..Self::child(name, parent_id)
        }
    }
}

/// The backend transmits 64-bit integers as decimal strings.
mod int64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(value: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(n) => s.serialize_str(&n.to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        match Option::<Raw>::deserialize(d)? {
            None => Ok(None),
            Some(Raw::Number(n)) => Ok(Some(n)),
            Some(Raw::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}
