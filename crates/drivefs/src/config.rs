//! Connection configuration.
//!
//! A [`DriveConfig`] is owned by one filesystem instance. It can be loaded
//! from YAML:
//!
//! ```yaml
//! credentials:
//!   refresh_token: "1//0g..."
//!   client_id: "1234.apps.googleusercontent.com"
//!   client_secret: "GOCSPX-..."
//! root_id: "0AbCdEf"      # optional alternate root folder
//! drive_id: "0AXyZ"       # optional shared drive
//! http:
//!   retries: 3
//!   retry_delay_ms: 500
//! ```
//!
//! or assembled from `DRIVEFS_*` environment variables.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_API_URL: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";

/// Resumable uploads require chunk sizes in multiples of this.
pub const UPLOAD_CHUNK_GRANULARITY: usize = 256 * 1024;
pub const DEFAULT_CHUNK_SIZE: usize = 40 * UPLOAD_CHUNK_GRANULARITY;
pub const DEFAULT_RETRIES: usize = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// OAuth2 credential material.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Credentials {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            client_id: None,
            client_secret: None,
            token_uri: default_token_uri(),
        }
    }
}

impl Credentials {
    /// True when an expired access token can be replaced.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some()
    }
}

/// Transport tuning for the HTTP backend.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HttpConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_upload_url")]
    pub upload_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Retries applied to every backend call after the first attempt.
    #[serde(default = "default_retries")]
    pub retries: usize,
    /// First backoff delay; later delays double.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            upload_url: default_upload_url(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Everything needed to open a filesystem on the remote store.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DriveConfig {
    #[serde(default)]
    pub credentials: Credentials,
    /// Folder treated as the filesystem root instead of the store's own root.
    #[serde(default)]
    pub root_id: Option<String>,
    /// Shared drive every list query is scoped to.
    #[serde(default)]
    pub drive_id: Option<String>,
    #[serde(default)]
    pub http: HttpConfig,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_upload_url() -> String {
    DEFAULT_UPLOAD_URL.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_retries() -> usize {
    DEFAULT_RETRIES
}

fn default_retry_delay() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl DriveConfig {
    /// Scoped to an alternate root folder.
    #[must_use]
    pub fn with_root_id<S: Into<String>>(mut self, root_id: S) -> Self {
        self.root_id = Some(root_id.into());
        self
    }

    /// Scoped to a shared drive.
    #[must_use]
    pub fn with_drive_id<S: Into<String>>(mut self, drive_id: S) -> Self {
        self.drive_id = Some(drive_id.into());
        self
    }

    /// Parse and validate YAML configuration text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: DriveConfig = serde_yaml_ng::from_str(text)
            .map_err(|e| Error::config(format!("Invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from `DRIVEFS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let config = Self::default().merge_vars(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay variables from `lookup` onto this configuration.
    #[must_use]
    pub fn merge_vars<F: Fn(&str) -> Option<String>>(mut self, lookup: F) -> Self {
        let set = |slot: &mut Option<String>, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = Some(value);
            }
        };
        set(&mut self.credentials.access_token, "DRIVEFS_ACCESS_TOKEN");
        set(&mut self.credentials.refresh_token, "DRIVEFS_REFRESH_TOKEN");
        set(&mut self.credentials.client_id, "DRIVEFS_CLIENT_ID");
        set(&mut self.credentials.client_secret, "DRIVEFS_CLIENT_SECRET");
        set(&mut self.root_id, "DRIVEFS_ROOT_ID");
        set(&mut self.drive_id, "DRIVEFS_DRIVE_ID");
        if let Some(uri) = lookup("DRIVEFS_TOKEN_URI").filter(|v| !v.is_empty()) {
            self.credentials.token_uri = uri;
        }
        self
    }

    /// Checks the settings the HTTP backend depends on.
    pub fn validate(&self) -> Result<()> {
        let creds = &self.credentials;
        if creds.access_token.is_none() && !creds.can_refresh() {
            return Err(Error::config(
                "credentials need an access_token or a refresh_token with client_id",
            ));
        }
        if self.http.chunk_size == 0 || self.http.chunk_size % UPLOAD_CHUNK_GRANULARITY != 0 {
            return Err(Error::config(format!(
                "http.chunk_size must be a positive multiple of {UPLOAD_CHUNK_GRANULARITY}"
            )));
        }
        if self.root_id.as_deref() == Some("") {
            return Err(Error::config("root_id cannot be empty"));
        }
        Ok(())
    }
}

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DriveConfig> {
    let content = std::fs::read_to_string(&path).map_err(|e| {
        Error::config(format!(
            "Failed to read config file {}: {e}",
            path.as_ref().display()
        ))
    })?;
    DriveConfig::from_yaml(&content)
}
