use super::auth::TokenSource;
use super::upload::HttpUpload;
use crate::backend::{Backend, ListRequest, ObjectPage, UploadSession, UploadTarget};
use crate::config::DriveConfig;
use crate::error::{Error, Result};
use crate::object::{Channel, OBJECT_FIELDS, ObjectMetadata, ObjectRecord, Permission};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use diagnostics::*;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Objects requested per list call.
pub const PAGE_SIZE: usize = 100;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<ObjectRecord>,
    next_page_token: Option<String>,
}

/// Builds `base/segments...?params`.
pub(crate) fn endpoint(base: &str, segments: &[&str], params: &[(&str, &str)]) -> Result<Url> {
    let mut url =
        Url::parse(base).map_err(|e| Error::config(format!("Invalid API URL {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| Error::config(format!("API URL cannot be a base: {base}")))?
        .pop_if_empty()
        .extend(segments);
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url)
}

/// URL of one list page, scoped to a shared drive when the request names one.
pub(crate) fn list_url(api_url: &str, request: &ListRequest) -> Result<Url> {
    let query = request.query.to_string();
    let fields = format!("nextPageToken,files({OBJECT_FIELDS})");
    let page_size = PAGE_SIZE.to_string();
    let mut params = vec![
        ("q", query.as_str()),
        ("fields", fields.as_str()),
        ("pageSize", page_size.as_str()),
    ];
    if let Some(token) = &request.page_token {
        params.push(("pageToken", token.as_str()));
    }
    match &request.drive_id {
        Some(drive_id) => params.extend([
            ("corpora", "drive"),
            ("driveId", drive_id.as_str()),
            ("includeItemsFromAllDrives", "true"),
            ("supportsAllDrives", "true"),
        ]),
        None => params.push(("supportsAllDrives", "true")),
    }
    endpoint(api_url, &["files"], &params)
}

/// Connection state shared by the backend and its upload sessions.
pub(crate) struct Connection {
    client: reqwest::Client,
    tokens: TokenSource,
    pub(crate) api_url: String,
    pub(crate) upload_url: String,
    retries: usize,
    retry_delay: Duration,
    pub(crate) chunk_size: usize,
}

async fn check(response: Response, accept: &(dyn Fn(StatusCode) -> bool + Sync)) -> Result<Response> {
    let status = response.status();
    if accept(status) {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(Error::api(status.as_u16(), message))
}

impl Connection {
    /// Sends a request built by `build`, refreshing the access token once on
    /// 401 and retrying transient failures with exponential backoff.
    pub(crate) async fn send_with<F, A>(&self, build: F, accept: A) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder + Sync,
        A: Fn(StatusCode) -> bool + Sync,
    {
        let build = &build;
        let accept = &accept;
        let attempt = move || async move {
            let token = self.tokens.access_token().await?;
            let response = build(&self.client).bearer_auth(&token).send().await?;
            if response.status() == StatusCode::UNAUTHORIZED && self.tokens.can_refresh() {
                let token = self.tokens.refresh().await?;
                let response = build(&self.client).bearer_auth(&token).send().await?;
                return check(response, accept).await;
            }
            check(response, accept).await
        };

        attempt
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(self.retry_delay)
                    .with_max_times(self.retries),
            )
            .when(Error::is_transient)
            .notify(|err: &Error, delay: Duration| {
                let error = err.to_string();
                let delay_ms = delay.as_millis() as u64;
                warn!("retrying backend call in {delay_ms}ms: {error}", delay_ms: delay_ms, error: error);
            })
            .await
    }

    pub(crate) async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder + Sync,
    {
        self.send_with(build, |status| status.is_success()).await
    }
}

/// The remote store's REST API.
pub struct HttpBackend {
    conn: Arc<Connection>,
}

impl HttpBackend {
    pub fn new(config: &DriveConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_seconds))
            .build()?;
        Ok(Self {
            conn: Arc::new(Connection {
                client,
                tokens: TokenSource::new(&config.credentials),
                api_url: config.http.api_url.clone(),
                upload_url: config.http.upload_url.clone(),
                retries: config.http.retries,
                retry_delay: Duration::from_millis(config.http.retry_delay_ms),
                chunk_size: config.http.chunk_size,
            }),
        })
    }

    fn url(&self, segments: &[&str], params: &[(&str, &str)]) -> Result<Url> {
        endpoint(&self.conn.api_url, segments, params)
    }

    async fn fetch_json<T>(&self, method: Method, url: Url) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .conn
            .send(|client| client.request(method.clone(), url.clone()))
            .await?;
        Ok(response.json().await?)
    }

    async fn send_json<B, T>(&self, method: Method, url: Url, body: &B) -> Result<T>
    where
        B: serde::Serialize + Sync + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .conn
            .send(|client| client.request(method.clone(), url.clone()).json(body))
            .await?;
        Ok(response.json().await?)
    }

    async fn fetch_bytes(&self, url: Url) -> Result<Vec<u8>> {
        let response = self.conn.send(|client| client.get(url.clone())).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list(&self, request: &ListRequest) -> Result<ObjectPage> {
        let url = list_url(&self.conn.api_url, request)?;
        let query = request.query.to_string();
        debug!("list {query}", query: query);
        let list: FileList = self.fetch_json(Method::GET, url).await?;
        Ok(ObjectPage {
            objects: list.files,
            next_page_token: list.next_page_token,
        })
    }

    async fn get(&self, id: &str) -> Result<ObjectRecord> {
        let url = self.url(
            &["files", id],
            &[("fields", OBJECT_FIELDS), ("supportsAllDrives", "true")],
        )?;
        self.fetch_json(Method::GET, url).await
    }

    async fn create(&self, metadata: &ObjectMetadata) -> Result<ObjectRecord> {
        let url = self.url(
            &["files"],
            &[("fields", OBJECT_FIELDS), ("supportsAllDrives", "true")],
        )?;
        self.send_json(Method::POST, url, metadata).await
    }

    async fn update(
        &self,
        id: &str,
        metadata: &ObjectMetadata,
        add_parents: &[String],
        remove_parents: &[String],
    ) -> Result<ObjectRecord> {
        let add = add_parents.join(",");
        let remove = remove_parents.join(",");
        let mut params = vec![("fields", OBJECT_FIELDS), ("supportsAllDrives", "true")];
        if !add.is_empty() {
            params.push(("addParents", add.as_str()));
        }
        if !remove.is_empty() {
            params.push(("removeParents", remove.as_str()));
        }
        let url = self.url(&["files", id], &params)?;
        self.send_json(Method::PATCH, url, metadata).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let url = self.url(&["files", id], &[("supportsAllDrives", "true")])?;
        self.conn
            .send(|client| client.delete(url.clone()))
            .await?;
        Ok(())
    }

    async fn copy(&self, id: &str, metadata: &ObjectMetadata) -> Result<ObjectRecord> {
        let url = self.url(
            &["files", id, "copy"],
            &[("fields", OBJECT_FIELDS), ("supportsAllDrives", "true")],
        )?;
        self.send_json(Method::POST, url, metadata).await
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>> {
        let url = self.url(&["files", id], &[("alt", "media"), ("supportsAllDrives", "true")])?;
        self.fetch_bytes(url).await
    }

    async fn export(&self, id: &str, mime_type: &str) -> Result<Vec<u8>> {
        let url = self.url(&["files", id, "export"], &[("mimeType", mime_type)])?;
        self.fetch_bytes(url).await
    }

    async fn create_permission(&self, id: &str, permission: &Permission) -> Result<Permission> {
        let url = self.url(
            &["files", id, "permissions"],
            &[("supportsAllDrives", "true")],
        )?;
        self.send_json(Method::POST, url, permission).await
    }

    async fn watch(&self, id: &str, channel: &Channel) -> Result<Channel> {
        let url = self.url(&["files", id, "watch"], &[("supportsAllDrives", "true")])?;
        self.send_json(Method::POST, url, channel).await
    }

    async fn start_upload(
        &self,
        target: UploadTarget,
        content: Vec<u8>,
    ) -> Result<Box<dyn UploadSession>> {
        let upload = HttpUpload::start(self.conn.clone(), target, content).await?;
        Ok(Box::new(upload))
    }
}
