//! HTTP transport for the Drive v3 REST API.
//!
//! The client holds the installed access token and attaches it to every
//! request. All calls are scoped to the private application folder by the
//! queries and metadata the callers hand in.

use crate::codec::MultipartBody;
use crate::config::DriveConfig;
use crate::error::{DriveError, DriveResult};
use crate::types::{FileQuery, RemoteFile};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Remote storage capability the engine depends on.
#[async_trait]
pub trait DriveTransport: Send + Sync {
    /// Installs the bearer token used by subsequent calls.
    ///
    /// Fails with [`DriveError::Auth`] if the token is malformed.
    async fn set_access_token(&self, token: &str) -> DriveResult<()>;

    /// Removes the installed token.
    async fn clear_access_token(&self);

    /// The currently installed token, if any.
    async fn access_token(&self) -> Option<String>;

    /// Lists files matching `query`.
    async fn list(&self, query: &FileQuery) -> DriveResult<Vec<RemoteFile>>;

    /// Downloads the raw content of file `id`.
    async fn get_media(&self, id: &str) -> DriveResult<Vec<u8>>;

    /// Creates a file from a multipart body and returns its id.
    async fn create(&self, body: MultipartBody) -> DriveResult<String>;

    /// Replaces metadata and content of file `id`.
    async fn update(&self, id: &str, body: MultipartBody) -> DriveResult<()>;
}

/// Fields requested on every listing.
const LIST_FIELDS: &str = "files(id, name, modifiedTime)";

/// reqwest-backed Drive client.
pub struct DriveClient {
    client: Client,
    api_base_url: String,
    api_key: Option<String>,
    token: Arc<RwLock<Option<String>>>,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
}

#[derive(Deserialize)]
struct CreatedFile {
    id: String,
}

impl DriveClient {
    pub fn new(config: &DriveConfig) -> DriveResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    async fn bearer(&self) -> DriveResult<String> {
        self.token
            .read()
            .await
            .clone()
            .ok_or(DriveError::NotAuthenticated)
    }

    /// Attaches the token and API key.
    async fn authorize(&self, request: RequestBuilder) -> DriveResult<RequestBuilder> {
        let token = self.bearer().await?;
        let request = request.bearer_auth(token);
        Ok(match self.api_key {
            Some(ref key) => request.query(&[("key", key.as_str())]),
            None => request,
        })
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> DriveResult<reqwest::Response> {
        self.authorize(request)
            .await?
            .send()
            .await?
            .error_for_status()
            .map_err(|e| DriveError::Remote(format!("{what} failed: {e}")))
    }
}

#[async_trait]
impl DriveTransport for DriveClient {
    async fn set_access_token(&self, token: &str) -> DriveResult<()> {
        if token.trim().is_empty() {
            return Err(DriveError::Auth("access token is empty".to_string()));
        }
        HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| DriveError::Auth(format!("malformed access token: {e}")))?;

        *self.token.write().await = Some(token.to_string());
        Ok(())
    }

    async fn clear_access_token(&self) {
        *self.token.write().await = None;
    }

    async fn access_token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    async fn list(&self, query: &FileQuery) -> DriveResult<Vec<RemoteFile>> {
        let url = format!("{}/drive/v3/files", self.api_base_url);
        let page_size = query.page_size.to_string();
        let request = self.client.get(&url).query(&[
            ("spaces", query.space.as_str()),
            ("q", query.to_q().as_str()),
            ("fields", LIST_FIELDS),
            ("pageSize", page_size.as_str()),
        ]);

        let list: FileList = self.send(request, "file list").await?.json().await?;
        debug!("listed {} file(s) for {}", list.files.len(), query.to_q());
        Ok(list.files)
    }

    async fn get_media(&self, id: &str) -> DriveResult<Vec<u8>> {
        let url = format!("{}/drive/v3/files/{id}", self.api_base_url);
        let request = self.client.get(&url).query(&[("alt", "media")]);

        let bytes = self.send(request, "download").await?.bytes().await?;
        debug!("downloaded {} bytes from file {id}", bytes.len());
        Ok(bytes.to_vec())
    }

    async fn create(&self, body: MultipartBody) -> DriveResult<String> {
        let url = format!("{}/upload/drive/v3/files", self.api_base_url);
        let size = body.body.len();
        let request = self
            .client
            .post(&url)
            .query(&[("uploadType", "multipart")])
            .header(CONTENT_TYPE, body.content_type)
            .body(body.body);

        let created: CreatedFile = self.send(request, "create").await?.json().await?;
        debug!("created file {} ({size} bytes)", created.id);
        Ok(created.id)
    }

    async fn update(&self, id: &str, body: MultipartBody) -> DriveResult<()> {
        let url = format!("{}/upload/drive/v3/files/{id}", self.api_base_url);
        let size = body.body.len();
        let request = self
            .client
            .patch(&url)
            .query(&[("uploadType", "multipart")])
            .header(CONTENT_TYPE, body.content_type)
            .body(body.body);

        self.send(request, "update").await?;
        debug!("updated file {id} ({size} bytes)");
        Ok(())
    }
}
