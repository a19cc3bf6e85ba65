//! GCS client for the bucket resizer
//!
//! Talks to the Cloud Storage JSON API with reqwest. Requests carry an OAuth2
//! access token from a service account key (minted and refreshed by
//! `gcp_auth`), a pre-minted token, or nothing at all when pointed at an
//! emulator.

use super::{Listed, ObjectDescriptor, ObjectListing, ObjectStore, StorageError};
use crate::config::{Config, Credentials};
use async_trait::async_trait;
use bytes::Bytes;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use std::collections::VecDeque;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://storage.googleapis.com";
const STORAGE_SCOPES: &[&str] = &["https://www.googleapis.com/auth/devstorage.read_write"];

/// How requests are authenticated
pub enum GcsAuth {
    /// No Authorization header (emulators)
    Anonymous,
    /// Fixed bearer token
    Bearer(String),
    /// Service account key, tokens cached by the provider
    ServiceAccount(Box<CustomServiceAccount>),
}

impl GcsAuth {
    /// Resolve configured credentials, reading key files as needed
    pub fn from_credentials(credentials: &Credentials) -> Result<Self, StorageError> {
        let account = match credentials {
            Credentials::AccessToken(token) => return Ok(GcsAuth::Bearer(token.clone())),
            Credentials::ServiceAccountJson(json) => {
                CustomServiceAccount::from_json(json).map_err(|e| {
                    StorageError::Credentials(format!("Invalid service account JSON: {e}"))
                })?
            }
            Credentials::ServiceAccountFile(path) => {
                CustomServiceAccount::from_file(path).map_err(|e| {
                    StorageError::Credentials(format!(
                        "Failed to load GCS service account JSON at {}: {e}",
                        path.display()
                    ))
                })?
            }
        };
        Ok(GcsAuth::ServiceAccount(Box::new(account)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    items: Vec<ObjectDescriptor>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// GCS client bound to one bucket
pub struct GcsClient {
    bucket: String,
    base_url: String,
    http_client: Client,
    auth: GcsAuth,
}

impl GcsClient {
    /// Create a new GCS client from raw parameters
    pub fn new(bucket: &str, base_url: &str, auth: GcsAuth) -> Result<Self, StorageError> {
        let http_client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StorageError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            bucket: bucket.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            auth,
        })
    }

    /// Create a new GCS client from configuration
    pub fn from_config(cfg: &Config) -> Result<Self, StorageError> {
        let client = match cfg.emulator_host.as_deref() {
            Some(host) => {
                let base_url = if host.starts_with("http://") || host.starts_with("https://") {
                    host.to_string()
                } else {
                    format!("http://{host}")
                };
                info!(bucket = %cfg.bucket, endpoint = %base_url, "Using GCS emulator, authentication disabled");
                Self::new(&cfg.bucket, &base_url, GcsAuth::Anonymous)?
            }
            None => {
                let auth = GcsAuth::from_credentials(&cfg.credentials)?;
                if let GcsAuth::ServiceAccount(_) = &auth {
                    info!("Loaded service account credentials");
                }
                Self::new(&cfg.bucket, DEFAULT_BASE_URL, auth)?
            }
        };

        info!(bucket = %cfg.bucket, project_id = %cfg.project_id, "GCS client initialized");
        Ok(client)
    }

    fn object_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(name)
        )
    }

    async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, StorageError> {
        Ok(match &self.auth {
            GcsAuth::Anonymous => request,
            GcsAuth::Bearer(token) => request.bearer_auth(token),
            GcsAuth::ServiceAccount(account) => {
                let token = account.token(STORAGE_SCOPES).await.map_err(|e| {
                    StorageError::Credentials(format!("Failed to fetch access token: {e}"))
                })?;
                request.bearer_auth(token.as_str())
            }
        })
    }

    /// Fetch one page of the bucket listing
    async fn list_page(&self, page_token: Option<&str>) -> Result<ListPage, StorageError> {
        let url = format!(
            "{}/storage/v1/b/{}/o",
            self.base_url,
            urlencoding::encode(&self.bucket)
        );
        let mut request = self.http_client.get(&url);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = self.authorize(request).await?.send().await?;
        let response = check_status(response, &self.bucket).await?;
        let page: ListPage = response.json().await?;

        debug!(
            bucket = %self.bucket,
            items = page.items.len(),
            has_more = page.next_page_token.is_some(),
            "Fetched listing page"
        );
        Ok(page)
    }
}

#[async_trait]
impl ObjectStore for GcsClient {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list(&self) -> Box<dyn ObjectListing + '_> {
        Box::new(GcsListing {
            client: self,
            buffered: VecDeque::new(),
            next_page_token: None,
            exhausted: false,
        })
    }

    async fn read(&self, name: &str) -> Result<Bytes, StorageError> {
        debug!(object = %name, "Downloading from GCS");

        let request = self
            .http_client
            .get(self.object_url(name))
            .query(&[("alt", "media")]);
        let response = self.authorize(request).await?.send().await?;
        let response = check_status(response, name).await?;

        let bytes = response.bytes().await?;
        debug!(object = %name, size = bytes.len(), "Downloaded from GCS");
        Ok(bytes)
    }

    async fn write(
        &self,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let url = format!(
            "{}/upload/storage/v1/b/{}/o",
            self.base_url,
            urlencoding::encode(&self.bucket)
        );
        let size = data.len();
        debug!(object = %name, size, "Uploading to GCS");

        let request = self
            .http_client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", name)])
            .header(header::CONTENT_TYPE, content_type)
            .body(data);
        let response = self.authorize(request).await?.send().await?;
        check_status(response, name).await?;

        debug!(object = %name, size, "Uploaded to GCS");
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let url = format!(
            "{}/copyTo/b/{}/o/{}",
            self.object_url(from),
            urlencoding::encode(&self.bucket),
            urlencoding::encode(to)
        );

        let request = self.http_client.post(&url);
        let response = self.authorize(request).await?.send().await?;
        check_status(response, from).await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let request = self.http_client.delete(self.object_url(name));
        let response = self.authorize(request).await?.send().await?;
        check_status(response, name).await?;
        Ok(())
    }
}

async fn check_status(response: Response, name: &str) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::NOT_FOUND => Err(StorageError::NotFound {
            name: name.to_string(),
        }),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StorageError::Forbidden {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        }),
        _ => Err(StorageError::Http {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        }),
    }
}

/// Paged listing that fetches the next page only when the buffer runs dry
struct GcsListing<'a> {
    client: &'a GcsClient,
    buffered: VecDeque<ObjectDescriptor>,
    next_page_token: Option<String>,
    exhausted: bool,
}

#[async_trait]
impl ObjectListing for GcsListing<'_> {
    async fn next(&mut self) -> Listed {
        loop {
            if let Some(descriptor) = self.buffered.pop_front() {
                return Listed::Object(descriptor);
            }
            if self.exhausted {
                return Listed::Done;
            }

            match self.client.list_page(self.next_page_token.as_deref()).await {
                Ok(page) => {
                    self.buffered.extend(page.items);
                    self.next_page_token = page.next_page_token;
                    if self.next_page_token.is_none() {
                        self.exhausted = true;
                    }
                }
                Err(e) => {
                    self.exhausted = true;
                    return Listed::Failed(e);
                }
            }
        }
    }
}
