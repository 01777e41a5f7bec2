use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, CONTENT_LENGTH};
use reqwest::{Client, Response};

use super::error::ApiError;
use super::types::{Album, AlbumDetail, AssetMetadata};

const USER_AGENT: &str = concat!("immich-sync/", env!("CARGO_PKG_VERSION"));

/// Byte stream of an asset's original file.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ApiError>> + Send>>;

/// An opened download: the length the server advertised (when it did) and
/// the body stream.
pub struct AssetDownload {
    pub content_length: Option<u64>,
    pub stream: ByteStream,
}

/// The catalog operations the sync engine needs.
/// The concrete implementation is [`ImmichClient`]; tests substitute fakes.
#[async_trait::async_trait]
pub trait ImmichApi: Send + Sync {
    /// List albums. `shared_only` restricts to albums shared with the user.
    async fn list_albums(&self, shared_only: bool) -> Result<Vec<Album>, ApiError>;

    /// Fetch one album with its asset entries.
    async fn get_album(&self, album_id: &str) -> Result<AlbumDetail, ApiError>;

    /// Fetch fresh metadata for one asset.
    async fn asset_info(&self, asset_id: &str) -> Result<AssetMetadata, ApiError>;

    /// Probe the byte size of an asset's original file without fetching it.
    async fn asset_size(&self, asset_id: &str) -> Result<u64, ApiError>;

    /// Open the asset's original file for streaming download.
    async fn open_original(&self, asset_id: &str) -> Result<AssetDownload, ApiError>;
}

/// HTTP client for an Immich server.
///
/// Every request carries the API key in the `x-api-key` header; metadata
/// calls accept JSON, size probes and downloads accept raw bytes.
pub struct ImmichClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl ImmichClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ApiError> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, url: &str) -> Result<Response, ApiError> {
        let response = self
            .http
            .get(url)
            .header("x-api-key", &self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        check_status(response)
    }

    async fn original_request(&self, asset_id: &str, head: bool) -> Result<Response, ApiError> {
        let url = self.url(&format!("/api/assets/{asset_id}/original"));
        let request = if head {
            self.http.head(&url)
        } else {
            self.http.get(&url)
        };
        let response = request
            .header("x-api-key", &self.api_key)
            .header(ACCEPT, "application/octet-stream")
            .send()
            .await?;
        check_status(response)
    }
}

fn check_status(response: Response) -> Result<Response, ApiError> {
    if !response.status().is_success() {
        return Err(ApiError::Status {
            status: response.status().as_u16(),
            url: response.url().to_string(),
        });
    }
    Ok(response)
}

#[async_trait::async_trait]
impl ImmichApi for ImmichClient {
    async fn list_albums(&self, shared_only: bool) -> Result<Vec<Album>, ApiError> {
        let mut url = self.url("/api/albums");
        if shared_only {
            url.push_str("?shared=true");
        }
        Ok(self.get_json(&url).await?.json().await?)
    }

    async fn get_album(&self, album_id: &str) -> Result<AlbumDetail, ApiError> {
        let url = self.url(&format!("/api/albums/{album_id}"));
        Ok(self.get_json(&url).await?.json().await?)
    }

    async fn asset_info(&self, asset_id: &str) -> Result<AssetMetadata, ApiError> {
        let url = self.url(&format!("/api/assets/{asset_id}"));
        Ok(self.get_json(&url).await?.json().await?)
    }

    async fn asset_size(&self, asset_id: &str) -> Result<u64, ApiError> {
        let response = self.original_request(asset_id, true).await?;
        let size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        Ok(size)
    }

    async fn open_original(&self, asset_id: &str) -> Result<AssetDownload, ApiError> {
        let response = self.original_request(asset_id, false).await?;
        let content_length = response.content_length();
        let stream = response.bytes_stream().map_err(ApiError::from).boxed();
        Ok(AssetDownload {
            content_length,
            stream,
        })
    }
}
