//! Thin HTTP client for the Photos Library API albums endpoints.

use std::time::Duration;

use albumsync_core::{AlbumPage, AlbumSummary, ContinuationToken};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct PhotosApiClient {
    http_client: reqwest::Client,
    api_base: String,
    access_token: String,
    cover_size: u32,
}

impl PhotosApiClient {
    pub fn new(
        access_token: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
        cover_size: u32,
    ) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ProviderError::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            api_base: api_base.into(),
            access_token: access_token.into(),
            cover_size,
        })
    }

    /// Swaps in a refreshed token for later calls.
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// `GET /albums?pageSize=N[&pageToken=T]`
    pub async fn list_albums(
        &self,
        token: Option<&ContinuationToken>,
        page_size: u32,
    ) -> ProviderResult<AlbumPage> {
        let mut request = self
            .http_client
            .get(format!("{}/albums", self.api_base))
            .bearer_auth(&self.access_token)
            .query(&[("pageSize", page_size.to_string())]);
        if let Some(token) = token {
            request = request.query(&[("pageToken", token.as_str())]);
        }

        let body = send(request).await?;
        let page = parse_album_list(&body, self.cover_size)?;
        debug!(
            returned = page.albums.len(),
            has_more = page.has_more(),
            "fetched album page"
        );
        Ok(page)
    }

    /// `GET /albums/{id}`
    pub async fn get_album(&self, external_id: &str) -> ProviderResult<AlbumSummary> {
        let request = self
            .http_client
            .get(format!(
                "{}/albums/{}",
                self.api_base,
                urlencoding::encode(external_id)
            ))
            .bearer_auth(&self.access_token);

        let body = send(request).await?;
        let album: ApiAlbum = serde_json::from_str(&body)
            .map_err(|e| ProviderError::malformed(format!("failed to parse album: {e}")))?;
        album.into_summary(self.cover_size)
    }
}

async fn send(request: reqwest::RequestBuilder) -> ProviderResult<String> {
    let response = request.send().await.map_err(|e| {
        let message = if e.is_timeout() {
            "request timed out".to_string()
        } else if e.is_connect() {
            format!("connection failed: {e}")
        } else {
            format!("request failed: {e}")
        };
        ProviderError::unavailable(message).with_source(e)
    })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::unavailable(format!("failed to read response body: {e}")))?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(error_for_status(status, &body))
    }
}

/// Maps a non-2xx answer to its error kind, keeping Google's own message.
fn error_for_status(status: StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED => ProviderError::auth_expired(message),
        StatusCode::NOT_FOUND => ProviderError::not_found(message),
        other => ProviderError::rejected(other.as_u16(), message),
    }
}

fn parse_album_list(body: &str, cover_size: u32) -> ProviderResult<AlbumPage> {
    let list: AlbumListResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::malformed(format!("failed to parse album list: {e}")))?;

    let albums = list
        .albums
        .into_iter()
        .map(|album| album.into_summary(cover_size))
        .collect::<ProviderResult<Vec<_>>>()?;

    Ok(AlbumPage::new(
        albums,
        list.next_page_token.and_then(ContinuationToken::new),
    ))
}

/// Base URLs serve a thumbnail unless a size suffix is appended.
fn cover_download_url(base_url: &str, size: u32) -> String {
    format!("{base_url}=w{size}-h{size}")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumListResponse {
    #[serde(default)]
    albums: Vec<ApiAlbum>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiAlbum {
    id: Option<String>,
    #[serde(default)]
    title: String,
    product_url: Option<String>,
    /// int64 fields arrive as JSON strings.
    media_items_count: Option<String>,
    cover_photo_base_url: Option<String>,
}

impl ApiAlbum {
    fn into_summary(self, cover_size: u32) -> ProviderResult<AlbumSummary> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::malformed("album without an id"))?;

        let media_count = self
            .media_items_count
            .map(|raw| {
                raw.parse::<u64>().map_err(|_| {
                    ProviderError::malformed(format!(
                        "album {id} has a non-numeric mediaItemsCount: {raw}"
                    ))
                })
            })
            .transpose()?;

        let mut summary = AlbumSummary::new(id, self.title);
        summary.media_count = media_count;
        summary.product_url = self.product_url;
        summary.cover_url = self
            .cover_photo_base_url
            .map(|base| cover_download_url(&base, cover_size));
        Ok(summary)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}
