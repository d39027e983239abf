//! Downloading album cover images.

use std::time::Duration;

use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::source::BoxFuture;

/// Whole-request timeout for one cover download.
pub const DEFAULT_COVER_TIMEOUT_SECS: u64 = 30;

/// Bytes of a downloaded cover plus the declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl CoverImage {
    /// File extension for the declared media type, `jpg` when unknown.
    pub fn extension(&self) -> &'static str {
        let essence = self
            .content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            .unwrap_or_default();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/heic" | "image/heif" => "heic",
            _ => "jpg",
        }
    }
}

/// Fetches the image behind a cover URL.
pub trait CoverFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ProviderResult<CoverImage>>;
}

/// Plain HTTP GET; cover URLs from either source need no credentials.
#[derive(Debug, Clone)]
pub struct HttpCoverFetcher {
    http_client: reqwest::Client,
}

impl HttpCoverFetcher {
    /// `timeout` bounds the whole request, body included.
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("albumsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http_client })
    }

    async fn download(&self, url: &str) -> ProviderResult<CoverImage> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::unavailable(format!("cover download failed: {e}")).with_source(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::rejected(
                status.as_u16(),
                format!("cover download answered {status}"),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::unavailable(format!("failed to read cover body: {e}")))?;
        if bytes.is_empty() {
            return Err(ProviderError::malformed("cover download returned no data"));
        }

        debug!(size = bytes.len(), content_type = ?content_type, "downloaded cover");
        Ok(CoverImage {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

impl CoverFetcher for HttpCoverFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ProviderResult<CoverImage>> {
        Box::pin(self.download(url))
    }
}
