//! The [`AlbumSource`] trait and helpers shared by its implementations.
//!
//! A source is chosen once at daemon start-up from configuration and then
//! used through `Arc<dyn AlbumSource>`; callers never branch on the mode.

use std::future::Future;
use std::pin::Pin;

use albumsync_core::{AlbumPage, AlbumSummary, ContinuationToken, SourceMode};

use crate::error::{ProviderError, ProviderResult};

/// The Photos Library API refuses page sizes above this.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Boxed future so the trait stays object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Clamps a requested page size into `1..=MAX_PAGE_SIZE`.
pub fn clamp_page_size(requested: u32) -> u32 {
    requested.clamp(1, MAX_PAGE_SIZE)
}

/// Where album listings come from: the demo catalog or Google Photos.
pub trait AlbumSource: Send + Sync {
    /// Stable name used in logs and status output.
    fn name(&self) -> &str;

    fn mode(&self) -> SourceMode;

    /// Fetches the page starting at `token` (`None` for the first page).
    ///
    /// `page_size` is clamped by the implementation. The returned page's
    /// `next_token` is `None` once the listing is exhausted.
    fn list_albums<'a>(
        &'a self,
        token: Option<&'a ContinuationToken>,
        page_size: u32,
    ) -> BoxFuture<'a, ProviderResult<AlbumPage>>;

    /// Fetches a single album by its external id.
    fn get_album<'a>(&'a self, external_id: &'a str) -> BoxFuture<'a, ProviderResult<AlbumSummary>>;

    /// Whether the source holds credentials it believes are usable.
    /// Always true for sources that need none.
    fn is_authenticated(&self) -> bool;
}

/// Runs `op`; if it fails with `AuthExpired`, runs `refresh` once and then
/// `op` once more. Any other outcome of the first attempt is returned as is,
/// and the second attempt's outcome is final.
pub async fn with_auth_retry<T, Op, Fut, Refresh, RefreshFut>(
    op: Op,
    refresh: Refresh,
) -> ProviderResult<T>
where
    Op: Fn() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
    Refresh: FnOnce() -> RefreshFut,
    RefreshFut: Future<Output = ProviderResult<()>>,
{
    match op().await {
        Err(err) if err.is_auth_expired() => {
            tracing::info!(error = %err, "access rejected, refreshing credentials once");
            refresh().await?;
            op().await
        }
        other => other,
    }
}

/// Source that fails every call with the same error.
///
/// Installed when the configured source cannot be built, so the daemon still
/// starts and reports the problem on each request.
#[derive(Debug)]
pub struct ErrorSource {
    name: String,
    mode: SourceMode,
    error: ProviderError,
}

impl ErrorSource {
    pub fn new(name: impl Into<String>, mode: SourceMode, error: ProviderError) -> Self {
        Self {
            name: name.into(),
            mode,
            error,
        }
    }

    fn fail<T: Send + 'static>(&self) -> BoxFuture<'static, ProviderResult<T>> {
        let error = self.error.detached().with_provider(&self.name);
        Box::pin(async move { Err(error) })
    }
}

impl AlbumSource for ErrorSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> SourceMode {
        self.mode
    }

    fn list_albums<'a>(
        &'a self,
        _token: Option<&'a ContinuationToken>,
        _page_size: u32,
    ) -> BoxFuture<'a, ProviderResult<AlbumPage>> {
        self.fail()
    }

    fn get_album<'a>(&'a self, _external_id: &'a str) -> BoxFuture<'a, ProviderResult<AlbumSummary>> {
        self.fail()
    }

    fn is_authenticated(&self) -> bool {
        false
    }
}
