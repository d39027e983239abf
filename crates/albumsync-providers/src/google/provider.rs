use albumsync_core::{AlbumPage, AlbumSummary, ContinuationToken, SourceMode};
use tokio::sync::{Mutex as TokioMutex, RwLock as TokioRwLock};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::source::{AlbumSource, BoxFuture, clamp_page_size, with_auth_retry};

use super::client::PhotosApiClient;
use super::config::GoogleConfig;
use super::oauth::OAuthClient;
use super::tokens::TokenStorage;

const SOURCE_NAME: &str = "google-photos";

/// Live album source backed by the Photos Library API.
pub struct GooglePhotosSource {
    config: GoogleConfig,
    token_storage: TokenStorage,
    oauth_client: OAuthClient,
    api_client: TokioRwLock<Option<PhotosApiClient>>,
    /// Serializes refreshes so concurrent requests spend one refresh token grant.
    refresh_lock: TokioMutex<()>,
}

impl GooglePhotosSource {
    /// Loads any persisted tokens; does not touch the network.
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        config.validate()?;

        let token_storage = TokenStorage::new(&config.token_path);
        if let Err(e) = token_storage.load() {
            warn!(error = %e, "ignoring unreadable token file");
        }
        let oauth_client = OAuthClient::new(config.credentials.clone(), config.timeout)?;

        Ok(Self {
            config,
            token_storage,
            oauth_client,
            api_client: TokioRwLock::new(None),
            refresh_lock: TokioMutex::new(()),
        })
    }

    /// Sends refresh grants to `url` instead of Google's token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.oauth_client = self.oauth_client.with_token_url(url);
        self
    }

    /// Runs the browser consent flow and persists the resulting tokens.
    pub async fn authenticate(&self) -> ProviderResult<()> {
        info!("starting Google Photos authorization");
        let tokens = self
            .oauth_client
            .authorize(&self.config.scopes, self.config.loopback_port_range)
            .await?;
        self.token_storage.set(tokens.clone())?;
        self.install_token(&tokens.access_token).await?;
        info!(path = %self.token_storage.path().display(), "authorization stored");
        Ok(())
    }

    /// True when stored tokens lack the configured scopes or cannot be renewed.
    pub fn needs_reauth(&self) -> bool {
        self.token_storage.needs_reauth(&self.config.scopes)
    }

    async fn install_token(&self, access_token: &str) -> ProviderResult<()> {
        let mut slot = self.api_client.write().await;
        match slot.as_mut() {
            Some(client) => client.set_access_token(access_token),
            None => {
                *slot = Some(PhotosApiClient::new(
                    access_token,
                    self.config.api_base.clone(),
                    self.config.timeout,
                    &self.config.user_agent,
                    self.config.cover_size,
                )?);
            }
        }
        Ok(())
    }

    /// API client holding an access token not known to be expired.
    async fn client(&self) -> ProviderResult<PhotosApiClient> {
        let tokens = self.token_storage.get().ok_or_else(|| {
            ProviderError::auth_expired("not authorized, run 'albumsync auth google'")
        })?;

        if tokens.is_expired() {
            debug!("access token expired, refreshing before request");
            self.refresh(Some(&tokens.access_token)).await?;
        } else if self.api_client.read().await.is_none() {
            self.install_token(&tokens.access_token).await?;
        }

        self.api_client
            .read()
            .await
            .clone()
            .ok_or_else(|| ProviderError::internal("API client not initialized"))
    }

    /// Exchanges the refresh token for a new access token.
    ///
    /// `stale` is the access token the caller saw fail; if another task has
    /// already replaced it, that replacement is used instead of refreshing
    /// again.
    async fn refresh(&self, stale: Option<&str>) -> ProviderResult<()> {
        let _guard = self.refresh_lock.lock().await;

        let tokens = self.token_storage.get().ok_or_else(|| {
            ProviderError::auth_expired("not authorized, run 'albumsync auth google'")
        })?;
        if let Some(stale) = stale
            && tokens.access_token != stale
            && !tokens.is_expired()
        {
            return self.install_token(&tokens.access_token).await;
        }

        let refresh_token = tokens.refresh_token.as_deref().ok_or_else(|| {
            ProviderError::auth_expired("no refresh token stored, run 'albumsync auth google'")
        })?;
        let refreshed = self.oauth_client.refresh_token(refresh_token).await?;
        let updated = self.token_storage.apply_refresh(
            &refreshed.access_token,
            refreshed.expires_in,
            refreshed.refresh_token,
        )?;
        self.install_token(&updated.access_token).await
    }

    /// Refresh triggered by a 401 on the token the API client holds.
    async fn refresh_after_rejection(&self) -> ProviderResult<()> {
        let stale = self
            .api_client
            .read()
            .await
            .as_ref()
            .map(|c| c.access_token().to_string());
        self.refresh(stale.as_deref()).await
    }
}

impl AlbumSource for GooglePhotosSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn mode(&self) -> SourceMode {
        SourceMode::Live
    }

    fn list_albums<'a>(
        &'a self,
        token: Option<&'a ContinuationToken>,
        page_size: u32,
    ) -> BoxFuture<'a, ProviderResult<AlbumPage>> {
        let page_size = clamp_page_size(page_size);
        Box::pin(async move {
            with_auth_retry(
                move || async move { self.client().await?.list_albums(token, page_size).await },
                move || self.refresh_after_rejection(),
            )
            .await
            .map_err(|e| e.with_provider(SOURCE_NAME))
        })
    }

    fn get_album<'a>(&'a self, external_id: &'a str) -> BoxFuture<'a, ProviderResult<AlbumSummary>> {
        Box::pin(async move {
            with_auth_retry(
                move || async move { self.client().await?.get_album(external_id).await },
                move || self.refresh_after_rejection(),
            )
            .await
            .map_err(|e| e.with_provider(SOURCE_NAME))
        })
    }

    fn is_authenticated(&self) -> bool {
        self.token_storage.get().is_some_and(|t| t.is_usable())
    }
}
