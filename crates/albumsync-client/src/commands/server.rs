//! `albumsync server`: builds the daemon from config and runs it in the
//! foreground until SIGTERM/SIGINT or a `shutdown` request.

use std::sync::Arc;

use albumsync_core::SourceMode;
use albumsync_providers::{AlbumSource, DemoSource, ErrorSource, HttpCoverFetcher, ProviderError};
use albumsync_server::{
    AlbumStore, ImportReconciler, MediaLibrary, MemoryAlbumStore, RequestHandler, SignalHandler,
    SocketServer, SqliteAlbumStore, make_connection_handler, new_shared_state,
};
use tracing::{error, info, warn};

use crate::cli::Cli;
use crate::config::{ClientConfig, StoreBackend};
use crate::error::{ClientError, ClientResult};

pub async fn run(cli: &Cli, config: &ClientConfig) -> ClientResult<()> {
    let socket_path = cli
        .socket_path
        .clone()
        .unwrap_or_else(|| config.socket_path());
    let mut server_config = config.server_config(&socket_path);
    if let Some(secs) = cli.timeout {
        server_config = server_config.with_connection_timeout(std::time::Duration::from_secs(secs));
    }
    server_config.validate()?;

    let source = build_source(config);
    info!(
        source = source.name(),
        mode = %source.mode(),
        authenticated = source.is_authenticated(),
        "album source ready"
    );

    let reconciler = Arc::new(build_reconciler(config).await?);

    let signals = SignalHandler::new();
    let handler = RequestHandler::new(
        new_shared_state(),
        source,
        reconciler,
        server_config.default_page_size,
    )
    .with_shutdown_handle(signals.shutdown_handle());

    let server = SocketServer::new(server_config).await?;
    signals.spawn_listener();
    info!(path = %socket_path.display(), "daemon listening");

    server
        .run_until_shutdown(make_connection_handler(handler), signals.shutdown().wait())
        .await?;

    info!("daemon stopped");
    Ok(())
}

/// The configured source, or an [`ErrorSource`] carrying the reason it
/// could not be built.
pub fn build_source(config: &ClientConfig) -> Arc<dyn AlbumSource> {
    match config.mode {
        SourceMode::Demo => {
            let source = DemoSource::new(config.demo.catalog_size);
            match config.demo.cover_base.as_deref() {
                Some(base) => Arc::new(source.with_cover_base(base)),
                None => Arc::new(source),
            }
        }
        SourceMode::Live => match live_source(config) {
            Ok(source) => source,
            Err(e) => {
                error!(error = %e, "live source unavailable, requests will fail until it is configured");
                Arc::new(ErrorSource::new(
                    "google-photos",
                    SourceMode::Live,
                    ProviderError::configuration(e.to_string()),
                ))
            }
        },
    }
}

#[cfg(feature = "google")]
fn live_source(config: &ClientConfig) -> ClientResult<Arc<dyn AlbumSource>> {
    use albumsync_providers::google::GooglePhotosSource;

    let settings = config.google.as_ref().ok_or_else(|| {
        ClientError::config("mode is \"live\" but config.toml has no [google] section")
    })?;
    let source = GooglePhotosSource::new(settings.to_provider_config()?)?;
    if source.needs_reauth() {
        warn!("Google Photos is not authorized, run `albumsync auth google`");
    }
    Ok(Arc::new(source))
}

#[cfg(not(feature = "google"))]
fn live_source(_config: &ClientConfig) -> ClientResult<Arc<dyn AlbumSource>> {
    Err(ClientError::config(
        "albumsync was built without the google feature",
    ))
}

pub async fn build_store(config: &ClientConfig) -> ClientResult<Arc<dyn AlbumStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            warn!("using the in-memory store, imports are lost when the daemon exits");
            Ok(Arc::new(MemoryAlbumStore::new()))
        }
        StoreBackend::Sqlite => {
            let path = config.store_path();
            let store = SqliteAlbumStore::open(&path).await?;
            info!(path = %path.display(), "opened album store");
            Ok(Arc::new(store))
        }
    }
}

async fn build_reconciler(config: &ClientConfig) -> ClientResult<ImportReconciler> {
    let store = build_store(config).await?;
    let media = MediaLibrary::new(config.media_dir());
    let reconciler = ImportReconciler::new(store, media);
    if !config.store.fetch_covers {
        info!("cover downloads disabled");
        return Ok(reconciler);
    }
    let fetcher = HttpCoverFetcher::new(config.cover_timeout())?;
    Ok(reconciler.with_cover_fetcher(Arc::new(fetcher)))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use albumsync_providers::ProviderErrorCode;

    use super::*;
    use crate::cli::Command;
    use crate::socket::SocketClient;

    fn config_in(dir: &tempfile::TempDir, extra: &str) -> ClientConfig {
        let text = format!(
            "[store]\npath = \"{}\"\nmedia_dir = \"{}\"\nfetch_covers = false\n{extra}",
            dir.path().join("albums.db").display(),
            dir.path().join("covers").display(),
        );
        ClientConfig::parse(&text).unwrap()
    }

    #[tokio::test]
    async fn demo_source_uses_catalog_size() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir, "[demo]\ncatalog_size = 5\n");
        let source = build_source(&config);
        assert_eq!(source.mode(), SourceMode::Demo);
        let page = source.list_albums(None, 50).await.unwrap();
        assert_eq!(page.albums.len(), 5);
        assert!(!page.has_more());
        assert!(page.albums.iter().all(|a| a.cover_url.is_none()));
    }

    #[tokio::test]
    async fn demo_cover_base_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir, "[demo]\ncover_base = \"http://127.0.0.1:9/c\"\n");
        let album = build_source(&config).get_album("demo-album-01").await.unwrap();
        assert_eq!(album.cover_url.as_deref(), Some("http://127.0.0.1:9/c/demo-album-01.jpg"));
    }

    #[tokio::test]
    async fn unusable_live_source_reports_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir, "");
        config.mode = SourceMode::Live;
        let source = build_source(&config);
        assert_eq!(source.mode(), SourceMode::Live);
        let err = source.list_albums(None, 10).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::Configuration);
    }

    #[tokio::test]
    async fn sqlite_store_is_created_at_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir, "");
        let store = build_store(&config).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(dir.path().join("albums.db").exists());
    }

    #[tokio::test]
    async fn serves_until_shutdown_request() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("albumsync.sock");
        let config = config_in(&dir, "");
        let cli = Cli {
            config: None,
            debug: false,
            socket_path: Some(socket_path.clone()),
            timeout: Some(5),
            command: Command::Server,
        };

        let daemon = tokio::spawn(async move { run(&cli, &config).await });

        let client = SocketClient::new(&socket_path, Duration::from_secs(5));
        let mut attempts = 0;
        while !client.ping().await {
            attempts += 1;
            assert!(attempts < 100, "daemon did not come up");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let report = client.import("demo-album-03").await.unwrap();
        assert!(report.is_new());
        assert!(!report.cover_attached);

        client.shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), daemon)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(!socket_path.exists());
    }
}
