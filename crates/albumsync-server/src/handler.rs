//! Request dispatch.

use std::sync::Arc;

use albumsync_core::{ImportReport, ImportStatus};
use albumsync_protocol::{
    ErrorCode, ErrorResponse, PROTOCOL_VERSION, Request, Response, StatusInfo,
};
use albumsync_providers::AlbumSource;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{Span, debug, info, warn};

use crate::error::{ServerError, ServerResult, provider_error_response};
use crate::reconciler::ImportReconciler;
use crate::signals::ShutdownHandle;
use crate::socket::Connection;
use crate::store::AlbumStore;

/// Daemon-wide state shared by every connection.
#[derive(Debug)]
pub struct ServerState {
    start_time: DateTime<Utc>,
    shutdown_requested: bool,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
            shutdown_requested: false,
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Whole seconds since the daemon started, never negative.
    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.start_time).num_seconds().max(0) as u64
    }

    /// Marks the daemon as stopping; later requests other than `ping`
    /// are refused.
    pub fn request_shutdown(&mut self) {
        self.shutdown_requested = true;
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }
}

pub type SharedState = Arc<RwLock<ServerState>>;

/// Fresh state stamped with the current time.
pub fn new_shared_state() -> SharedState {
    Arc::new(RwLock::new(ServerState::new()))
}

/// Routes requests to the album source, the store and the reconciler.
///
/// Cheap to clone; one clone serves each connection.
#[derive(Clone)]
pub struct RequestHandler {
    state: SharedState,
    source: Arc<dyn AlbumSource>,
    store: Arc<dyn AlbumStore>,
    reconciler: Arc<ImportReconciler>,
    default_page_size: u32,
    shutdown: Option<ShutdownHandle>,
}

impl RequestHandler {
    /// Takes its store from `reconciler`, so listing and import always see
    /// the same records. `default_page_size` applies when a fetch names none.
    pub fn new(
        state: SharedState,
        source: Arc<dyn AlbumSource>,
        reconciler: Arc<ImportReconciler>,
        default_page_size: u32,
    ) -> Self {
        Self {
            state,
            source,
            store: Arc::clone(reconciler.store()),
            reconciler,
            default_page_size,
            shutdown: None,
        }
    }

    /// A `shutdown` request also triggers this handle.
    pub fn with_shutdown_handle(mut self, handle: ShutdownHandle) -> Self {
        self.shutdown = Some(handle);
        self
    }

    /// Answers one request. Never fails; errors become `Response::Error`.
    #[tracing::instrument(skip(self, request), fields(request_type = request.kind(), duration_ms))]
    pub async fn handle(&self, request: &Request) -> Response {
        let start = std::time::Instant::now();

        let response = if self.state.read().await.shutdown_requested()
            && !matches!(request, Request::Ping)
        {
            Response::from_error(ServerError::Shutdown.to_response())
        } else {
            self.dispatch(request).await
        };

        let duration = start.elapsed();
        if tracing::enabled!(tracing::Level::DEBUG) {
            Span::current().record("duration_ms", duration.as_millis());
            debug!(
                request_type = request.kind(),
                duration_ms = duration.as_millis(),
                success = response.is_success(),
                "request handled"
            );
        }
        response
    }

    async fn dispatch(&self, request: &Request) -> Response {
        match request {
            Request::Ping => Response::Pong,
            Request::Status => match self.status_info().await {
                Ok(info) => Response::status(info),
                Err(e) => Response::from_error(e.to_response()),
            },
            Request::FetchAlbums {
                continuation_token,
                page_size,
                mode,
            } => {
                let configured = self.source.mode();
                if let Some(requested) = mode
                    && *requested != configured
                {
                    return Response::error(
                        ErrorCode::InvalidRequest,
                        format!("daemon serves {configured} albums, request asked for {requested}"),
                    );
                }

                let page_size = page_size.unwrap_or(self.default_page_size);
                debug!(
                    token = continuation_token.as_ref().map(|t| t.as_str()),
                    page_size, "fetching album page"
                );
                match self
                    .source
                    .list_albums(continuation_token.as_ref(), page_size)
                    .await
                {
                    Ok(page) => Response::albums(page.albums, configured, page.next_token),
                    Err(e) => {
                        warn!(error = %e, "album fetch failed");
                        Response::from_error(provider_error_response(&e))
                    }
                }
            }
            Request::ImportAlbum { external_id } => match self.import(external_id).await {
                Ok(report) => Response::import(report),
                Err(e) => {
                    warn!(external_id = %external_id, error = %e, "import failed");
                    Response::from_error(e.to_response())
                }
            },
            Request::ListImported => match self.store.list().await {
                Ok(albums) => Response::ImportedAlbums { albums },
                Err(e) => Response::from_error(ServerError::from(e).to_response()),
            },
            Request::Shutdown => {
                info!("shutdown requested by client");
                self.state.write().await.request_shutdown();
                if let Some(handle) = &self.shutdown {
                    handle.trigger();
                }
                Response::Ok
            }
        }
    }

    /// Imports by external id, asking the source for metadata only when
    /// the album is not already present.
    async fn import(&self, external_id: &str) -> ServerResult<ImportReport> {
        let external_id = external_id.trim();
        if external_id.is_empty() {
            return Err(ServerError::InvalidRequest(
                "external id must not be empty".to_string(),
            ));
        }

        if let Some(existing) = self.store.find_by_external_id(external_id).await? {
            return Ok(ImportReport::from_record(ImportStatus::AlreadyExists, &existing));
        }

        let album = self.source.get_album(external_id).await?;
        Ok(self.reconciler.import(&album).await?.report())
    }

    async fn status_info(&self) -> ServerResult<StatusInfo> {
        let (uptime_seconds, started_at) = {
            let state = self.state.read().await;
            (state.uptime_seconds(), state.start_time())
        };
        Ok(StatusInfo {
            uptime_seconds,
            started_at,
            mode: self.source.mode(),
            source: self.source.name().to_string(),
            authenticated: self.source.is_authenticated(),
            imported_count: self.store.count().await?,
        })
    }

    /// Serves requests on `conn` until the client disconnects.
    pub async fn handle_connection(&self, mut conn: Connection) -> ServerResult<()> {
        loop {
            match conn.read_request().await {
                Ok(Some(envelope)) => {
                    let response = if envelope.is_compatible() {
                        self.handle(&envelope.payload).await
                    } else {
                        warn!(
                            version = %envelope.protocol_version,
                            expected = PROTOCOL_VERSION,
                            "incompatible protocol version"
                        );
                        Response::from_error(ErrorResponse::invalid_request(format!(
                            "unsupported protocol version {}, expected {PROTOCOL_VERSION}",
                            envelope.protocol_version
                        )))
                    };
                    conn.respond(&envelope.request_id, response).await?;

                    if self.state.read().await.shutdown_requested() {
                        return Err(ServerError::Shutdown);
                    }
                }
                Ok(None) => {
                    debug!("client disconnected");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "error reading request");
                    return Err(e);
                }
            }
        }
    }
}

/// Connection callback for [`crate::SocketServer::run_until_shutdown`].
pub fn make_connection_handler(
    handler: RequestHandler,
) -> impl Fn(Connection) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
+ Send
+ Sync
+ 'static {
    move |conn| {
        let handler = handler.clone();
        Box::pin(async move {
            if let Err(e) = handler.handle_connection(conn).await
                && !matches!(e, ServerError::Shutdown)
            {
                warn!(error = %e, "connection handler error");
            }
        })
    }
}
