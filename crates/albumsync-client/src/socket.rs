//! Unix socket client for the albumsync daemon.

use std::path::{Path, PathBuf};
use std::time::Duration;

use albumsync_core::{AlbumPage, ContinuationToken, ImportReport, ImportedAlbum, SourceMode};
use albumsync_protocol::{
    Envelope, FRAME_HEADER_LEN, Request, Response, StatusInfo, decode_message, encode_message,
    frame_len,
};
use albumsync_providers::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};
use crate::gateway::AlbumGateway;

/// One connection per request, each bounded by `timeout`.
///
/// Waiting for an `import_album` reply uses `import_timeout` instead: the
/// daemon looks the album up and downloads its cover before answering.
#[derive(Debug, Clone)]
pub struct SocketClient {
    socket_path: PathBuf,
    timeout: Duration,
    import_timeout: Duration,
    /// Sent with fetch requests so a daemon serving the other mode refuses them.
    mode: Option<SourceMode>,
}

impl SocketClient {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
            import_timeout: timeout,
            mode: None,
        }
    }

    /// Default socket path with a 30 second timeout.
    pub fn with_defaults() -> Self {
        Self::new(albumsync_server::default_socket_path(), Duration::from_secs(30))
    }

    /// Read timeout for import replies; never shorter than `timeout`.
    #[must_use]
    pub fn with_import_timeout(mut self, timeout: Duration) -> Self {
        self.import_timeout = timeout.max(self.timeout);
        self
    }

    pub fn import_timeout(&self) -> Duration {
        self.import_timeout
    }

    /// Tags fetch requests with `mode`.
    #[must_use]
    pub fn with_expected_mode(mut self, mode: SourceMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// The socket file exists; says nothing about whether a daemon listens.
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Sends `request` and returns the daemon's payload, error responses
    /// included.
    pub async fn send(&self, request: Request) -> ClientResult<Response> {
        let request_id = Uuid::new_v4().to_string();
        let kind = request.kind();
        let envelope = Envelope::request(&request_id, request);

        debug!(
            socket = %self.socket_path.display(),
            request_id = %request_id,
            kind,
            "connecting to daemon"
        );

        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| {
                ClientError::Connection(format!(
                    "connection timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                ClientError::Connection(format!(
                    "failed to connect to {}: {e} (is `albumsync server` running?)",
                    self.socket_path.display()
                ))
            })?;

        let response = self.exchange(stream, &envelope).await?;
        if response.request_id != request_id {
            warn!(
                expected = %request_id,
                received = %response.request_id,
                "response request_id mismatch"
            );
        }
        Ok(response.payload)
    }

    async fn exchange(
        &self,
        mut stream: UnixStream,
        envelope: &Envelope<Request>,
    ) -> ClientResult<Envelope<Response>> {
        let frame = encode_message(envelope)?;
        let read_timeout = match envelope.payload {
            Request::ImportAlbum { .. } => self.import_timeout,
            _ => self.timeout,
        };

        tokio::time::timeout(self.timeout, async {
            stream.write_all(&frame).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| ClientError::Timeout("sending request".into()))??;

        let frame = tokio::time::timeout(read_timeout, async {
            let mut header = [0u8; FRAME_HEADER_LEN];
            stream.read_exact(&mut header).await?;
            let len = frame_len(header)?;
            let mut frame = header.to_vec();
            frame.resize(FRAME_HEADER_LEN + len, 0);
            stream.read_exact(&mut frame[FRAME_HEADER_LEN..]).await?;
            Ok::<_, ClientError>(frame)
        })
        .await
        .map_err(|_| ClientError::Timeout("reading response".into()))??;

        let envelope: Envelope<Response> = decode_message(&frame)?;
        debug!(request_id = %envelope.request_id, "response received");
        Ok(envelope)
    }

    /// Sends `request` and turns an error payload into [`ClientError::Server`].
    async fn call(&self, request: Request) -> ClientResult<Response> {
        match self.send(request).await? {
            Response::Error { error } => Err(ClientError::Server(error)),
            other => Ok(other),
        }
    }

    /// One page of albums; a daemon serving another mode answers with an error.
    pub async fn fetch(
        &self,
        token: Option<&ContinuationToken>,
        page_size: u32,
    ) -> ClientResult<AlbumPage> {
        let request = Request::FetchAlbums {
            continuation_token: token.cloned(),
            page_size: Some(page_size),
            mode: self.mode,
        };
        match self.call(request).await? {
            Response::Albums {
                albums,
                next_continuation_token,
                ..
            } => Ok(AlbumPage::new(albums, next_continuation_token)),
            other => Err(unexpected("albums", &other)),
        }
    }

    pub async fn import(&self, external_id: &str) -> ClientResult<ImportReport> {
        match self.call(Request::import_album(external_id)).await? {
            Response::Import { report } => Ok(report),
            other => Err(unexpected("import", &other)),
        }
    }

    /// Every stored record, in display order.
    pub async fn list_imported(&self) -> ClientResult<Vec<ImportedAlbum>> {
        match self.call(Request::ListImported).await? {
            Response::ImportedAlbums { albums } => Ok(albums),
            other => Err(unexpected("imported_albums", &other)),
        }
    }

    pub async fn status(&self) -> ClientResult<StatusInfo> {
        match self.call(Request::Status).await? {
            Response::Status { info } => Ok(info),
            other => Err(unexpected("status", &other)),
        }
    }

    /// Asks the daemon to stop after answering.
    pub async fn shutdown(&self) -> ClientResult<()> {
        match self.call(Request::Shutdown).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected("ok", &other)),
        }
    }

    /// True when the daemon answers a ping.
    pub async fn ping(&self) -> bool {
        matches!(self.send(Request::Ping).await, Ok(Response::Pong))
    }
}

fn unexpected(expected: &str, got: &Response) -> ClientError {
    let got = serde_json::to_value(got)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_string))
        .unwrap_or_else(|| "unknown".into());
    ClientError::UnexpectedResponse(format!("expected {expected}, got {got}"))
}

impl AlbumGateway for SocketClient {
    fn fetch_page<'a>(
        &'a self,
        token: Option<&'a ContinuationToken>,
        page_size: u32,
    ) -> BoxFuture<'a, ClientResult<AlbumPage>> {
        Box::pin(self.fetch(token, page_size))
    }

    fn import_album<'a>(&'a self, external_id: &'a str) -> BoxFuture<'a, ClientResult<ImportReport>> {
        Box::pin(self.import(external_id))
    }
}
