//! Unix socket listener and per-connection framing.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use albumsync_protocol::{
    Envelope, ErrorCode, FRAME_HEADER_LEN, ProtocolError, Request, Response, encode_message,
    frame_len,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

pub struct SocketServer {
    config: ServerConfig,
    listener: UnixListener,
    connection_semaphore: Arc<Semaphore>,
}

impl SocketServer {
    /// Binds the configured socket path.
    ///
    /// A socket file nobody answers on is removed first when
    /// `cleanup_stale_socket` is set; a live one is an error.
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        let socket_path = &config.socket_path;

        if let Some(parent) = socket_path.parent()
            && !parent.exists()
        {
            return Err(ServerError::socket_path_invalid(
                parent.to_string_lossy().to_string(),
            ));
        }

        if socket_path.exists() {
            let live = UnixStream::connect(socket_path).await.is_ok();
            if live || !config.cleanup_stale_socket {
                return Err(ServerError::socket_in_use(
                    socket_path.to_string_lossy().to_string(),
                ));
            }
            info!(path = %socket_path.display(), "removing stale socket");
            std::fs::remove_file(socket_path)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }
        info!(path = %socket_path.display(), "socket server listening");

        let connection_semaphore = Arc::new(Semaphore::new(config.max_connections));
        Ok(Self {
            config,
            listener,
            connection_semaphore,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    pub async fn accept(&self) -> ServerResult<Connection> {
        let permit = Arc::clone(&self.connection_semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ServerError::Shutdown)?;

        let (stream, _addr) = self.listener.accept().await?;
        debug!("accepted connection");

        Ok(Connection {
            stream,
            timeout: self.config.connection_timeout,
            _permit: permit,
        })
    }

    /// Accept loop; each connection runs on its own task.
    pub async fn run<F, Fut>(&self, handler: F) -> ServerResult<()>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        loop {
            match self.accept().await {
                Ok(connection) => {
                    tokio::spawn(handler(connection));
                }
                Err(ServerError::Shutdown) => return Ok(()),
                Err(e) => error!(error = %e, "failed to accept connection"),
            }
        }
    }

    pub async fn run_until_shutdown<F, Fut, S>(&self, handler: F, shutdown: S) -> ServerResult<()>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
        S: std::future::Future<Output = ()> + Send,
    {
        tokio::select! {
            result = self.run(handler) => result,
            _ = shutdown => {
                info!("shutdown signal received");
                Ok(())
            }
        }
    }
}

impl Drop for SocketServer {
    fn drop(&mut self) {
        let path = &self.config.socket_path;
        if path.exists() {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed socket file"),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove socket file"),
            }
        }
    }
}

pub struct Connection {
    stream: UnixStream,
    timeout: Duration,
    _permit: OwnedSemaphorePermit,
}

impl Connection {
    /// Reads one request envelope; `Ok(None)` on a clean disconnect.
    pub async fn read_request(&mut self) -> ServerResult<Option<Envelope<Request>>> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        match tokio::time::timeout(self.timeout, self.stream.read_exact(&mut header)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(timeout("read request length")),
        }

        let len = frame_len(header)?;
        let mut payload = vec![0u8; len];
        match tokio::time::timeout(self.timeout, self.stream.read_exact(&mut payload)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(timeout("read request payload")),
        }

        let envelope: Envelope<Request> =
            serde_json::from_slice(&payload).map_err(ProtocolError::from)?;
        Ok(Some(envelope))
    }

    pub async fn write_response(&mut self, envelope: &Envelope<Response>) -> ServerResult<()> {
        let frame = encode_message(envelope)?;
        self.write_frame(&frame).await
    }

    /// Sends `response` tagged with `request_id`.
    ///
    /// A response that does not fit in one frame is replaced by an
    /// `InternalError` reply carrying the same request id, so the client
    /// gets an answer instead of a dropped connection.
    pub async fn respond(
        &mut self,
        request_id: impl Into<String>,
        response: Response,
    ) -> ServerResult<()> {
        let envelope = Envelope::response(request_id, response);
        let frame = match encode_message(&envelope) {
            Err(ProtocolError::MessageTooLarge { size, max }) => {
                warn!(size, max, "response exceeds frame limit");
                let error = Response::error(
                    ErrorCode::InternalError,
                    format!("response of {size} bytes exceeds the {max} byte message limit"),
                );
                encode_message(&Envelope::response(envelope.request_id, error))?
            }
            other => other?,
        };
        self.write_frame(&frame).await
    }

    async fn write_frame(&mut self, frame: &[u8]) -> ServerResult<()> {
        match tokio::time::timeout(self.timeout, self.stream.write_all(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(timeout("write response")),
        }
    }
}

fn timeout(operation: &str) -> ServerError {
    ServerError::Protocol(ProtocolError::Timeout {
        operation: operation.to_string(),
    })
}
