//! Daemon configuration.

use std::path::PathBuf;
use std::time::Duration;

use albumsync_providers::MAX_PAGE_SIZE;

use crate::error::{ServerError, ServerResult};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Listener settings for [`crate::SocketServer`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    /// Applies to each frame read or write on a connection.
    pub connection_timeout: Duration,
    /// Connections beyond this wait for a free slot.
    pub max_connections: usize,
    /// Remove a socket file left behind by a dead daemon.
    pub cleanup_stale_socket: bool,
    /// Used when a fetch request carries no page size.
    pub default_page_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            connection_timeout: Duration::from_secs(30),
            max_connections: 100,
            cleanup_stale_socket: true,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Default::default()
        }
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_cleanup_stale_socket(mut self, cleanup: bool) -> Self {
        self.cleanup_stale_socket = cleanup;
        self
    }

    pub fn with_default_page_size(mut self, size: u32) -> Self {
        self.default_page_size = size;
        self
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.max_connections == 0 {
            return Err(ServerError::config("max_connections must be at least 1"));
        }
        if self.connection_timeout.is_zero() {
            return Err(ServerError::config("connection timeout must be positive"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.default_page_size) {
            return Err(ServerError::config(format!(
                "default page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }
}

/// `$XDG_RUNTIME_DIR/albumsync.sock`, else `/tmp/albumsync-$UID.sock`.
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("albumsync.sock")
    } else {
        #[cfg(unix)]
        let uid = unsafe { libc::getuid() };
        #[cfg(not(unix))]
        let uid = 0;
        PathBuf::from(format!("/tmp/albumsync-{uid}.sock"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        assert_eq!(config.connection_timeout, Duration::from_secs(30));
        assert_eq!(config.default_page_size, DEFAULT_PAGE_SIZE);
        assert!(config.cleanup_stale_socket);
        config.validate().unwrap();
    }

    #[test]
    fn builder_overrides() {
        let config = ServerConfig::new("/custom/path.sock")
            .with_connection_timeout(Duration::from_secs(5))
            .with_max_connections(4)
            .with_cleanup_stale_socket(false)
            .with_default_page_size(50);

        assert_eq!(config.socket_path, PathBuf::from("/custom/path.sock"));
        assert_eq!(config.max_connections, 4);
        assert!(!config.cleanup_stale_socket);
        config.validate().unwrap();
    }

    #[test]
    fn page_size_out_of_range_is_rejected() {
        assert!(ServerConfig::default().with_default_page_size(0).validate().is_err());
        assert!(ServerConfig::default().with_default_page_size(51).validate().is_err());
        assert!(ServerConfig::default().with_max_connections(0).validate().is_err());
    }

    #[test]
    fn default_socket_path_format() {
        let path = default_socket_path();
        let path = path.to_string_lossy();
        assert!(path.contains("albumsync"));
        assert!(path.ends_with(".sock"));
    }
}
