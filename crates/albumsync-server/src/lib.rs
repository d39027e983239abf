//! albumsync daemon: album stores, import reconciliation, request handling
//! and the Unix socket server.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use albumsync_providers::DemoSource;
//! use albumsync_server::{
//!     ImportReconciler, MediaLibrary, MemoryAlbumStore, RequestHandler, ServerConfig,
//!     SignalHandler, SocketServer, make_connection_handler, new_shared_state,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let reconciler = Arc::new(ImportReconciler::new(
//!         Arc::new(MemoryAlbumStore::new()),
//!         MediaLibrary::new("/tmp/albumsync-covers"),
//!     ));
//!     let signals = SignalHandler::new();
//!     let handler = RequestHandler::new(
//!         new_shared_state(),
//!         Arc::new(DemoSource::default()),
//!         reconciler,
//!         config.default_page_size,
//!     )
//!     .with_shutdown_handle(signals.shutdown_handle());
//!
//!     let server = SocketServer::new(config).await?;
//!     signals.spawn_listener();
//!     server
//!         .run_until_shutdown(make_connection_handler(handler), signals.shutdown().wait())
//!         .await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod handler;
mod media;
mod reconciler;
mod signals;
mod socket;
pub mod store;

pub use config::{DEFAULT_PAGE_SIZE, ServerConfig, default_socket_path};
pub use error::{ServerError, ServerResult, provider_error_response};
pub use handler::{RequestHandler, ServerState, SharedState, make_connection_handler, new_shared_state};
pub use media::MediaLibrary;
pub use reconciler::{ImportOutcome, ImportReconciler};
pub use signals::{ShutdownHandle, ShutdownSignal, SignalHandler};
pub use socket::{Connection, SocketServer};
pub use store::{
    AlbumStore, CreateOutcome, MemoryAlbumStore, NewAlbum, SqliteAlbumStore, StoreError,
    StoreResult,
};
