//! The `albumsync` command-line client.
//!
//! - [`PaginationDriver`] runs one browse/import session against an
//!   [`AlbumGateway`]
//! - [`SocketClient`] is the gateway that talks to the daemon
//! - [`commands`] holds one module per subcommand, `server` included

pub mod cli;
pub mod commands;
pub mod config;
pub mod driver;
pub mod error;
pub mod gateway;
pub mod render;
pub mod secret;
pub mod socket;

pub use cli::Cli;
pub use driver::{BulkFailure, BulkSummary, DriverConfig, DriverState, PageOutcome, PaginationDriver};
pub use error::{ClientError, ClientResult};
pub use gateway::AlbumGateway;
pub use socket::SocketClient;
