//! Google Photos album source.
//!
//! Authorization is the installed-app OAuth flow: the user registers an
//! OAuth client, `albumsync auth google` runs the PKCE loopback flow once,
//! and the resulting refresh token is kept in the token file. At runtime
//! [`GooglePhotosSource`] refreshes the access token when it is known to be
//! expired, and once more whenever the API answers 401.
//!
//! ```ignore
//! use albumsync_providers::google::{GoogleConfig, GooglePhotosSource, OAuthCredentials};
//!
//! let config = GoogleConfig::new(OAuthCredentials::new(id, secret));
//! let source = GooglePhotosSource::new(config)?;
//! let page = source.list_albums(None, 20).await?;
//! ```

mod client;
mod config;
mod oauth;
mod provider;
mod tokens;

pub use client::PhotosApiClient;
pub use config::{GoogleConfig, OAuthCredentials};
pub use oauth::{OAuthClient, PkceFlow, RefreshedToken};
pub use provider::GooglePhotosSource;
pub use tokens::{TokenInfo, TokenStorage};
