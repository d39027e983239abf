//! Client and daemon configuration.
//!
//! One `config.toml`, by default at `~/.config/albumsync/config.toml`, is read
//! by both the CLI and `albumsync server`. Every section is optional:
//!
//! ```toml
//! mode = "demo"
//!
//! [browse]
//! page_size = 20
//! bulk_delay_ms = 500
//!
//! [store]
//! backend = "sqlite"
//! path = "~/.local/share/albumsync/albums.db"
//!
//! [demo]
//! catalog_size = 48
//! # cover_base = "http://localhost:8000/covers"
//!
//! [google]
//! client_id = "env::GOOGLE_CLIENT_ID"
//! client_secret = "pass::google/albumsync"
//! ```
//!
//! Paths may start with `~/`. Credential values accept the references
//! described in [`crate::secret`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use albumsync_core::SourceMode;
use albumsync_providers::MAX_PAGE_SIZE;
use albumsync_providers::demo::DEFAULT_CATALOG_SIZE;
use albumsync_server::{DEFAULT_PAGE_SIZE, ServerConfig, default_socket_path};
use serde::{Deserialize, Serialize};

use crate::driver::DriverConfig;
use crate::error::{ClientError, ClientResult};

pub const DEFAULT_BULK_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Album source the daemon serves.
    pub mode: SourceMode,

    pub browse: BrowseSettings,

    pub server: ServerSettings,

    pub store: StoreSettings,

    pub demo: DemoSettings,

    #[cfg(feature = "google")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google: Option<GoogleSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseSettings {
    pub page_size: u32,
    /// Pause between consecutive imports of a bulk import.
    pub bulk_delay_ms: u64,
}

impl Default for BrowseSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            bulk_delay_ms: DEFAULT_BULK_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,

    /// Seconds; applies to the client request and to each daemon frame.
    pub timeout: u64,

    pub max_connections: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            socket_path: None,
            timeout: 30,
            max_connections: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    /// Nothing survives a daemon restart.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,

    /// SQLite database file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Directory cover images are written into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_dir: Option<PathBuf>,

    pub fetch_covers: bool,

    /// Seconds allowed for one cover download.
    pub cover_timeout: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: None,
            media_dir: None,
            fetch_covers: true,
            cover_timeout: albumsync_providers::covers::DEFAULT_COVER_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    pub catalog_size: usize,

    /// Image host for demo covers, e.g. `http://localhost:8000/covers`. Demo
    /// albums have no covers, and demo mode makes no network requests, unless
    /// this is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_base: Option<String>,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            catalog_size: DEFAULT_CATALOG_SIZE,
            cover_base: None,
        }
    }
}

impl ClientConfig {
    /// Reads the default config file, falling back to defaults when absent.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ClientResult<Self> {
        toml::from_str(content)
            .map_err(|e| ClientError::config(format!("failed to parse config: {e}")))
    }

    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("albumsync")
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("albumsync")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.server
            .socket_path
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(default_socket_path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout)
    }

    pub fn store_path(&self) -> PathBuf {
        self.store
            .path
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| Self::default_data_dir().join("albums.db"))
    }

    pub fn media_dir(&self) -> PathBuf {
        self.store
            .media_dir
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| Self::default_data_dir().join("covers"))
    }

    pub fn cover_timeout(&self) -> Duration {
        Duration::from_secs(self.store.cover_timeout)
    }

    /// Longest the daemon may work on one import before replying: the
    /// upstream album lookup plus, when enabled, the cover download.
    ///
    /// Clients add this to their own timeout when waiting for an import.
    pub fn daemon_import_budget(&self) -> Duration {
        let mut budget = Duration::ZERO;
        if self.mode == SourceMode::Live {
            budget += live_lookup_budget();
        }
        if self.store.fetch_covers {
            budget += self.cover_timeout();
        }
        budget
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig::default()
            .with_page_size(self.browse.page_size)
            .with_bulk_delay(Duration::from_millis(self.browse.bulk_delay_ms))
    }

    pub fn server_config(&self, socket_path: impl Into<PathBuf>) -> ServerConfig {
        ServerConfig::new(socket_path)
            .with_connection_timeout(self.timeout())
            .with_max_connections(self.server.max_connections)
            .with_default_page_size(self.browse.page_size)
    }

    /// Checks ranges and, in live mode, that Google credentials resolve.
    pub fn validate(&self) -> ClientResult<()> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.browse.page_size) {
            return Err(ClientError::config(format!(
                "browse.page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.browse.page_size
            )));
        }
        if self.server.timeout == 0 {
            return Err(ClientError::config("server.timeout must be at least 1 second"));
        }
        if self.server.max_connections == 0 {
            return Err(ClientError::config("server.max_connections must be at least 1"));
        }
        if self.demo.catalog_size == 0 {
            return Err(ClientError::config("demo.catalog_size must be at least 1"));
        }
        if self.store.fetch_covers && self.store.cover_timeout == 0 {
            return Err(ClientError::config("store.cover_timeout must be at least 1 second"));
        }

        if self.mode == SourceMode::Live {
            #[cfg(feature = "google")]
            match self.google.as_ref() {
                Some(google) => {
                    google.resolve_credentials()?;
                }
                None => {
                    return Err(ClientError::config(
                        "mode is \"live\" but config.toml has no [google] section",
                    ));
                }
            }
            #[cfg(not(feature = "google"))]
            return Err(ClientError::config(
                "mode is \"live\" but albumsync was built without the google feature",
            ));
        }
        Ok(())
    }
}

/// A live lookup may refresh an expired token, call the API, then refresh and
/// retry once after a rejection: four requests at most.
#[cfg(feature = "google")]
fn live_lookup_budget() -> Duration {
    Duration::from_secs(albumsync_providers::google::GoogleConfig::DEFAULT_TIMEOUT_SECS) * 4
}

#[cfg(not(feature = "google"))]
fn live_lookup_budget() -> Duration {
    Duration::ZERO
}

/// Replaces a leading `~/` with the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

/// `[google]` section.
#[cfg(feature = "google")]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleSettings {
    /// Accepts `pass::` and `env::` references.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Accepts `pass::` and `env::` references.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Console-downloaded credentials JSON, used when the inline pair is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_path: Option<PathBuf>,

    /// Longest edge, in pixels, requested for cover images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_size: Option<u32>,
}

#[cfg(feature = "google")]
impl GoogleSettings {
    pub fn to_provider_config(&self) -> ClientResult<albumsync_providers::google::GoogleConfig> {
        use albumsync_providers::google::GoogleConfig;

        let mut config = GoogleConfig::new(self.resolve_credentials()?);
        if let Some(path) = &self.token_path {
            config = config.with_token_path(expand_home(path));
        }
        if let Some(size) = self.cover_size {
            config = config.with_cover_size(size);
        }
        config
            .validate()
            .map_err(|e| ClientError::config(format!("invalid Google configuration: {e}")))?;
        Ok(config)
    }

    /// Inline `client_id`/`client_secret` first, then `credentials_file`.
    pub fn resolve_credentials(&self) -> ClientResult<albumsync_providers::google::OAuthCredentials> {
        use albumsync_providers::google::OAuthCredentials;

        let credentials = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => {
                let id = crate::secret::resolve(id)
                    .map_err(|e| ClientError::config(format!("client_id: {e}")))?;
                let secret = crate::secret::resolve(secret)
                    .map_err(|e| ClientError::config(format!("client_secret: {e}")))?;
                OAuthCredentials::new(id, secret)
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(ClientError::config(
                    "[google] needs both client_id and client_secret",
                ));
            }
            (None, None) => match &self.credentials_file {
                Some(path) => OAuthCredentials::from_file(expand_home(path))
                    .map_err(|e| ClientError::config(e.to_string()))?,
                None => {
                    return Err(ClientError::config(format!(
                        "Google credentials not found. Add to {}:\n  \
                         [google]\n  \
                         client_id = \"YOUR_ID.apps.googleusercontent.com\"\n  \
                         client_secret = \"YOUR_SECRET\"\n\n  \
                         Or run: albumsync auth google --credentials-file <path>",
                        ClientConfig::default_path().display()
                    )));
                }
            },
        };

        credentials
            .validate()
            .map_err(|e| ClientError::config(format!("invalid Google credentials: {e}")))?;
        Ok(credentials)
    }
}
