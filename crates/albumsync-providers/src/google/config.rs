//! Google Photos source configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};

/// OAuth client registered in the Google Cloud console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// `client_secret_*.json` as downloaded from the console, either nested
/// under `installed`/`web` or flat.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to read credentials file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&content)
    }

    /// Accepts the `installed` or `web` layouts of a downloaded client
    /// secret file, or a flat `client_id`/`client_secret` object.
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let file: CredentialsFile = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration(format!("failed to parse credentials JSON: {e}"))
        })?;

        if let Some(section) = file.installed.or(file.web) {
            return Ok(Self::new(section.client_id, section.client_secret));
        }
        match (file.client_id, file.client_secret) {
            (Some(id), Some(secret)) => Ok(Self::new(id, secret)),
            _ => Err(ProviderError::configuration(
                "credentials JSON needs an 'installed' or 'web' section, or top-level client_id and client_secret",
            )),
        }
    }

    pub fn validate(&self) -> ProviderResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(ProviderError::configuration("client_id is required"));
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err(ProviderError::configuration(
                "client_id should end with .apps.googleusercontent.com",
            ));
        }
        if self.client_secret.trim().is_empty() {
            return Err(ProviderError::configuration("client_secret is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub credentials: OAuthCredentials,
    /// Where the OAuth token set is persisted.
    pub token_path: PathBuf,
    /// Photos Library API root, overridable for tests.
    pub api_base: String,
    /// Per-request timeout for API calls.
    pub timeout: Duration,
    pub user_agent: String,
    /// Inclusive port range tried for the OAuth loopback redirect.
    pub loopback_port_range: (u16, u16),
    pub scopes: Vec<String>,
    /// Edge length requested for cover downloads, in pixels.
    pub cover_size: u32,
}

impl GoogleConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_API_BASE: &'static str = "https://photoslibrary.googleapis.com/v1";
    pub const PHOTOS_READONLY_SCOPE: &'static str =
        "https://www.googleapis.com/auth/photoslibrary.readonly";
    pub const DEFAULT_COVER_SIZE: u32 = 1024;

    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            credentials,
            token_path: Self::default_token_path(),
            api_base: Self::DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("albumsync/{}", env!("CARGO_PKG_VERSION")),
            loopback_port_range: (8080, 8090),
            scopes: vec![Self::PHOTOS_READONLY_SCOPE.to_string()],
            cover_size: Self::DEFAULT_COVER_SIZE,
        }
    }

    /// `$XDG_DATA_HOME/albumsync/google-tokens.json` or the platform equivalent.
    pub fn default_token_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("albumsync")
            .join("google-tokens.json")
    }

    #[must_use]
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_loopback_port_range(mut self, start: u16, end: u16) -> Self {
        self.loopback_port_range = (start, end);
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn with_cover_size(mut self, size: u32) -> Self {
        self.cover_size = size;
        self
    }

    pub fn validate(&self) -> ProviderResult<()> {
        self.credentials.validate()?;
        if self.scopes.is_empty() {
            return Err(ProviderError::configuration(
                "at least one OAuth scope is required",
            ));
        }
        if self.loopback_port_range.0 > self.loopback_port_range.1 {
            return Err(ProviderError::configuration("invalid loopback port range"));
        }
        if url::Url::parse(&self.api_base).is_err() {
            return Err(ProviderError::configuration(format!(
                "invalid API base URL: {}",
                self.api_base
            )));
        }
        if self.cover_size == 0 {
            return Err(ProviderError::configuration("cover size must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> OAuthCredentials {
        OAuthCredentials::new("test-client.apps.googleusercontent.com", "test-secret")
    }

    #[test]
    fn credential_checks() {
        assert!(credentials().validate().is_ok());
        assert!(OAuthCredentials::new("", "s").validate().is_err());
        assert!(OAuthCredentials::new("bad-id", "s").validate().is_err());
        assert!(
            OAuthCredentials::new("x.apps.googleusercontent.com", " ")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn defaults_request_photos_readonly() {
        let config = GoogleConfig::new(credentials());
        assert_eq!(config.scopes, vec![GoogleConfig::PHOTOS_READONLY_SCOPE]);
        assert_eq!(config.api_base, GoogleConfig::DEFAULT_API_BASE);
        assert!(config.token_path.ends_with("albumsync/google-tokens.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn api_base_trailing_slash_trimmed() {
        let config = GoogleConfig::new(credentials()).with_api_base("http://127.0.0.1:9999/v1/");
        assert_eq!(config.api_base, "http://127.0.0.1:9999/v1");
    }

    #[test]
    fn invalid_settings_rejected() {
        assert!(GoogleConfig::new(credentials()).with_scopes(vec![]).validate().is_err());
        assert!(
            GoogleConfig::new(credentials())
                .with_loopback_port_range(9000, 8000)
                .validate()
                .is_err()
        );
        assert!(GoogleConfig::new(credentials()).with_cover_size(0).validate().is_err());
    }

    #[test]
    fn credentials_json_formats() {
        let nested = r#"{"installed":{"client_id":"a.apps.googleusercontent.com","client_secret":"s","project_id":"p"}}"#;
        assert_eq!(
            OAuthCredentials::from_json(nested).unwrap().client_id,
            "a.apps.googleusercontent.com"
        );

        let web = r#"{"web":{"client_id":"w.apps.googleusercontent.com","client_secret":"ws"}}"#;
        assert_eq!(OAuthCredentials::from_json(web).unwrap().client_secret, "ws");

        let flat = r#"{"client_id":"f.apps.googleusercontent.com","client_secret":"fs","refresh_token":"r"}"#;
        assert_eq!(OAuthCredentials::from_json(flat).unwrap().client_secret, "fs");
    }

    #[test]
    fn credentials_json_errors() {
        let err = OAuthCredentials::from_json(r#"{"other":{}}"#).unwrap_err();
        assert!(err.message().contains("client_id"));

        let err = OAuthCredentials::from_json("not json").unwrap_err();
        assert!(err.message().contains("parse"));
    }
}
