//! Persisted OAuth token set.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

/// Access tokens count as expired this long before Google says they are.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
    pub last_refresh: DateTime<Utc>,
}

fn expiry_from(expires_in_secs: Option<i64>) -> Option<DateTime<Utc>> {
    expires_in_secs
        .map(|secs| Utc::now() + Duration::seconds(secs) - Duration::seconds(EXPIRY_MARGIN_SECS))
}

impl TokenInfo {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expiry_from(expires_in_secs),
            scopes,
            last_refresh: Utc::now(),
        }
    }

    /// Tokens without an expiry never expire.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Usable now, or renewable without user interaction.
    pub fn is_usable(&self) -> bool {
        !self.is_expired() || self.refresh_token.is_some()
    }

    /// Applies a refresh response. Google may rotate the refresh token.
    pub fn refreshed(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
        rotated_refresh_token: Option<String>,
    ) {
        self.access_token = access_token.into();
        self.expires_at = expiry_from(expires_in_secs);
        if let Some(refresh) = rotated_refresh_token {
            self.refresh_token = Some(refresh);
        }
        self.last_refresh = Utc::now();
    }
}

/// File-backed token store with an in-memory copy.
///
/// Writes go to a sibling temp file that is then renamed over the target,
/// and the file is readable by the owner only.
#[derive(Debug)]
pub struct TokenStorage {
    path: PathBuf,
    tokens: RwLock<Option<TokenInfo>>,
}

impl TokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tokens: RwLock::new(None),
        }
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Option<TokenInfo>> {
        self.tokens.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Option<TokenInfo>> {
        self.tokens.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns `Ok(false)` when no token file exists yet.
    pub fn load(&self) -> ProviderResult<bool> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no token file");
            return Ok(false);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to read token file: {e}")).with_source(e)
        })?;
        let tokens: TokenInfo = serde_json::from_str(&content).map_err(|e| {
            ProviderError::configuration(format!("failed to parse token file: {e}"))
        })?;

        info!(path = %self.path.display(), "loaded Google tokens");
        *self.write_guard() = Some(tokens);
        Ok(true)
    }

    fn persist(&self, tokens: &TokenInfo) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::configuration(format!("failed to create token directory: {e}"))
            })?;
        }

        let content = serde_json::to_string_pretty(tokens)
            .map_err(|e| ProviderError::internal(format!("failed to serialize tokens: {e}")))?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content).map_err(|e| {
            ProviderError::configuration(format!("failed to write token file: {e}"))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600)).map_err(|e| {
                ProviderError::configuration(format!("failed to restrict token file: {e}"))
            })?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to replace token file: {e}"))
        })?;
        debug!(path = %self.path.display(), "saved Google tokens");
        Ok(())
    }

    pub fn get(&self) -> Option<TokenInfo> {
        self.read_guard().clone()
    }

    /// Persists `tokens` first; memory is only updated once the write succeeds.
    pub fn set(&self, tokens: TokenInfo) -> ProviderResult<()> {
        self.persist(&tokens)?;
        *self.write_guard() = Some(tokens);
        Ok(())
    }

    /// Applies a refresh to the stored set and persists it.
    pub fn apply_refresh(
        &self,
        access_token: &str,
        expires_in_secs: Option<i64>,
        rotated_refresh_token: Option<String>,
    ) -> ProviderResult<TokenInfo> {
        let mut updated = self
            .get()
            .ok_or_else(|| ProviderError::internal("no tokens to update"))?;
        updated.refreshed(access_token, expires_in_secs, rotated_refresh_token);
        self.set(updated.clone())?;
        Ok(updated)
    }

    /// Forgets the tokens and deletes the file.
    pub fn clear(&self) -> ProviderResult<()> {
        *self.write_guard() = None;
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                ProviderError::configuration(format!("failed to remove token file: {e}"))
            })?;
            info!(path = %self.path.display(), "cleared Google tokens");
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// No tokens, a missing scope, or an expired token with nothing to
    /// refresh it with.
    pub fn needs_reauth(&self, required_scopes: &[String]) -> bool {
        self.read_guard()
            .as_ref()
            .is_none_or(|t| !t.has_scopes(required_scopes) || !t.is_usable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes() -> Vec<String> {
        vec!["https://www.googleapis.com/auth/photoslibrary.readonly".to_string()]
    }

    #[test]
    fn fresh_token_is_not_expired() {
        let token = TokenInfo::new("a", Some("r".into()), Some(3600), scopes());
        assert!(!token.is_expired());
        assert!(token.is_usable());
    }

    #[test]
    fn expiry_margin_applies() {
        let token = TokenInfo::new("a", None, Some(30), scopes());
        assert!(token.is_expired());
        assert!(!token.is_usable());
    }

    #[test]
    fn token_without_expiry_never_expires() {
        let token = TokenInfo::new("a", None, None, vec![]);
        assert!(!token.is_expired());
    }

    #[test]
    fn refresh_keeps_refresh_token_unless_rotated() {
        let mut token = TokenInfo::new("old", Some("r1".into()), Some(0), scopes());
        token.refreshed("new", Some(3600), None);
        assert_eq!(token.access_token, "new");
        assert_eq!(token.refresh_token.as_deref(), Some("r1"));
        assert!(!token.is_expired());

        token.refreshed("newer", Some(3600), Some("r2".into()));
        assert_eq!(token.refresh_token.as_deref(), Some("r2"));
    }

    #[test]
    fn storage_roundtrip_via_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tokens.json");
        let storage = TokenStorage::new(&path);
        storage
            .set(TokenInfo::new("access", Some("refresh".into()), Some(3600), scopes()))
            .unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reopened = TokenStorage::new(&path);
        assert!(reopened.load().unwrap());
        assert_eq!(reopened.get().unwrap().access_token, "access");
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let storage = TokenStorage::new(&path);
        storage.set(TokenInfo::new("a", None, None, vec![])).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn apply_refresh_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let storage = TokenStorage::new(&path);
        assert!(storage.apply_refresh("x", None, None).is_err());

        storage
            .set(TokenInfo::new("old", Some("r".into()), Some(0), scopes()))
            .unwrap();
        storage.apply_refresh("new", Some(3600), None).unwrap();

        let reopened = TokenStorage::new(&path);
        reopened.load().unwrap();
        assert_eq!(reopened.get().unwrap().access_token, "new");
    }

    #[test]
    fn missing_file_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let storage = TokenStorage::new(&path);
        assert!(!storage.load().unwrap());
        assert!(storage.needs_reauth(&scopes()));

        storage.set(TokenInfo::new("a", None, None, scopes())).unwrap();
        assert!(!storage.needs_reauth(&scopes()));
        assert!(storage.needs_reauth(&["other".to_string()]));

        storage.clear().unwrap();
        assert!(!path.exists());
        assert!(storage.get().is_none());
    }
}
