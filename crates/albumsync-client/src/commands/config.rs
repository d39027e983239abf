//! `albumsync config`.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Prints the effective configuration, defaults filled in.
pub fn dump(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    let text = toml::to_string_pretty(config)
        .map_err(|e| ClientError::config(format!("failed to serialize config: {e}")))?;
    println!("# {}", path.display());
    println!("{text}");
    Ok(())
}

pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    config.validate()?;

    #[cfg(feature = "google")]
    if config.mode != albumsync_core::SourceMode::Live
        && let Some(google) = &config.google
        && (google.client_id.is_some() || google.credentials_file.is_some())
    {
        google.resolve_credentials()?;
        println!("Google credentials resolve.");
    }

    println!("Configuration is valid.");
    Ok(())
}

pub fn path(path: &Path) -> ClientResult<()> {
    println!("config: {}", path.display());
    println!("data:   {}", ClientConfig::default_data_dir().display());
    Ok(())
}
