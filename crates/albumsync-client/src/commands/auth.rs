//! `albumsync auth google`.

use std::path::{Path, PathBuf};

use albumsync_providers::google::{GooglePhotosSource, OAuthCredentials};
use tracing::{info, warn};

use crate::config::{ClientConfig, GoogleSettings};
use crate::error::{ClientError, ClientResult};

/// Where the credentials came from.
#[derive(Debug, PartialEq, Eq)]
enum CredentialSource {
    /// `--client-id`/`--client-secret` or `--credentials-file`.
    Cli,
    /// Already in config.toml.
    Config,
}

/// Runs the PKCE loopback flow for the read-only Photos scope.
///
/// Credentials given on the command line are written into the `[google]`
/// section of `config_path` so the daemon finds them.
pub async fn google(
    client_id: Option<String>,
    client_secret: Option<String>,
    credentials_file: Option<PathBuf>,
    force: bool,
    config: &ClientConfig,
    config_path: &Path,
) -> ClientResult<()> {
    let settings = config.google.clone().unwrap_or_default();
    let (credentials, source) =
        resolve_google_credentials(client_id, client_secret, credentials_file, &settings)?;

    let mut settings_for_source = settings;
    settings_for_source.client_id = Some(credentials.client_id.clone());
    settings_for_source.client_secret = Some(credentials.client_secret.clone());
    let photos = GooglePhotosSource::new(settings_for_source.to_provider_config()?)?;

    if source == CredentialSource::Cli {
        match persist_credentials(config_path, &credentials) {
            Ok(()) => println!("Credentials saved to {}", config_path.display()),
            Err(e) => warn!(error = %e, "could not save credentials to config.toml"),
        }
    }

    if !photos.needs_reauth() && !force {
        println!("Already authorized with Google Photos.");
        println!("Use --force to authorize again.");
        return Ok(());
    }

    println!("Starting Google Photos authorization...");
    println!();
    println!("A browser window will open to grant read-only access to your albums.");
    println!("If it does not, open the URL printed below.");
    println!();

    photos.authenticate().await?;

    info!("Google Photos authorization complete");
    println!();
    println!("Authorization successful, tokens saved.");
    if config.mode != albumsync_core::SourceMode::Live {
        println!("Set mode = \"live\" in config.toml to browse your own albums.");
    }
    Ok(())
}

/// Priority: `--client-id` + `--client-secret`, then `--credentials-file`,
/// then the `[google]` section.
fn resolve_google_credentials(
    cli_client_id: Option<String>,
    cli_client_secret: Option<String>,
    cli_credentials_file: Option<PathBuf>,
    settings: &GoogleSettings,
) -> ClientResult<(OAuthCredentials, CredentialSource)> {
    match (cli_client_id, cli_client_secret) {
        (Some(id), Some(secret)) => {
            return Ok((OAuthCredentials::new(id, secret), CredentialSource::Cli));
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(ClientError::config(
                "both --client-id and --client-secret are required when passing credentials directly",
            ));
        }
        (None, None) => {}
    }

    if let Some(path) = cli_credentials_file {
        let credentials = OAuthCredentials::from_file(&path).map_err(|e| {
            ClientError::config(format!(
                "failed to load credentials from {}: {e}",
                path.display()
            ))
        })?;
        return Ok((credentials, CredentialSource::Cli));
    }

    if settings.client_id.is_some()
        || settings.client_secret.is_some()
        || settings.credentials_file.is_some()
    {
        return Ok((settings.resolve_credentials()?, CredentialSource::Config));
    }

    Err(ClientError::config(format!(
        "Google credentials are required. Provide them via:\n  \
         - client_id + client_secret in {}\n  \
         - --client-id and --client-secret\n  \
         - --credentials-file (JSON from Google Cloud Console)\n  \
         - GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET",
        ClientConfig::default_path().display()
    )))
}

/// Writes `client_id`/`client_secret` under `[google]`, keeping the rest of
/// the file, comments included.
fn persist_credentials(config_path: &Path, credentials: &OAuthCredentials) -> ClientResult<()> {
    let content = if config_path.exists() {
        std::fs::read_to_string(config_path)?
    } else {
        String::new()
    };

    let mut doc = content.parse::<toml_edit::DocumentMut>().map_err(|e| {
        ClientError::config(format!("could not parse {}: {e}", config_path.display()))
    })?;

    if !doc.contains_key("google") {
        doc["google"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    let google = doc["google"].as_table_mut().ok_or_else(|| {
        ClientError::config(format!("`google` in {} is not a table", config_path.display()))
    })?;
    google["client_id"] = toml_edit::value(credentials.client_id.as_str());
    google["client_secret"] = toml_edit::value(credentials.client_secret.as_str());

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(config_path, doc.to_string())?;
    info!(path = %config_path.display(), "credentials saved");
    Ok(())
}
