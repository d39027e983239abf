//! albumsync CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use albumsync_client::cli::{AuthProvider, Cli, Command, ConfigAction};
use albumsync_client::commands;
use albumsync_client::config::ClientConfig;
use albumsync_client::error::ClientResult;
use albumsync_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing = match (&cli.command, cli.debug) {
        (Command::Server, true) => TracingConfig::daemon().with_level(tracing::Level::DEBUG),
        (Command::Server, false) => TracingConfig::daemon(),
        (_, true) => TracingConfig::cli_debug(),
        (_, false) => TracingConfig::cli(),
    };
    if let Err(e) = init_tracing(tracing) {
        eprintln!("warning: {e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
    let config = if cli.config.is_some() {
        ClientConfig::load_from(&config_path)?
    } else {
        ClientConfig::load()?
    };

    match &cli.command {
        Command::Server => commands::server::run(&cli, &config).await,
        Command::Auth { provider } => match provider {
            #[cfg(feature = "google")]
            AuthProvider::Google {
                client_id,
                client_secret,
                credentials_file,
                force,
            } => {
                commands::auth::google(
                    client_id.clone(),
                    client_secret.clone(),
                    credentials_file.clone(),
                    *force,
                    &config,
                    &config_path,
                )
                .await
            }
            #[cfg(not(feature = "google"))]
            _ => Err(albumsync_client::error::ClientError::config(
                "albumsync was built without the google feature",
            )),
        },
        Command::Browse(args) => commands::browse::run(&cli, &config, args).await,
        Command::Import(args) => commands::import::run(&cli, &config, args).await,
        Command::List { json } => commands::list::run(&cli, &config, *json).await,
        Command::Status { json } => commands::status::run(&cli, &config, *json).await,
        Command::Stop => commands::status::stop(&cli, &config).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config_path),
        },
    }
}
