//! `albumsync status` and `albumsync stop`.

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::render;

use super::socket_client;

pub async fn run(cli: &Cli, config: &ClientConfig, json: bool) -> ClientResult<()> {
    let info = socket_client(cli, config).status().await?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&info).map_err(|e| {
                ClientError::Protocol(format!("failed to serialize status: {e}"))
            })?
        );
    } else {
        print!("{}", render::status(&info));
    }
    Ok(())
}

/// Returns once the daemon has acknowledged; it may still be draining
/// connections.
pub async fn stop(cli: &Cli, config: &ClientConfig) -> ClientResult<()> {
    let client = socket_client(cli, config);
    client.shutdown().await?;
    println!("Daemon at {} is shutting down.", client.socket_path().display());
    Ok(())
}
