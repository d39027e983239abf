//! `albumsync list`.

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::render;

use super::socket_client;

/// Prints the daemon's imported records as a table or JSON.
pub async fn run(cli: &Cli, config: &ClientConfig, json: bool) -> ClientResult<()> {
    let albums = socket_client(cli, config).list_imported().await?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&albums).map_err(|e| {
                ClientError::Protocol(format!("failed to serialize albums: {e}"))
            })?
        );
    } else {
        print!("{}", render::imported_table(&albums));
    }
    Ok(())
}
