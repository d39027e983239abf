//! `albumsync browse`.

use serde_json::json;

use crate::cli::{BrowseArgs, Cli};
use crate::config::ClientConfig;
use crate::driver::{PageOutcome, PaginationDriver};
use crate::error::{ClientError, ClientResult};
use crate::gateway::AlbumGateway;
use crate::render;

use super::{cancel_on_ctrl_c, print_problems, socket_client};

pub async fn run(cli: &Cli, config: &ClientConfig, args: &BrowseArgs) -> ClientResult<()> {
    let mut driver_config = config.driver_config();
    if let Some(size) = args.page_size {
        driver_config = driver_config.with_page_size(size);
    }
    let driver = PaginationDriver::new(socket_client(cli, config), driver_config);
    let limit = (!args.all).then_some(args.pages.max(1));

    let outcome = cancel_on_ctrl_c(&driver, load_pages(&driver, limit)).await;
    let albums = driver.albums();
    if let PageOutcome::Failed(message) = &outcome
        && albums.is_empty()
    {
        return Err(ClientError::Browse(message.clone()));
    }

    if args.json {
        let body = json!({
            "albums": albums,
            "has_more": driver.has_more(),
            "cancelled": outcome == PageOutcome::Cancelled,
        });
        println!("{}", serde_json::to_string_pretty(&body).map_err(|e| {
            ClientError::Protocol(format!("failed to serialize albums: {e}"))
        })?);
    } else {
        print!("{}", render::album_table(&albums));
        if driver.has_more() {
            println!(
                "{} album(s) shown, more available (use --pages N or --all)",
                albums.len()
            );
        }
    }
    print_problems(&driver);
    Ok(())
}

/// Loads the first page, then further pages until `limit` pages are applied
/// or the session stops. Returns the last outcome.
pub(crate) async fn load_pages<G: AlbumGateway>(
    driver: &PaginationDriver<G>,
    limit: Option<usize>,
) -> PageOutcome {
    let mut outcome = driver.start().await;
    while matches!(outcome, PageOutcome::Applied { has_more: true, .. })
        && limit.is_none_or(|max| driver.pages_loaded() < max)
    {
        outcome = driver.load_more().await;
    }
    outcome
}
