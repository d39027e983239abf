//! `albumsync import`.

use std::collections::HashSet;
use std::time::Duration;

use crate::cli::{Cli, ImportArgs};
use crate::config::ClientConfig;
use crate::driver::{PageOutcome, PaginationDriver};
use crate::error::{ClientError, ClientResult};
use crate::render;

use super::browse::load_pages;
use super::{cancel_on_ctrl_c, print_problems, socket_client};

/// Imports the given ids, or every album the source lists with `--all`.
///
/// Ctrl-C stops the run between albums; what was already imported stays.
pub async fn run(cli: &Cli, config: &ClientConfig, args: &ImportArgs) -> ClientResult<()> {
    let mut driver_config = config.driver_config();
    if let Some(ms) = args.delay_ms {
        driver_config = driver_config.with_bulk_delay(Duration::from_millis(ms));
    }
    let driver = PaginationDriver::new(socket_client(cli, config), driver_config);

    let ids = if args.all {
        match cancel_on_ctrl_c(&driver, load_pages(&driver, None)).await {
            PageOutcome::Cancelled => {
                eprintln!("cancelled while listing albums, nothing imported");
                return Ok(());
            }
            PageOutcome::Failed(message) if driver.albums().is_empty() => {
                return Err(ClientError::Browse(message));
            }
            _ => {}
        }
        driver
            .albums()
            .into_iter()
            .map(|album| album.external_id)
            .collect()
    } else {
        unique(&args.ids)
    };

    if ids.is_empty() {
        println!("No albums to import.");
        return Ok(());
    }

    let summary = cancel_on_ctrl_c(&driver, driver.bulk_import(&ids)).await?;
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).map_err(|e| {
                ClientError::Protocol(format!("failed to serialize summary: {e}"))
            })?
        );
    } else {
        print!("{}", render::bulk_summary(&summary));
    }
    print_problems(&driver);
    Ok(())
}

/// Drops repeated ids, keeping first occurrences in order.
fn unique(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}
