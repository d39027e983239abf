//! Subcommand implementations.

#[cfg(feature = "google")]
pub mod auth;
pub mod browse;
pub mod config;
pub mod import;
pub mod list;
pub mod server;
pub mod status;

use std::future::Future;
use std::time::Duration;

use albumsync_core::ActivityLevel;
use tracing::debug;

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::driver::PaginationDriver;
use crate::gateway::AlbumGateway;
use crate::socket::SocketClient;

/// Socket client honouring `--socket-path` and `--timeout` over the config.
pub fn socket_client(cli: &Cli, config: &ClientConfig) -> SocketClient {
    let path = cli
        .socket_path
        .clone()
        .unwrap_or_else(|| config.socket_path());
    let timeout = cli
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.timeout());
    SocketClient::new(path, timeout)
        .with_import_timeout(timeout + config.daemon_import_budget())
        .with_expected_mode(config.mode)
}

/// Runs `work`, turning Ctrl-C into a cooperative cancel on `driver`.
///
/// A press that lands between two requests cancels nothing, so the next
/// press is still honoured. A second press after a cancel exits right away.
pub(crate) async fn cancel_on_ctrl_c<G, F>(driver: &PaginationDriver<G>, work: F) -> F::Output
where
    G: AlbumGateway,
    F: Future,
{
    match cancel_on_interrupt(driver, work, tokio::signal::ctrl_c).await {
        Interrupted::Finished(output) => output,
        Interrupted::Forced => {
            eprintln!("interrupted again, exiting");
            std::process::exit(130);
        }
    }
}

enum Interrupted<T> {
    Finished(T),
    /// Interrupted again while a cancel was already pending.
    Forced,
}

async fn cancel_on_interrupt<G, F, I, IF>(
    driver: &PaginationDriver<G>,
    work: F,
    mut interrupt: I,
) -> Interrupted<F::Output>
where
    G: AlbumGateway,
    F: Future,
    I: FnMut() -> IF,
    IF: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(work);
    let mut cancel_pending = false;
    loop {
        tokio::select! {
            biased;
            interrupted = interrupt() => {
                if let Err(e) = interrupted {
                    debug!(error = %e, "cannot listen for Ctrl-C");
                    return Interrupted::Finished(work.await);
                }
                if cancel_pending {
                    return Interrupted::Forced;
                }
                if driver.cancel() {
                    cancel_pending = true;
                    eprintln!("cancelling, waiting for the current request to finish...");
                } else {
                    debug!("interrupt between requests, nothing to cancel yet");
                }
            }
            output = &mut work => return Interrupted::Finished(output),
        }
    }
}

/// Prints warnings and errors the driver recorded to stderr.
pub(crate) fn print_problems<G: AlbumGateway>(driver: &PaginationDriver<G>) {
    for entry in driver.activity_log().entries_at_least(ActivityLevel::Warn) {
        eprintln!("{entry}");
    }
}
