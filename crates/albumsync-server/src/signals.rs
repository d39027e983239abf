//! SIGTERM/SIGINT handling.
//!
//! Every shutdown source (a signal, a `shutdown` request) flips the same
//! watch channel; the accept loop waits on it.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info};

/// Owns the shutdown channel and hands out [`ShutdownSignal`]s and
/// [`ShutdownHandle`]s.
pub struct SignalHandler {
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalHandler {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    /// Spawns the task that waits for termination signals. Call once.
    #[cfg(unix)]
    pub fn spawn_listener(&self) {
        let shutdown_tx = Arc::clone(&self.shutdown_tx);

        tokio::spawn(async move {
            use tokio::signal::unix::{SignalKind, signal};

            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(term), Ok(int)) => (term, int),
                    (Err(e), _) | (_, Err(e)) => {
                        error!(error = %e, "failed to install signal handlers");
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                _ = sigint.recv() => info!("received SIGINT, shutting down"),
            }
            let _ = shutdown_tx.send(true);
            debug!("signal listener stopped");
        });
    }

    #[cfg(not(unix))]
    pub fn spawn_listener(&self) {
        let shutdown_tx = Arc::clone(&self.shutdown_tx);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received Ctrl+C, shutting down");
                let _ = shutdown_tx.send(true);
            }
        });
    }

    /// A receiver that resolves once shutdown is triggered.
    pub fn shutdown(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.shutdown_rx.clone(),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
            rx: self.shutdown_rx.clone(),
        }
    }
}

/// Completes once shutdown has been signalled.
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub async fn wait(mut self) {
        // A closed channel also ends the wait.
        let _ = self.rx.wait_for(|down| *down).await;
    }
}

#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    pub fn wait(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.rx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_sets_flag() {
        let handler = SignalHandler::new();
        assert!(!handler.is_shutdown());
        handler.trigger_shutdown();
        assert!(handler.is_shutdown());
    }

    #[tokio::test]
    async fn signal_wait_completes_after_trigger() {
        let handler = SignalHandler::new();
        let shutdown = handler.shutdown();
        let handle = handler.shutdown_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.trigger();
        });

        let result = tokio::time::timeout(Duration::from_millis(500), shutdown.wait()).await;
        assert!(result.is_ok());
        assert!(handler.is_shutdown());
    }

    #[tokio::test]
    async fn wait_after_trigger_returns_immediately() {
        let handler = SignalHandler::new();
        let handle = handler.shutdown_handle();
        handle.trigger();
        assert!(handle.is_shutdown());

        let result = tokio::time::timeout(Duration::from_millis(50), handle.wait().wait()).await;
        assert!(result.is_ok());
    }
}
