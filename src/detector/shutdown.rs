// src/detector/shutdown.rs - Shutdown requests for the cycle loop

use log::{error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;

/// Cloneable shutdown flag. The scheduler only looks at it between cycles,
/// so a collection window that has started always runs to the end.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
    notifier: broadcast::Sender<()>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (notifier, _) = broadcast::channel(4);
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            notifier,
        }
    }

    pub fn trigger(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            info!("Shutdown requested");
        }
        let _ = self.notifier.send(());
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been requested
    pub async fn wait(&self) {
        let mut receiver = self.notifier.subscribe();
        if self.is_requested() {
            return;
        }
        let _ = receiver.recv().await;
    }

    /// Trigger on Ctrl+C, and on SIGTERM where available
    pub fn start_signal_handlers(&self) {
        let on_ctrl_c = self.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C signal, stopping after the current cycle...");
                    on_ctrl_c.trigger();
                }
                Err(err) => {
                    error!("Failed to listen for Ctrl+C signal: {}", err);
                }
            }
        });

        #[cfg(unix)]
        {
            let on_sigterm = self.clone();
            tokio::spawn(async move {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                        info!("Received SIGTERM signal, stopping after the current cycle...");
                        on_sigterm.trigger();
                    }
                    Err(err) => {
                        error!("Failed to register SIGTERM handler: {}", err);
                    }
                }
            });
        }

        info!("Shutdown signal handlers started");
    }
}
