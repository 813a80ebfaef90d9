// src/tasks/mod.rs
// Background maintenance: periodic expiry sweeps standing in for the TTL
// indexes the datastore does not provide.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::CONFIG;
use crate::state::AppState;

pub struct TaskManager {
    state: Arc<AppState>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl TaskManager {
    pub fn new(state: Arc<AppState>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            state,
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    pub async fn start(&mut self) {
        let state = self.state.clone();
        let mut shutdown = self.shutdown_rx.clone();
        let interval_secs = CONFIG.tasks.sweep_interval_secs;

        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            // First tick fires immediately; skip it so startup is quiet.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_expiry_sweep(&state).await;
                    }
                    _ = shutdown.changed() => {
                        debug!("Expiry sweep task shutting down");
                        break;
                    }
                }
            }
        });

        self.handles.push(handle);
        info!("Background tasks started (sweep every {}s)", interval_secs);
    }

    pub async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }
}

async fn run_expiry_sweep(state: &AppState) {
    match state.session_service.end_expired_sessions().await {
        Ok(ended) if ended > 0 => info!("Expiry sweep ended {} sessions", ended),
        Ok(_) => {}
        Err(err) => error!("Session expiry sweep failed: {}", err),
    }

    match state.refresh_tokens.purge_expired().await {
        Ok(purged) if purged > 0 => info!("Expiry sweep purged {} refresh tokens", purged),
        Ok(_) => {}
        Err(err) => error!("Refresh token purge failed: {}", err),
    }
}
