//! Owner of the background poll and broadcast tasks.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::broadcast::Broadcaster;
use super::poller::Poller;
use crate::config::MonitorConfig;

/// Running poll and broadcast loops on independent timers
pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn both loops on the current runtime
    pub fn start(poller: Poller, broadcaster: Arc<Broadcaster>, config: &MonitorConfig) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);

        let tasks = vec![
            tokio::spawn(poller.run(config.poll_interval, shutdown_rx.clone())),
            tokio::spawn(broadcaster.run(config.broadcast_interval, shutdown_rx)),
        ];

        Self { shutdown, tasks }
    }

    /// Signal both loops and wait for them to finish
    pub async fn shutdown(self) {
        info!("Stopping background tasks");
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Background task ended abnormally: {}", e);
            }
        }
    }
}
