//! Application state for API handlers

use crate::scheduler::Scheduler;
use box_controller::{ControllerEventEnvelope, InMemoryCluster};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Cluster backend
    pub cluster: Arc<InMemoryCluster>,

    /// Scheduler handle
    pub scheduler: Arc<Scheduler>,

    /// Controller event channel
    pub event_tx: broadcast::Sender<ControllerEventEnvelope>,

    /// Largest accepted replica count
    pub max_replicas: u32,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        cluster: Arc<InMemoryCluster>,
        scheduler: Arc<Scheduler>,
        event_tx: broadcast::Sender<ControllerEventEnvelope>,
    ) -> Self {
        Self {
            cluster,
            scheduler,
            event_tx,
            max_replicas: u32::MAX,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Cap the replica count accepted by apply requests
    pub fn with_max_replicas(mut self, max_replicas: u32) -> Self {
        self.max_replicas = max_replicas;
        self
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let secs = (chrono::Utc::now() - self.started_at).num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}
