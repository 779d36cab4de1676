//! Server setup and lifecycle management

use crate::api::{create_router, AppState};
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::scheduler::{Scheduler, Trigger};
use box_controller::{event_channel, ControllerEventEnvelope, InMemoryCluster, Reconciler};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

/// Box controller daemon
pub struct Server {
    config: DaemonConfig,
    cluster: Arc<InMemoryCluster>,
    scheduler: Arc<Scheduler>,
    trigger_rx: mpsc::Receiver<Trigger>,
    event_tx: broadcast::Sender<ControllerEventEnvelope>,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let cluster = Arc::new(InMemoryCluster::new());
        let (event_tx, _) = event_channel();

        let factory = config.controller.pod_factory();
        let reconciler = Reconciler::new(cluster.clone(), Arc::new(factory))
            .with_config(config.controller.reconciler_config())
            .with_events(event_tx.clone());

        let (scheduler, trigger_rx) =
            Scheduler::new(config.scheduler.clone(), cluster.clone(), Arc::new(reconciler));

        Ok(Self {
            config,
            cluster,
            scheduler,
            trigger_rx,
            event_tx,
        })
    }

    /// Shared state for the REST API
    pub fn state(&self) -> AppState {
        AppState::new(
            self.cluster.clone(),
            self.scheduler.clone(),
            self.event_tx.clone(),
        )
        .with_max_replicas(self.config.controller.max_replicas)
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let app = create_router(self.state(), self.config.server.enable_cors);

        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Box daemon listening on {}", addr);
        tracing::info!(
            image = %self.config.controller.image,
            policy = ?self.config.controller.unidentified_policy,
            "Controller configured"
        );

        // Start scheduler in background
        let scheduler = self.scheduler.clone();
        let watch_rx = self.cluster.watch();
        let trigger_rx = self.trigger_rx;
        let scheduler_handle = tokio::spawn(async move {
            scheduler.start(trigger_rx, Some(watch_rx)).await;
        });

        // Run server with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Box daemon shutting down");

        self.scheduler.stop().await;
        if let Err(e) = scheduler_handle.await {
            tracing::warn!(error = %e, "Scheduler task ended abnormally");
        }

        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
