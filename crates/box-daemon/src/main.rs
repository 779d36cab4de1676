//! Box Daemon - runs the box controller against the in-memory cluster
//!
//! The daemon provides:
//! - Reconciliation of every BoxController toward its replica count
//! - Watch, requeue and periodic resync triggers
//! - REST API for BoxControllers and their boxes
//! - Event streaming for observability

use box_daemon::{DaemonConfig, DaemonError, DaemonResult, Server};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Box Daemon CLI
#[derive(Parser)]
#[command(name = "boxd")]
#[command(about = "Box Daemon - identity-aware box population controller", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "BOX_CONFIG")]
    config: Option<String>,

    /// Listen address
    #[arg(short, long, env = "BOX_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, env = "BOX_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "BOX_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::InvalidArgument(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    println!(
        r#"
  ┌─┐┌─┐─┐ ┬┌┬┐
  ├┴┐│ │┌┴┬┘ ││
  └─┘└─┘┴ └──┴┘  v{}

  Listening on {}
  Resync every {}s, requeue after {}s
"#,
        env!("CARGO_PKG_VERSION"),
        config.server.listen_addr,
        config.scheduler.resync_interval_secs,
        config.controller.requeue_after_secs,
    );

    Server::new(config)?.run().await
}
