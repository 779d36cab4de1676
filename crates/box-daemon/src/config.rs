//! Configuration for box-daemon

use box_controller::{BoxPodFactory, ReconcilerConfig, UnidentifiedPolicy, DEFAULT_IMAGE};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Reconciler configuration
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
        }
    }
}

/// Reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Container image for new boxes
    #[serde(default = "default_image")]
    pub image: String,

    /// Container command for new boxes; unset keeps the built-in shell loop
    #[serde(default)]
    pub command: Option<Vec<String>>,

    /// Container args, used together with `command`
    #[serde(default)]
    pub args: Vec<String>,

    /// Largest replica count a BoxController may ask for. Every pass
    /// materializes the free identity range, so this bounds its memory.
    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,

    /// Scale-down treatment of boxes without identity
    #[serde(default)]
    pub unidentified_policy: UnidentifiedPolicy,

    /// Requeue hint after every pass, in seconds
    #[serde(default = "default_requeue_after")]
    pub requeue_after_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            command: None,
            args: Vec::new(),
            max_replicas: default_max_replicas(),
            unidentified_policy: UnidentifiedPolicy::default(),
            requeue_after_secs: default_requeue_after(),
        }
    }
}

impl ControllerConfig {
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            requeue_after: Duration::from_secs(self.requeue_after_secs),
            unidentified_policy: self.unidentified_policy,
        }
    }

    /// Pod factory for new boxes
    pub fn pod_factory(&self) -> BoxPodFactory {
        let factory = BoxPodFactory::new().with_image(self.image.clone());
        match &self.command {
            Some(command) => factory.with_command(command.clone(), self.args.clone()),
            None => factory,
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Full resync interval in seconds
    #[serde(default = "default_resync_interval")]
    pub resync_interval_secs: u64,

    /// Deadline for a single reconcile pass in seconds
    #[serde(default = "default_reconcile_timeout")]
    pub reconcile_timeout_secs: u64,

    /// Retry delay after a failed pass in seconds
    #[serde(default = "default_error_requeue")]
    pub error_requeue_secs: u64,

    /// Maximum passes running at once across all keys
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_reconciles: usize,

    /// Capacity of the trigger queue
    #[serde(default = "default_queue_capacity")]
    pub trigger_queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            resync_interval_secs: default_resync_interval(),
            reconcile_timeout_secs: default_reconcile_timeout(),
            error_requeue_secs: default_error_requeue(),
            max_concurrent_reconciles: default_max_concurrent(),
            trigger_queue_capacity: default_queue_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8080))
}

fn default_image() -> String {
    DEFAULT_IMAGE.to_string()
}

fn default_max_replicas() -> u32 {
    1000
}

fn default_requeue_after() -> u64 {
    60
}

fn default_resync_interval() -> u64 {
    60
}

fn default_reconcile_timeout() -> u64 {
    30
}

fn default_error_requeue() -> u64 {
    10
}

fn default_max_concurrent() -> usize {
    10
}

fn default_queue_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration from defaults, an optional file and `BOX__` environment variables
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Nested keys use a double underscore, e.g. BOX__SCHEDULER__RESYNC_INTERVAL_SECS
        builder = builder.add_source(
            config::Environment::with_prefix("BOX")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.controller.image, "alpine:latest");
        assert_eq!(config.controller.unidentified_policy, UnidentifiedPolicy::RemoveFirst);
        assert_eq!(config.controller.max_replicas, 1000);
        assert!(config.controller.command.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_scheduler_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.resync_interval_secs, 60);
        assert_eq!(config.reconcile_timeout_secs, 30);
        assert_eq!(config.max_concurrent_reconciles, 10);
    }

    #[test]
    fn test_reconciler_config_conversion() {
        let controller = ControllerConfig {
            requeue_after_secs: 5,
            unidentified_policy: UnidentifiedPolicy::Ignore,
            ..Default::default()
        };
        let reconciler = controller.reconciler_config();
        assert_eq!(reconciler.requeue_after, Duration::from_secs(5));
        assert_eq!(reconciler.unidentified_policy, UnidentifiedPolicy::Ignore);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: DaemonConfig = serde_json::from_value(serde_json::json!({
            "controller": { "unidentified_policy": "ignore" },
            "scheduler": { "resync_interval_secs": 5 }
        }))
        .unwrap();
        assert_eq!(config.controller.unidentified_policy, UnidentifiedPolicy::Ignore);
        assert_eq!(config.controller.requeue_after_secs, 60);
        assert_eq!(config.scheduler.resync_interval_secs, 5);
        assert_eq!(config.scheduler.reconcile_timeout_secs, 30);
    }

    #[test]
    fn test_pod_factory_uses_configured_command() {
        use box_controller::UnitFactory;
        use box_types::{BoxController, Identity};

        let controller = ControllerConfig {
            image: "busybox:1.36".to_string(),
            command: Some(vec!["sleep".to_string()]),
            args: vec!["infinity".to_string()],
            ..Default::default()
        };
        let owner = BoxController::new("default", "boxes", 1);
        let pod = controller.pod_factory().build(&owner, Identity::new(1));

        let container = &pod.spec.containers[0];
        assert_eq!(container.image, "busybox:1.36");
        assert_eq!(container.command, vec!["sleep"]);
        assert_eq!(container.args, vec!["infinity"]);
    }

    #[test]
    fn test_pod_factory_keeps_default_command() {
        use box_controller::UnitFactory;
        use box_types::{BoxController, Identity};

        let owner = BoxController::new("default", "boxes", 1);
        let expected = BoxPodFactory::new().build(&owner, Identity::new(1));
        let pod = ControllerConfig::default()
            .pod_factory()
            .build(&owner, Identity::new(1));

        assert_eq!(pod.spec.containers[0].command, expected.spec.containers[0].command);
        assert_eq!(pod.spec.containers[0].args, expected.spec.containers[0].args);
    }

    #[test]
    fn test_load_without_file() {
        let config = DaemonConfig::load(None).unwrap();
        assert_eq!(config.scheduler.error_requeue_secs, 10);
    }
}
