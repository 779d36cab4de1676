//! Box Daemon library
//!
//! This module provides the runtime around the box controller:
//! - Scheduler with per-key serialization, requeues and resync
//! - REST API handlers
//! - Server lifecycle management

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError, DaemonResult};
pub use scheduler::{Scheduler, SchedulerStats, Trigger, TriggerReason};
pub use server::Server;
