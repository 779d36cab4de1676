//! Box Controller - Identity allocation and population reconciliation
//!
//! Keeps a population of boxes alive for every `BoxController` parent. Each
//! box carries a small integer identity; the controller hands out the
//! smallest free identities on scale-up and removes the largest on
//! scale-down.
//!
//! ## Components
//!
//! - **allocator**: derives used/free identities from live boxes
//! - **reconciler**: diff, create/remove and status projection for one pass
//! - **factory**: builds the pod for a given identity
//! - **cluster**: collaborator traits and the in-memory reference cluster
//! - **events**: best-effort stream of what each pass did

#![deny(unsafe_code)]

pub mod allocator;
pub mod cluster;
pub mod error;
pub mod events;
pub mod factory;
pub mod reconciler;

pub use allocator::{allocate, Allocation};
pub use cluster::{Cluster, InMemoryCluster, ParentStore, UnitStore, WatchEvent};
pub use error::{ClusterError, ClusterResult, ReconcileError};
pub use events::{event_channel, ControllerEvent, ControllerEventEnvelope, EventSeverity};
pub use factory::{BoxPodFactory, UnitFactory, DEFAULT_IMAGE};
pub use reconciler::{
    diff, Action, PassSummary, Plan, Reconciler, ReconcilerConfig, UnidentifiedPolicy,
    DEFAULT_REQUEUE_AFTER,
};
