//! Cluster collaborator trait definitions

use crate::error::ClusterResult;
use async_trait::async_trait;
use box_types::{BoxController, BoxControllerStatus, LabelSelector, ObjectKey, Pod};

/// Combined collaborator trait
pub trait Cluster: ParentStore + UnitStore + Send + Sync {}

impl<T> Cluster for T where T: ParentStore + UnitStore + Send + Sync {}

/// Access to BoxController parent resources
#[async_trait]
pub trait ParentStore: Send + Sync {
    /// Get a parent by key
    async fn get_parent(&self, key: &ObjectKey) -> ClusterResult<Option<BoxController>>;

    /// List all parents in every namespace
    async fn list_parents(&self) -> ClusterResult<Vec<BoxController>>;

    /// Replace the status of a parent. Fails with `NotFound` if it is gone.
    async fn update_parent_status(
        &self,
        key: &ObjectKey,
        status: BoxControllerStatus,
    ) -> ClusterResult<()>;
}

/// Access to managed units
#[async_trait]
pub trait UnitStore: Send + Sync {
    /// List units in a namespace matching a selector
    async fn list_managed_units(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> ClusterResult<Vec<Pod>>;

    /// Create a unit. Fails with `Conflict` if the name is taken.
    async fn create_unit(&self, pod: Pod) -> ClusterResult<()>;

    /// Delete a unit. Fails with `NotFound` if it does not exist.
    async fn delete_unit(&self, namespace: &str, name: &str) -> ClusterResult<()>;
}
