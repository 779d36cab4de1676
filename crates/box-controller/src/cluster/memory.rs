//! In-memory cluster implementation

use super::traits::*;
use crate::error::{ClusterError, ClusterResult};
use async_trait::async_trait;
use box_types::{BoxController, BoxControllerStatus, LabelSelector, ObjectKey, Pod, OWNER_LABEL_KEY};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

const WATCH_CHANNEL_CAPACITY: usize = 1024;

/// Change notification for parent resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchEvent {
    /// Parent created or its spec changed
    Applied(ObjectKey),
    /// Parent deleted
    Deleted(ObjectKey),
}

impl WatchEvent {
    pub fn key(&self) -> &ObjectKey {
        match self {
            WatchEvent::Applied(key) | WatchEvent::Deleted(key) => key,
        }
    }
}

/// In-memory cluster for development and testing.
///
/// Status updates do not emit watch events, so a controller that writes
/// status after every pass does not retrigger itself.
#[derive(Debug)]
pub struct InMemoryCluster {
    parents: Arc<RwLock<HashMap<ObjectKey, BoxController>>>,
    pods: Arc<RwLock<HashMap<ObjectKey, Pod>>>,
    watch_tx: broadcast::Sender<WatchEvent>,
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCluster {
    /// Create an empty cluster
    pub fn new() -> Self {
        let (watch_tx, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Self {
            parents: Arc::new(RwLock::new(HashMap::new())),
            pods: Arc::new(RwLock::new(HashMap::new())),
            watch_tx,
        }
    }

    /// Subscribe to parent change notifications
    pub fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.watch_tx.subscribe()
    }

    /// Create a parent or update its spec.
    ///
    /// Status and identity metadata of an existing parent are preserved and
    /// `generation` is bumped when the spec changes.
    pub async fn apply_parent(&self, parent: BoxController) -> BoxController {
        let key = parent.key();
        let stored = {
            let mut parents = self.parents.write().await;
            let stored = match parents.get(&key) {
                Some(existing) => {
                    let mut updated = existing.clone();
                    if updated.spec != parent.spec {
                        updated.spec = parent.spec;
                        updated.metadata.generation += 1;
                    }
                    updated.metadata.labels = parent.metadata.labels;
                    updated
                }
                None => {
                    let mut created = parent;
                    created.metadata.generation = 1;
                    created
                }
            };
            parents.insert(key.clone(), stored.clone());
            stored
        };

        let _ = self.watch_tx.send(WatchEvent::Applied(key));
        stored
    }

    /// Delete a parent and every unit it owns. Returns whether it existed.
    pub async fn delete_parent(&self, key: &ObjectKey) -> bool {
        let existed = self.parents.write().await.remove(key).is_some();
        if existed {
            let mut pods = self.pods.write().await;
            pods.retain(|pod_key, pod| {
                pod_key.namespace != key.namespace
                    || pod.metadata.labels.get(OWNER_LABEL_KEY) != Some(&key.name)
            });
            drop(pods);
            let _ = self.watch_tx.send(WatchEvent::Deleted(key.clone()));
        }
        existed
    }

    /// Insert or replace a unit without any checks
    pub async fn put_unit(&self, pod: Pod) {
        let key = pod.metadata.key();
        self.pods.write().await.insert(key, pod);
    }

    /// Every unit in a namespace regardless of labels, sorted by name
    pub async fn units_in(&self, namespace: &str) -> Vec<Pod> {
        let pods = self.pods.read().await;
        let mut units: Vec<Pod> = pods
            .values()
            .filter(|p| p.namespace() == namespace)
            .cloned()
            .collect();
        units.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        units
    }
}

#[async_trait]
impl ParentStore for InMemoryCluster {
    async fn get_parent(&self, key: &ObjectKey) -> ClusterResult<Option<BoxController>> {
        let parents = self.parents.read().await;
        Ok(parents.get(key).cloned())
    }

    async fn list_parents(&self) -> ClusterResult<Vec<BoxController>> {
        let parents = self.parents.read().await;
        let mut all: Vec<BoxController> = parents.values().cloned().collect();
        all.sort_by_key(|p| p.key());
        Ok(all)
    }

    async fn update_parent_status(
        &self,
        key: &ObjectKey,
        status: BoxControllerStatus,
    ) -> ClusterResult<()> {
        let mut parents = self.parents.write().await;
        let parent = parents
            .get_mut(key)
            .ok_or_else(|| ClusterError::NotFound(key.to_string()))?;
        parent.status = status;
        Ok(())
    }
}

#[async_trait]
impl UnitStore for InMemoryCluster {
    async fn list_managed_units(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> ClusterResult<Vec<Pod>> {
        let pods = self.pods.read().await;
        let mut units: Vec<Pod> = pods
            .values()
            .filter(|p| p.namespace() == namespace && selector.matches(&p.metadata.labels))
            .cloned()
            .collect();
        units.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Ok(units)
    }

    async fn create_unit(&self, pod: Pod) -> ClusterResult<()> {
        if pod.metadata.name.is_empty() {
            return Err(ClusterError::Invalid("pod name must not be empty".to_string()));
        }

        let key = pod.metadata.key();
        let mut pods = self.pods.write().await;
        if pods.contains_key(&key) {
            return Err(ClusterError::Conflict(format!("pod {} already exists", key)));
        }
        pods.insert(key, pod);
        Ok(())
    }

    async fn delete_unit(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let key = ObjectKey::new(namespace, name);
        let mut pods = self.pods.write().await;
        pods.remove(&key)
            .map(|_| ())
            .ok_or_else(|| ClusterError::NotFound(format!("pod {}", key)))
    }
}
