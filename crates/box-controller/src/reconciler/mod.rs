//! Population reconciliation
//!
//! One pass fetches the parent, lists live boxes, derives identities, writes
//! the observed status and then creates or removes boxes until the live count
//! matches the desired count. Passes are level-triggered: nothing is carried
//! over between them, so a pass that fails half-way is repaired by the next.
//!
//! Callers must not run two passes for the same key concurrently.

mod plan;
mod status;

pub use plan::{diff, Plan, UnidentifiedPolicy};
pub use status::{project_status, CONDITION_AVAILABLE, CONDITION_DEGRADED, CONDITION_PROGRESSING};

use crate::allocator::allocate;
use crate::cluster::Cluster;
use crate::error::ReconcileError;
use crate::events::{ControllerEvent, ControllerEventEnvelope};
use crate::factory::UnitFactory;
use box_types::{managed_selector, BoxController, BoxControllerStatus, Identity, ObjectKey};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Default interval after which a key is reconciled again without any event
pub const DEFAULT_REQUEUE_AFTER: Duration = Duration::from_secs(60);

/// Reconciler settings
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Requeue hint returned after every pass on an existing parent
    pub requeue_after: Duration,

    /// Scale-down treatment of boxes without identity
    pub unidentified_policy: UnidentifiedPolicy,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            requeue_after: DEFAULT_REQUEUE_AFTER,
            unidentified_policy: UnidentifiedPolicy::default(),
        }
    }
}

/// What one pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub desired: u32,
    pub live: usize,
    /// Identities of boxes created, ascending
    pub created: Vec<Identity>,
    /// Names of boxes removed (or already gone), in removal order
    pub removed: Vec<String>,
    pub failed_creates: usize,
    pub failed_removes: usize,
    pub status_persisted: bool,
}

impl PassSummary {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty()
            && self.removed.is_empty()
            && self.failed_creates == 0
            && self.failed_removes == 0
    }
}

/// Outcome handed back to the scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Action {
    /// Run the pass again after this long even without an event
    pub requeue_after: Option<Duration>,
    pub summary: PassSummary,
}

impl Action {
    pub fn requeue(after: Duration, summary: PassSummary) -> Self {
        Self {
            requeue_after: Some(after),
            summary,
        }
    }

    /// Nothing left to do until the parent changes
    pub fn await_change() -> Self {
        Self::default()
    }
}

/// Converges box populations toward their desired replica count
pub struct Reconciler {
    cluster: Arc<dyn Cluster>,
    factory: Arc<dyn UnitFactory>,
    config: ReconcilerConfig,
    event_tx: Option<broadcast::Sender<ControllerEventEnvelope>>,
}

impl Reconciler {
    pub fn new(cluster: Arc<dyn Cluster>, factory: Arc<dyn UnitFactory>) -> Self {
        Self {
            cluster,
            factory,
            config: ReconcilerConfig::default(),
            event_tx: None,
        }
    }

    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_events(mut self, event_tx: broadcast::Sender<ControllerEventEnvelope>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Run one pass for `key`, abandoning it at `deadline`.
    ///
    /// Remote calls still in flight at the deadline are dropped; the remaining
    /// creates and removes are left for the next pass.
    pub async fn reconcile(
        &self,
        key: &ObjectKey,
        deadline: Instant,
    ) -> Result<Action, ReconcileError> {
        match tokio::time::timeout_at(deadline, self.run_pass(key)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(key = %key, "Reconcile pass abandoned at deadline");
                Err(ReconcileError::DeadlineExceeded(key.clone()))
            }
        }
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn run_pass(&self, key: &ObjectKey) -> Result<Action, ReconcileError> {
        let parent = match self.cluster.get_parent(key).await {
            Ok(Some(parent)) => parent,
            Ok(None) => {
                debug!("BoxController not found, nothing to reconcile");
                return Ok(Action::await_change());
            }
            Err(source) => {
                return Err(ReconcileError::FetchParent {
                    key: key.clone(),
                    source,
                })
            }
        };

        let live = self
            .cluster
            .list_managed_units(&key.namespace, &managed_selector())
            .await
            .map_err(|source| ReconcileError::ListUnits {
                key: key.clone(),
                source,
            })?;

        let desired = parent.replicas();
        let allocation = allocate(&live, desired);
        let plan = diff(live.len(), desired, &allocation, self.config.unidentified_policy);

        debug!(
            desired = desired,
            live = live.len(),
            identified = allocation.identified_count(),
            free = allocation.free.len(),
            "Reconciling box population"
        );

        let mut summary = PassSummary {
            desired,
            live: live.len(),
            ..Default::default()
        };

        let status = project_status(&parent, &allocation, live.len(), &plan);
        summary.status_persisted = self.persist_status(key, status).await;

        if plan.shortfall > 0 {
            warn!(
                shortfall = plan.shortfall,
                "Not enough free identities to reach desired replicas"
            );
        }

        self.create_units(&parent, &plan.create, &mut summary).await;
        self.remove_units(key, &plan.remove, &mut summary).await;

        self.emit(
            key,
            ControllerEvent::PassCompleted {
                desired,
                live: summary.live,
                created: summary.created.len(),
                removed: summary.removed.len(),
            },
        );

        Ok(Action::requeue(self.config.requeue_after, summary))
    }

    async fn persist_status(&self, key: &ObjectKey, status: BoxControllerStatus) -> bool {
        match self.cluster.update_parent_status(key, status).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to update BoxController status");
                self.emit(
                    key,
                    ControllerEvent::StatusUpdateFailed {
                        reason: e.to_string(),
                    },
                );
                false
            }
        }
    }

    async fn create_units(&self, parent: &BoxController, ids: &[Identity], summary: &mut PassSummary) {
        if !ids.is_empty() {
            info!(count = ids.len(), "Scaling up box population");
        }

        let key = parent.key();
        for &id in ids {
            let pod = self.factory.build(parent, id);
            let name = pod.metadata.name.clone();

            match self.cluster.create_unit(pod).await {
                Ok(()) => {
                    info!(pod = %name, id = %id, "Created box");
                    summary.created.push(id);
                    self.emit(&key, ControllerEvent::UnitCreated { pod: name, id });
                }
                Err(e) => {
                    error!(pod = %name, id = %id, error = %e, "Failed to create box");
                    summary.failed_creates += 1;
                    self.emit(
                        &key,
                        ControllerEvent::UnitCreateFailed {
                            id,
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }
    }

    async fn remove_units(&self, key: &ObjectKey, names: &[String], summary: &mut PassSummary) {
        if !names.is_empty() {
            info!(count = names.len(), "Scaling down box population");
        }

        for name in names {
            match self.cluster.delete_unit(&key.namespace, name).await {
                Ok(()) => {
                    info!(pod = %name, "Deleted box to match replicas");
                    summary.removed.push(name.clone());
                    self.emit(key, ControllerEvent::UnitRemoved { pod: name.clone() });
                }
                Err(e) if e.is_not_found() => {
                    debug!(pod = %name, "Box already gone");
                    summary.removed.push(name.clone());
                }
                Err(e) => {
                    error!(pod = %name, error = %e, "Failed to delete box");
                    summary.failed_removes += 1;
                    self.emit(
                        key,
                        ControllerEvent::UnitRemoveFailed {
                            pod: name.clone(),
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }
    }

    fn emit(&self, key: &ObjectKey, event: ControllerEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ControllerEventEnvelope::new(key.clone(), event));
        }
    }
}
