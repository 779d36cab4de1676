//! Reconcile scheduling: triggers, requeues and periodic resync

use super::locks::KeyLocks;
use crate::config::SchedulerConfig;
use box_controller::{Action, Cluster, ReconcileError, Reconciler, WatchEvent};
use box_types::ObjectKey;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{mpsc, Mutex, Notify, RwLock, Semaphore};
use tokio::time::{interval, Duration, Instant};

/// Why a pass was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// Parent created, changed or deleted
    Watch,
    /// Requeue hint from a previous pass expired
    Requeue,
    /// Periodic full enumeration
    Resync,
    /// Operator asked for it
    Manual,
}

/// Request to reconcile one parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub key: ObjectKey,
    pub reason: TriggerReason,
}

impl Trigger {
    pub fn new(key: ObjectKey, reason: TriggerReason) -> Self {
        Self { key, reason }
    }
}

/// Pass counters since startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub passes_succeeded: u64,
    pub passes_failed: u64,
    pub triggers_coalesced: u64,
}

#[derive(Debug, Default)]
struct Counters {
    passes_succeeded: AtomicU64,
    passes_failed: AtomicU64,
    triggers_coalesced: AtomicU64,
}

/// Drives the reconciler for every parent in the cluster
pub struct Scheduler {
    config: SchedulerConfig,
    cluster: Arc<dyn Cluster>,
    reconciler: Arc<Reconciler>,
    trigger_tx: mpsc::Sender<Trigger>,
    locks: KeyLocks,
    /// Keys with a pass waiting to start
    queued: Mutex<HashSet<ObjectKey>>,
    /// Key to token of its one live requeue timer
    requeues: Arc<Mutex<HashMap<ObjectKey, u64>>>,
    next_token: AtomicU64,
    permits: Arc<Semaphore>,
    running: Arc<RwLock<bool>>,
    shutdown: Notify,
    counters: Counters,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(
        config: SchedulerConfig,
        cluster: Arc<dyn Cluster>,
        reconciler: Arc<Reconciler>,
    ) -> (Arc<Self>, mpsc::Receiver<Trigger>) {
        let (trigger_tx, trigger_rx) = mpsc::channel(config.trigger_queue_capacity.max(1));
        let permits = Arc::new(Semaphore::new(config.max_concurrent_reconciles.max(1)));

        let scheduler = Arc::new(Self {
            config,
            cluster,
            reconciler,
            trigger_tx,
            locks: KeyLocks::new(),
            queued: Mutex::new(HashSet::new()),
            requeues: Arc::new(Mutex::new(HashMap::new())),
            next_token: AtomicU64::new(0),
            permits,
            running: Arc::new(RwLock::new(false)),
            shutdown: Notify::new(),
            counters: Counters::default(),
        });

        (scheduler, trigger_rx)
    }

    /// Ask for a pass over `key`
    pub async fn trigger(&self, key: ObjectKey, reason: TriggerReason) {
        if self.trigger_tx.send(Trigger::new(key, reason)).await.is_err() {
            tracing::debug!("Scheduler stopped, trigger dropped");
        }
    }

    /// Run the dispatch loop until [`Scheduler::stop`] is called.
    ///
    /// The first resync tick fires immediately, so every existing parent
    /// gets a pass on startup.
    pub async fn start(
        self: Arc<Self>,
        mut trigger_rx: mpsc::Receiver<Trigger>,
        mut watch_rx: Option<broadcast::Receiver<WatchEvent>>,
    ) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        tracing::info!("Scheduler started");

        let mut resync = interval(Duration::from_secs(self.config.resync_interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => break,
                _ = resync.tick() => {
                    self.resync().await;
                }
                trigger = trigger_rx.recv() => match trigger {
                    Some(trigger) => self.dispatch(trigger).await,
                    None => break,
                },
                event = next_watch_event(&mut watch_rx) => match event {
                    Ok(event) => {
                        self.dispatch(Trigger::new(event.key().clone(), TriggerReason::Watch)).await;
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Watch lagged, falling back to full resync");
                        self.resync().await;
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!("Watch closed, relying on resync and requeues");
                        watch_rx = None;
                    }
                },
            }

            if !*self.running.read().await {
                break;
            }
        }

        tracing::info!("Scheduler stopped");
    }

    /// Stop the scheduler
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        self.shutdown.notify_one();
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Run a pass for `key` right now, waiting for any pass already running.
    pub async fn reconcile_now(&self, key: &ObjectKey) -> Result<Action, ReconcileError> {
        let guard = self.locks.acquire(key).await;
        let result = self.run_pass(key, TriggerReason::Manual).await;
        drop(guard);
        self.after_pass(key, &result).await;
        result
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            passes_succeeded: self.counters.passes_succeeded.load(Ordering::Relaxed),
            passes_failed: self.counters.passes_failed.load(Ordering::Relaxed),
            triggers_coalesced: self.counters.triggers_coalesced.load(Ordering::Relaxed),
        }
    }

    /// Number of keys with a requeue timer armed
    pub async fn pending_requeues(&self) -> usize {
        self.requeues.lock().await.len()
    }

    async fn resync(self: &Arc<Self>) {
        match self.cluster.list_parents().await {
            Ok(parents) => {
                tracing::debug!(count = parents.len(), "Resyncing parents");
                for parent in parents {
                    self.dispatch(Trigger::new(parent.key(), TriggerReason::Resync))
                        .await;
                }
            }
            Err(e) => tracing::warn!(error = %e, "Resync failed to list parents"),
        }
    }

    /// Start a pass unless one is already waiting for this key
    async fn dispatch(self: &Arc<Self>, trigger: Trigger) {
        {
            let mut queued = self.queued.lock().await;
            if !queued.insert(trigger.key.clone()) {
                self.counters.triggers_coalesced.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %trigger.key, reason = ?trigger.reason, "Pass already queued");
                return;
            }
        }

        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.process(trigger).await;
        });
    }

    async fn process(&self, trigger: Trigger) {
        let guard = self.locks.acquire(&trigger.key).await;
        // Triggers arriving from here on queue a fresh pass
        self.queued.lock().await.remove(&trigger.key);

        let Ok(_permit) = self.permits.clone().acquire_owned().await else {
            return;
        };

        let result = self.run_pass(&trigger.key, trigger.reason).await;
        drop(guard);
        self.after_pass(&trigger.key, &result).await;
    }

    async fn run_pass(
        &self,
        key: &ObjectKey,
        reason: TriggerReason,
    ) -> Result<Action, ReconcileError> {
        tracing::debug!(key = %key, reason = ?reason, "Reconciling");

        let deadline = Instant::now() + Duration::from_secs(self.config.reconcile_timeout_secs);
        let result = self.reconciler.reconcile(key, deadline).await;

        match &result {
            Ok(_) => {
                self.counters.passes_succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.passes_failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key = %key, error = %e, "Reconcile pass failed");
            }
        }

        result
    }

    async fn after_pass(&self, key: &ObjectKey, result: &Result<Action, ReconcileError>) {
        match result {
            Ok(Action {
                requeue_after: Some(after),
                ..
            }) => self.schedule_requeue(key.clone(), *after).await,
            Ok(_) => {
                self.requeues.lock().await.remove(key);
                self.locks.prune(key).await;
            }
            Err(_) => {
                let backoff = Duration::from_secs(self.config.error_requeue_secs);
                self.schedule_requeue(key.clone(), backoff).await;
            }
        }
    }

    /// Arm a requeue timer for `key`, superseding any earlier one
    async fn schedule_requeue(&self, key: ObjectKey, after: Duration) {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.requeues.lock().await.insert(key.clone(), token);

        let requeues = self.requeues.clone();
        let trigger_tx = self.trigger_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;

            let current = {
                let mut requeues = requeues.lock().await;
                if requeues.get(&key) == Some(&token) {
                    requeues.remove(&key);
                    true
                } else {
                    false
                }
            };

            if current {
                let _ = trigger_tx
                    .send(Trigger::new(key, TriggerReason::Requeue))
                    .await;
            }
        });
    }
}

async fn next_watch_event(
    watch_rx: &mut Option<broadcast::Receiver<WatchEvent>>,
) -> Result<WatchEvent, RecvError> {
    match watch_rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
