//! Scheduler behavior against the in-memory cluster: per-key exclusion,
//! trigger coalescing, watch and resync triggers, requeue-driven self-heal,
//! error backoff and shutdown.

use async_trait::async_trait;
use box_controller::{
    BoxPodFactory, ClusterError, ClusterResult, InMemoryCluster, ParentStore, Reconciler,
    ReconcileError, ReconcilerConfig, UnitStore, WatchEvent,
};
use box_daemon::config::SchedulerConfig;
use box_daemon::{Scheduler, TriggerReason};
use box_types::{BoxController, BoxControllerStatus, LabelSelector, ObjectKey, Pod};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Records how many list calls overlap, per namespace and overall.
/// Unit listing fails while `fail_lists` is set.
#[derive(Default)]
struct OverlapCluster {
    inner: InMemoryCluster,
    list_delay: Duration,
    fail_lists: AtomicBool,
    in_flight: Mutex<HashMap<String, usize>>,
    max_per_namespace: Mutex<usize>,
    max_overall: Mutex<usize>,
}

impl OverlapCluster {
    fn with_delay(list_delay: Duration) -> Self {
        Self {
            list_delay,
            ..Default::default()
        }
    }

    fn enter(&self, namespace: &str) {
        let mut in_flight = self.in_flight.lock().unwrap();
        let count = in_flight.entry(namespace.to_string()).or_insert(0);
        *count += 1;

        let mut max_ns = self.max_per_namespace.lock().unwrap();
        *max_ns = (*max_ns).max(*count);

        let overall: usize = in_flight.values().sum();
        let mut max_all = self.max_overall.lock().unwrap();
        *max_all = (*max_all).max(overall);
    }

    fn exit(&self, namespace: &str) {
        let mut in_flight = self.in_flight.lock().unwrap();
        if let Some(count) = in_flight.get_mut(namespace) {
            *count -= 1;
        }
    }
}

#[async_trait]
impl ParentStore for OverlapCluster {
    async fn get_parent(&self, key: &ObjectKey) -> ClusterResult<Option<BoxController>> {
        self.inner.get_parent(key).await
    }

    async fn list_parents(&self) -> ClusterResult<Vec<BoxController>> {
        self.inner.list_parents().await
    }

    async fn update_parent_status(
        &self,
        key: &ObjectKey,
        status: BoxControllerStatus,
    ) -> ClusterResult<()> {
        self.inner.update_parent_status(key, status).await
    }
}

#[async_trait]
impl UnitStore for OverlapCluster {
    async fn list_managed_units(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> ClusterResult<Vec<Pod>> {
        self.enter(namespace);
        tokio::time::sleep(self.list_delay).await;
        self.exit(namespace);
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(ClusterError::Unavailable("list refused".to_string()));
        }
        self.inner.list_managed_units(namespace, selector).await
    }

    async fn create_unit(&self, pod: Pod) -> ClusterResult<()> {
        self.inner.create_unit(pod).await
    }

    async fn delete_unit(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        self.inner.delete_unit(namespace, name).await
    }
}

fn reconciler(cluster: Arc<dyn box_controller::Cluster>, requeue_after: Duration) -> Arc<Reconciler> {
    Arc::new(
        Reconciler::new(cluster, Arc::new(BoxPodFactory::new())).with_config(ReconcilerConfig {
            requeue_after,
            ..Default::default()
        }),
    )
}

fn quiet_config() -> SchedulerConfig {
    SchedulerConfig {
        resync_interval_secs: 3600,
        ..Default::default()
    }
}

/// Poll until `namespace` holds exactly `expected` boxes
async fn wait_for_boxes(cluster: &InMemoryCluster, namespace: &str, expected: usize) -> Vec<Pod> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let pods = cluster.units_in(namespace).await;
            if pods.len() == expected {
                return pods;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{} never reached {} boxes", namespace, expected))
}

// ---------------------------------------------------------------------------
// Per-key exclusion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_passes_for_one_key_never_overlap() {
    let cluster = Arc::new(OverlapCluster::with_delay(Duration::from_millis(20)));
    let parent = cluster
        .inner
        .apply_parent(BoxController::new("default", "boxes", 2))
        .await;
    let (scheduler, _rx) = Scheduler::new(
        quiet_config(),
        cluster.clone(),
        reconciler(cluster.clone(), Duration::from_secs(60)),
    );

    let key = parent.key();
    let results = join_all((0..5).map(|_| scheduler.reconcile_now(&key))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(*cluster.max_per_namespace.lock().unwrap(), 1);
    assert_eq!(cluster.inner.units_in("default").await.len(), 2);
}

#[tokio::test]
async fn passes_for_distinct_keys_run_in_parallel() {
    let cluster = Arc::new(OverlapCluster::with_delay(Duration::from_millis(50)));
    let a = cluster.inner.apply_parent(BoxController::new("a", "boxes", 1)).await;
    let b = cluster.inner.apply_parent(BoxController::new("b", "boxes", 1)).await;
    let (scheduler, _rx) = Scheduler::new(
        quiet_config(),
        cluster.clone(),
        reconciler(cluster.clone(), Duration::from_secs(60)),
    );

    let (ka, kb) = (a.key(), b.key());
    let (ra, rb) = tokio::join!(scheduler.reconcile_now(&ka), scheduler.reconcile_now(&kb));

    assert!(ra.is_ok() && rb.is_ok());
    assert_eq!(*cluster.max_overall.lock().unwrap(), 2);
}

#[tokio::test]
async fn triggers_for_a_waiting_key_coalesce() {
    let cluster = Arc::new(OverlapCluster::with_delay(Duration::from_millis(200)));
    let parent = cluster
        .inner
        .apply_parent(BoxController::new("default", "boxes", 1))
        .await;
    let key = parent.key();
    let (scheduler, rx) = Scheduler::new(
        quiet_config(),
        cluster.clone(),
        reconciler(cluster.clone(), Duration::from_secs(60)),
    );

    // A manual pass holds the key while the scheduler starts
    let manual = tokio::spawn({
        let scheduler = scheduler.clone();
        let key = key.clone();
        async move { scheduler.reconcile_now(&key).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The startup resync queues one pass that waits on the key
    let handle = tokio::spawn(scheduler.clone().start(rx, None));
    tokio::time::sleep(Duration::from_millis(20)).await;

    for _ in 0..10 {
        scheduler.trigger(key.clone(), TriggerReason::Manual).await;
    }

    assert!(manual.await.unwrap().is_ok());
    tokio::time::timeout(Duration::from_secs(5), async {
        while scheduler.stats().passes_succeeded < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("queued pass never ran");

    let stats = scheduler.stats();
    assert_eq!(stats.passes_succeeded, 2);
    assert_eq!(stats.triggers_coalesced, 10);
    assert_eq!(*cluster.max_per_namespace.lock().unwrap(), 1);

    scheduler.stop().await;
    handle.await.unwrap();
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn startup_resync_reconciles_existing_parents() {
    let cluster = Arc::new(InMemoryCluster::new());
    cluster
        .apply_parent(BoxController::new("default", "boxes", 3))
        .await;
    let (scheduler, rx) = Scheduler::new(
        quiet_config(),
        cluster.clone(),
        reconciler(cluster.clone(), Duration::from_secs(60)),
    );

    let handle = tokio::spawn(scheduler.clone().start(rx, None));

    let pods = wait_for_boxes(&cluster, "default", 3).await;
    let mut names: Vec<&str> = pods.iter().map(|p| p.name()).collect();
    names.sort();
    assert_eq!(names, vec!["box-1", "box-2", "box-3"]);

    scheduler.stop().await;
    handle.await.unwrap();
}

#[tokio::test]
async fn watch_events_drive_scale_up_and_down() {
    let cluster = Arc::new(InMemoryCluster::new());
    let (scheduler, rx) = Scheduler::new(
        quiet_config(),
        cluster.clone(),
        reconciler(cluster.clone(), Duration::from_secs(60)),
    );
    let handle = tokio::spawn(scheduler.clone().start(rx, Some(cluster.watch())));

    cluster
        .apply_parent(BoxController::new("default", "boxes", 4))
        .await;
    wait_for_boxes(&cluster, "default", 4).await;

    cluster
        .apply_parent(BoxController::new("default", "boxes", 1))
        .await;
    let pods = wait_for_boxes(&cluster, "default", 1).await;
    assert_eq!(pods[0].name(), "box-1");

    scheduler.stop().await;
    handle.await.unwrap();
}

#[tokio::test]
async fn lagged_watch_falls_back_to_resync() {
    let cluster = Arc::new(InMemoryCluster::new());
    let (watch_tx, watch_rx) = broadcast::channel::<WatchEvent>(1);
    let (scheduler, rx) = Scheduler::new(
        quiet_config(),
        cluster.clone(),
        reconciler(cluster.clone(), Duration::from_secs(60)),
    );
    let handle = tokio::spawn(scheduler.clone().start(rx, Some(watch_rx)));

    // Let the startup resync pass over an empty cluster
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The parent's own event never reaches the scheduler
    cluster
        .apply_parent(BoxController::new("default", "boxes", 2))
        .await;
    let ghost = ObjectKey::new("ghost", "none");
    for _ in 0..3 {
        watch_tx.send(WatchEvent::Applied(ghost.clone())).unwrap();
    }

    wait_for_boxes(&cluster, "default", 2).await;

    scheduler.stop().await;
    handle.await.unwrap();
}

#[tokio::test]
async fn requeue_heals_without_watch_events() {
    let cluster = Arc::new(InMemoryCluster::new());
    cluster
        .apply_parent(BoxController::new("default", "boxes", 2))
        .await;
    let (scheduler, rx) = Scheduler::new(
        quiet_config(),
        cluster.clone(),
        reconciler(cluster.clone(), Duration::from_millis(50)),
    );
    let handle = tokio::spawn(scheduler.clone().start(rx, None));

    wait_for_boxes(&cluster, "default", 2).await;

    // Box deletions do not produce watch events; only the requeue notices
    cluster.delete_unit("default", "box-1").await.unwrap();
    let pods = wait_for_boxes(&cluster, "default", 2).await;
    assert!(pods.iter().any(|p| p.name() == "box-1"));

    scheduler.stop().await;
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_pass_retries_after_error_backoff() {
    let cluster = Arc::new(OverlapCluster::default());
    cluster.fail_lists.store(true, Ordering::SeqCst);
    let parent = cluster
        .inner
        .apply_parent(BoxController::new("default", "boxes", 1))
        .await;
    let key = parent.key();
    let config = SchedulerConfig {
        error_requeue_secs: 5,
        ..quiet_config()
    };
    let (scheduler, mut rx) = Scheduler::new(
        config,
        cluster.clone(),
        reconciler(cluster.clone(), Duration::from_secs(60)),
    );

    let started = tokio::time::Instant::now();
    let result = scheduler.reconcile_now(&key).await;
    assert!(matches!(result, Err(ReconcileError::ListUnits { .. })));
    assert_eq!(scheduler.stats().passes_failed, 1);
    assert_eq!(scheduler.pending_requeues().await, 1);

    let trigger = rx.recv().await.unwrap();
    let waited = started.elapsed();
    assert_eq!(trigger.key, key);
    assert_eq!(trigger.reason, TriggerReason::Requeue);
    assert!(waited >= Duration::from_secs(5));
    assert!(waited < Duration::from_secs(60));
    assert_eq!(scheduler.pending_requeues().await, 0);

    // Once listing recovers the retry converges
    cluster.fail_lists.store(false, Ordering::SeqCst);
    assert!(scheduler.reconcile_now(&key).await.is_ok());
    assert_eq!(cluster.inner.units_in("default").await.len(), 1);
}

#[tokio::test]
async fn stop_ends_the_dispatch_loop() {
    let cluster = Arc::new(InMemoryCluster::new());
    let (scheduler, rx) = Scheduler::new(
        quiet_config(),
        cluster.clone(),
        reconciler(cluster.clone(), Duration::from_secs(60)),
    );
    let handle = tokio::spawn(scheduler.clone().start(rx, Some(cluster.watch())));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(scheduler.is_running().await);

    scheduler.stop().await;
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();
    assert!(!scheduler.is_running().await);
}
