//! Reconciliation driver: wires the monitor, eviction pipeline and orphan
//! sweeper to the external collaborators and owns their periodic tasks.
//!
//! Cooperative shutdown is a `tokio::sync::watch<bool>`: `trigger` flips
//! the watch, and each `tokio::select!` loop below observes it and exits
//! instead of being `abort()`-ed.

use std::sync::Arc;

use node_guardian_core::{ClockSource, PodInfo};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::{ClusterApi, CloudProvider, DaemonSetCache, EventRecorder, PodApi};
use crate::config::GuardianConfig;
use crate::core::GuardianCore;
use crate::eviction::EvictionPipeline;
use crate::monitor::StatusMonitor;
use crate::orphan::OrphanSweeper;
use crate::registry::NodeStatusRegistry;

/// Handle used to request a cooperative shutdown of all five driver tasks.
#[derive(Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        let _ = self.sender.send(true);
    }
}

/// Handle the external workload cache uses to push add/update events into
/// the driver's fifth task, which force-deletes the pod if its bound node
/// is already absent from the known node set.
#[derive(Clone)]
pub struct PodEventHandle {
    sender: mpsc::Sender<PodInfo>,
}

impl PodEventHandle {
    /// Submits a pod add/update event. Never blocks the caller on a full
    /// channel -- a dropped event is re-observed on the next periodic
    /// orphan sweep, so this degrades to the 30s sweep rather than stalling
    /// the cache's own callback.
    pub fn notify(&self, pod: PodInfo) {
        let _ = self.sender.try_send(pod);
    }
}

pub struct GuardianDriver {
    pub(crate) monitor: Arc<StatusMonitor>,
    pub(crate) eviction: Arc<EvictionPipeline>,
    pub(crate) orphan: Arc<OrphanSweeper>,
    config: GuardianConfig,
    shutdown_tx: watch::Sender<bool>,
    pod_event_tx: mpsc::Sender<PodInfo>,
    pod_event_rx: std::sync::Mutex<Option<mpsc::Receiver<PodInfo>>>,
}

/// Bound on the event-driven orphan queue. A cache replaying its full
/// current state on reconnect can burst far more events than the periodic
/// sweep ever processes at once; beyond this, events are dropped and caught
/// by the next 30s sweep instead.
const POD_EVENT_CHANNEL_CAPACITY: usize = 1024;

impl GuardianDriver {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cluster_api: Arc<dyn ClusterApi>,
        pod_api: Arc<dyn PodApi>,
        daemon_set_cache: Arc<dyn DaemonSetCache>,
        cloud_provider: Option<Arc<dyn CloudProvider>>,
        event_recorder: Arc<dyn EventRecorder>,
        clock: Arc<dyn ClockSource>,
        config: GuardianConfig,
    ) -> Self {
        let core = Arc::new(GuardianCore::new(config.eviction_limiter_qps));
        let registry = Arc::new(NodeStatusRegistry::new());

        let monitor = Arc::new(StatusMonitor::new(
            core.clone(),
            registry.clone(),
            cluster_api.clone(),
            pod_api.clone(),
            cloud_provider,
            event_recorder.clone(),
            clock.clone(),
            config.clone(),
        ));
        let eviction = Arc::new(EvictionPipeline::new(
            core.clone(),
            pod_api.clone(),
            daemon_set_cache,
            event_recorder,
            clock.clone(),
            config.clone(),
        ));
        let orphan = Arc::new(OrphanSweeper::new(core, pod_api));

        let (shutdown_tx, _) = watch::channel(false);
        let (pod_event_tx, pod_event_rx) = mpsc::channel(POD_EVENT_CHANNEL_CAPACITY);

        Self {
            monitor,
            eviction,
            orphan,
            config,
            shutdown_tx,
            pod_event_tx,
            pod_event_rx: std::sync::Mutex::new(Some(pod_event_rx)),
        }
    }

    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            sender: Arc::new(self.shutdown_tx.clone()),
        }
    }

    /// Handle the external workload cache should call on pod add/update
    /// events, feeding the driver's event-driven orphan watcher.
    #[must_use]
    pub fn pod_event_handle(&self) -> PodEventHandle {
        PodEventHandle {
            sender: self.pod_event_tx.clone(),
        }
    }

    /// The status monitor, for callers (tests, embedders with their own
    /// scheduler) that want to drive a tick directly rather than through
    /// `spawn`'s timer.
    #[must_use]
    pub fn monitor(&self) -> &Arc<StatusMonitor> {
        &self.monitor
    }

    /// The eviction pipeline, for direct queue-drain driving.
    #[must_use]
    pub fn eviction(&self) -> &Arc<EvictionPipeline> {
        &self.eviction
    }

    /// The orphan sweeper, for direct sweep driving.
    #[must_use]
    pub fn orphan(&self) -> &Arc<OrphanSweeper> {
        &self.orphan
    }

    /// Spawns the five independently-timed tasks. Returns their join handles
    /// so the caller can await a clean shutdown. Calling this twice panics --
    /// the event-driven watcher's receiver can only be taken once.
    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(5);

        handles.push(spawn_periodic(
            "status-monitor",
            self.config.node_monitor_period(),
            self.shutdown_tx.subscribe(),
            {
                let monitor = self.monitor.clone();
                move || {
                    let monitor = monitor.clone();
                    async move {
                        if let Err(err) = monitor.tick().await {
                            tracing::warn!(%err, "status monitor tick failed");
                        }
                    }
                }
            },
        ));

        handles.push(spawn_periodic(
            "delete-queue-drain",
            self.config.node_eviction_period(),
            self.shutdown_tx.subscribe(),
            {
                let eviction = self.eviction.clone();
                move || {
                    let eviction = eviction.clone();
                    async move { eviction.drain_delete_queues().await }
                }
            },
        ));

        handles.push(spawn_periodic(
            "termination-queue-drain",
            self.config.node_eviction_period(),
            self.shutdown_tx.subscribe(),
            {
                let eviction = self.eviction.clone();
                move || {
                    let eviction = eviction.clone();
                    async move { eviction.drain_termination_queues().await }
                }
            },
        ));

        handles.push(spawn_periodic(
            "orphan-sweep",
            self.config.orphan_sweep_period(),
            self.shutdown_tx.subscribe(),
            {
                let orphan = self.orphan.clone();
                move || {
                    let orphan = orphan.clone();
                    async move { orphan.sweep().await }
                }
            },
        ));

        let pod_event_rx = self
            .pod_event_rx
            .lock()
            .expect("pod event mutex poisoned")
            .take()
            .expect("GuardianDriver::spawn called more than once");
        handles.push(spawn_pod_event_watcher(
            self.orphan.clone(),
            pod_event_rx,
            self.shutdown_tx.subscribe(),
        ));

        handles
    }
}

/// Fifth driver task: not timer-driven like the other four, but fed by the
/// workload cache's add/update callbacks through `PodEventHandle`. Delegates
/// to the same orphan policy `sweep` uses, scoped to the one pod that
/// changed, so an orphan is caught well before the next 30s sweep.
fn spawn_pod_event_watcher(
    orphan: Arc<OrphanSweeper>,
    mut events: mpsc::Receiver<PodInfo>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                pod = events.recv() => {
                    match pod {
                        Some(pod) => orphan.handle_pod_event(&pod).await,
                        None => break,
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(task = "pod-event-watcher", "shutting down");
                        break;
                    }
                }
            }
        }
    })
}

/// Spawns a task that calls `make_tick()` on every timer fire, until the
/// shutdown watch flips to `true`.
fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: std::time::Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    mut make_tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    make_tick().await;
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(task = name, "shutting down");
                        break;
                    }
                }
            }
        }
    })
}
