//! Status monitor: the controller's heart.
//!
//! Runs the five-phase tick: reconcile the known node set, update each
//! node's observed status with retry-and-refetch, decide on evictions,
//! report Ready transitions, and sweep zone states. Logging follows one
//! convention throughout: `info!` for expected transitions, `warn!` for
//! presumed-stale nodes and retry exhaustion, `debug!` for routine
//! bookkeeping, `error!` only for the "non-nil saved, nil observed"
//! anomaly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use node_guardian_core::{
    ClockSource, ConditionStatus, EventReason, EventType, NodeCondition, NodeConditionKind,
    NodeInfo, NodeName,
};
use tracing::{debug, error, info, warn};

use crate::api::{ClusterApi, CloudProvider, EventRecorder, PodApi};
use crate::config::GuardianConfig;
use crate::core::GuardianCore;
use crate::registry::{NodeStatusEntry, NodeStatusRegistry};
use crate::zone::compute_zone_state;

pub struct StatusMonitor {
    core: Arc<GuardianCore>,
    registry: Arc<NodeStatusRegistry>,
    cluster_api: Arc<dyn ClusterApi>,
    pod_api: Arc<dyn PodApi>,
    cloud_provider: Option<Arc<dyn CloudProvider>>,
    event_recorder: Arc<dyn EventRecorder>,
    clock: Arc<dyn ClockSource>,
    config: GuardianConfig,
}

impl StatusMonitor {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        core: Arc<GuardianCore>,
        registry: Arc<NodeStatusRegistry>,
        cluster_api: Arc<dyn ClusterApi>,
        pod_api: Arc<dyn PodApi>,
        cloud_provider: Option<Arc<dyn CloudProvider>>,
        event_recorder: Arc<dyn EventRecorder>,
        clock: Arc<dyn ClockSource>,
        config: GuardianConfig,
    ) -> Self {
        Self {
            core,
            registry,
            cluster_api,
            pod_api,
            cloud_provider,
            event_recorder,
            clock,
            config,
        }
    }

    /// Runs one full tick: reconcile, per-node status pass, zone sweep.
    pub async fn tick(&self) -> anyhow::Result<()> {
        let listed = self.cluster_api.list_nodes().await?;
        self.reconcile_known_set(&listed).await?;

        let now_ms = self.clock.now_ms();
        let mut ready_by_zone: HashMap<String, Vec<ConditionStatus>> = HashMap::new();

        for node in listed.iter().filter(|n| !n.is_master) {
            let observed_ready = self.update_node_status(node, now_ms).await;
            if let Some(status) = observed_ready {
                ready_by_zone.entry(node.zone.clone()).or_default().push(status);
            }
        }

        self.sweep_zone_states(&ready_by_zone, &listed, now_ms);
        Ok(())
    }

    /// Phase 1: reconcile the known node set against the freshly listed one.
    async fn reconcile_known_set(&self, listed: &[NodeInfo]) -> anyhow::Result<()> {
        let now_ms = self.clock.now_ms();
        let listed_names: HashSet<NodeName> = listed.iter().map(|n| n.name.clone()).collect();
        let known_names: HashSet<NodeName> = self.core.known_node_names().into_iter().collect();

        for node in listed {
            if !known_names.contains(&node.name) {
                info!(node = %node.name, zone = %node.zone, "registering newly observed node");
                self.event_recorder.record(
                    &node.name,
                    EventType::Normal,
                    EventReason::REGISTERED_NODE,
                    "Node became visible to the controller",
                );
                self.core.ensure_zone(&node.zone, now_ms);
                self.core.cancel_pod_eviction(&node.name, &node.zone, now_ms);
                self.core.insert_known_node(node.clone());
            }
        }

        for name in known_names.difference(&listed_names) {
            let zone = self
                .core
                .get_known_node(name)
                .map(|n| n.zone)
                .unwrap_or_default();
            info!(node = %name, "node removed from cluster, scheduling eviction");
            self.event_recorder.record(
                name,
                EventType::Normal,
                EventReason::REMOVING_NODE,
                "Node no longer present in the cluster API's node list",
            );
            if let Some(node) = self.core.get_known_node(name) {
                self.core.evict_pods(&node, now_ms);
            }
            self.core.remove_known_node(name);
            self.registry.remove(name);
        }

        Ok(())
    }

    /// Phase 2+3+4: `tryUpdateNodeStatus` with retry-and-refetch, then the
    /// eviction decision and transition reporting for one node. Returns the
    /// observed Ready status for the zone sweep, or `None` if the node
    /// vanished mid-retry.
    async fn update_node_status(&self, node: &NodeInfo, now_ms: u64) -> Option<ConditionStatus> {
        let mut current = node.clone();
        let mut attempt = 0;
        loop {
            match self.apply_status_update(&current, now_ms).await {
                Ok(observed_status) => return Some(observed_status),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.config.node_status_update_retry {
                        warn!(node = %node.name, attempts = attempt, %err, "status update retries exhausted");
                        return None;
                    }
                    match self.cluster_api.get_node(&node.name).await {
                        Ok(Some(refetched)) => current = refetched,
                        Ok(None) | Err(_) => {
                            debug!(node = %node.name, "node presumed deleted during retry, skipping");
                            return None;
                        }
                    }
                }
            }
        }
    }

    /// One attempt of `tryUpdateNodeStatus`: updates the registry entry,
    /// checks staleness, and runs the eviction decision/transition reporting
    /// for this node. Returns `Err` only when the staleness push to the
    /// cluster API fails (the retryable condition).
    async fn apply_status_update(&self, node: &NodeInfo, now_ms: u64) -> anyhow::Result<ConditionStatus> {
        let raw_ready = node.ready_condition().cloned();
        let (observed, grace_ms) = match &raw_ready {
            Some(c) => (c.clone(), self.config.node_monitor_grace_period().as_millis() as u64),
            None => (
                NodeCondition::synthesize_unknown(NodeConditionKind::Ready, node.creation_timestamp),
                self.config.node_startup_grace_period().as_millis() as u64,
            ),
        };

        let saved = self.registry.get(&node.name);
        let previous_status = saved.as_ref().and_then(|e| e.ready.as_ref().map(|c| c.status));

        match &saved {
            None => {
                self.registry.insert(node.name.clone(), {
                    let mut entry = NodeStatusEntry::new(now_ms);
                    entry.ready = Some(observed.clone());
                    entry
                });
            }
            Some(entry) if entry.ready.is_none() && raw_ready.is_some() => {
                self.registry.with_entry_mut(&node.name, |e| {
                    e.ready = Some(observed.clone());
                    e.probe_timestamp_ms = now_ms;
                    e.ready_transition_timestamp_ms = now_ms;
                });
            }
            Some(entry) if entry.ready.is_some() && raw_ready.is_none() => {
                error!(node = %node.name, "node had a recorded Ready condition but now reports none");
                self.registry.with_entry_mut(&node.name, |e| {
                    e.ready = Some(observed.clone());
                    e.probe_timestamp_ms = now_ms;
                    e.ready_transition_timestamp_ms = now_ms;
                });
            }
            Some(entry) => {
                let saved_ready = entry.ready.as_ref().expect("checked above");
                if saved_ready.last_heartbeat_time == observed.last_heartbeat_time
                    && saved_ready.last_transition_time == observed.last_transition_time
                {
                    // unchanged
                } else if saved_ready.last_transition_time == observed.last_transition_time {
                    self.registry.with_entry_mut(&node.name, |e| {
                        e.ready = Some(observed.clone());
                        e.probe_timestamp_ms = now_ms;
                    });
                } else {
                    self.registry.with_entry_mut(&node.name, |e| {
                        e.ready = Some(observed.clone());
                        e.probe_timestamp_ms = now_ms;
                        e.ready_transition_timestamp_ms = now_ms;
                    });
                }
            }
        }

        let entry = self.registry.get(&node.name).expect("just written");
        if now_ms > entry.probe_timestamp_ms + grace_ms {
            warn!(node = %node.name, "node presumed stale, marking Unknown");
            let reason = if raw_ready.is_none() {
                "NodeStatusNeverUpdated"
            } else {
                "NodeStatusUnknown"
            };
            let mut stale_node = node.clone();
            for kind in [NodeConditionKind::Ready, NodeConditionKind::OutOfDisk] {
                let message = "Kubelet stopped posting node status".to_string();
                let stale_condition = NodeCondition {
                    kind,
                    status: ConditionStatus::Unknown,
                    reason: reason.to_string(),
                    message,
                    last_heartbeat_time: entry.ready.as_ref().map_or(now_ms, |c| c.last_heartbeat_time),
                    last_transition_time: now_ms,
                };
                stale_node.conditions.retain(|c| c.kind != kind);
                stale_node.conditions.push(stale_condition);
            }
            self.cluster_api.update_node_status(&stale_node).await?;
            self.registry.with_entry_mut(&node.name, |e| {
                e.ready_transition_timestamp_ms = now_ms;
                e.ready = stale_node.ready_condition().cloned();
            });
        }

        let entry = self.registry.get(&node.name).expect("just written");
        let observed_status = entry.ready.as_ref().map_or(ConditionStatus::Unknown, |c| c.status);

        self.run_eviction_decision(node, &entry, now_ms).await;
        self.report_transition(node, previous_status, observed_status).await;

        Ok(observed_status)
    }

    /// Phase 3: eviction decision and the cloud-provider escape hatch.
    async fn run_eviction_decision(&self, node: &NodeInfo, entry: &NodeStatusEntry, now_ms: u64) {
        let observed_status = entry.ready.as_ref().map_or(ConditionStatus::Unknown, |c| c.status);
        let eviction_timeout_ms = self.config.pod_eviction_timeout().as_millis() as u64;

        match observed_status {
            ConditionStatus::False => {
                if now_ms > entry.ready_transition_timestamp_ms + eviction_timeout_ms {
                    self.core.evict_pods(node, now_ms);
                }
            }
            ConditionStatus::Unknown => {
                if now_ms > entry.probe_timestamp_ms + eviction_timeout_ms {
                    self.core.evict_pods(node, now_ms);
                }
            }
            ConditionStatus::True => {
                self.core.cancel_pod_eviction(&node.name, &node.zone, now_ms);
            }
        }

        if observed_status != ConditionStatus::True {
            if let Some(provider) = &self.cloud_provider {
                match provider.instance_exists(&node.name).await {
                    Ok(false) => self.force_delete_gone_node(node),
                    Ok(true) => {}
                    Err(err) => {
                        warn!(node = %node.name, %err, "cloud provider query failed, skipping this tick's check");
                    }
                }
            }
        }
    }

    /// Asynchronously force-deletes a node whose backing instance is gone,
    /// bypassing the queue and grace periods. Detached so it never holds the
    /// evictor lock or blocks the tick.
    fn force_delete_gone_node(&self, node: &NodeInfo) {
        let node = node.clone();
        let cluster_api = self.cluster_api.clone();
        let pod_api = self.pod_api.clone();
        let event_recorder = self.event_recorder.clone();
        tokio::spawn(async move {
            event_recorder.record(
                &node.name,
                EventType::Normal,
                EventReason::DELETING_NODE,
                "Cloud provider reports the backing instance no longer exists",
            );
            if let Ok(pods) = pod_api.list_pods_on_node(&node.name).await {
                for pod in pods {
                    if let Err(err) = pod_api.force_delete_pod(&pod).await {
                        warn!(node = %node.name, pod = %pod.name, %err, "force-delete of pod on cloud-gone node failed");
                    }
                }
            }
            if let Err(err) = cluster_api.delete_node(&node.name).await {
                warn!(node = %node.name, %err, "force-delete of cloud-gone node failed");
            }
        });
    }

    /// Phase 4: if the node was Ready and no longer is, emit `NodeNotReady`
    /// and mark its pods not-ready.
    async fn report_transition(
        &self,
        node: &NodeInfo,
        previous_status: Option<ConditionStatus>,
        observed_status: ConditionStatus,
    ) {
        if previous_status == Some(ConditionStatus::True) && observed_status != ConditionStatus::True {
            self.event_recorder.record(
                &node.name,
                EventType::Warning,
                EventReason::NODE_NOT_READY,
                "Node Ready condition transitioned away from True",
            );
            if let Ok(pods) = self.pod_api.list_pods_on_node(&node.name).await {
                for pod in pods {
                    if let Err(err) = self.pod_api.update_pod_status_not_ready(&pod).await {
                        debug!(node = %node.name, pod = %pod.name, %err, "failed to mark pod not-ready");
                    }
                }
            }
        }
    }

    /// Phase 5: classify every zone observed this tick; react to transitions.
    fn sweep_zone_states(
        &self,
        ready_by_zone: &HashMap<String, Vec<ConditionStatus>>,
        listed: &[NodeInfo],
        now_ms: u64,
    ) {
        for (zone, statuses) in ready_by_zone {
            let new_state = compute_zone_state(statuses);
            let old_state = self.core.zone_state(zone);
            if new_state == old_state {
                continue;
            }

            let zone_node_names: Vec<NodeName> = listed
                .iter()
                .filter(|n| &n.zone == zone && !n.is_master)
                .map(|n| n.name.clone())
                .collect();

            match new_state {
                crate::zone::ZoneState::FullSegmentation => {
                    info!(zone = %zone, "zone entering FullSegmentation, cancelling pending evictions");
                    self.core.cancel_all_in_zone(zone, &zone_node_names, now_ms);
                }
                crate::zone::ZoneState::Normal if old_state == crate::zone::ZoneState::FullSegmentation => {
                    info!(zone = %zone, "zone recovered to Normal, resetting node timestamps");
                    for name in &zone_node_names {
                        self.registry.with_entry_mut(name, |e| {
                            e.probe_timestamp_ms = now_ms;
                            e.ready_transition_timestamp_ms = now_ms;
                        });
                    }
                }
                _ => {}
            }

            self.core.set_zone_state(zone, new_state);
        }
    }
}
