//! Eviction pipeline: delete worker and termination worker.
//!
//! Both fire every `nodeEvictionPeriod`, each scanning every zone's
//! respective queue. Worker bodies are `async fn`s operating on the queue's
//! `pop_due`/`reinsert`/`finish` trio so a cluster-API call never holds the
//! queue's internal lock.

use std::sync::Arc;
use std::time::Duration;

use node_guardian_core::{ClockSource, EventReason, EventType, NodeName};
use tracing::{debug, info, warn};

use crate::api::{DaemonSetCache, EventRecorder, PodApi};
use crate::config::GuardianConfig;
use crate::core::GuardianCore;

pub struct EvictionPipeline {
    core: Arc<GuardianCore>,
    pod_api: Arc<dyn PodApi>,
    daemon_set_cache: Arc<dyn DaemonSetCache>,
    event_recorder: Arc<dyn EventRecorder>,
    clock: Arc<dyn ClockSource>,
    config: GuardianConfig,
}

impl EvictionPipeline {
    #[must_use]
    pub fn new(
        core: Arc<GuardianCore>,
        pod_api: Arc<dyn PodApi>,
        daemon_set_cache: Arc<dyn DaemonSetCache>,
        event_recorder: Arc<dyn EventRecorder>,
        clock: Arc<dyn ClockSource>,
        config: GuardianConfig,
    ) -> Self {
        Self {
            core,
            pod_api,
            daemon_set_cache,
            event_recorder,
            clock,
            config,
        }
    }

    /// Drains one due entry from every zone's delete queue.
    pub async fn drain_delete_queues(&self) {
        let now_ms = self.clock.now_ms();
        for zone in self.core.zone_keys() {
            let (pod_evictor, _) = self.core.zone_queues(&zone, now_ms);
            let Some(popped) = pod_evictor.pop_due(now_ms) else {
                continue;
            };
            let node_name = popped.key.clone();
            match self.delete_node_pods(&node_name).await {
                Ok(should_terminate) => {
                    pod_evictor.finish(&node_name);
                    if should_terminate {
                        let (_, termination_evictor) = self.core.zone_queues(&zone, now_ms);
                        termination_evictor.add(node_name, now_ms);
                    }
                }
                Err(err) => {
                    warn!(node = %node_name, %err, "pod deletion failed, will retry on next drain");
                    pod_evictor.reinsert(popped, now_ms, 0);
                }
            }
        }
    }

    /// Lists the node's evictable pods and issues a graceful delete for
    /// each. Returns whether any pod actually had a nonzero grace period (and
    /// so needs to be handed to the termination worker).
    async fn delete_node_pods(&self, node_name: &NodeName) -> anyhow::Result<bool> {
        let pods = self.pod_api.list_pods_on_node(node_name).await?;
        let mut needs_termination = false;
        for pod in pods.iter().filter(|p| p.is_evictable() && !self.daemon_set_cache.is_daemon_set_pod(p)) {
            self.pod_api.delete_pod(pod, pod.grace_period_seconds).await?;
            if pod.grace_period_seconds > 0 {
                needs_termination = true;
            }
        }
        Ok(needs_termination)
    }

    /// Drains one due entry from every zone's termination queue.
    pub async fn drain_termination_queues(&self) {
        let now_ms = self.clock.now_ms();
        for zone in self.core.zone_keys() {
            let (_, termination_evictor) = self.core.zone_queues(&zone, now_ms);
            let Some(popped) = termination_evictor.pop_due(now_ms) else {
                continue;
            };
            let node_name = popped.key.clone();
            match self.check_termination(&node_name, now_ms).await {
                Ok(TerminationOutcome::AllGone) => {
                    info!(node = %node_name, "all pods terminated");
                    self.event_recorder.record(
                        &node_name,
                        EventType::Normal,
                        EventReason::TERMINATED_ALL_PODS,
                        "All pods on the node finished terminating",
                    );
                    termination_evictor.finish(&node_name);
                }
                Ok(TerminationOutcome::StillWaiting(remaining)) => {
                    termination_evictor.reinsert(popped, now_ms, remaining.as_millis() as u64);
                }
                Err(err) => {
                    debug!(node = %node_name, %err, "termination check failed, retrying next drain");
                    termination_evictor.reinsert(popped, now_ms, 0);
                }
            }
        }
    }

    /// Force-deletes any pod whose grace period has fully elapsed; reports
    /// how long to wait before the next check otherwise.
    async fn check_termination(&self, node_name: &NodeName, now_ms: u64) -> anyhow::Result<TerminationOutcome> {
        let pods = self.pod_api.list_pods_on_node(node_name).await?;
        if pods.is_empty() {
            return Ok(TerminationOutcome::AllGone);
        }

        let max_grace_ms = self.config.maximum_grace_period().as_millis() as u64;
        let eviction_period_ms = self.config.node_eviction_period().as_millis() as u64;
        let mut min_remaining_ms: Option<u64> = None;

        for pod in &pods {
            let Some(deletion_ms) = pod.deletion_timestamp else {
                continue;
            };
            let effective_grace_ms = (pod.grace_period_seconds * 1000).min(max_grace_ms);
            let deadline_ms = deletion_ms + effective_grace_ms;
            if now_ms >= deadline_ms {
                self.pod_api.force_delete_pod(pod).await?;
            } else {
                let remaining = deadline_ms - now_ms;
                min_remaining_ms = Some(min_remaining_ms.map_or(remaining, |m| m.min(remaining)));
            }
        }

        match min_remaining_ms {
            None => Ok(TerminationOutcome::AllGone),
            Some(remaining) => Ok(TerminationOutcome::StillWaiting(Duration::from_millis(
                remaining.max(eviction_period_ms),
            ))),
        }
    }
}

enum TerminationOutcome {
    AllGone,
    StillWaiting(Duration),
}
