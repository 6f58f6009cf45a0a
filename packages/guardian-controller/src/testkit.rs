//! In-memory fakes driving the end-to-end scenario tests.
//!
//! One shared piece of state behind a `std::sync::Mutex`, implementing
//! every external trait the driver depends on, so a scenario can be
//! driven purely by advancing a `FixedClock` and calling
//! `tick()`/`sweep()` directly instead of racing a real timer.

use std::sync::Mutex;

use async_trait::async_trait;
use node_guardian_core::{EventRecord as CoreEventRecord, EventType, NodeInfo, NodeName, PodInfo};

use crate::api::{ClusterApi, CloudProvider, DaemonSetCache, EventRecorder, PodApi};

#[derive(Default)]
pub struct FakeCluster {
    nodes: Mutex<Vec<NodeInfo>>,
    pods: Mutex<Vec<PodInfo>>,
    /// Node names the fake cloud provider reports as gone.
    gone_instances: Mutex<Vec<NodeName>>,
    events: Mutex<Vec<CoreEventRecord>>,
}

impl FakeCluster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_nodes(&self, nodes: Vec<NodeInfo>) {
        *self.nodes.lock().unwrap() = nodes;
    }

    pub fn set_pods(&self, pods: Vec<PodInfo>) {
        *self.pods.lock().unwrap() = pods;
    }

    pub fn mark_instance_gone(&self, node_name: &str) {
        self.gone_instances.lock().unwrap().push(node_name.to_string());
    }

    #[must_use]
    pub fn nodes(&self) -> Vec<NodeInfo> {
        self.nodes.lock().unwrap().clone()
    }

    #[must_use]
    pub fn pods(&self) -> Vec<PodInfo> {
        self.pods.lock().unwrap().clone()
    }

    #[must_use]
    pub fn events(&self) -> Vec<CoreEventRecord> {
        self.events.lock().unwrap().clone()
    }

    #[must_use]
    pub fn events_with_reason(&self, reason: &str) -> Vec<CoreEventRecord> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.reason == reason)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_nodes(&self) -> anyhow::Result<Vec<NodeInfo>> {
        Ok(self.nodes())
    }

    async fn get_node(&self, name: &str) -> anyhow::Result<Option<NodeInfo>> {
        Ok(self.nodes.lock().unwrap().iter().find(|n| n.name == name).cloned())
    }

    async fn update_node_status(&self, node: &NodeInfo) -> anyhow::Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        if let Some(existing) = nodes.iter_mut().find(|n| n.name == node.name) {
            *existing = node.clone();
        }
        Ok(())
    }

    async fn delete_node(&self, name: &str) -> anyhow::Result<()> {
        self.nodes.lock().unwrap().retain(|n| n.name != name);
        Ok(())
    }
}

#[async_trait]
impl PodApi for FakeCluster {
    async fn list_pods_on_node(&self, node_name: &str) -> anyhow::Result<Vec<PodInfo>> {
        Ok(self
            .pods
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.node_name.as_deref() == Some(node_name))
            .cloned()
            .collect())
    }

    async fn delete_pod(&self, pod: &PodInfo, grace_period_seconds: u64) -> anyhow::Result<()> {
        let mut pods = self.pods.lock().unwrap();
        if let Some(existing) = pods.iter_mut().find(|p| p.name == pod.name) {
            existing.grace_period_seconds = grace_period_seconds;
            existing.deletion_timestamp = Some(0);
        }
        Ok(())
    }

    async fn force_delete_pod(&self, pod: &PodInfo) -> anyhow::Result<()> {
        self.pods.lock().unwrap().retain(|p| p.name != pod.name);
        Ok(())
    }

    async fn update_pod_status_not_ready(&self, _pod: &PodInfo) -> anyhow::Result<()> {
        Ok(())
    }

    async fn list_all_pods(&self) -> anyhow::Result<Vec<PodInfo>> {
        Ok(self.pods())
    }
}

impl DaemonSetCache for FakeCluster {
    fn is_daemon_set_pod(&self, pod: &PodInfo) -> bool {
        pod.owned_by_daemon_set
    }
}

#[async_trait]
impl CloudProvider for FakeCluster {
    async fn instance_exists(&self, node_name: &NodeName) -> anyhow::Result<bool> {
        Ok(!self.gone_instances.lock().unwrap().contains(node_name))
    }
}

impl EventRecorder for FakeCluster {
    fn record(&self, node_name: &NodeName, event_type: EventType, reason: &'static str, message: &str) {
        self.events.lock().unwrap().push(CoreEventRecord::new(
            node_name.clone(),
            event_type,
            reason,
            message.to_string(),
        ));
    }
}
