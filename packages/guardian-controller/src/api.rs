//! External collaborator contracts.
//!
//! The cluster API watch machinery, the cloud provider and the event
//! recorder are out-of-scope collaborators; only their call shapes are fixed
//! here, as `async_trait`s, following `cluster/traits.rs`'s
//! `ClusterService`/`MembershipService` convention of trait-only contracts
//! with no default implementation.

use async_trait::async_trait;
use node_guardian_core::{EventType, NodeInfo, NodeName, PodInfo};

/// Read/write access to node objects, as the cluster API store would expose.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn list_nodes(&self) -> anyhow::Result<Vec<NodeInfo>>;
    async fn get_node(&self, name: &str) -> anyhow::Result<Option<NodeInfo>>;
    async fn update_node_status(&self, node: &NodeInfo) -> anyhow::Result<()>;
    async fn delete_node(&self, name: &str) -> anyhow::Result<()>;
}

/// Read/write access to pod objects bound to nodes.
#[async_trait]
pub trait PodApi: Send + Sync {
    async fn list_pods_on_node(&self, node_name: &str) -> anyhow::Result<Vec<PodInfo>>;
    async fn delete_pod(&self, pod: &PodInfo, grace_period_seconds: u64) -> anyhow::Result<()>;
    async fn force_delete_pod(&self, pod: &PodInfo) -> anyhow::Result<()>;
    async fn update_pod_status_not_ready(&self, pod: &PodInfo) -> anyhow::Result<()>;
    /// All pods in the cluster, used by the orphan sweeper. Unlike
    /// `list_pods_on_node` this is not scoped to one node.
    async fn list_all_pods(&self) -> anyhow::Result<Vec<PodInfo>>;
}

/// Read-only view over the daemon-set cache, used by the delete worker to
/// skip pods that will simply be recreated on the same node.
pub trait DaemonSetCache: Send + Sync {
    fn is_daemon_set_pod(&self, pod: &PodInfo) -> bool;
}

/// Cloud-provider instance-existence check. Absence of a provider (the
/// `Option<Arc<dyn CloudProvider>>` the driver holds being `None`) means the
/// check is skipped entirely, not that every node is presumed gone.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    async fn instance_exists(&self, node_name: &NodeName) -> anyhow::Result<bool>;
}

/// Cluster event sink.
pub trait EventRecorder: Send + Sync {
    fn record(&self, node_name: &NodeName, event_type: EventType, reason: &'static str, message: &str);
}
