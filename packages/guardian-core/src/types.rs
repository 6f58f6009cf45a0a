//! Node domain types shared between the controller and its wire boundary.
//!
//! These mirror the client-facing shape a real cluster API would expose --
//! plain data, `Serialize`/`Deserialize` for logging and event payloads, no
//! behavior. The controller's own bookkeeping types (status registry
//! entries, zone states, queue entries) live in `node-guardian-controller`
//! since they are internal, not wire data.

use serde::{Deserialize, Serialize};

/// Stable identifier for a node. Cheap to clone; used as a map key throughout.
pub type NodeName = String;

/// Failure-domain label on a node. The empty string is a legal zone, meaning
/// "unzoned" -- every unzoned node is treated as sharing one failure domain.
pub type ZoneKey = String;

/// Tri-state health signal, mirroring the wire representation of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// The condition kinds the controller cares about. A real cluster API exposes
/// more (MemoryPressure, PIDPressure, NetworkUnavailable, ...); the controller
/// only reasons about these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeConditionKind {
    Ready,
    OutOfDisk,
}

/// A single node condition as reported (or synthesized) from a node object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCondition {
    pub kind: NodeConditionKind,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    /// Remote heartbeat timestamp (node's own clock), ms since epoch.
    pub last_heartbeat_time: u64,
    /// Remote transition timestamp (node's own clock), ms since epoch.
    pub last_transition_time: u64,
}

impl NodeCondition {
    /// Builds a synthesized Unknown condition, used when a node has never
    /// reported a condition of this kind -- both timestamps are pinned to the
    /// node's creation time.
    #[must_use]
    pub fn synthesize_unknown(kind: NodeConditionKind, creation_timestamp: u64) -> Self {
        Self {
            kind,
            status: ConditionStatus::Unknown,
            reason: "NodeStatusNeverUpdated".to_string(),
            message: "Node has never reported status".to_string(),
            last_heartbeat_time: creation_timestamp,
            last_transition_time: creation_timestamp,
        }
    }
}

/// Snapshot of a node object as returned by the cluster API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub name: NodeName,
    pub zone: ZoneKey,
    pub is_master: bool,
    pub creation_timestamp: u64,
    pub conditions: Vec<NodeCondition>,
}

impl NodeInfo {
    /// Finds the condition of the given kind, if the node has reported one.
    #[must_use]
    pub fn condition(&self, kind: NodeConditionKind) -> Option<&NodeCondition> {
        self.conditions.iter().find(|c| c.kind == kind)
    }

    /// Shorthand for the Ready condition, the one the monitor and classifier
    /// consult most often.
    #[must_use]
    pub fn ready_condition(&self) -> Option<&NodeCondition> {
        self.condition(NodeConditionKind::Ready)
    }
}

/// Identifies a workload (pod) bound, or not yet bound, to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodInfo {
    pub namespace: String,
    pub name: String,
    pub node_name: Option<NodeName>,
    pub is_mirror_pod: bool,
    pub owned_by_daemon_set: bool,
    pub grace_period_seconds: u64,
    /// Set once deletion has been requested; `None` while the pod is live.
    pub deletion_timestamp: Option<u64>,
}

impl PodInfo {
    /// Returns `true` if this pod is exempt from ordinary node-drain eviction
    /// (mirror pods are unmanaged static pods; daemon-set pods are recreated
    /// on the same node by their own controller, not rescheduled elsewhere).
    #[must_use]
    pub fn is_evictable(&self) -> bool {
        !self.is_mirror_pod && !self.owned_by_daemon_set
    }
}
