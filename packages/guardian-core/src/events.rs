//! Event payloads recorded against cluster objects.
//!
//! The controller never talks to an event sink directly -- it calls
//! `EventRecorder::record` (defined in `node-guardian-controller::api`) with
//! one of these payloads. Keeping the payload shape here, alongside the node
//! types it refers to, lets both the controller and its fakes share one
//! definition.

use serde::{Deserialize, Serialize};

use crate::types::NodeName;

/// Severity of a recorded event, mirroring the cluster API's own enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    Normal,
    Warning,
}

/// Reason strings the controller emits. Kept as associated constants rather
/// than an enum so they read naturally as the `reason` field of an event.
pub struct EventReason;

impl EventReason {
    pub const REGISTERED_NODE: &'static str = "RegisteredNode";
    pub const REMOVING_NODE: &'static str = "RemovingNode";
    pub const NODE_NOT_READY: &'static str = "NodeNotReady";
    pub const DELETING_NODE: &'static str = "DeletingNode";
    pub const TERMINATED_ALL_PODS: &'static str = "TerminatedAllPods";
}

/// A single event the controller wants recorded against a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub node_name: NodeName,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
}

impl EventRecord {
    #[must_use]
    pub fn new(
        node_name: impl Into<NodeName>,
        event_type: EventType,
        reason: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            node_name: node_name.into(),
            event_type,
            reason: reason.to_string(),
            message: message.into(),
        }
    }
}
