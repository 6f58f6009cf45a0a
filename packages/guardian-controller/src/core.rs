//! Shared state behind "the evictor lock".
//!
//! Per the concurrency model, `knownNodeSet`, `zoneStates` and the map of
//! per-zone eviction queues are a single process-wide critical section. The
//! queues themselves stay independently lock-protected (see [`crate::queue`])
//! so draining one doesn't require holding this coarser lock for the
//! duration of a pod-deletion call -- a refinement permitted as long as the
//! ordering invariants of the tick hold (documented in DESIGN.md).
//! Structural changes -- which zones and nodes exist -- still go through
//! this one lock: one struct owning its shared maps behind a single
//! internal lock.

use std::collections::HashMap;
use std::sync::Arc;

use node_guardian_core::{NodeInfo, NodeName, ZoneKey};
use parking_lot::Mutex;

use crate::queue::RateLimitedQueue;
use crate::zone::ZoneState;

/// The two rate-limited queues owned by one zone.
pub struct ZoneQueues {
    pub pod_evictor: Arc<RateLimitedQueue<NodeName>>,
    pub termination_evictor: Arc<RateLimitedQueue<NodeName>>,
}

impl ZoneQueues {
    fn new(qps: f64, now_ms: u64) -> Self {
        Self {
            pod_evictor: Arc::new(RateLimitedQueue::new(qps, now_ms)),
            termination_evictor: Arc::new(RateLimitedQueue::new(qps, now_ms)),
        }
    }
}

struct Inner {
    known_nodes: HashMap<NodeName, NodeInfo>,
    zone_states: HashMap<ZoneKey, ZoneState>,
    zone_queues: HashMap<ZoneKey, ZoneQueues>,
    eviction_qps: f64,
}

/// The evictor lock: one `Mutex` guarding every piece of structural state
/// the monitor and eviction pipeline share.
pub struct GuardianCore {
    inner: Mutex<Inner>,
}

impl GuardianCore {
    #[must_use]
    pub fn new(eviction_qps: f64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                known_nodes: HashMap::new(),
                zone_states: HashMap::new(),
                zone_queues: HashMap::new(),
                eviction_qps,
            }),
        }
    }

    /// Ensures both queues exist for `zone`, creating them with fresh token
    /// buckets if this is the zone's first-seen node.
    pub fn ensure_zone(&self, zone: &str, now_ms: u64) {
        let mut inner = self.inner.lock();
        if !inner.zone_queues.contains_key(zone) {
            let qps = inner.eviction_qps;
            inner
                .zone_queues
                .insert(zone.to_string(), ZoneQueues::new(qps, now_ms));
        }
        inner.zone_states.entry(zone.to_string()).or_insert(ZoneState::Normal);
    }

    pub fn insert_known_node(&self, node: NodeInfo) {
        self.inner.lock().known_nodes.insert(node.name.clone(), node);
    }

    pub fn remove_known_node(&self, name: &str) -> Option<NodeInfo> {
        self.inner.lock().known_nodes.remove(name)
    }

    #[must_use]
    pub fn known_node_names(&self) -> Vec<NodeName> {
        self.inner.lock().known_nodes.keys().cloned().collect()
    }

    #[must_use]
    pub fn get_known_node(&self, name: &str) -> Option<NodeInfo> {
        self.inner.lock().known_nodes.get(name).cloned()
    }

    #[must_use]
    pub fn zone_state(&self, zone: &str) -> ZoneState {
        self.inner
            .lock()
            .zone_states
            .get(zone)
            .copied()
            .unwrap_or(ZoneState::Normal)
    }

    pub fn set_zone_state(&self, zone: &str, state: ZoneState) {
        self.inner
            .lock()
            .zone_states
            .insert(zone.to_string(), state);
    }

    #[must_use]
    pub fn zone_keys(&self) -> Vec<ZoneKey> {
        self.inner.lock().zone_states.keys().cloned().collect()
    }

    #[must_use]
    pub fn all_zones_full_segmentation(&self) -> bool {
        let inner = self.inner.lock();
        !inner.zone_states.is_empty()
            && inner
                .zone_states
                .values()
                .all(|s| *s == ZoneState::FullSegmentation)
    }

    /// Clones the queue handles for `zone`, creating them with a fresh token
    /// bucket if this is the first time the zone has been touched.
    #[must_use]
    pub fn zone_queues(&self, zone: &str, now_ms: u64) -> (Arc<RateLimitedQueue<NodeName>>, Arc<RateLimitedQueue<NodeName>>) {
        let mut inner = self.inner.lock();
        if !inner.zone_queues.contains_key(zone) {
            let qps = inner.eviction_qps;
            inner
                .zone_queues
                .insert(zone.to_string(), ZoneQueues::new(qps, now_ms));
        }
        let queues = inner.zone_queues.get(zone).expect("just inserted");
        (queues.pod_evictor.clone(), queues.termination_evictor.clone())
    }

    /// The gate in `evictPods`: returns `false` (refuse entry) if the node's
    /// own zone is FullSegmentation, or if every known zone is -- the latter
    /// a global safeguard distinct from the per-zone gate, guarding a zone
    /// that hasn't been classified yet this tick rather than subsuming the
    /// per-zone check.
    pub fn evict_pods(&self, node: &NodeInfo, now_ms: u64) -> bool {
        if self.zone_state(&node.zone) == ZoneState::FullSegmentation || self.all_zones_full_segmentation() {
            return false;
        }
        let (pod_evictor, _) = self.zone_queues(&node.zone, now_ms);
        pod_evictor.add(node.name.clone(), now_ms);
        true
    }

    /// Removes the node from both queues of its zone.
    pub fn cancel_pod_eviction(&self, node_name: &str, zone: &str, now_ms: u64) {
        let (pod_evictor, termination_evictor) = self.zone_queues(zone, now_ms);
        pod_evictor.remove(&node_name.to_string());
        termination_evictor.remove(&node_name.to_string());
    }

    /// Cancels pending evictions for every node in `zone`, used when the zone
    /// enters FullSegmentation.
    pub fn cancel_all_in_zone(&self, zone: &str, node_names: &[NodeName], now_ms: u64) {
        for name in node_names {
            self.cancel_pod_eviction(name, zone, now_ms);
        }
    }
}
