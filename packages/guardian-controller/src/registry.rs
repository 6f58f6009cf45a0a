//! Node status registry: the monitor's record of what it last observed.
//!
//! A plain concurrent map behind `parking_lot::RwLock`: small helper
//! methods, no trait object indirection, the monitor tick as the sole
//! writer.

use std::collections::HashMap;

use node_guardian_core::{NodeCondition, NodeName};
use parking_lot::RwLock;

/// One entry per known node: the last-observed Ready condition plus the two
/// local timestamps used for grace-period arithmetic. The monitor also
/// overwrites OutOfDisk on the node object during the staleness path (spec
/// §4.D step 2), but nothing downstream of the registry ever reads it back,
/// so it is not duplicated into this entry.
#[derive(Debug, Clone)]
pub struct NodeStatusEntry {
    pub ready: Option<NodeCondition>,
    /// Local wall-clock instant when we last saw the remote heartbeat change.
    pub probe_timestamp_ms: u64,
    /// Local wall-clock instant when the Ready condition last flipped value.
    pub ready_transition_timestamp_ms: u64,
}

impl NodeStatusEntry {
    #[must_use]
    pub fn new(now_ms: u64) -> Self {
        Self {
            ready: None,
            probe_timestamp_ms: now_ms,
            ready_transition_timestamp_ms: now_ms,
        }
    }
}

#[derive(Debug, Default)]
pub struct NodeStatusRegistry {
    entries: RwLock<HashMap<NodeName, NodeStatusEntry>>,
}

impl NodeStatusRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<NodeStatusEntry> {
        self.entries.read().get(name).cloned()
    }

    pub fn insert(&self, name: NodeName, entry: NodeStatusEntry) {
        self.entries.write().insert(name, entry);
    }

    /// Removes the entry for `name`, called only when the node leaves the
    /// known set.
    pub fn remove(&self, name: &str) -> Option<NodeStatusEntry> {
        self.entries.write().remove(name)
    }

    pub fn with_entry_mut<F>(&self, name: &str, f: F)
    where
        F: FnOnce(&mut NodeStatusEntry),
    {
        if let Some(entry) = self.entries.write().get_mut(name) {
            f(entry);
        }
    }

    #[must_use]
    pub fn known_names(&self) -> Vec<NodeName> {
        self.entries.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
