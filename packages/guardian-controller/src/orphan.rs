//! Orphan sweeper: force-deletes workloads bound to a node the cache no
//! longer knows about.

use std::sync::Arc;

use node_guardian_core::PodInfo;
use tracing::{debug, warn};

use crate::api::PodApi;
use crate::core::GuardianCore;

pub struct OrphanSweeper {
    core: Arc<GuardianCore>,
    pod_api: Arc<dyn PodApi>,
}

impl OrphanSweeper {
    #[must_use]
    pub fn new(core: Arc<GuardianCore>, pod_api: Arc<dyn PodApi>) -> Self {
        Self { core, pod_api }
    }

    /// Applies the orphan policy to a single workload, as invoked by the
    /// workload cache's add/update callback rather than the periodic sweep.
    /// Same policy as `sweep`, scoped to one pod so a cache event doesn't
    /// have to wait for the next 30s cycle.
    pub async fn handle_pod_event(&self, pod: &PodInfo) {
        let Some(node_name) = &pod.node_name else {
            return;
        };
        if self.core.get_known_node(node_name).is_some() {
            return;
        }
        debug!(node = %node_name, pod = %pod.name, "force-deleting orphaned workload (event-driven)");
        if let Err(err) = self.pod_api.force_delete_pod(pod).await {
            warn!(node = %node_name, pod = %pod.name, %err, "failed to force-delete orphaned workload");
        }
    }

    /// Lists every workload; force-deletes any bound to a node absent from
    /// the known node set. Workloads with no node binding are ignored.
    pub async fn sweep(&self) {
        let pods = match self.pod_api.list_all_pods().await {
            Ok(pods) => pods,
            Err(err) => {
                warn!(%err, "orphan sweep failed to list workloads, skipping this cycle");
                return;
            }
        };

        // Prefer the controller's own known-node set over a fresh list call:
        // it is kept current by the monitor tick and this sweep should not
        // independently race the reconciliation phase for node visibility.
        let known: std::collections::HashSet<_> = self.core.known_node_names().into_iter().collect();

        for pod in pods {
            let Some(node_name) = &pod.node_name else {
                continue;
            };
            if !known.contains(node_name) {
                debug!(node = %node_name, pod = %pod.name, "force-deleting orphaned workload");
                if let Err(err) = self.pod_api.force_delete_pod(&pod).await {
                    warn!(node = %node_name, pod = %pod.name, %err, "failed to force-delete orphaned workload");
                }
            }
        }
    }
}
