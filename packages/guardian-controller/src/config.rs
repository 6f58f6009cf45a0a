//! Guardian configuration.
//!
//! Tunables governing grace periods, monitor cadence, and eviction rate
//! limiting. Exposed both as a plain struct (for embedding) and a
//! `clap::Parser` CLI front-end (for the standalone binary).

use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::errors::GuardianError;

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "node-guardian", about = "Cluster node health controller")]
pub struct GuardianConfig {
    /// Time from last known-bad observation to eviction trigger.
    #[arg(long, env = "GUARDIAN_POD_EVICTION_TIMEOUT_SECS", default_value_t = 300)]
    pub pod_eviction_timeout_secs: u64,

    /// Grace after which a heartbeat-less node is marked Unknown.
    #[arg(long, env = "GUARDIAN_NODE_MONITOR_GRACE_PERIOD_SECS", default_value_t = 40)]
    pub node_monitor_grace_period_secs: u64,

    /// Same as `node_monitor_grace_period_secs`, but applied when the node has
    /// never reported a Ready condition.
    #[arg(long, env = "GUARDIAN_NODE_STARTUP_GRACE_PERIOD_SECS", default_value_t = 60)]
    pub node_startup_grace_period_secs: u64,

    /// Period of the status monitor tick.
    #[arg(long, env = "GUARDIAN_NODE_MONITOR_PERIOD_SECS", default_value_t = 5)]
    pub node_monitor_period_secs: u64,

    /// Token-bucket refill rate for per-zone eviction queues, in queries per second.
    #[arg(long, env = "GUARDIAN_EVICTION_LIMITER_QPS", default_value_t = 0.1)]
    pub eviction_limiter_qps: f64,

    /// Upper bound on termination wait before force-delete.
    #[arg(long, env = "GUARDIAN_MAXIMUM_GRACE_PERIOD_SECS", default_value_t = 300)]
    pub maximum_grace_period_secs: u64,

    /// Period of both eviction workers (delete queue, termination queue).
    #[arg(long, env = "GUARDIAN_NODE_EVICTION_PERIOD_MS", default_value_t = 100)]
    pub node_eviction_period_ms: u64,

    /// Per-tick retry count for status updates.
    #[arg(long, env = "GUARDIAN_NODE_STATUS_UPDATE_RETRY", default_value_t = 5)]
    pub node_status_update_retry: u32,

    /// Period of the orphan workload sweep.
    #[arg(long, env = "GUARDIAN_ORPHAN_SWEEP_PERIOD_SECS", default_value_t = 30)]
    pub orphan_sweep_period_secs: u64,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            pod_eviction_timeout_secs: 300,
            node_monitor_grace_period_secs: 40,
            node_startup_grace_period_secs: 60,
            node_monitor_period_secs: 5,
            eviction_limiter_qps: 0.1,
            maximum_grace_period_secs: 300,
            node_eviction_period_ms: 100,
            node_status_update_retry: 5,
            orphan_sweep_period_secs: 30,
        }
    }
}

impl GuardianConfig {
    pub fn pod_eviction_timeout(&self) -> Duration {
        Duration::from_secs(self.pod_eviction_timeout_secs)
    }

    pub fn node_monitor_grace_period(&self) -> Duration {
        Duration::from_secs(self.node_monitor_grace_period_secs)
    }

    pub fn node_startup_grace_period(&self) -> Duration {
        Duration::from_secs(self.node_startup_grace_period_secs)
    }

    pub fn node_monitor_period(&self) -> Duration {
        Duration::from_secs(self.node_monitor_period_secs)
    }

    pub fn maximum_grace_period(&self) -> Duration {
        Duration::from_secs(self.maximum_grace_period_secs)
    }

    pub fn node_eviction_period(&self) -> Duration {
        Duration::from_millis(self.node_eviction_period_ms)
    }

    pub fn orphan_sweep_period(&self) -> Duration {
        Duration::from_secs(self.orphan_sweep_period_secs)
    }

    /// Enforces the cross-field constraint: the monitor's grace period must
    /// exceed the kubelet's own report period times the retry count, and
    /// stay under the eviction timeout, or grace-period arithmetic can trip
    /// eviction before the node has had a fair chance to report.
    pub fn validate(&self, kubelet_report_period_secs: u64) -> Result<(), GuardianError> {
        let lower_bound = kubelet_report_period_secs * u64::from(self.node_status_update_retry);
        if self.node_monitor_grace_period_secs <= lower_bound {
            return Err(GuardianError::InvalidConfig(format!(
                "node_monitor_grace_period_secs ({}) must exceed kubelet_report_period * retries ({})",
                self.node_monitor_grace_period_secs, lower_bound
            )));
        }
        if self.node_monitor_grace_period_secs >= self.pod_eviction_timeout_secs {
            return Err(GuardianError::InvalidConfig(format!(
                "node_monitor_grace_period_secs ({}) must be less than pod_eviction_timeout_secs ({})",
                self.node_monitor_grace_period_secs, self.pod_eviction_timeout_secs
            )));
        }
        if self.eviction_limiter_qps <= 0.0 {
            return Err(GuardianError::InvalidConfig(
                "eviction_limiter_qps must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_defaults() {
        let cfg = GuardianConfig::default();
        assert_eq!(cfg.node_monitor_period_secs, 5);
        assert_eq!(cfg.node_monitor_grace_period_secs, 40);
        assert_eq!(cfg.pod_eviction_timeout_secs, 300);
        assert!((cfg.eviction_limiter_qps - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_rejects_grace_period_below_kubelet_floor() {
        let mut cfg = GuardianConfig::default();
        cfg.node_monitor_grace_period_secs = 5;
        assert!(cfg.validate(10).is_err());
    }

    #[test]
    fn validate_rejects_grace_period_above_eviction_timeout() {
        let mut cfg = GuardianConfig::default();
        cfg.node_monitor_grace_period_secs = 50;
        cfg.pod_eviction_timeout_secs = 30;
        assert!(cfg.validate(1).is_err());
    }

    #[test]
    fn validate_accepts_defaults_with_typical_kubelet_period() {
        let cfg = GuardianConfig::default();
        assert!(cfg.validate(5).is_ok());
    }

    #[test]
    fn validate_rejects_nonpositive_qps() {
        let mut cfg = GuardianConfig::default();
        cfg.eviction_limiter_qps = 0.0;
        assert!(cfg.validate(1).is_err());
    }
}
