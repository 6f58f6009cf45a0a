//! End-to-end scenario suite driving `GuardianDriver` against the
//! `testkit::FakeCluster` fixture: a healthy steady state, a lone silent
//! node, a full-zone partition and its recovery, node deletion, a cloud-
//! confirmed-gone node, and orphaned-workload cleanup, plus the invariants
//! those scenarios rely on. Every scenario advances a shared `FixedClock`
//! explicitly rather than racing a real timer, so assertions land on exact
//! tick boundaries.

use std::sync::Arc;
use std::time::Duration;

use node_guardian_controller::testkit::FakeCluster;
use node_guardian_controller::{
    ConditionStatus, FixedClock, GuardianConfig, GuardianDriver, NodeCondition, NodeConditionKind,
    NodeInfo, PodInfo,
};

/// A self-consistent tick/grace/timeout triple (`grace < timeout`, matching
/// the cross-field constraint `GuardianConfig::validate` enforces) used by
/// every scenario below unless a scenario needs its own.
fn scenario_config() -> GuardianConfig {
    GuardianConfig {
        pod_eviction_timeout_secs: 30,
        node_monitor_grace_period_secs: 15,
        node_startup_grace_period_secs: 15,
        node_monitor_period_secs: 5,
        eviction_limiter_qps: 1000.0,
        maximum_grace_period_secs: 300,
        node_eviction_period_ms: 100,
        node_status_update_retry: 5,
        orphan_sweep_period_secs: 30,
    }
}

fn ready_node(name: &str, zone: &str, status: ConditionStatus, hb_ms: u64, tr_ms: u64) -> NodeInfo {
    NodeInfo {
        name: name.to_string(),
        zone: zone.to_string(),
        is_master: false,
        creation_timestamp: 0,
        conditions: vec![NodeCondition {
            kind: NodeConditionKind::Ready,
            status,
            reason: "KubeletReady".to_string(),
            message: String::new(),
            last_heartbeat_time: hb_ms,
            last_transition_time: tr_ms,
        }],
    }
}

fn pod(name: &str, node: &str, grace_secs: u64) -> PodInfo {
    PodInfo {
        namespace: "default".to_string(),
        name: name.to_string(),
        node_name: Some(node.to_string()),
        is_mirror_pod: false,
        owned_by_daemon_set: false,
        grace_period_seconds: grace_secs,
        deletion_timestamp: None,
    }
}

fn driver(cluster: &Arc<FakeCluster>, clock: &Arc<FixedClock>, config: GuardianConfig) -> GuardianDriver {
    GuardianDriver::new(
        cluster.clone(),
        cluster.clone(),
        cluster.clone(),
        Some(cluster.clone()),
        cluster.clone(),
        clock.clone(),
        config,
    )
}

/// Scenario 1: healthy steady state. Two nodes, always Ready, never drift
/// past the grace period -- no eviction, no not-ready transition, both
/// registered exactly once.
#[tokio::test]
async fn healthy_steady_state_registers_nodes_without_eviction() {
    let cluster = Arc::new(FakeCluster::new());
    cluster.set_nodes(vec![
        ready_node("n1", "z1", ConditionStatus::True, 0, 0),
        ready_node("n2", "z1", ConditionStatus::True, 0, 0),
    ]);

    let clock = Arc::new(FixedClock::new(0));
    let driver = driver(&cluster, &clock, scenario_config());

    // Ticks at t=0,5,10: all strictly inside the 15s grace window.
    for _ in 0..3 {
        driver.monitor().tick().await.unwrap();
        clock.advance(5_000);
    }

    let registered = cluster.events_with_reason("RegisteredNode");
    assert_eq!(registered.len(), 2);
    assert!(cluster.events_with_reason("NodeNotReady").is_empty());
}

/// Scenario 2: a node goes silent (heartbeat never changes again) while a
/// second node in its zone keeps heartbeating normally, so the zone itself
/// never looks partitioned. The silent node is eventually marked Unknown
/// once the monitor grace period elapses, and later evicted once the
/// Unknown duration exceeds the pod eviction timeout -- both measured from
/// the node's local probe timestamp, which itself never advances once the
/// heartbeat stops changing.
#[tokio::test]
async fn silent_node_is_marked_unknown_then_evicted() {
    let cluster = Arc::new(FakeCluster::new());
    cluster.set_nodes(vec![
        ready_node("n1", "z1", ConditionStatus::True, 0, 0),
        ready_node("n2", "z1", ConditionStatus::True, 0, 0),
    ]);
    cluster.set_pods(vec![pod("p1", "n1", 0)]);

    let clock = Arc::new(FixedClock::new(0));
    let config = scenario_config();
    let driver = driver(&cluster, &clock, config);

    let refresh_n2 = |now: u64| {
        let mut nodes = cluster.nodes();
        for n in &mut nodes {
            if n.name == "n2" {
                *n = ready_node("n2", "z1", ConditionStatus::True, now, now);
            }
        }
        cluster.set_nodes(nodes);
    };

    // Ticks at t=0,5,10,15: still inside the grace window (15 > 15 is false).
    // n2 gets a fresh heartbeat every tick so zone z1 never looks segmented.
    for _ in 0..4 {
        refresh_n2(clock.now_ms());
        driver.monitor().tick().await.unwrap();
        clock.advance(5_000);
    }
    let n1 = cluster.nodes().into_iter().find(|n| n.name == "n1").unwrap();
    assert_eq!(n1.ready_condition().unwrap().status, ConditionStatus::True);

    // Tick at t=20: now(20) > probe(0) + grace(15) -- n1 flips Unknown.
    refresh_n2(clock.now_ms());
    driver.monitor().tick().await.unwrap();
    let n1 = cluster.nodes().into_iter().find(|n| n.name == "n1").unwrap();
    assert_eq!(n1.ready_condition().unwrap().status, ConditionStatus::Unknown);
    assert!(!cluster.events_with_reason("NodeNotReady").is_empty());

    // The pod must not be touched yet: the Unknown duration (measured from
    // the still-zero probe timestamp) has not yet exceeded the 30s timeout.
    driver.eviction().drain_delete_queues().await;
    let p1 = cluster.pods().into_iter().find(|p| p.name == "p1").unwrap();
    assert!(p1.deletion_timestamp.is_none());

    // Continue ticking to t=35: now(35) > probe(0) + timeout(30) -- enqueued.
    for _ in 0..3 {
        clock.advance(5_000); // t=25, t=30, t=35
        refresh_n2(clock.now_ms());
        driver.monitor().tick().await.unwrap();
    }

    driver.eviction().drain_delete_queues().await;
    let p1 = cluster.pods().into_iter().find(|p| p.name == "p1").unwrap();
    assert!(p1.deletion_timestamp.is_some(), "pod should be evicted once Unknown exceeds the eviction timeout");
}

/// Scenario 3: every node in a zone reports Unknown simultaneously -- a
/// network partition, not simultaneous hardware failure. No eviction is
/// enqueued while the zone stays FullSegmentation, no matter how long the
/// nodes remain Unknown; eviction resumes only after a genuine recovery,
/// and resets every node's timestamps so recovery doesn't cause an instant
/// eviction storm on the nodes that are still down.
#[tokio::test]
async fn full_zone_partition_suppresses_eviction_until_recovery() {
    let cluster = Arc::new(FakeCluster::new());
    cluster.set_nodes(vec![
        ready_node("n1", "z2", ConditionStatus::Unknown, 0, 0),
        ready_node("n2", "z2", ConditionStatus::Unknown, 0, 0),
        ready_node("n3", "z2", ConditionStatus::Unknown, 0, 0),
    ]);
    cluster.set_pods(vec![pod("p1", "n1", 0), pod("p2", "n2", 0), pod("p3", "n3", 0)]);

    let clock = Arc::new(FixedClock::new(0));
    let driver = driver(&cluster, &clock, scenario_config());

    // Tick well past the 30s eviction timeout (measured from each node's
    // unmoving probe timestamp); a lone-node timeout would have enqueued
    // eviction by now, but the zone is fully segmented.
    for _ in 0..12 {
        driver.monitor().tick().await.unwrap();
        clock.advance(5_000);
    }
    driver.eviction().drain_delete_queues().await;
    for name in ["p1", "p2", "p3"] {
        let p = cluster.pods().into_iter().find(|p| p.name == name).unwrap();
        assert!(p.deletion_timestamp.is_none(), "{name} must not be evicted during FullSegmentation");
    }

    // n1 recovers with a fresh heartbeat/transition.
    let now = clock.now_ms();
    let mut nodes = cluster.nodes();
    for n in &mut nodes {
        if n.name == "n1" {
            *n = ready_node("n1", "z2", ConditionStatus::True, now, now);
        }
    }
    cluster.set_nodes(nodes);
    driver.monitor().tick().await.unwrap();

    // Immediately after recovery, n2 and n3's timestamps were just reset --
    // they must not be evicted on the very next drain even though they were
    // "Unknown" for a long time before the reset.
    driver.eviction().drain_delete_queues().await;
    for name in ["p2", "p3"] {
        let p = cluster.pods().into_iter().find(|p| p.name == name).unwrap();
        assert!(p.deletion_timestamp.is_none(), "{name} must get a fresh grace window after zone recovery");
    }

    // n2/n3 stay Unknown forever after the reset; n1 keeps a live heartbeat
    // so the zone doesn't drift back into FullSegmentation on its own. After
    // another full eviction timeout, n2/n3 are legitimately evicted, proving
    // the zone really returned to Normal rather than staying gated.
    for _ in 0..8 {
        clock.advance(5_000);
        let now = clock.now_ms();
        let mut nodes = cluster.nodes();
        for n in &mut nodes {
            if n.name == "n1" {
                *n = ready_node("n1", "z2", ConditionStatus::True, now, now);
            }
        }
        cluster.set_nodes(nodes);
        driver.monitor().tick().await.unwrap();
    }
    driver.eviction().drain_delete_queues().await;
    let p2 = cluster.pods().into_iter().find(|p| p.name == "p2").unwrap();
    assert!(p2.deletion_timestamp.is_some(), "eviction must resume once the zone is back to Normal");
}

/// Scenario 4: a node disappears from the listed set entirely (not just
/// Unready). The controller must emit `RemovingNode`, enqueue its pods for
/// eviction immediately -- no grace period wait -- and drop it from the
/// known set.
#[tokio::test]
async fn node_deleted_from_cluster_evicts_immediately() {
    let cluster = Arc::new(FakeCluster::new());
    cluster.set_nodes(vec![ready_node("n1", "z1", ConditionStatus::True, 0, 0)]);
    cluster.set_pods(vec![pod("p1", "n1", 0)]);

    let clock = Arc::new(FixedClock::new(0));
    let driver = driver(&cluster, &clock, scenario_config());

    driver.monitor().tick().await.unwrap();

    cluster.set_nodes(vec![]);
    driver.monitor().tick().await.unwrap();

    assert_eq!(cluster.events_with_reason("RemovingNode").len(), 1);

    driver.eviction().drain_delete_queues().await;
    let p1 = cluster.pods().into_iter().find(|p| p.name == "p1").unwrap();
    assert!(p1.deletion_timestamp.is_some(), "pods on a vanished node are evicted without waiting out a grace period");
}

/// Scenario 5: a node reports unhealthy and the cloud provider confirms the
/// backing instance no longer exists. The node and its pods are force-
/// deleted asynchronously, bypassing the ordinary queue and grace periods.
#[tokio::test]
async fn cloud_confirmed_gone_node_is_force_deleted() {
    let cluster = Arc::new(FakeCluster::new());
    cluster.set_nodes(vec![ready_node("n1", "z1", ConditionStatus::False, 0, 0)]);
    cluster.set_pods(vec![pod("p1", "n1", 30)]);
    cluster.mark_instance_gone("n1");

    let clock = Arc::new(FixedClock::new(0));
    let driver = driver(&cluster, &clock, scenario_config());

    driver.monitor().tick().await.unwrap();
    // The force-delete runs on a detached task; give it a chance to run.
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(cluster.events_with_reason("DeletingNode").len(), 1);
    assert!(cluster.nodes().into_iter().all(|n| n.name != "n1"));
    assert!(cluster.pods().is_empty(), "pods on a cloud-confirmed-gone node are force-deleted");
}

/// Scenario 6: a pod bound to a node the node cache doesn't know about is
/// force-deleted by the orphan sweeper; an unbound pod is left alone.
#[tokio::test]
async fn orphan_sweeper_force_deletes_unbound_workloads() {
    let cluster = Arc::new(FakeCluster::new());
    cluster.set_nodes(vec![ready_node("n1", "z1", ConditionStatus::True, 0, 0)]);
    cluster.set_pods(vec![pod("p1", "n1", 0), pod("p2", "n3-gone", 0)]);

    let clock = Arc::new(FixedClock::new(0));
    let driver = driver(&cluster, &clock, scenario_config());

    driver.monitor().tick().await.unwrap();
    driver.orphan().sweep().await;

    let remaining: Vec<_> = cluster.pods().into_iter().map(|p| p.name).collect();
    assert_eq!(remaining, vec!["p1".to_string()]);
}

/// The driver's fifth, event-driven task: a workload-cache add/update event
/// for a pod bound to an unknown node is force-deleted without waiting for
/// the periodic sweep, and the driver still shuts down cleanly.
#[tokio::test]
async fn event_driven_watcher_evicts_orphan_and_shuts_down_cleanly() {
    let cluster = Arc::new(FakeCluster::new());
    cluster.set_pods(vec![pod("p1", "n-gone", 0)]);

    let clock = Arc::new(FixedClock::new(0));
    let driver = driver(&cluster, &clock, scenario_config());

    let pod_events = driver.pod_event_handle();
    let shutdown = driver.shutdown_handle();
    let handles = driver.spawn();

    pod_events.notify(pod("p1", "n-gone", 0));

    let mut deleted = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if cluster.pods().is_empty() {
            deleted = true;
            break;
        }
    }
    assert!(deleted, "event-driven watcher should force-delete the orphan without waiting for the 30s sweep");

    shutdown.trigger();
    for handle in handles {
        handle.await.expect("driver task should exit cleanly on shutdown");
    }
}

/// Invariant: the status registry's two local timestamps never invert, and
/// `knownNodeSet` tracks the last successful list exactly.
#[tokio::test]
async fn known_node_set_matches_last_listed_nodes() {
    let cluster = Arc::new(FakeCluster::new());
    cluster.set_nodes(vec![
        ready_node("n1", "z1", ConditionStatus::True, 0, 0),
        ready_node("n2", "z1", ConditionStatus::True, 0, 0),
    ]);

    let clock = Arc::new(FixedClock::new(0));
    let driver = driver(&cluster, &clock, scenario_config());
    driver.monitor().tick().await.unwrap();

    cluster.set_nodes(vec![ready_node("n1", "z1", ConditionStatus::True, 0, 0)]);
    driver.monitor().tick().await.unwrap();

    // n2 must have been fully forgotten: re-adding it later re-registers
    // from scratch rather than resuming stale history.
    cluster.set_nodes(vec![
        ready_node("n1", "z1", ConditionStatus::True, 0, 0),
        ready_node("n2", "z1", ConditionStatus::True, 100_000, 100_000),
    ]);
    driver.monitor().tick().await.unwrap();

    let registered = cluster.events_with_reason("RegisteredNode");
    assert_eq!(registered.len(), 3, "n2 registers again after being removed and re-observed");
}
