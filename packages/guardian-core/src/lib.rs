//! Node Guardian Core -- shared domain types for the node health controller.
//!
//! This crate provides the foundation layer the controller and its test
//! fakes both depend on:
//!
//! - **Clock** ([`clock`]): `ClockSource` abstraction so timestamp math never
//!   reads a remote node's clock or the wall clock directly in tests.
//! - **Types** ([`types`]): `NodeInfo`, `NodeCondition`, `PodInfo` and the
//!   `NodeName`/`ZoneKey` aliases -- the wire-shaped data every component
//!   passes around.
//! - **Events** ([`events`]): `EventRecord`/`EventType`/`EventReason`, the
//!   payload shape for the controller's event-recorder collaborator.

pub mod clock;
pub mod events;
pub mod types;

pub use clock::{ClockSource, FixedClock, SystemClock};
pub use events::{EventRecord, EventReason, EventType};
pub use types::{
    ConditionStatus, NodeCondition, NodeConditionKind, NodeInfo, NodeName, PodInfo, ZoneKey,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }

    #[test]
    fn reexports_accessible() {
        let _ = SystemClock;
        let _ = FixedClock::new(0);
        let _ = ConditionStatus::True;
        let _ = NodeConditionKind::Ready;
        let _: NodeName = "n1".to_string();
        let _: ZoneKey = "z1".to_string();
        let _ = EventType::Normal;
        let _ = EventReason::REGISTERED_NODE;
    }

    #[test]
    fn node_condition_json_roundtrip() {
        let cond = NodeCondition::synthesize_unknown(NodeConditionKind::Ready, 42);
        let json = serde_json::to_string(&cond).expect("serialize");
        let decoded: NodeCondition = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(cond, decoded);
    }
}
