//! Per-turn outputs handed to replay and scoring collaborators.
//!
//! The kernel reports three things per turn: the post-turn world snapshot,
//! the discrete events that occurred (for replay), and the per-fleet
//! aggregate counters (for scoring). Everything here is serde-serializable;
//! the actual wire/file encoding is collaborator-owned and out of scope.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, NodeId};
use crate::event::EventTime;
use crate::world::World;

/// A discrete occurrence recorded for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplayEvent {
    /// An entity was destroyed.
    Destroyed {
        /// What was destroyed.
        entity: EntityId,
        /// Position at the moment of destruction (extrapolated to the
        /// event time for moving units, not the start of the sub-step).
        location: DVec2,
        /// Physical radius of the destroyed entity.
        radius: f64,
        /// Sub-step within the turn.
        substep: u32,
        /// Fraction of the sub-step at which destruction occurred.
        time: EventTime,
    },
    /// Production spawned a new unit.
    Spawned {
        /// The new unit.
        ship: EntityId,
        /// Where it appeared.
        location: DVec2,
        /// The producing node.
        node: NodeId,
        /// The producing node's position.
        node_location: DVec2,
    },
    /// One attacker engaged one or more targets simultaneously.
    Attack {
        /// The firing unit.
        attacker: EntityId,
        /// Attacker position at engagement.
        location: DVec2,
        /// Sub-step within the turn.
        substep: u32,
        /// Fraction of the sub-step at which the engagement occurred.
        time: EventTime,
        /// Every target engaged in this batch.
        targets: Vec<EntityId>,
        /// Target positions at engagement, parallel to `targets`.
        target_locations: Vec<DVec2>,
    },
}

/// Aggregate per-fleet counters maintained across the match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetStats {
    /// Units spawned by this fleet's production.
    pub ships_produced: u32,
    /// Weapon damage credited to this fleet (full damage per engaged
    /// target, independent of splitting).
    pub damage_dealt: u64,
    /// Turns this fleet entered while still alive.
    pub turns_alive: u32,
}

/// Everything one completed turn produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// 1-based turn number.
    pub turn: u32,
    /// World state after the turn completed. Identical to the entry
    /// appended to the orchestrator's history.
    pub snapshot: World,
    /// Discrete events in resolution order.
    pub events: Vec<ReplayEvent>,
    /// Per-fleet counters as of the end of this turn.
    pub stats: Vec<FleetStats>,
}
