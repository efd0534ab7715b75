//! Entity types for the simulation kernel.
//!
//! This module provides the identity and state types for everything that
//! lives in the world:
//!
//! - [`FleetId`], [`SlotId`], [`NodeId`]: newtype identifiers
//! - [`EntityId`]: tagged reference distinguishing units from nodes
//! - [`Ship`]: a mobile combat unit owned by exactly one fleet
//! - [`Node`]: a stationary, capturable production structure
//!
//! # Identity and ordering
//!
//! Entity identities are stable for an entity's lifetime; destroyed units
//! never have their slot reused within a match. All identifiers derive
//! `Ord`, and [`EntityId`]'s derived order (units before nodes, then by
//! owner and index) is the deterministic total order that event
//! tie-breaking and every keyed collection in the kernel rely on.

use std::fmt;

use bitflags::bitflags;
use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Identifier of one competing fleet.
///
/// Fleets are numbered densely from zero and the numbering is stable for
/// the whole match.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FleetId(u8);

impl FleetId {
    /// Creates a fleet id from its raw index.
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Returns the raw fleet index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for FleetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FleetId({})", self.0)
    }
}

impl fmt::Display for FleetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-fleet slot index of a unit.
///
/// Slots are assigned monotonically as units spawn and are never reused
/// within a match, so a `(FleetId, SlotId)` pair names one unit forever.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SlotId(u32);

impl SlotId {
    /// Creates a slot id from its raw index.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw slot index.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotId({})", self.0)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a stationary node in the world's node table.
///
/// Node indices are assigned at world generation and stay valid for the
/// whole match; destroyed nodes keep their index but are dead.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a node id from its raw index.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw node index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tagged reference to any entity in the world.
///
/// The `Invalid` variant exists so that collaborator-supplied references
/// can be represented before validation; an `Invalid` id reaching a world
/// lookup is a fatal [`crate::error::SimError::InvalidEntity`], never a
/// silent no-op.
///
/// The derived `Ord` (units first, then nodes, then invalid) is load
/// bearing: simultaneous events are tie-broken by participant order.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum EntityId {
    /// A mobile unit, named by owner and slot.
    Ship {
        /// Owning fleet.
        fleet: FleetId,
        /// Per-owner slot index.
        slot: SlotId,
    },
    /// A stationary node.
    Node(NodeId),
    /// An unvalidated or deliberately-invalid reference.
    Invalid,
}

impl EntityId {
    /// Creates a unit reference.
    #[must_use]
    pub const fn ship(fleet: FleetId, slot: SlotId) -> Self {
        Self::Ship { fleet, slot }
    }

    /// Creates a node reference.
    #[must_use]
    pub const fn node(id: NodeId) -> Self {
        Self::Node(id)
    }

    /// Returns `true` if this references a mobile unit.
    #[must_use]
    pub const fn is_ship(self) -> bool {
        matches!(self, Self::Ship { .. })
    }

    /// Returns `true` if this references a stationary node.
    #[must_use]
    pub const fn is_node(self) -> bool {
        matches!(self, Self::Node(_))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ship { fleet, slot } => write!(f, "ship {fleet}/{slot}"),
            Self::Node(id) => write!(f, "node {id}"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

/// Docking state machine of a unit.
///
/// Transitions: `Undocked -> Docking -> Docked -> Undocking -> Undocked`,
/// driven by dock/undock commands and the end-of-turn countdown. A unit in
/// any state other than `Undocked` ignores thrust and cannot fire.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum DockingStatus {
    /// Free-flying; the only state that may thrust, fire, or start docking.
    #[default]
    Undocked,
    /// Dock transition in progress.
    Docking,
    /// Attached to a node; counts toward production and heals.
    Docked,
    /// Undock transition in progress.
    Undocking,
}

bitflags! {
    /// Transient per-turn status flags on a node.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// Locked against docking for the rest of the turn after a
        /// same-turn ownership contention. Cleared at end of turn.
        const FROZEN = 1 << 0;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::empty()
    }
}

// Flags serialize as their raw bits; the flag set is kernel-internal and
// replay collaborators treat it as opaque.
impl Serialize for NodeFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for NodeFlags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_bits_retain(u8::deserialize(deserializer)?))
    }
}

/// A mobile combat unit.
///
/// Units move with linear velocity within a turn, collide as circles, and
/// engage opposing units within weapon range. The docking fields mirror the
/// owning node's docked-set: a unit claims a node slot iff that node lists
/// the unit's slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ship {
    /// Position at the start of the current sub-step.
    pub position: DVec2,
    /// Velocity in map units per sub-step.
    pub velocity: DVec2,
    /// Physical radius.
    pub radius: f64,
    /// Remaining health; zero means destroyed.
    pub health: u16,
    /// Docking state machine value.
    pub docking: DockingStatus,
    /// Node this unit is docked or docking to, if any.
    pub docked_node: Option<NodeId>,
    /// Turns remaining in the current dock/undock transition.
    pub docking_progress: u32,
    /// Turns until the weapon can fire again.
    pub weapon_cooldown: u32,
}

impl Ship {
    /// Creates an undocked, stationary unit at `position`.
    #[must_use]
    pub fn new(position: DVec2, radius: f64, health: u16) -> Self {
        Self {
            position,
            velocity: DVec2::ZERO,
            radius,
            health,
            docking: DockingStatus::Undocked,
            docked_node: None,
            docking_progress: 0,
            weapon_cooldown: 0,
        }
    }

    /// Returns `true` while the unit has health remaining.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Current speed (velocity magnitude).
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.velocity.length()
    }

    /// Applies an acceleration of `magnitude` along `angle_rad`, capping the
    /// resulting speed at `max_speed`.
    pub fn accelerate_by(&mut self, magnitude: f64, angle_rad: f64, max_speed: f64) {
        self.velocity += DVec2::new(magnitude * angle_rad.cos(), magnitude * angle_rad.sin());
        let speed = self.velocity.length();
        if speed > max_speed {
            self.velocity *= max_speed / speed;
        }
    }

    /// Position after travelling along the current velocity for `time`
    /// sub-steps.
    #[must_use]
    pub fn position_at(&self, time: f64) -> DVec2 {
        self.position + self.velocity * time
    }

    /// Restores health, capped at `max_health`.
    pub fn heal(&mut self, amount: u16, max_health: u16) {
        self.health = self.health.saturating_add(amount).min(max_health);
    }

    /// Clears any docking relationship. Does not touch the node side.
    pub fn reset_docking(&mut self) {
        self.docking = DockingStatus::Undocked;
        self.docked_node = None;
        self.docking_progress = 0;
    }

    /// Returns `true` if the unit may start docking to a node with the
    /// given position and radius under the `dock_radius` rule.
    #[must_use]
    pub fn can_dock(&self, node_position: DVec2, node_radius: f64, dock_radius: f64) -> bool {
        self.position.distance(node_position) <= self.radius + node_radius + dock_radius
    }
}

/// A stationary, capturable production structure.
///
/// Unowned until a fleet first completes a dock to it. The `docked` list
/// holds slot indices of the owner's units and is bounded by `capacity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Fixed position.
    pub position: DVec2,
    /// Physical radius.
    pub radius: f64,
    /// Remaining health; zero means destroyed.
    pub health: u16,
    /// Owning fleet, if any fleet has claimed this node.
    pub owner: Option<FleetId>,
    /// Slot indices of the owner's docked or docking units.
    pub docked: Vec<SlotId>,
    /// Maximum number of simultaneously docked units.
    pub capacity: u32,
    /// Production left before the node is exhausted.
    pub remaining_production: u16,
    /// Production accumulated toward the next spawned unit.
    pub accumulated_production: u16,
    /// Transient status flags.
    pub flags: NodeFlags,
}

impl Node {
    /// Creates an unowned node.
    #[must_use]
    pub fn new(position: DVec2, radius: f64, health: u16, capacity: u32, production: u16) -> Self {
        Self {
            position,
            radius,
            health,
            owner: None,
            docked: Vec::new(),
            capacity,
            remaining_production: production,
            accumulated_production: 0,
            flags: NodeFlags::empty(),
        }
    }

    /// Returns `true` while the node has health remaining.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Returns `true` while the node is frozen against docking.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.flags.contains(NodeFlags::FROZEN)
    }

    /// Adds a unit slot to the docked set.
    pub fn add_ship(&mut self, slot: SlotId) {
        self.docked.push(slot);
    }

    /// Removes a unit slot from the docked set, if present.
    pub fn remove_ship(&mut self, slot: SlotId) {
        self.docked.retain(|&s| s != slot);
    }

    /// Releases ownership and empties the docked set.
    pub fn release(&mut self) {
        self.owner = None;
        self.docked.clear();
    }
}
