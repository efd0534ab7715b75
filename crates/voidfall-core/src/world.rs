//! World model: every entity in the bounded plane, and nothing else.
//!
//! The [`World`] owns no behavior beyond its own invariants. Units are
//! stored per fleet in `BTreeMap`s keyed by slot, so every iteration the
//! kernel performs is in deterministic (fleet, slot) order; nodes live in a
//! fixed table whose indices stay stable even after destruction.
//!
//! # Snapshots
//!
//! `World` is `Clone + Serialize`. The turn orchestrator clones it once per
//! turn into append-only history; a clone is the world snapshot handed to
//! replay/score collaborators.
//!
//! # Lookups
//!
//! Entity lookups return `Result`: a reference that should have been
//! validated but wasn't is a programming error in the caller, surfaced as a
//! typed [`SimError`] and never silently skipped.

use std::collections::BTreeMap;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, FleetId, Node, NodeId, Ship, SlotId};
use crate::error::SimError;

/// Read-only view of either entity kind, exposing the shared physical
/// surface (position, radius, health) the resolution engine needs.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum EntityRef<'a> {
    /// A mobile unit.
    Ship(&'a Ship),
    /// A stationary node.
    Node(&'a Node),
}

impl EntityRef<'_> {
    /// Position of the referenced entity.
    #[must_use]
    pub fn position(&self) -> DVec2 {
        match self {
            Self::Ship(ship) => ship.position,
            Self::Node(node) => node.position,
        }
    }

    /// Physical radius of the referenced entity.
    #[must_use]
    pub fn radius(&self) -> f64 {
        match self {
            Self::Ship(ship) => ship.radius,
            Self::Node(node) => node.radius,
        }
    }

    /// Remaining health of the referenced entity.
    #[must_use]
    pub fn health(&self) -> u16 {
        match self {
            Self::Ship(ship) => ship.health,
            Self::Node(node) => node.health,
        }
    }
}

/// The complete set of mobile units and stationary nodes at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    width: f64,
    height: f64,
    /// Units per fleet, keyed by slot. Deterministic iteration order.
    ships: Vec<BTreeMap<SlotId, Ship>>,
    /// Node table with stable indices; dead nodes stay in place.
    nodes: Vec<Node>,
    /// Next slot per fleet. Monotonic; slots are never reused.
    next_slot: Vec<u32>,
}

impl World {
    /// Creates an empty world of the given dimensions with `fleets`
    /// competing fleets.
    #[must_use]
    pub fn new(width: f64, height: f64, fleets: usize) -> Self {
        Self {
            width,
            height,
            ships: vec![BTreeMap::new(); fleets],
            nodes: Vec::new(),
            next_slot: vec![0; fleets],
        }
    }

    /// Map width.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Map height.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Number of competing fleets (fixed for the match).
    #[must_use]
    pub fn fleet_count(&self) -> usize {
        self.ships.len()
    }

    /// Geometric center of the map.
    #[must_use]
    pub fn center(&self) -> DVec2 {
        DVec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Returns `true` if `position` lies inside the bounded plane.
    #[must_use]
    pub fn within_bounds(&self, position: DVec2) -> bool {
        position.x >= 0.0 && position.x < self.width && position.y >= 0.0 && position.y < self.height
    }

    // ---------------------------------------------------------------------
    // Construction (world generation interface)
    // ---------------------------------------------------------------------

    /// Appends a node to the table, returning its stable id.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(node);
        id
    }

    /// Spawns a unit for `fleet` at `position`, assigning the next free
    /// slot. Slots are monotonic and never reused within a match.
    pub fn spawn_ship(&mut self, fleet: FleetId, position: DVec2, radius: f64, health: u16) -> SlotId {
        let slot = SlotId::new(self.next_slot[fleet.index()]);
        self.next_slot[fleet.index()] += 1;
        self.ships[fleet.index()].insert(slot, Ship::new(position, radius, health));
        slot
    }

    // ---------------------------------------------------------------------
    // Lookups
    // ---------------------------------------------------------------------

    /// Looks up a unit by owner and slot.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownShip`] if no live record exists for the pair.
    pub fn ship(&self, fleet: FleetId, slot: SlotId) -> Result<&Ship, SimError> {
        self.ships
            .get(fleet.index())
            .and_then(|fleet_ships| fleet_ships.get(&slot))
            .ok_or(SimError::UnknownShip { fleet, slot })
    }

    /// Mutable unit lookup by owner and slot.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownShip`] if no live record exists for the pair.
    pub fn ship_mut(&mut self, fleet: FleetId, slot: SlotId) -> Result<&mut Ship, SimError> {
        self.ships
            .get_mut(fleet.index())
            .and_then(|fleet_ships| fleet_ships.get_mut(&slot))
            .ok_or(SimError::UnknownShip { fleet, slot })
    }

    /// Looks up a node by id.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownNode`] if the id is out of range.
    pub fn node(&self, id: NodeId) -> Result<&Node, SimError> {
        self.nodes.get(id.index()).ok_or(SimError::UnknownNode(id))
    }

    /// Mutable node lookup by id.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownNode`] if the id is out of range.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SimError> {
        self.nodes.get_mut(id.index()).ok_or(SimError::UnknownNode(id))
    }

    /// Looks up any entity by tagged reference.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidEntity`] for an invalid-tagged reference;
    /// [`SimError::UnknownShip`]/[`SimError::UnknownNode`] for a dangling one.
    pub fn entity(&self, id: EntityId) -> Result<EntityRef<'_>, SimError> {
        match id {
            EntityId::Ship { fleet, slot } => self.ship(fleet, slot).map(EntityRef::Ship),
            EntityId::Node(node) => self.node(node).map(EntityRef::Node),
            EntityId::Invalid => Err(SimError::InvalidEntity),
        }
    }

    /// Returns `true` if `id` names a live entity. Dangling and invalid
    /// references are simply not alive.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        match id {
            EntityId::Ship { fleet, slot } => {
                self.ship(fleet, slot).map(Ship::is_alive).unwrap_or(false)
            }
            EntityId::Node(node) => self.node(node).map(Node::is_alive).unwrap_or(false),
            EntityId::Invalid => false,
        }
    }

    // ---------------------------------------------------------------------
    // Iteration
    // ---------------------------------------------------------------------

    /// Iterates all units in deterministic (fleet, slot) order.
    pub fn ships(&self) -> impl Iterator<Item = (FleetId, SlotId, &Ship)> {
        self.ships.iter().enumerate().flat_map(|(fleet, fleet_ships)| {
            #[allow(clippy::cast_possible_truncation)]
            let fleet = FleetId::new(fleet as u8);
            fleet_ships.iter().map(move |(&slot, ship)| (fleet, slot, ship))
        })
    }

    /// Iterates all units mutably, still in deterministic (fleet, slot)
    /// order.
    pub fn ships_mut(&mut self) -> impl Iterator<Item = (FleetId, SlotId, &mut Ship)> {
        self.ships
            .iter_mut()
            .enumerate()
            .flat_map(|(fleet, fleet_ships)| {
                #[allow(clippy::cast_possible_truncation)]
                let fleet = FleetId::new(fleet as u8);
                fleet_ships
                    .iter_mut()
                    .map(move |(&slot, ship)| (fleet, slot, ship))
            })
    }

    /// Iterates one fleet's units in slot order.
    pub fn fleet_ships(&self, fleet: FleetId) -> impl Iterator<Item = (SlotId, &Ship)> {
        self.ships[fleet.index()].iter().map(|(&slot, ship)| (slot, ship))
    }

    /// Slots currently held by one fleet, in order.
    #[must_use]
    pub fn fleet_slots(&self, fleet: FleetId) -> Vec<SlotId> {
        self.ships[fleet.index()].keys().copied().collect()
    }

    /// Number of live units a fleet currently fields.
    #[must_use]
    pub fn ship_count(&self, fleet: FleetId) -> usize {
        self.ships[fleet.index()].len()
    }

    /// Iterates all nodes (dead ones included) with their ids.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(idx, node)| {
            #[allow(clippy::cast_possible_truncation)]
            let id = NodeId::new(idx as u32);
            (id, node)
        })
    }

    /// Iterates all nodes mutably with their ids.
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut Node)> {
        self.nodes.iter_mut().enumerate().map(|(idx, node)| {
            #[allow(clippy::cast_possible_truncation)]
            let id = NodeId::new(idx as u32);
            (id, node)
        })
    }

    /// Number of entries in the node table.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Counts the units of `node` that have fully completed docking.
    #[must_use]
    pub fn fully_docked_count(&self, node: &Node) -> usize {
        let Some(owner) = node.owner else {
            return 0;
        };
        node.docked
            .iter()
            .filter(|&&slot| {
                self.ship(owner, slot)
                    .map(|ship| ship.docking == crate::entity::DockingStatus::Docked)
                    .unwrap_or(false)
            })
            .count()
    }

    // ---------------------------------------------------------------------
    // Spatial scan (exhaustive)
    // ---------------------------------------------------------------------

    /// Exhaustive scan: every live entity whose body comes within `radius`
    /// of `center` (surface inclusive), in deterministic order — units by
    /// (fleet, slot), then nodes by index.
    ///
    /// Deliberately not grid-accelerated: callers are the explosion cascade
    /// and spawn placement, both keyed off the small fixed node population.
    #[must_use]
    pub fn scan(&self, center: DVec2, radius: f64) -> Vec<EntityId> {
        let mut hits = Vec::new();
        for (fleet, slot, ship) in self.ships() {
            if ship.is_alive() && center.distance(ship.position) <= radius + ship.radius {
                hits.push(EntityId::ship(fleet, slot));
            }
        }
        for (id, node) in self.nodes() {
            if node.is_alive() && center.distance(node.position) <= radius + node.radius {
                hits.push(EntityId::node(id));
            }
        }
        hits
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Marks an entity dead without any cascade or event emission. Used by
    /// the resolution engine after it has run the cascade itself, and for
    /// forced removal of an unresponsive fleet.
    ///
    /// # Errors
    ///
    /// Propagates the lookup error for dangling or invalid references.
    pub fn unsafe_kill(&mut self, id: EntityId) -> Result<(), SimError> {
        match id {
            EntityId::Ship { fleet, slot } => {
                self.ship_mut(fleet, slot)?.health = 0;
            }
            EntityId::Node(node) => {
                self.node_mut(node)?.health = 0;
            }
            EntityId::Invalid => return Err(SimError::InvalidEntity),
        }
        Ok(())
    }

    /// Purges destroyed units from the live maps. Nodes keep their table
    /// entry (ids stay stable) and are skipped everywhere via liveness.
    pub fn cleanup_dead(&mut self) {
        for fleet_ships in &mut self.ships {
            fleet_ships.retain(|_, ship| ship.is_alive());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::DockingStatus;

    fn test_world() -> World {
        World::new(100.0, 100.0, 2)
    }

    mod bounds_tests {
        use super::*;

        #[test]
        fn interior_points_are_in_bounds() {
            let world = test_world();
            assert!(world.within_bounds(DVec2::new(0.0, 0.0)));
            assert!(world.within_bounds(DVec2::new(99.9, 99.9)));
        }

        #[test]
        fn edges_and_exterior_are_out() {
            let world = test_world();
            assert!(!world.within_bounds(DVec2::new(100.0, 50.0)));
            assert!(!world.within_bounds(DVec2::new(-0.1, 50.0)));
            assert!(!world.within_bounds(DVec2::new(50.0, 100.0)));
        }

        #[test]
        fn center() {
            assert_eq!(test_world().center(), DVec2::new(50.0, 50.0));
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[test]
        fn slots_are_monotonic_and_never_reused() {
            let mut world = test_world();
            let fleet = FleetId::new(0);
            let a = world.spawn_ship(fleet, DVec2::new(10.0, 10.0), 0.5, 255);
            let b = world.spawn_ship(fleet, DVec2::new(20.0, 10.0), 0.5, 255);
            assert!(a < b);

            world.unsafe_kill(EntityId::ship(fleet, a)).unwrap();
            world.cleanup_dead();
            let c = world.spawn_ship(fleet, DVec2::new(30.0, 10.0), 0.5, 255);
            assert!(c > b);
        }

        #[test]
        fn cleanup_removes_dead_ships_only() {
            let mut world = test_world();
            let fleet = FleetId::new(0);
            let a = world.spawn_ship(fleet, DVec2::new(10.0, 10.0), 0.5, 255);
            let b = world.spawn_ship(fleet, DVec2::new(20.0, 10.0), 0.5, 255);
            world.unsafe_kill(EntityId::ship(fleet, a)).unwrap();
            world.cleanup_dead();
            assert!(world.ship(fleet, a).is_err());
            assert!(world.ship(fleet, b).is_ok());
        }

        #[test]
        fn dead_nodes_keep_their_id() {
            let mut world = test_world();
            let id = world.add_node(Node::new(DVec2::new(50.0, 50.0), 5.0, 1000, 3, 500));
            world.unsafe_kill(EntityId::node(id)).unwrap();
            world.cleanup_dead();
            assert!(world.node(id).is_ok());
            assert!(!world.is_alive(EntityId::node(id)));
        }
    }

    mod lookup_tests {
        use super::*;

        #[test]
        fn invalid_reference_is_fatal() {
            let world = test_world();
            assert_eq!(world.entity(EntityId::Invalid), Err(SimError::InvalidEntity));
        }

        #[test]
        fn dangling_ship_reference_is_fatal() {
            let world = test_world();
            let err = world.ship(FleetId::new(0), SlotId::new(3)).unwrap_err();
            assert_eq!(
                err,
                SimError::UnknownShip {
                    fleet: FleetId::new(0),
                    slot: SlotId::new(3)
                }
            );
        }

        #[test]
        fn is_alive_never_errors() {
            let world = test_world();
            assert!(!world.is_alive(EntityId::Invalid));
            assert!(!world.is_alive(EntityId::ship(FleetId::new(1), SlotId::new(0))));
            assert!(!world.is_alive(EntityId::node(NodeId::new(9))));
        }

        #[test]
        fn entity_ref_surfaces_shared_fields() {
            let mut world = test_world();
            let fleet = FleetId::new(0);
            let slot = world.spawn_ship(fleet, DVec2::new(10.0, 20.0), 0.5, 200);
            let entity = world.entity(EntityId::ship(fleet, slot)).unwrap();
            assert_eq!(entity.position(), DVec2::new(10.0, 20.0));
            assert_eq!(entity.health(), 200);
        }
    }

    mod scan_tests {
        use super::*;

        #[test]
        fn scan_includes_surface_touches() {
            let mut world = test_world();
            let fleet = FleetId::new(0);
            // Center distance 10.5 == radius 10 + ship radius 0.5.
            world.spawn_ship(fleet, DVec2::new(60.5, 50.0), 0.5, 255);
            let hits = world.scan(DVec2::new(50.0, 50.0), 10.0);
            assert_eq!(hits.len(), 1);
        }

        #[test]
        fn scan_skips_dead_entities() {
            let mut world = test_world();
            let fleet = FleetId::new(0);
            let slot = world.spawn_ship(fleet, DVec2::new(52.0, 50.0), 0.5, 255);
            world.unsafe_kill(EntityId::ship(fleet, slot)).unwrap();
            assert!(world.scan(DVec2::new(50.0, 50.0), 10.0).is_empty());
        }

        #[test]
        fn scan_order_is_ships_then_nodes() {
            let mut world = test_world();
            let node = world.add_node(Node::new(DVec2::new(50.0, 50.0), 5.0, 1000, 3, 500));
            let slot = world.spawn_ship(FleetId::new(1), DVec2::new(48.0, 50.0), 0.5, 255);
            let hits = world.scan(DVec2::new(50.0, 50.0), 10.0);
            assert_eq!(
                hits,
                vec![
                    EntityId::ship(FleetId::new(1), slot),
                    EntityId::node(node)
                ]
            );
        }
    }

    mod docking_tests {
        use super::*;

        #[test]
        fn fully_docked_counts_only_completed_docks() {
            let mut world = test_world();
            let fleet = FleetId::new(0);
            let node_id = world.add_node(Node::new(DVec2::new(50.0, 50.0), 5.0, 1000, 3, 500));
            let a = world.spawn_ship(fleet, DVec2::new(44.0, 50.0), 0.5, 255);
            let b = world.spawn_ship(fleet, DVec2::new(56.0, 50.0), 0.5, 255);

            let node = world.node_mut(node_id).unwrap();
            node.owner = Some(fleet);
            node.add_ship(a);
            node.add_ship(b);
            world.ship_mut(fleet, a).unwrap().docking = DockingStatus::Docked;
            world.ship_mut(fleet, b).unwrap().docking = DockingStatus::Docking;

            let node = world.node(node_id).unwrap();
            assert_eq!(world.fully_docked_count(node), 1);
        }
    }
}
