//! Test helper functions for building worlds, commands, and scenarios.

use std::collections::BTreeMap;

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::command::{Command, TurnCommands};
use crate::entity::{DockingStatus, FleetId, Node, SlotId};
use crate::world::World;

/// Installs a test-writer tracing subscriber so kernel debug output shows
/// up under `cargo test` when `RUST_LOG` asks for it. Safe to call from
/// every test; only the first call wins.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A 200x200 arena with two empty fleets.
pub fn two_fleet_arena() -> World {
    World::new(200.0, 200.0, 2)
}

/// Spawns a default-stats unit at a position.
pub fn spawn_ship_at(world: &mut World, fleet: u8, x: f64, y: f64) -> SlotId {
    world.spawn_ship(FleetId::new(fleet), DVec2::new(x, y), 0.5, 255)
}

/// Spawns a unit already moving with the given velocity.
pub fn spawn_moving_ship(world: &mut World, fleet: u8, position: DVec2, velocity: DVec2) -> SlotId {
    let slot = world.spawn_ship(FleetId::new(fleet), position, 0.5, 255);
    world
        .ship_mut(FleetId::new(fleet), slot)
        .expect("just spawned")
        .velocity = velocity;
    slot
}

/// A one-command turn for a single unit (sub-step 0).
pub fn single_command(fleet: u8, slot: SlotId, command: Command) -> TurnCommands {
    let mut per_slot = BTreeMap::new();
    per_slot.insert(slot, command);
    let mut commands = TurnCommands::new();
    commands.insert(FleetId::new(fleet), vec![per_slot]);
    commands
}

/// Merges per-fleet command sets into one turn input.
pub fn merge_commands(sets: Vec<TurnCommands>) -> TurnCommands {
    let mut out = TurnCommands::new();
    for set in sets {
        out.extend(set);
    }
    out
}

/// A seeded random battle world: a few nodes, a few units per fleet.
pub fn random_world(seed: u64) -> World {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut world = World::new(160.0, 160.0, 2);

    for _ in 0..3 {
        let position = DVec2::new(rng.gen_range(30.0..130.0), rng.gen_range(30.0..130.0));
        let radius = rng.gen_range(4.0..8.0);
        let health = rng.gen_range(1500..2500);
        let capacity = rng.gen_range(2..5);
        world.add_node(Node::new(position, radius, health, capacity, 500));
    }

    for fleet in 0..2 {
        for _ in 0..4 {
            let position = DVec2::new(rng.gen_range(10.0..150.0), rng.gen_range(10.0..150.0));
            world.spawn_ship(FleetId::new(fleet), position, 0.5, 255);
        }
    }

    world
}

/// Seeded random commands for every living unit: mostly thrusts, the
/// occasional dock attempt. Draw order follows the world's deterministic
/// unit iteration, so the same seed yields the same commands.
pub fn random_commands(world: &World, rng: &mut ChaCha8Rng) -> TurnCommands {
    let mut commands = TurnCommands::new();
    let node_count = world.node_count();

    for (fleet, slot, _) in world.ships() {
        let command = if node_count > 0 && rng.gen_bool(0.1) {
            #[allow(clippy::cast_possible_truncation)]
            let node = crate::entity::NodeId::new(rng.gen_range(0..node_count) as u32);
            Command::Dock(node)
        } else {
            Command::Thrust {
                magnitude: rng.gen_range(0.0..7.0),
                angle_deg: rng.gen_range(0.0..360.0),
            }
        };
        commands
            .entry(fleet)
            .or_insert_with(|| vec![BTreeMap::new()])
            .first_mut()
            .expect("one sub-step")
            .insert(slot, command);
    }

    commands
}

/// Asserts the docking invariant: a unit claims a node slot iff that node
/// lists the slot.
pub fn assert_docking_consistent(world: &World) {
    for (fleet, slot, ship) in world.ships() {
        match ship.docking {
            DockingStatus::Undocked => {
                assert_eq!(ship.docked_node, None, "undocked unit claims a node");
            }
            _ => {
                let node_id = ship
                    .docked_node
                    .unwrap_or_else(|| panic!("docking unit {fleet}/{slot} has no node"));
                let node = world.node(node_id).expect("claimed node exists");
                assert_eq!(node.owner, Some(fleet), "claimed node owned by another fleet");
                assert!(
                    node.docked.contains(&slot),
                    "node {node_id} does not list docked unit {fleet}/{slot}"
                );
            }
        }
    }

    for (node_id, node) in world.nodes() {
        if !node.is_alive() {
            continue;
        }
        for &slot in &node.docked {
            let owner = node.owner.expect("docked set on unowned node");
            let ship = world
                .ship(owner, slot)
                .unwrap_or_else(|_| panic!("node {node_id} lists missing unit"));
            assert_ne!(ship.docking, DockingStatus::Undocked);
            assert_eq!(ship.docked_node, Some(node_id));
        }
    }
}
