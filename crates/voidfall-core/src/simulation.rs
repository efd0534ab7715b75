//! Turn orchestrator.
//!
//! [`Simulation`] drives the strictly ordered per-turn phase sequence:
//!
//! 1. Forced removal of fleets whose controller went unresponsive
//! 2. Sub-steps: apply commands, detect → schedule → resolve, advance
//! 3. Production accrual and unit spawning
//! 4. Velocity drag
//! 5. Weapon-cooldown decrement
//! 6. Docking countdown advance, docked healing, node unfreeze
//!
//! followed by snapshot capture and liveness recomputation. The world is
//! exclusively owned here; a turn, once started, always runs to completion
//! deterministically given its inputs (or aborts with a fatal
//! [`SimError`], after which the state must be discarded).

use glam::DVec2;
use tracing::{debug, trace};

use crate::command::{Command, TurnCommands};
use crate::config::GameConfig;
use crate::entity::{DockingStatus, EntityId, FleetId, NodeId, SlotId};
use crate::error::SimError;
use crate::event;
use crate::output::{FleetStats, ReplayEvent, TurnRecord};
use crate::resolve::ResolutionCtx;
use crate::schedule::EventQueue;
use crate::world::World;

/// The authoritative match state and its turn driver.
///
/// # Example
///
/// ```
/// use glam::DVec2;
/// use voidfall_core::config::GameConfig;
/// use voidfall_core::entity::FleetId;
/// use voidfall_core::simulation::Simulation;
/// use voidfall_core::world::World;
///
/// let mut world = World::new(120.0, 80.0, 2);
/// world.spawn_ship(FleetId::new(0), DVec2::new(20.0, 40.0), 0.5, 255);
/// world.spawn_ship(FleetId::new(1), DVec2::new(100.0, 40.0), 0.5, 255);
///
/// let mut sim = Simulation::new(GameConfig::default(), world);
/// let record = sim
///     .run_turn(&Default::default(), &[true, true])
///     .expect("turn runs");
/// assert_eq!(record.turn, 1);
/// ```
pub struct Simulation {
    config: GameConfig,
    world: World,
    turn: u32,
    max_turns: u32,
    /// Which fleets were alive entering the current turn.
    alive: Vec<bool>,
    stats: Vec<FleetStats>,
    /// Append-only post-turn snapshots; index 0 is the initial world.
    history: Vec<World>,
    /// Replay events per completed turn.
    event_log: Vec<Vec<ReplayEvent>>,
}

impl Simulation {
    /// Creates a simulation over a generated initial world.
    ///
    /// The turn ceiling is derived from the world area as
    /// `100 + ⌊√(width·height)⌋`.
    #[must_use]
    pub fn new(config: GameConfig, world: World) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let max_turns = 100 + (world.width() * world.height()).sqrt() as u32;
        let fleets = world.fleet_count();
        let history = vec![world.clone()];
        Self {
            config,
            world,
            turn: 0,
            max_turns,
            alive: vec![true; fleets],
            stats: vec![FleetStats::default(); fleets],
            history,
            event_log: Vec::new(),
        }
    }

    /// The match configuration.
    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The current world state.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Completed turns so far.
    #[must_use]
    pub fn turn(&self) -> u32 {
        self.turn
    }

    /// The turn ceiling for this match.
    #[must_use]
    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    /// Which fleets are still alive.
    #[must_use]
    pub fn living_fleets(&self) -> &[bool] {
        &self.alive
    }

    /// Per-fleet aggregate counters.
    #[must_use]
    pub fn stats(&self) -> &[FleetStats] {
        &self.stats
    }

    /// Append-only snapshot history; entry 0 is the initial world, entry
    /// `n` the world after turn `n`.
    #[must_use]
    pub fn history(&self) -> &[World] {
        &self.history
    }

    /// Replay events per completed turn.
    #[must_use]
    pub fn event_log(&self) -> &[Vec<ReplayEvent>] {
        &self.event_log
    }

    /// Whether the match is over: the turn ceiling was reached, at most
    /// one fleet remains (multi-fleet match), or the sole fleet was
    /// eliminated (single-fleet match).
    #[must_use]
    pub fn complete(&self) -> bool {
        let living = self.alive.iter().filter(|&&alive| alive).count();
        let fleets = self.world.fleet_count();
        self.turn >= self.max_turns
            || (living <= 1 && fleets > 1)
            || (living == 0 && fleets == 1)
    }

    /// Runs one full turn.
    ///
    /// `responsive` reports, per fleet, whether its controller delivered
    /// this turn; an unresponsive fleet is forcibly removed with no
    /// cascading side effects before anything else happens.
    ///
    /// # Errors
    ///
    /// [`SimError::LivenessMismatch`] for a wrong-length liveness slice;
    /// any other [`SimError`] means the kernel hit an inconsistency and
    /// the turn was aborted.
    pub fn run_turn(
        &mut self,
        commands: &TurnCommands,
        responsive: &[bool],
    ) -> Result<TurnRecord, SimError> {
        if responsive.len() != self.world.fleet_count() {
            return Err(SimError::LivenessMismatch {
                expected: self.world.fleet_count(),
                got: responsive.len(),
            });
        }

        self.turn += 1;
        debug!(turn = self.turn, "beginning turn");

        for fleet in 0..self.world.fleet_count() {
            if self.alive[fleet] {
                self.stats[fleet].turns_alive += 1;
            }
        }

        // Unresponsive controllers: forced removal, no cascades.
        for fleet in 0..self.world.fleet_count() {
            if self.alive[fleet] && !responsive[fleet] {
                #[allow(clippy::cast_possible_truncation)]
                self.force_remove(FleetId::new(fleet as u8))?;
                self.alive[fleet] = false;
            }
        }

        let mut events: Vec<ReplayEvent> = Vec::new();

        for substep in 0..self.config.substeps {
            self.apply_commands(commands, substep);

            let detected = event::detect(&self.world, &self.config)?;
            trace!(turn = self.turn, substep, detected = detected.len(), "sub-step events");
            let mut queue = EventQueue::new(detected);
            while let Some(batch) = queue.next_batch(&self.world) {
                let mut ctx = ResolutionCtx::new(
                    &mut self.world,
                    &self.config,
                    &mut self.stats,
                    &mut events,
                    substep,
                );
                ctx.resolve_batch(&batch)?;
            }

            // Advance every surviving unit by the full sub-step.
            for (_, _, ship) in self.world.ships_mut() {
                ship.position += ship.velocity;
            }
        }

        self.process_production(&mut events)?;
        self.process_drag();
        self.process_cooldowns();
        self.process_docking()?;

        let snapshot = self.world.clone();
        self.history.push(snapshot.clone());
        self.event_log.push(events.clone());
        self.alive = self.find_living_fleets();

        Ok(TurnRecord {
            turn: self.turn,
            snapshot,
            events,
            stats: self.stats.clone(),
        })
    }

    // ---------------------------------------------------------------------
    // Phase 1-2: liveness and commands
    // ---------------------------------------------------------------------

    /// Removes every trace of a fleet without triggering destruction side
    /// effects: its units vanish (no explosions, no events) and its nodes
    /// become unowned. Other fleets must not be penalized for a timeout.
    fn force_remove(&mut self, fleet: FleetId) -> Result<(), SimError> {
        debug!(%fleet, "forcibly removing unresponsive fleet");
        for slot in self.world.fleet_slots(fleet) {
            self.world.unsafe_kill(EntityId::ship(fleet, slot))?;
        }
        self.world.cleanup_dead();
        for (_, node) in self.world.nodes_mut() {
            if node.owner == Some(fleet) {
                node.release();
            }
        }
        Ok(())
    }

    /// Applies one sub-step's commands for every living fleet, in fleet
    /// then slot order. Semantically invalid commands are ignored.
    fn apply_commands(&mut self, commands: &TurnCommands, substep: u32) {
        for fleet_index in 0..self.world.fleet_count() {
            if !self.alive[fleet_index] {
                continue;
            }
            #[allow(clippy::cast_possible_truncation)]
            let fleet = FleetId::new(fleet_index as u8);
            let Some(queue) = commands.get(&fleet) else {
                continue;
            };
            let Some(per_slot) = queue.get(substep as usize) else {
                continue;
            };
            for (&slot, &command) in per_slot {
                self.apply_command(fleet, slot, command);
            }
        }
    }

    fn apply_command(&mut self, fleet: FleetId, slot: SlotId, command: Command) {
        match command {
            Command::Noop => {}
            Command::Thrust { magnitude, angle_deg } => {
                let max_speed = self.config.max_speed;
                let magnitude = magnitude.clamp(0.0, self.config.max_acceleration);
                if let Ok(ship) = self.world.ship_mut(fleet, slot) {
                    if ship.docking == DockingStatus::Undocked {
                        ship.accelerate_by(magnitude, angle_deg.to_radians(), max_speed);
                    }
                }
            }
            Command::Dock(node_id) => self.apply_dock(fleet, slot, node_id),
            Command::Undock => {
                if let Ok(ship) = self.world.ship_mut(fleet, slot) {
                    if ship.docking == DockingStatus::Docked {
                        ship.docking = DockingStatus::Undocking;
                        ship.docking_progress = self.config.dock_turns;
                    }
                }
            }
        }
    }

    /// Dock validation: undocked, motionless, a live unfrozen in-range
    /// node. An unowned node is claimed; a rival's node triggers the
    /// same-turn contention rule.
    fn apply_dock(&mut self, fleet: FleetId, slot: SlotId, node_id: NodeId) {
        let Ok(ship) = self.world.ship(fleet, slot) else {
            return;
        };
        if ship.docking != DockingStatus::Undocked || ship.velocity != DVec2::ZERO {
            return;
        }
        // Out-of-range target ids are no-ops.
        let Ok(node) = self.world.node(node_id) else {
            return;
        };
        if !node.is_alive() || node.is_frozen() {
            return;
        }
        if !ship.can_dock(node.position, node.radius, self.config.dock_radius) {
            debug!(%fleet, %slot, node = %node_id, "dock rejected: out of range");
            return;
        }

        if node.owner.is_none() {
            if let Ok(node) = self.world.node_mut(node_id) {
                node.owner = Some(fleet);
            }
        }

        let Ok(node) = self.world.node(node_id) else {
            return;
        };
        if node.owner == Some(fleet) && (node.docked.len() as u32) < node.capacity {
            if let Ok(ship) = self.world.ship_mut(fleet, slot) {
                ship.docked_node = Some(node_id);
                ship.docking = DockingStatus::Docking;
                ship.docking_progress = self.config.dock_turns;
            }
            if let Ok(node) = self.world.node_mut(node_id) {
                node.add_ship(slot);
            }
        } else if node.owner != Some(fleet) {
            let Some(owner) = node.owner else {
                return;
            };
            // If every docked unit started docking this same turn, two
            // fleets contested an empty node simultaneously: nobody gets
            // it, and the node locks for the rest of the turn.
            let all_started_this_turn = node.docked.iter().all(|&docked_slot| {
                self.world
                    .ship(owner, docked_slot)
                    .map(|docked| {
                        docked.docking == DockingStatus::Docking
                            && docked.docking_progress == self.config.dock_turns
                    })
                    .unwrap_or(false)
            });
            if all_started_this_turn {
                let contested: Vec<SlotId> = node.docked.clone();
                for docked_slot in contested {
                    if let Ok(docked) = self.world.ship_mut(owner, docked_slot) {
                        docked.reset_docking();
                    }
                }
                if let Ok(node) = self.world.node_mut(node_id) {
                    node.flags.insert(crate::entity::NodeFlags::FROZEN);
                    node.release();
                }
                debug!(node = %node_id, "simultaneous dock contention, node frozen");
            }
        }
    }

    // ---------------------------------------------------------------------
    // Phase 3: production
    // ---------------------------------------------------------------------

    /// Accrues production on every owned, populated node and spawns units
    /// whenever the accumulator crosses the spawn threshold.
    fn process_production(&mut self, events: &mut Vec<ReplayEvent>) -> Result<(), SimError> {
        for index in 0..self.world.node_count() {
            #[allow(clippy::cast_possible_truncation)]
            let node_id = NodeId::new(index as u32);
            let node = self.world.node(node_id)?;
            if !node.is_alive() {
                continue;
            }
            let Some(owner) = node.owner else {
                continue;
            };
            let docked = self.world.fully_docked_count(node);
            if docked == 0 {
                continue;
            }

            #[allow(clippy::cast_possible_truncation)]
            let rate = self
                .config
                .base_productivity
                .saturating_add(self.config.additional_productivity.saturating_mul(docked as u16 - 1));
            let production = node.remaining_production.min(rate);
            let node_location = node.position;

            {
                let node = self.world.node_mut(node_id)?;
                node.remaining_production -= production;
                node.accumulated_production += production;
            }

            while self.world.node(node_id)?.accumulated_production >= self.config.production_per_ship
            {
                let Some(location) = self.spawn_location(node_id)? else {
                    // Nowhere to place a unit: production stays banked.
                    break;
                };
                self.world.node_mut(node_id)?.accumulated_production -=
                    self.config.production_per_ship;
                let slot = self.world.spawn_ship(
                    owner,
                    location,
                    self.config.ship_radius,
                    self.config.base_ship_health,
                );
                self.stats[owner.index()].ships_produced += 1;
                events.push(ReplayEvent::Spawned {
                    ship: EntityId::ship(owner, slot),
                    location,
                    node: node_id,
                    node_location,
                });
                debug!(%owner, %slot, node = %node_id, "unit produced");
            }
        }
        Ok(())
    }

    /// Nearest unoccupied valid offset around a node's crust, preferring
    /// placements closest to the world center (strict improvement keeps
    /// the first candidate in scan order on ties).
    fn spawn_location(&self, node_id: NodeId) -> Result<Option<DVec2>, SimError> {
        let node = self.world.node(node_id)?;
        let center = self.world.center();
        let open_radius = self.config.ship_radius * 2.0;

        let mut best: Option<DVec2> = None;
        let mut best_distance = f64::MAX;
        for dx in -self.config.spawn_radius..=self.config.spawn_radius {
            for dy in -self.config.spawn_radius..=self.config.spawn_radius {
                let offset_angle = f64::from(dy).atan2(f64::from(dx));
                let offset = DVec2::new(
                    f64::from(dx) + node.radius * offset_angle.cos(),
                    f64::from(dy) + node.radius * offset_angle.sin(),
                );
                let location = node.position + offset;
                if !self.world.within_bounds(location) {
                    continue;
                }
                let distance = location.distance(center);
                if distance < best_distance && self.world.scan(location, open_radius).is_empty() {
                    best_distance = distance;
                    best = Some(location);
                }
            }
        }
        Ok(best)
    }

    // ---------------------------------------------------------------------
    // Phases 4-6: drag, cooldowns, docking
    // ---------------------------------------------------------------------

    fn process_drag(&mut self) {
        let drag = self.config.drag;
        let max_speed = self.config.max_speed;
        for (_, _, ship) in self.world.ships_mut() {
            let speed = ship.speed();
            if speed <= drag {
                ship.velocity = DVec2::ZERO;
            } else {
                let angle = ship.velocity.y.atan2(ship.velocity.x);
                ship.accelerate_by(drag, angle + std::f64::consts::PI, max_speed);
            }
        }
    }

    fn process_cooldowns(&mut self) {
        for (_, _, ship) in self.world.ships_mut() {
            ship.weapon_cooldown = ship.weapon_cooldown.saturating_sub(1);
        }
    }

    /// Advances dock/undock countdowns, heals docked units, and lifts
    /// every node's same-turn freeze.
    fn process_docking(&mut self) -> Result<(), SimError> {
        let regeneration = self.config.docked_ship_regeneration;
        let max_health = self.config.max_ship_health;

        let mut completed_undocks: Vec<(SlotId, NodeId)> = Vec::new();
        for (_, slot, ship) in self.world.ships_mut() {
            match ship.docking {
                DockingStatus::Docking => {
                    ship.docking_progress = ship.docking_progress.saturating_sub(1);
                    if ship.docking_progress == 0 {
                        ship.docking = DockingStatus::Docked;
                    }
                }
                DockingStatus::Undocking => {
                    ship.docking_progress = ship.docking_progress.saturating_sub(1);
                    if ship.docking_progress == 0 {
                        let node = ship.docked_node;
                        ship.reset_docking();
                        if let Some(node) = node {
                            completed_undocks.push((slot, node));
                        }
                    }
                }
                DockingStatus::Docked => {
                    ship.heal(regeneration, max_health);
                }
                DockingStatus::Undocked => {}
            }
        }
        for (slot, node) in completed_undocks {
            self.world.node_mut(node)?.remove_ship(slot);
        }

        for (_, node) in self.world.nodes_mut() {
            node.flags.remove(crate::entity::NodeFlags::FROZEN);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Liveness
    // ---------------------------------------------------------------------

    /// Recomputes which fleets remain alive. A fleet owning every living
    /// node (each with at least one completed docking) wins outright:
    /// everyone else is marked dead this turn.
    fn find_living_fleets(&self) -> Vec<bool> {
        let fleets = self.world.fleet_count();
        let mut still_alive = vec![false; fleets];
        for (fleet, _, ship) in self.world.ships() {
            if ship.is_alive() {
                still_alive[fleet.index()] = true;
            }
        }

        let mut owned = vec![0usize; fleets];
        let mut total_nodes = 0usize;
        for (_, node) in self.world.nodes() {
            if !node.is_alive() {
                continue;
            }
            total_nodes += 1;
            if let Some(owner) = node.owner {
                // A node only counts as held once a docking has completed.
                if !node.docked.is_empty() && self.world.fully_docked_count(node) > 0 {
                    owned[owner.index()] += 1;
                }
            }
        }

        if total_nodes > 0 {
            for fleet in 0..fleets {
                if owned[fleet] == total_nodes {
                    still_alive.fill(false);
                    if fleets > 1 {
                        still_alive[fleet] = true;
                    }
                }
            }
        }

        still_alive
    }
}
