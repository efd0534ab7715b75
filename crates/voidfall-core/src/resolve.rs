//! Resolution engine: applies the effects of simultaneous event batches.
//!
//! A [`ResolutionCtx`] borrows the mutable world plus the per-turn output
//! sinks for the duration of one sub-step and applies batches handed over
//! by the scheduler. Within a batch:
//!
//! 1. Collisions and desertions deal their damage immediately, in the
//!    batch's deterministic event order; attack engagements are only
//!    *registered* (attacker validity is checked at registration).
//! 2. Each registered attacker that is still alive, off cooldown, and
//!    undocked fires once: its weapon damage splits evenly across every
//!    target it engaged, and its cooldown starts.
//! 3. Per-target attack damage is accumulated fractionally across all
//!    attackers and applied in one truncated application.
//!
//! Destruction cascades inside the same batch: a destroyed node releases
//! its docked units and detonates, damaging (and possibly destroying)
//! everything within the explosion radius, recursively. Destroyed units are
//! purged from the live collections after every batch so the next batch
//! never observes them.

use std::collections::BTreeMap;

use glam::DVec2;
use tracing::debug;

use crate::config::GameConfig;
use crate::entity::{DockingStatus, EntityId, SlotId};
use crate::error::SimError;
use crate::event::{EventKind, EventTime, SimulationEvent};
use crate::output::{FleetStats, ReplayEvent};
use crate::world::World;

/// Damage dealt by a node explosion to a body whose nearest surface point
/// sits at `distance` from the node's center.
///
/// Inside the node body the damage is `u16::MAX`. From the surface the
/// damage falls linearly from twice the maximum unit health down to half of
/// it approaching the explosion radius, and is zero at or beyond it.
#[must_use]
pub fn explosion_damage(node_radius: f64, distance: f64, config: &GameConfig) -> u16 {
    if distance < node_radius {
        return u16::MAX;
    }
    let from_crust = distance - node_radius;
    if from_crust < config.explosion_radius {
        let max_hp = f64::from(config.max_ship_health);
        let damage = 2.0 * max_hp - (from_crust / config.explosion_radius) * 1.5 * max_hp;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        return damage as u16;
    }
    0
}

/// One attacker's aggregated engagements within a batch.
#[derive(Debug)]
struct AttackRecord {
    location: DVec2,
    time: EventTime,
    targets: Vec<EntityId>,
    target_locations: Vec<DVec2>,
}

/// Mutable resolution state for one sub-step.
pub struct ResolutionCtx<'a> {
    world: &'a mut World,
    config: &'a GameConfig,
    stats: &'a mut [FleetStats],
    events: &'a mut Vec<ReplayEvent>,
    substep: u32,
}

impl<'a> ResolutionCtx<'a> {
    /// Borrows the world and output sinks for one sub-step's resolution.
    pub fn new(
        world: &'a mut World,
        config: &'a GameConfig,
        stats: &'a mut [FleetStats],
        events: &'a mut Vec<ReplayEvent>,
        substep: u32,
    ) -> Self {
        Self { world, config, stats, events, substep }
    }

    /// Applies one simultaneous batch and purges destroyed units.
    ///
    /// Once application starts, every event in the batch is applied and
    /// cleanup runs before returning; an `Err` means the kernel state is
    /// inconsistent and the turn must abort.
    ///
    /// # Errors
    ///
    /// Propagates lookup failures as fatal [`SimError`]s.
    pub fn resolve_batch(&mut self, batch: &[SimulationEvent]) -> Result<(), SimError> {
        let mut attackers: BTreeMap<EntityId, AttackRecord> = BTreeMap::new();

        for ev in batch {
            match ev.kind {
                EventKind::Collision => {
                    let (first_damage, second_damage) = self.collision_damage(ev.first, ev.second)?;
                    self.damage_entity(ev.first, first_damage, ev.time)?;
                    self.damage_entity(ev.second, second_damage, ev.time)?;
                }
                EventKind::Desertion => {
                    let health = self.world.entity(ev.first)?.health();
                    self.damage_entity(ev.first, health, ev.time)?;
                }
                EventKind::Attack => {
                    self.register_attack(&mut attackers, ev.first, ev.second, ev.time)?;
                    self.register_attack(&mut attackers, ev.second, ev.first, ev.time)?;
                }
            }
        }

        // Attack application: split damage accumulates fractionally per
        // target across every attacker, and is applied exactly once.
        let mut accumulated: BTreeMap<EntityId, f64> = BTreeMap::new();
        for (&attacker_id, record) in &attackers {
            let EntityId::Ship { fleet, slot } = attacker_id else {
                return Err(SimError::InvalidEntity);
            };
            let attacker = self.world.ship(fleet, slot)?;
            // A collision earlier in this batch may have destroyed the
            // attacker since registration; re-validate before firing.
            if !attacker.is_alive()
                || attacker.weapon_cooldown > 0
                || attacker.docking != DockingStatus::Undocked
            {
                continue;
            }
            self.world.ship_mut(fleet, slot)?.weapon_cooldown = self.config.weapon_cooldown;

            #[allow(clippy::cast_precision_loss)]
            let share = f64::from(self.config.weapon_damage) / record.targets.len() as f64;
            for &target in &record.targets {
                *accumulated.entry(target).or_default() += share;
            }
        }

        for (attacker_id, record) in attackers {
            self.events.push(ReplayEvent::Attack {
                attacker: attacker_id,
                location: record.location,
                substep: self.substep,
                time: record.time,
                targets: record.targets,
                target_locations: record.target_locations,
            });
        }

        if let Some(batch_time) = batch.first().map(|ev| ev.time) {
            for (target, amount) in accumulated {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let damage = amount.min(f64::from(u16::MAX)) as u16;
                self.damage_entity(target, damage, batch_time)?;
            }
        }

        self.world.cleanup_dead();
        Ok(())
    }

    /// Damage each collision participant takes, per the symmetric rules:
    /// units exchange their current healths; a unit hitting a node dies
    /// outright while the node absorbs the unit's health.
    fn collision_damage(
        &self,
        first: EntityId,
        second: EntityId,
    ) -> Result<(u16, u16), SimError> {
        match (first, second) {
            (EntityId::Ship { fleet: f1, slot: s1 }, EntityId::Ship { fleet: f2, slot: s2 }) => {
                let h1 = self.world.ship(f1, s1)?.health;
                let h2 = self.world.ship(f2, s2)?.health;
                Ok((h2, h1))
            }
            (EntityId::Ship { fleet, slot }, EntityId::Node(_))
            | (EntityId::Node(_), EntityId::Ship { fleet, slot }) => {
                let h = self.world.ship(fleet, slot)?.health;
                Ok((h, h))
            }
            _ => Err(SimError::InvalidEntity),
        }
    }

    /// Registers one engagement of `target` by `src`, if `src` is able to
    /// fire. Damage accounting credits the full weapon damage per engaged
    /// target regardless of later splitting.
    fn register_attack(
        &mut self,
        attackers: &mut BTreeMap<EntityId, AttackRecord>,
        src: EntityId,
        target: EntityId,
        time: EventTime,
    ) -> Result<(), SimError> {
        let EntityId::Ship { fleet, slot } = src else {
            return Err(SimError::InvalidEntity);
        };
        let EntityId::Ship { fleet: target_fleet, slot: target_slot } = target else {
            return Err(SimError::InvalidEntity);
        };

        let attacker = self.world.ship(fleet, slot)?;
        if !attacker.is_alive()
            || attacker.weapon_cooldown > 0
            || attacker.docking != DockingStatus::Undocked
        {
            return Ok(());
        }
        let location = attacker.position;
        let target_location = self.world.ship(target_fleet, target_slot)?.position;

        let record = attackers.entry(src).or_insert_with(|| AttackRecord {
            location,
            time,
            targets: Vec::new(),
            target_locations: Vec::new(),
        });
        record.targets.push(target);
        record.target_locations.push(target_location);

        self.stats[fleet.index()].damage_dealt += u64::from(self.config.weapon_damage);
        Ok(())
    }

    /// Applies `damage` to a live entity, destroying it if the damage
    /// covers its remaining health. No-op on entities already destroyed
    /// earlier in the batch.
    fn damage_entity(&mut self, id: EntityId, damage: u16, time: EventTime) -> Result<(), SimError> {
        if !self.world.is_alive(id) {
            return Ok(());
        }
        let health = self.world.entity(id)?.health();
        if health <= damage {
            return self.kill_entity(id, time);
        }
        match id {
            EntityId::Ship { fleet, slot } => {
                self.world.ship_mut(fleet, slot)?.health = health - damage;
            }
            EntityId::Node(node) => {
                self.world.node_mut(node)?.health = health - damage;
            }
            EntityId::Invalid => return Err(SimError::InvalidEntity),
        }
        Ok(())
    }

    /// Destroys an entity: records the destruction at its extrapolated
    /// position, releases docking relationships, and for nodes detonates an
    /// area-of-effect explosion that may destroy further entities.
    fn kill_entity(&mut self, id: EntityId, time: EventTime) -> Result<(), SimError> {
        if !self.world.is_alive(id) {
            return Ok(());
        }
        match id {
            EntityId::Ship { fleet, slot } => {
                let ship = self.world.ship(fleet, slot)?;
                // Destruction location reflects the position at the event
                // time, not the start of the sub-step.
                let location = ship.position_at(time.as_fraction());
                let radius = ship.radius;
                let docked_node = (ship.docking != DockingStatus::Undocked)
                    .then_some(ship.docked_node)
                    .flatten();

                self.events.push(ReplayEvent::Destroyed {
                    entity: id,
                    location,
                    radius,
                    substep: self.substep,
                    time,
                });

                if let Some(node_id) = docked_node {
                    self.world.node_mut(node_id)?.remove_ship(slot);
                    self.world.ship_mut(fleet, slot)?.reset_docking();
                }
                self.world.unsafe_kill(id)?;
            }
            EntityId::Node(node_id) => {
                let node = self.world.node(node_id)?;
                let position = node.position;
                let radius = node.radius;
                let owner = node.owner;
                let docked: Vec<SlotId> = node.docked.clone();

                self.events.push(ReplayEvent::Destroyed {
                    entity: id,
                    location: position,
                    radius,
                    substep: self.substep,
                    time,
                });

                if let Some(owner) = owner {
                    for slot in docked {
                        self.world.ship_mut(owner, slot)?.reset_docking();
                    }
                }
                self.world.node_mut(node_id)?.docked.clear();

                // Mark dead before detonating so a chained explosion that
                // reaches back here cannot re-enter this destruction.
                self.world.unsafe_kill(id)?;
                debug!(node = %node_id, "node destroyed, detonating");

                let caught = self.world.scan(position, radius + self.config.explosion_radius);
                for target in caught {
                    if target == id {
                        continue;
                    }
                    let body = self.world.entity(target)?;
                    let distance = position.distance(body.position());
                    let damage =
                        explosion_damage(radius, distance - body.radius(), self.config);
                    self.damage_entity(target, damage, time)?;
                }
            }
            EntityId::Invalid => return Err(SimError::InvalidEntity),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{FleetId, Node};

    fn setup() -> (World, GameConfig, Vec<FleetStats>, Vec<ReplayEvent>) {
        (
            World::new(200.0, 200.0, 2),
            GameConfig::default(),
            vec![FleetStats::default(); 2],
            Vec::new(),
        )
    }

    fn attack_event(a: EntityId, b: EntityId, t: f64) -> SimulationEvent {
        SimulationEvent::new(EventKind::Attack, a, b, EventTime::from_fraction(t))
    }

    mod explosion_damage_tests {
        use super::*;

        #[test]
        fn maximum_at_the_surface() {
            let config = GameConfig::default();
            // distance == node radius: surface contact.
            assert_eq!(explosion_damage(5.0, 5.0, &config), 510);
        }

        #[test]
        fn inside_the_body_is_annihilation() {
            let config = GameConfig::default();
            assert_eq!(explosion_damage(5.0, 3.0, &config), u16::MAX);
        }

        #[test]
        fn zero_at_and_beyond_the_radius() {
            let config = GameConfig::default();
            assert_eq!(explosion_damage(5.0, 5.0 + config.explosion_radius, &config), 0);
            assert_eq!(explosion_damage(5.0, 100.0, &config), 0);
        }

        #[test]
        fn falloff_is_monotone() {
            let config = GameConfig::default();
            let mut last = u16::MAX;
            for step in 0..=40 {
                let d = 5.0 + f64::from(step) * config.explosion_radius / 40.0;
                let damage = explosion_damage(5.0, d, &config);
                assert!(damage <= last);
                last = damage;
            }
        }
    }

    mod collision_tests {
        use super::*;

        #[test]
        fn units_exchange_current_healths() {
            let (mut world, config, mut stats, mut events) = setup();
            let a = world.spawn_ship(FleetId::new(0), DVec2::new(50.0, 50.0), 0.5, 100);
            let b = world.spawn_ship(FleetId::new(1), DVec2::new(51.0, 50.0), 0.5, 255);
            let id_a = EntityId::ship(FleetId::new(0), a);
            let id_b = EntityId::ship(FleetId::new(1), b);

            let batch = [SimulationEvent::new(
                EventKind::Collision,
                id_a,
                id_b,
                EventTime::ZERO,
            )];
            let mut ctx = ResolutionCtx::new(&mut world, &config, &mut stats, &mut events, 0);
            ctx.resolve_batch(&batch).unwrap();

            // The weaker unit dies; the healthier one survives the exchange.
            assert!(!world.is_alive(id_a));
            assert_eq!(world.ship(FleetId::new(1), b).unwrap().health, 155);
        }

        #[test]
        fn node_collision_is_fatal_to_the_unit() {
            let (mut world, config, mut stats, mut events) = setup();
            let node = world.add_node(Node::new(DVec2::new(60.0, 50.0), 5.0, 2000, 3, 500));
            let slot = world.spawn_ship(FleetId::new(0), DVec2::new(55.0, 50.0), 0.5, 200);
            let ship_id = EntityId::ship(FleetId::new(0), slot);

            let batch = [SimulationEvent::new(
                EventKind::Collision,
                ship_id,
                EntityId::node(node),
                EventTime::ZERO,
            )];
            let mut ctx = ResolutionCtx::new(&mut world, &config, &mut stats, &mut events, 0);
            ctx.resolve_batch(&batch).unwrap();

            assert!(!world.is_alive(ship_id));
            assert_eq!(world.node(node).unwrap().health, 1800);
        }
    }

    mod attack_tests {
        use super::*;

        #[test]
        fn split_damage_across_two_targets() {
            let (mut world, config, mut stats, mut events) = setup();
            let a = world.spawn_ship(FleetId::new(0), DVec2::new(50.0, 50.0), 0.5, 255);
            let b = world.spawn_ship(FleetId::new(1), DVec2::new(53.0, 50.0), 0.5, 255);
            let c = world.spawn_ship(FleetId::new(1), DVec2::new(47.0, 50.0), 0.5, 255);
            let id_a = EntityId::ship(FleetId::new(0), a);
            let id_b = EntityId::ship(FleetId::new(1), b);
            let id_c = EntityId::ship(FleetId::new(1), c);

            let batch = [attack_event(id_a, id_b, 0.0), attack_event(id_a, id_c, 0.0)];
            let mut ctx = ResolutionCtx::new(&mut world, &config, &mut stats, &mut events, 0);
            ctx.resolve_batch(&batch).unwrap();

            // A engages two targets: 32 each. B and C each engage only A:
            // 64 each, accumulated to 128 before one application.
            assert_eq!(world.ship(FleetId::new(1), b).unwrap().health, 255 - 32);
            assert_eq!(world.ship(FleetId::new(1), c).unwrap().health, 255 - 32);
            assert_eq!(world.ship(FleetId::new(0), a).unwrap().health, 255 - 128);
        }

        #[test]
        fn fractional_shares_truncate_once_per_target() {
            let (mut world, config, mut stats, mut events) = setup();
            let a = world.spawn_ship(FleetId::new(0), DVec2::new(50.0, 50.0), 0.5, 255);
            let b = world.spawn_ship(FleetId::new(1), DVec2::new(53.0, 50.0), 0.5, 255);
            let c = world.spawn_ship(FleetId::new(1), DVec2::new(47.0, 50.0), 0.5, 255);
            let d = world.spawn_ship(FleetId::new(1), DVec2::new(50.0, 53.0), 0.5, 255);
            let id_a = EntityId::ship(FleetId::new(0), a);

            let batch = [
                attack_event(id_a, EntityId::ship(FleetId::new(1), b), 0.0),
                attack_event(id_a, EntityId::ship(FleetId::new(1), c), 0.0),
                attack_event(id_a, EntityId::ship(FleetId::new(1), d), 0.0),
            ];
            let mut ctx = ResolutionCtx::new(&mut world, &config, &mut stats, &mut events, 0);
            ctx.resolve_batch(&batch).unwrap();

            // 64 / 3 = 21.33..; each target takes 21 after truncation.
            assert_eq!(world.ship(FleetId::new(1), b).unwrap().health, 255 - 21);
            assert_eq!(world.ship(FleetId::new(1), c).unwrap().health, 255 - 21);
            assert_eq!(world.ship(FleetId::new(1), d).unwrap().health, 255 - 21);
        }

        #[test]
        fn cooldown_blocks_fire_but_not_being_hit() {
            let (mut world, config, mut stats, mut events) = setup();
            let a = world.spawn_ship(FleetId::new(0), DVec2::new(50.0, 50.0), 0.5, 255);
            let b = world.spawn_ship(FleetId::new(1), DVec2::new(53.0, 50.0), 0.5, 255);
            world.ship_mut(FleetId::new(0), a).unwrap().weapon_cooldown = 1;
            let id_a = EntityId::ship(FleetId::new(0), a);
            let id_b = EntityId::ship(FleetId::new(1), b);

            let batch = [attack_event(id_a, id_b, 0.0)];
            let mut ctx = ResolutionCtx::new(&mut world, &config, &mut stats, &mut events, 0);
            ctx.resolve_batch(&batch).unwrap();

            assert_eq!(world.ship(FleetId::new(1), b).unwrap().health, 255);
            assert_eq!(world.ship(FleetId::new(0), a).unwrap().health, 255 - 64);
        }

        #[test]
        fn docked_units_cannot_fire() {
            let (mut world, config, mut stats, mut events) = setup();
            let a = world.spawn_ship(FleetId::new(0), DVec2::new(50.0, 50.0), 0.5, 255);
            let b = world.spawn_ship(FleetId::new(1), DVec2::new(53.0, 50.0), 0.5, 255);
            world.ship_mut(FleetId::new(0), a).unwrap().docking = DockingStatus::Docked;
            let id_a = EntityId::ship(FleetId::new(0), a);
            let id_b = EntityId::ship(FleetId::new(1), b);

            let batch = [attack_event(id_a, id_b, 0.0)];
            let mut ctx = ResolutionCtx::new(&mut world, &config, &mut stats, &mut events, 0);
            ctx.resolve_batch(&batch).unwrap();

            assert_eq!(world.ship(FleetId::new(1), b).unwrap().health, 255);
            assert_eq!(world.ship(FleetId::new(0), a).unwrap().health, 255 - 64);
        }

        #[test]
        fn damage_dealt_credits_full_damage_per_target() {
            let (mut world, config, mut stats, mut events) = setup();
            let a = world.spawn_ship(FleetId::new(0), DVec2::new(50.0, 50.0), 0.5, 255);
            let b = world.spawn_ship(FleetId::new(1), DVec2::new(53.0, 50.0), 0.5, 255);
            let c = world.spawn_ship(FleetId::new(1), DVec2::new(47.0, 50.0), 0.5, 255);
            let id_a = EntityId::ship(FleetId::new(0), a);

            let batch = [
                attack_event(id_a, EntityId::ship(FleetId::new(1), b), 0.0),
                attack_event(id_a, EntityId::ship(FleetId::new(1), c), 0.0),
            ];
            let mut ctx = ResolutionCtx::new(&mut world, &config, &mut stats, &mut events, 0);
            ctx.resolve_batch(&batch).unwrap();

            assert_eq!(stats[0].damage_dealt, 128);
            assert_eq!(stats[1].damage_dealt, 128);
        }
    }

    mod cascade_tests {
        use super::*;

        #[test]
        fn node_destruction_undocks_and_detonates() {
            let (mut world, config, mut stats, mut events) = setup();
            let node = world.add_node(Node::new(DVec2::new(100.0, 100.0), 5.0, 100, 3, 500));
            // Docked unit sits on the surface: annihilated by the blast.
            let docked = world.spawn_ship(FleetId::new(0), DVec2::new(105.5, 100.0), 0.5, 255);
            // Bystander outside the explosion radius entirely.
            let far = world.spawn_ship(FleetId::new(1), DVec2::new(130.0, 100.0), 0.5, 255);
            // Rammer that triggers the destruction.
            let rammer = world.spawn_ship(FleetId::new(1), DVec2::new(104.0, 100.0), 0.5, 255);

            let owner = FleetId::new(0);
            world.node_mut(node).unwrap().owner = Some(owner);
            world.node_mut(node).unwrap().add_ship(docked);
            world.ship_mut(owner, docked).unwrap().docking = DockingStatus::Docked;
            world.ship_mut(owner, docked).unwrap().docked_node = Some(node);

            let batch = [SimulationEvent::new(
                EventKind::Collision,
                EntityId::ship(FleetId::new(1), rammer),
                EntityId::node(node),
                EventTime::ZERO,
            )];
            let mut ctx = ResolutionCtx::new(&mut world, &config, &mut stats, &mut events, 0);
            ctx.resolve_batch(&batch).unwrap();

            assert!(!world.is_alive(EntityId::node(node)));
            assert!(!world.is_alive(EntityId::ship(owner, docked)));
            assert!(world.is_alive(EntityId::ship(FleetId::new(1), far)));
            // Rammer died in the collision itself, before the blast.
            assert!(!world.is_alive(EntityId::ship(FleetId::new(1), rammer)));

            let destroyed: Vec<_> = events
                .iter()
                .filter(|ev| matches!(ev, ReplayEvent::Destroyed { .. }))
                .collect();
            assert_eq!(destroyed.len(), 3);
        }

        #[test]
        fn desertion_destruction_extrapolates_location() {
            let (mut world, config, mut stats, mut events) = setup();
            let slot = world.spawn_ship(FleetId::new(0), DVec2::new(5.0, 100.0), 0.5, 255);
            world.ship_mut(FleetId::new(0), slot).unwrap().velocity = DVec2::new(-10.0, 0.0);
            let id = EntityId::ship(FleetId::new(0), slot);

            let batch = [SimulationEvent::new(
                EventKind::Desertion,
                id,
                id,
                EventTime::from_fraction(0.5),
            )];
            let mut ctx = ResolutionCtx::new(&mut world, &config, &mut stats, &mut events, 0);
            ctx.resolve_batch(&batch).unwrap();

            assert!(!world.is_alive(id));
            match &events[0] {
                ReplayEvent::Destroyed { location, time, .. } => {
                    assert_eq!(*location, DVec2::new(0.0, 100.0));
                    assert_eq!(*time, EventTime::from_fraction(0.5));
                }
                other => panic!("expected destruction, got {other:?}"),
            }
        }
    }
}
