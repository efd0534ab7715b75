//! Event model and detection.
//!
//! One detection pass classifies everything that can happen within a
//! sub-step:
//!
//! - **Attack** — two opposing units come within weapon engagement range
//! - **Collision** — two bodies (unit/unit or unit/node) come into contact
//! - **Desertion** — a unit's trajectory leaves the bounded world
//!
//! Unit pairs are pruned through the [`CollisionGrid`]; nodes are scanned
//! exhaustively (their population is small and fixed). Every detected event
//! carries an [`EventTime`] — the sub-step fraction rounded to a fixed
//! precision — and lands in a `BTreeSet`, which both collapses the
//! duplicate detections (each pair is found from both sides) and yields the
//! deterministic total order the scheduler consumes.

use std::collections::BTreeSet;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::collide::collision_time;
use crate::config::GameConfig;
use crate::entity::{EntityId, Ship};
use crate::error::SimError;
use crate::spatial::CollisionGrid;
use crate::world::World;

/// Number of representable instants per sub-step.
///
/// Event times are rounded to this precision before comparison, so two
/// physically simultaneous events can never be split into separate batches
/// by floating-point noise.
pub const EVENT_TIME_PRECISION: u32 = 10_000;

/// A fraction of a sub-step in `[0, 1]`, stored as a fixed-point tick
/// count so equality and ordering are exact.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EventTime(u32);

impl EventTime {
    /// The start of the sub-step.
    pub const ZERO: Self = Self(0);

    /// The end of the sub-step.
    pub const END: Self = Self(EVENT_TIME_PRECISION);

    /// Rounds a raw sub-step fraction to event-time precision, clamped to
    /// `[0, 1]`.
    #[must_use]
    pub fn from_fraction(t: f64) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ticks = (t.clamp(0.0, 1.0) * f64::from(EVENT_TIME_PRECISION)).round() as u32;
        Self(ticks)
    }

    /// The rounded fraction as a float, for trajectory extrapolation.
    #[must_use]
    pub fn as_fraction(self) -> f64 {
        f64::from(self.0) / f64::from(EVENT_TIME_PRECISION)
    }
}

impl std::fmt::Debug for EventTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EventTime({})", self.as_fraction())
    }
}

/// What kind of interaction an event records.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum EventKind {
    /// Two bodies come into physical contact.
    Collision,
    /// Two opposing units come within weapon range.
    Attack,
    /// A unit's trajectory crosses the world boundary.
    Desertion,
}

/// One detected interaction within a sub-step.
///
/// Participants are stored in canonical (sorted) order so the same physical
/// interaction detected from both sides collapses to one set entry. The
/// derived `Ord` sorts by time first — the order the scheduler drains.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SimulationEvent {
    /// When within the sub-step the interaction occurs.
    pub time: EventTime,
    /// Interaction kind.
    pub kind: EventKind,
    /// First participant (canonically the smaller id).
    pub first: EntityId,
    /// Second participant; equals `first` for desertions.
    pub second: EntityId,
}

impl SimulationEvent {
    /// Creates an event, canonicalizing participant order.
    #[must_use]
    pub fn new(kind: EventKind, a: EntityId, b: EntityId, time: EventTime) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self { time, kind, first, second }
    }
}

/// Detects every event occurring within the coming sub-step.
///
/// # Errors
///
/// Lookup errors surface as [`SimError`]; they indicate a kernel bug (the
/// grid only indexes live units) and abort the step.
pub fn detect(world: &World, config: &GameConfig) -> Result<BTreeSet<SimulationEvent>, SimError> {
    let grid = CollisionGrid::build(world, config);
    let mut events = BTreeSet::new();
    let mut pair_tests: usize = 0;

    for (fleet, slot, ship) in world.ships() {
        let id1 = EntityId::ship(fleet, slot);

        // Anything that could reach this unit within the sub-step: its own
        // travel, a full-speed opposing closer, both bodies, weapon reach.
        let query_radius =
            ship.speed() + config.max_speed + ship.radius + config.ship_radius + config.weapon_radius;
        for id2 in grid.query(ship.position, query_radius) {
            if id2 == id1 {
                continue;
            }
            let EntityId::Ship { fleet: fleet2, slot: slot2 } = id2 else {
                continue;
            };
            let other = world.ship(fleet2, slot2)?;
            find_pair_events(&mut events, config, id1, id2, ship, other, fleet != fleet2);
            pair_tests += 1;
        }

        // Unit-vs-node checks are exhaustive; the node table is small.
        for (node_id, node) in world.nodes() {
            if !node.is_alive() {
                continue;
            }
            let distance = ship.position.distance(node.position);
            if distance <= ship.speed() + ship.radius + node.radius {
                let collision_radius = ship.radius + node.radius;
                match collision_time(
                    collision_radius,
                    ship.position,
                    node.position,
                    ship.velocity,
                    DVec2::ZERO,
                ) {
                    Some(t) if (0.0..=1.0).contains(&t) => {
                        events.insert(SimulationEvent::new(
                            EventKind::Collision,
                            id1,
                            EntityId::node(node_id),
                            EventTime::from_fraction(t),
                        ));
                    }
                    Some(_) => {}
                    None => {
                        // No root with the bodies already overlapping would
                        // mean a collision went unresolved last sub-step.
                        debug_assert!(distance > collision_radius);
                    }
                }
            }
        }

        // Desertion: the map is convex and the unit starts inside, so if it
        // ends outside there is exactly one earliest boundary crossing.
        if !world.within_bounds(ship.position_at(1.0)) {
            let t = boundary_exit_time(ship, world);
            events.insert(SimulationEvent::new(
                EventKind::Desertion,
                id1,
                id1,
                EventTime::from_fraction(t),
            ));
        }
    }

    trace!(pair_tests, detected = events.len(), "event detection pass");
    Ok(events)
}

/// Classifies one unit pair: weapon engagement for opposing owners,
/// physical collision regardless of ownership.
fn find_pair_events(
    events: &mut BTreeSet<SimulationEvent>,
    config: &GameConfig,
    id1: EntityId,
    id2: EntityId,
    ship1: &Ship,
    ship2: &Ship,
    opposing: bool,
) {
    let distance = ship1.position.distance(ship2.position);

    if opposing && distance <= ship1.speed() + ship2.speed() + config.weapon_radius {
        let attack_radius = ship1.radius + ship2.radius + config.weapon_radius;
        match collision_time(
            attack_radius,
            ship1.position,
            ship2.position,
            ship1.velocity,
            ship2.velocity,
        ) {
            Some(t) if (0.0..=1.0).contains(&t) => {
                events.insert(SimulationEvent::new(
                    EventKind::Attack,
                    id1,
                    id2,
                    EventTime::from_fraction(t),
                ));
            }
            // Solved outside the window (or unsolvable) while already in
            // range: engaged for the whole sub-step.
            _ if distance < attack_radius => {
                events.insert(SimulationEvent::new(EventKind::Attack, id1, id2, EventTime::ZERO));
            }
            _ => {}
        }
    }

    if distance <= ship1.speed() + ship2.speed() + ship1.radius + ship2.radius {
        let collision_radius = ship1.radius + ship2.radius;
        match collision_time(
            collision_radius,
            ship1.position,
            ship2.position,
            ship1.velocity,
            ship2.velocity,
        ) {
            Some(t) if (0.0..=1.0).contains(&t) => {
                events.insert(SimulationEvent::new(
                    EventKind::Collision,
                    id1,
                    id2,
                    EventTime::from_fraction(t),
                ));
            }
            Some(_) => {}
            None => {
                // Overlapping units would already have collided.
                debug_assert!(distance >= collision_radius);
            }
        }
    }
}

/// Earliest non-negative time at which the trajectory crosses any boundary
/// edge, solved per axis. The caller has established the end position is
/// out of bounds, so a crossing in `[0, 1]` always exists.
fn boundary_exit_time(ship: &Ship, world: &World) -> f64 {
    let mut time = f64::MAX;
    let p = ship.position;
    let v = ship.velocity;

    if v.x != 0.0 {
        for bound in [0.0, world.width()] {
            let t = (bound - p.x) / v.x;
            if t >= 0.0 && t < time {
                time = t;
            }
        }
    }
    if v.y != 0.0 {
        for bound in [0.0, world.height()] {
            let t = (bound - p.y) / v.y;
            if t >= 0.0 && t < time {
                time = t;
            }
        }
    }

    debug_assert!((0.0..=1.0).contains(&time));
    time
}
