//! Match configuration.
//!
//! All tunable gameplay constants live in [`GameConfig`], constructed once at
//! match start and passed by reference to every component that needs it.
//! There is deliberately no global constants table: two simulations with
//! different configs can coexist in one process, and a config can never be
//! mutated mid-match.

use serde::{Deserialize, Serialize};

/// Immutable gameplay constants for one match.
///
/// The defaults reproduce the standard contest ruleset. A match is fully
/// described by a `GameConfig` plus an initial [`crate::world::World`]; the
/// kernel never consults any other source of tuning.
///
/// # Example
///
/// ```
/// use voidfall_core::config::GameConfig;
///
/// let config = GameConfig::default();
/// assert_eq!(config.max_ship_health, 255);
/// assert!(config.weapon_radius > 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Physical radius of every mobile unit.
    pub ship_radius: f64,
    /// Health cap for mobile units; also the anchor for explosion falloff.
    pub max_ship_health: u16,
    /// Health newly spawned units start with.
    pub base_ship_health: u16,
    /// Hard cap on velocity magnitude after any acceleration.
    pub max_speed: f64,
    /// Largest thrust magnitude a single command may apply.
    pub max_acceleration: f64,
    /// Velocity magnitude shed at the end of every turn. Units slower than
    /// this come to a complete stop.
    pub drag: f64,
    /// Distance beyond combined radii at which weapons engage.
    pub weapon_radius: f64,
    /// Damage dealt per weapon engagement, split across simultaneous targets.
    pub weapon_damage: u16,
    /// Turns a weapon stays unavailable after firing.
    pub weapon_cooldown: u32,
    /// Extra reach beyond a node's surface within which a destroyed node
    /// damages entities.
    pub explosion_radius: f64,
    /// Distance beyond combined radii within which a dock command is valid.
    pub dock_radius: f64,
    /// Turns a dock or undock transition takes to complete.
    pub dock_turns: u32,
    /// Health restored per turn to a fully docked unit.
    pub docked_ship_regeneration: u16,
    /// Production accrued per turn by an occupied node's first docked unit.
    pub base_productivity: u16,
    /// Production accrued per additional docked unit.
    pub additional_productivity: u16,
    /// Accumulated production required to spawn one unit.
    pub production_per_ship: u16,
    /// Half-width of the square offset window scanned for spawn placement.
    pub spawn_radius: i32,
    /// Number of detect/resolve/advance sub-steps per turn.
    pub substeps: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            ship_radius: 0.5,
            max_ship_health: 255,
            base_ship_health: 255,
            max_speed: 30.0,
            max_acceleration: 7.0,
            drag: 10.0,
            weapon_radius: 5.0,
            weapon_damage: 64,
            weapon_cooldown: 1,
            explosion_radius: 10.0,
            dock_radius: 4.0,
            dock_turns: 5,
            docked_ship_regeneration: 0,
            base_productivity: 6,
            additional_productivity: 6,
            production_per_ship: 72,
            spawn_radius: 2,
            substeps: 1,
        }
    }
}

impl GameConfig {
    /// Upper bound on the distance at which two units could interact within
    /// one sub-step: both closing at full speed, bodies touching, weapons at
    /// maximum reach.
    #[must_use]
    pub fn max_interaction_radius(&self) -> f64 {
        2.0 * self.max_speed + 2.0 * self.ship_radius + self.weapon_radius
    }
}
