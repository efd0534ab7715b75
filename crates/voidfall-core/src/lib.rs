//! # Voidfall Core
//!
//! Deterministic simulation kernel for the Voidfall space-combat contest.
//!
//! Each turn, every fleet's validated commands are applied and the
//! continuous-time world advances by one unit of time: all collisions,
//! weapon exchanges, and boundary desertions within the interval are
//! detected analytically, ordered deterministically, and resolved in
//! simultaneous batches. Given the same initial world and the same inputs,
//! a match replays bit-for-bit.
//!
//! ## Architecture
//!
//! - [`world`]: entities and their invariants; owns no behavior
//! - [`spatial`]: uniform grid pruning pairwise event checks
//! - [`collide`]: analytic collision-time root-finder
//! - [`event`]: detection and deterministic event ordering
//! - [`schedule`]: simultaneous-batch grouping
//! - [`resolve`]: damage, destruction, and cascades
//! - [`simulation`]: the per-turn phase state machine
//!
//! ## Usage
//!
//! ```rust,ignore
//! use voidfall_core::{config::GameConfig, simulation::Simulation, world::World};
//!
//! let mut sim = Simulation::new(GameConfig::default(), generated_world);
//! while !sim.complete() {
//!     let record = sim.run_turn(&collect_commands(), &liveness)?;
//!     replay.append(record);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod collide;
pub mod command;
pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod output;
pub mod resolve;
pub mod schedule;
pub mod simulation;
pub mod spatial;
pub mod world;

// Re-exports for convenience
pub use command::{Command, CommandQueue, TurnCommands};
pub use config::GameConfig;
pub use entity::{DockingStatus, EntityId, FleetId, Node, NodeId, Ship, SlotId};
pub use error::SimError;
pub use event::{EventKind, EventTime, SimulationEvent};
pub use output::{FleetStats, ReplayEvent, TurnRecord};
pub use simulation::Simulation;
pub use world::World;

#[cfg(test)]
mod tests;
