//! Core-facing command types.
//!
//! Controllers (through the excluded networking collaborator) deliver one
//! [`TurnCommands`] per turn: for each fleet, an ordered list of per-unit
//! command maps, one map per sub-step. Commands reaching the kernel are
//! assumed syntactically valid; semantically invalid ones (unknown node
//! ids, too-far dock attempts, thrust while docked) are ignored without
//! failing the turn.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{FleetId, NodeId, SlotId};

/// One unit's command for one sub-step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Do nothing.
    #[default]
    Noop,
    /// Accelerate. Ignored while docked or mid-transition.
    Thrust {
        /// Acceleration magnitude; clamped to the configured maximum.
        magnitude: f64,
        /// Direction in degrees, counterclockwise from +x.
        angle_deg: f64,
    },
    /// Begin docking to a node. Requires zero velocity, proximity, a live
    /// unfrozen node with spare capacity, and compatible ownership.
    Dock(NodeId),
    /// Begin undocking. Valid only while fully docked.
    Undock,
}

/// One fleet's commands for a whole turn, indexed by sub-step.
pub type CommandQueue = Vec<BTreeMap<SlotId, Command>>;

/// Every fleet's commands for a whole turn.
pub type TurnCommands = BTreeMap<FleetId, CommandQueue>;
