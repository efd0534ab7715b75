//! Kernel error types.
//!
//! Every variant of [`SimError`] signals a programming error in a caller or
//! in the kernel itself, never a gameplay outcome. Invalid *commands* (bad
//! node id, too-far dock attempt, thrust while docked) are silently ignored
//! by the orchestrator; an error surfacing from [`crate::simulation`] means
//! the turn was aborted and the world must not be trusted further.

use thiserror::Error;

use crate::entity::{FleetId, NodeId, SlotId};

/// Fatal kernel errors.
///
/// Returned from entity lookups and propagated with `?` up through event
/// resolution to the turn boundary. None of these are recoverable mid-turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SimError {
    /// An identity tagged invalid reached a lookup.
    #[error("invalid entity reference reached the kernel")]
    InvalidEntity,

    /// A unit reference survived validation but no such unit exists.
    #[error("no such unit: fleet {fleet}, slot {slot}")]
    UnknownShip {
        /// Owning fleet of the missing unit.
        fleet: FleetId,
        /// Slot index of the missing unit.
        slot: SlotId,
    },

    /// A node reference survived validation but no such node exists.
    #[error("no such node: {0}")]
    UnknownNode(NodeId),

    /// The per-fleet liveness slice does not match the world's fleet count.
    #[error("liveness flags for {got} fleets, world has {expected}")]
    LivenessMismatch {
        /// Fleet count the world was built with.
        expected: usize,
        /// Length of the slice the caller passed.
        got: usize,
    },
}
