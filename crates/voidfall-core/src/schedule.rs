//! Deterministic scheduling of detected events.
//!
//! The detector hands over a totally ordered event set; the [`EventQueue`]
//! consumes it as successive *simultaneous batches* — maximal runs of
//! events sharing the minimum remaining [`EventTime`]. Resolving whole
//! batches at once (rather than picking an arbitrary order among equal
//! times) is what makes the simulation reproducible: all physically
//! simultaneous effects land together.
//!
//! Before a batch is yielded, events referencing entities destroyed by an
//! earlier batch in the same sub-step are dropped; a batch that empties out
//! is skipped entirely.

use std::collections::{BTreeSet, VecDeque};

use crate::event::SimulationEvent;
use crate::world::World;

/// Queue of pending events for one sub-step, drained as simultaneous
/// batches.
#[derive(Debug)]
pub struct EventQueue {
    /// Remaining events in ascending (time, kind, participants) order.
    events: VecDeque<SimulationEvent>,
}

impl EventQueue {
    /// Builds the queue from a detection pass. The set's order (time first)
    /// is the drain order.
    #[must_use]
    pub fn new(events: BTreeSet<SimulationEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }

    /// Number of events not yet drained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` once every event has been drained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Pops the next non-empty simultaneous batch, dropping events that
    /// reference entities no longer alive in `world`. Returns `None` when
    /// the queue is exhausted.
    pub fn next_batch(&mut self, world: &World) -> Option<Vec<SimulationEvent>> {
        while let Some(front) = self.events.front() {
            let time = front.time;
            let mut batch = Vec::new();
            while let Some(ev) = self.events.front().copied() {
                if ev.time != time {
                    break;
                }
                self.events.pop_front();
                batch.push(ev);
            }

            batch.retain(|ev| world.is_alive(ev.first) && world.is_alive(ev.second));
            if !batch.is_empty() {
                return Some(batch);
            }
        }
        None
    }
}
