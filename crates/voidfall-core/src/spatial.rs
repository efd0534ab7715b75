//! Uniform-grid spatial index over the bounded plane.
//!
//! Rebuilt from the world at the start of every sub-step, the grid buckets
//! every live unit into fixed-size square cells and answers proximity
//! queries with the contents of the query cell plus any neighbor the query
//! circle spills into. Cells are sized (from config) to exceed the largest
//! possible single-step interaction radius, so one ring of neighbors is
//! always enough.
//!
//! The guarantee is one-sided: the result is a superset of every unit that
//! could interact with the query circle this sub-step. False positives are
//! filtered by the exact solver; false negatives would be missed events and
//! must not occur.
//!
//! Nodes are never indexed — their population is small and fixed, and the
//! event detector scans them exhaustively.

use glam::DVec2;

use crate::config::GameConfig;
use crate::entity::EntityId;
use crate::world::World;

/// Spatial index of live units, valid for one sub-step.
#[derive(Debug)]
pub struct CollisionGrid {
    cell_size: f64,
    cols: usize,
    rows: usize,
    /// Row-major cell buckets of unit ids, each in (fleet, slot) order.
    cells: Vec<Vec<EntityId>>,
}

impl CollisionGrid {
    /// Builds the grid from the current world state, in time proportional
    /// to the unit count.
    #[must_use]
    pub fn build(world: &World, config: &GameConfig) -> Self {
        let cell_size = config.max_interaction_radius() + 1.0;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let cols = ((world.width() / cell_size).ceil() as usize).max(1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rows = ((world.height() / cell_size).ceil() as usize).max(1);

        let mut grid = Self {
            cell_size,
            cols,
            rows,
            cells: vec![Vec::new(); cols * rows],
        };

        for (fleet, slot, ship) in world.ships() {
            if ship.is_alive() {
                let (cx, cy) = grid.cell_of(ship.position);
                grid.cells[cy * cols + cx].push(EntityId::ship(fleet, slot));
            }
        }

        grid
    }

    /// Cell edge length.
    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Grid dimensions as (columns, rows).
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    fn cell_of(&self, position: DVec2) -> (usize, usize) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let cx = ((position.x / self.cell_size) as usize).min(self.cols - 1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let cy = ((position.y / self.cell_size) as usize).min(self.rows - 1);
        (cx, cy)
    }

    /// Every indexed unit in the cell containing `position` and in each
    /// neighboring cell the query circle extends into, with diagonal
    /// neighbors included when two adjoining edges are both exceeded.
    ///
    /// `radius` must not exceed the cell size; the detector's query radii
    /// are bounded by construction.
    #[must_use]
    pub fn query(&self, position: DVec2, radius: f64) -> Vec<EntityId> {
        debug_assert!(radius <= self.cell_size);

        let (cell_x, cell_y) = self.cell_of(position);
        #[allow(clippy::cast_precision_loss)]
        let real_x = self.cell_size * cell_x as f64;
        #[allow(clippy::cast_precision_loss)]
        let real_y = self.cell_size * cell_y as f64;

        // Each boundary is checked independently.
        let exceeds_left = position.x - radius < real_x && cell_x > 0;
        let exceeds_right =
            position.x + radius >= real_x + self.cell_size && cell_x + 1 < self.cols;
        let exceeds_top = position.y - radius < real_y && cell_y > 0;
        let exceeds_bottom =
            position.y + radius >= real_y + self.cell_size && cell_y + 1 < self.rows;

        let mut hits = Vec::new();
        let mut add_cell = |cx: usize, cy: usize| {
            hits.extend_from_slice(&self.cells[cy * self.cols + cx]);
        };

        add_cell(cell_x, cell_y);

        if exceeds_left {
            add_cell(cell_x - 1, cell_y);
            if exceeds_top {
                add_cell(cell_x - 1, cell_y - 1);
            }
            if exceeds_bottom {
                add_cell(cell_x - 1, cell_y + 1);
            }
        }

        if exceeds_top {
            add_cell(cell_x, cell_y - 1);
        }

        if exceeds_bottom {
            add_cell(cell_x, cell_y + 1);
        }

        if exceeds_right {
            add_cell(cell_x + 1, cell_y);
            if exceeds_top {
                add_cell(cell_x + 1, cell_y - 1);
            }
            if exceeds_bottom {
                add_cell(cell_x + 1, cell_y + 1);
            }
        }

        hits
    }
}
