//! Spatial partitioning for the built-in proximity contact source.
//!
//! Provides O(1) cell lookup and O(k) neighbor queries where k is the number
//! of entities in nearby cells, rather than O(n) for brute force.

use bevy_ecs::prelude::*;
use std::collections::HashMap;

use crate::components::{Collider, Position};
use crate::config::GameConfig;

/// Grid-based spatial partitioning structure.
///
/// Divides the arena into cells and tracks which colliders are in each cell.
/// Rebuilt from scratch once per frame.
#[derive(Resource, Debug)]
pub struct SpatialGrid {
    /// Cell size in world units.
    pub cell_size: f32,
    cells: HashMap<(i32, i32), Vec<SpatialEntry>>,
    /// Reverse lookup: entity to cell.
    entity_cells: HashMap<Entity, (i32, i32)>,
    /// Largest collider radius inserted since the last clear.
    max_radius: f32,
}

/// Entry in a spatial cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntry {
    pub entity: Entity,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(4.0)
    }
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(0.01),
            cells: HashMap::new(),
            entity_cells: HashMap::new(),
            max_radius: 0.0,
        }
    }

    /// Convert world coordinates to cell coordinates.
    #[inline]
    pub fn world_to_cell(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.entity_cells.clear();
        self.max_radius = 0.0;
    }

    /// Insert a circle collider.
    pub fn insert(&mut self, entity: Entity, x: f32, y: f32, radius: f32) {
        let cell = self.world_to_cell(x, y);

        // Remove from old cell if moved
        if let Some(&old_cell) = self.entity_cells.get(&entity) {
            if let Some(entries) = self.cells.get_mut(&old_cell) {
                entries.retain(|e| e.entity != entity);
            }
        }

        let entry = SpatialEntry {
            entity,
            x,
            y,
            radius,
        };
        self.cells.entry(cell).or_default().push(entry);
        self.entity_cells.insert(entity, cell);
        self.max_radius = self.max_radius.max(radius);
    }

    /// All entries whose center lies within `radius` of a point, closest
    /// first.
    pub fn query_radius(&self, x: f32, y: f32, radius: f32) -> Vec<SpatialEntry> {
        let radius_sq = radius * radius;
        let cells_to_check = (radius / self.cell_size).ceil() as i32 + 1;
        let center_cell = self.world_to_cell(x, y);

        let mut results = Vec::new();

        for dx in -cells_to_check..=cells_to_check {
            for dy in -cells_to_check..=cells_to_check {
                let cell = (center_cell.0 + dx, center_cell.1 + dy);
                if let Some(entries) = self.cells.get(&cell) {
                    for entry in entries {
                        let dist_sq = (entry.x - x).powi(2) + (entry.y - y).powi(2);
                        if dist_sq <= radius_sq {
                            results.push(*entry);
                        }
                    }
                }
            }
        }

        results.sort_by(|a, b| {
            let dist_a = (a.x - x).powi(2) + (a.y - y).powi(2);
            let dist_b = (b.x - x).powi(2) + (b.y - y).powi(2);
            dist_a
                .partial_cmp(&dist_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.entity.cmp(&b.entity))
        });

        results
    }

    /// Every pair of overlapping colliders, each reported once as
    /// `(lower, higher)` and sorted so the output is independent of hash
    /// iteration order.
    pub fn overlapping_pairs(&self) -> Vec<(Entity, Entity)> {
        let mut pairs = Vec::new();
        for entries in self.cells.values() {
            for a in entries {
                let reach = a.radius + self.max_radius;
                for b in self.query_radius(a.x, a.y, reach) {
                    if a.entity >= b.entity {
                        continue;
                    }
                    let touch = a.radius + b.radius;
                    let dist_sq = (a.x - b.x).powi(2) + (a.y - b.y).powi(2);
                    if dist_sq <= touch * touch {
                        pairs.push((a.entity, b.entity));
                    }
                }
            }
        }
        pairs.sort_unstable();
        pairs
    }

    /// Largest collider radius inserted since the last clear.
    pub fn max_radius(&self) -> f32 {
        self.max_radius
    }

    pub fn total_count(&self) -> usize {
        self.entity_cells.len()
    }
}

/// System that rebuilds the spatial grid each frame.
pub fn spatial_grid_update_system(
    config: Res<GameConfig>,
    mut grid: ResMut<SpatialGrid>,
    query: Query<(Entity, &Position, &Collider)>,
) {
    if !config.builtin_contacts {
        return;
    }
    if grid.cell_size != config.spatial_cell_size {
        *grid = SpatialGrid::new(config.spatial_cell_size);
    } else {
        grid.clear();
    }

    for (entity, pos, collider) in query.iter() {
        grid.insert(entity, pos.x, pos.y, collider.radius);
    }
}
