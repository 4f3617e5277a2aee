//! Navigation grid collaborator and footprint bookkeeping

use std::collections::HashMap;

use crate::core::types::{Vec2, Vec3};

/// Obstacle registry consumed by prop placement. Its pathfinding internals
/// are not our concern.
pub trait NavigationGrid {
    fn register_obstacle(&mut self, position: Vec3, footprint: Vec2, tag: &str);

    fn unregister_obstacle(&mut self, position: Vec3, footprint: Vec2);

    /// Cells or obstacles currently blocked, if the grid can tell.
    fn blocked_count(&self) -> Option<usize> {
        None
    }
}

/// Obstacle position as registered with the grid: on the ground plane and
/// rounded to 0.01 so register/unregister pairs match exactly.
pub fn nav_position(world: Vec3) -> Vec3 {
    let round = |v: f32| (v * 100.0).round() / 100.0;
    Vec3::new(round(world.x), 0.0, round(world.z))
}

/// A registered obstacle, remembered so it can be removed later
#[derive(Clone, Debug, PartialEq)]
pub struct NavFootprint {
    pub position: Vec3,
    pub footprint: Vec2,
    pub prop: String,
    pub index: u32,
}

/// Navigation bookkeeping counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NavigationStats {
    pub loaded_prop_chunks: usize,
    pub nav_chunks: usize,
    pub total_nav_props: usize,
    pub blocked: Option<usize>,
}

/// Obstacle set keyed by position in hundredths of a world unit
#[derive(Debug, Default)]
pub struct InMemoryNavigationGrid {
    obstacles: HashMap<(i64, i64), Vec<(Vec2, String)>>,
}

impl InMemoryNavigationGrid {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(position: Vec3) -> (i64, i64) {
        ((position.x * 100.0).round() as i64, (position.z * 100.0).round() as i64)
    }

    pub fn obstacle_count(&self) -> usize {
        self.obstacles.values().map(Vec::len).sum()
    }

    pub fn is_blocked(&self, position: Vec3) -> bool {
        self.obstacles.contains_key(&Self::key(position))
    }
}

impl NavigationGrid for InMemoryNavigationGrid {
    fn register_obstacle(&mut self, position: Vec3, footprint: Vec2, tag: &str) {
        self.obstacles
            .entry(Self::key(position))
            .or_default()
            .push((footprint, tag.to_string()));
    }

    fn unregister_obstacle(&mut self, position: Vec3, footprint: Vec2) {
        let key = Self::key(position);
        if let Some(list) = self.obstacles.get_mut(&key) {
            if let Some(i) = list.iter().position(|(f, _)| *f == footprint) {
                list.swap_remove(i);
            }
            if list.is_empty() {
                self.obstacles.remove(&key);
            }
        }
    }

    fn blocked_count(&self) -> Option<usize> {
        Some(self.obstacle_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nav_position_rounds_and_flattens() {
        let p = nav_position(Vec3::new(1.23456, 7.0, -2.005001));
        assert_eq!(p, Vec3::new(1.23, 0.0, -2.01));
    }

    #[test]
    fn test_register_unregister() {
        let mut grid = InMemoryNavigationGrid::new();
        let p = Vec3::new(3.5, 0.0, 4.5);
        grid.register_obstacle(p, Vec2::ONE, "tree");
        grid.register_obstacle(p, Vec2::splat(2.0), "rock");
        assert_eq!(grid.obstacle_count(), 2);
        assert!(grid.is_blocked(p));

        grid.unregister_obstacle(p, Vec2::ONE);
        assert_eq!(grid.blocked_count(), Some(1));
        grid.unregister_obstacle(p, Vec2::splat(2.0));
        assert!(!grid.is_blocked(p));

        // Unknown obstacles are ignored
        grid.unregister_obstacle(p, Vec2::ONE);
        assert_eq!(grid.obstacle_count(), 0);
    }
}
