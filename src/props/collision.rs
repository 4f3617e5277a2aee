//! Grid-radius collision avoidance between placed props of one chunk.

use crate::core::types::Vec2;
use super::definition::{CollisionMode, PropDefinition};

/// Symmetric "must keep apart" relation between prop definitions.
///
/// Props `a` and `b` conflict when either lists the other's group in its
/// avoid list, regardless of which one was placed first.
#[derive(Clone, Debug, Default)]
pub struct AvoidanceTable {
    count: usize,
    conflicts: Vec<bool>,
}

impl AvoidanceTable {
    pub fn build(props: &[PropDefinition]) -> Self {
        let count = props.len();
        let mut conflicts = vec![false; count * count];
        for (a, pa) in props.iter().enumerate() {
            for (b, pb) in props.iter().enumerate() {
                if pa.avoids(pb.group()) || pb.avoids(pa.group()) {
                    conflicts[a * count + b] = true;
                }
            }
        }
        Self { count, conflicts }
    }

    pub fn conflicts(&self, a: usize, b: usize) -> bool {
        a < self.count && b < self.count && self.conflicts[a * self.count + b]
    }
}

/// A prop instance that claims placement space. Scoped to one chunk load.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedPropRecord {
    /// World XZ position
    pub position: Vec2,
    /// Index of the prop definition in placement order
    pub prop: usize,
    pub radius: f32,
}

/// Records placed so far in the chunk being populated
#[derive(Clone, Debug, Default)]
pub struct CollisionSet {
    min_distance: f32,
    records: Vec<PlacedPropRecord>,
}

impl CollisionSet {
    pub fn new(min_distance: f32) -> Self {
        Self { min_distance: min_distance.max(0.0), records: Vec::new() }
    }

    /// Whether a candidate of prop `prop` at `position` keeps its distance
    /// from every conflicting record.
    pub fn is_clear(&self, table: &AvoidanceTable, prop: usize, position: Vec2, radius: f32) -> bool {
        self.records.iter().all(|record| {
            if !table.conflicts(prop, record.prop) {
                return true;
            }
            let reach = self.min_distance.max(radius).max(record.radius);
            position.distance_squared(record.position) > reach * reach
        })
    }

    pub fn insert(&mut self, record: PlacedPropRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[PlacedPropRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Whether the definition participates in avoidance at all
pub fn collides(prop: &PropDefinition) -> bool {
    prop.collision != CollisionMode::None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> Vec<PropDefinition> {
        vec![
            PropDefinition::new("a").with_group("ga"),
            PropDefinition::new("b").with_group("gb").with_avoid_groups(["ga"]),
            PropDefinition::new("c").with_group("gc").with_collision_size(4.0, 4.0),
        ]
    }

    #[test]
    fn test_table_is_symmetric() {
        let table = AvoidanceTable::build(&props());
        assert!(table.conflicts(0, 1));
        assert!(table.conflicts(1, 0));
        assert!(!table.conflicts(0, 2));
        assert!(!table.conflicts(0, 0));
        assert!(!table.conflicts(7, 0));
    }

    #[test]
    fn test_min_distance() {
        let table = AvoidanceTable::build(&props());
        let mut set = CollisionSet::new(1.5);
        set.insert(PlacedPropRecord { position: Vec2::new(0.0, 0.0), prop: 0, radius: 0.0 });

        assert!(!set.is_clear(&table, 1, Vec2::new(0.0, 0.0), 0.0));
        assert!(!set.is_clear(&table, 1, Vec2::new(1.0, 1.0), 0.0));
        assert!(set.is_clear(&table, 1, Vec2::new(2.0, 0.0), 0.0));
        // Non-conflicting props may overlap
        assert!(set.is_clear(&table, 2, Vec2::new(0.0, 0.0), 2.0));
    }

    #[test]
    fn test_larger_radius_wins() {
        let props = vec![
            PropDefinition::new("big").with_collision_size(6.0, 6.0),
            PropDefinition::new("small").with_avoid_groups(["big"]),
        ];
        let table = AvoidanceTable::build(&props);
        let mut set = CollisionSet::new(1.0);
        set.insert(PlacedPropRecord {
            position: Vec2::ZERO,
            prop: 0,
            radius: props[0].collision_radius(),
        });

        assert!(!set.is_clear(&table, 1, Vec2::new(2.9, 0.0), 0.0));
        assert!(set.is_clear(&table, 1, Vec2::new(3.1, 0.0), 0.0));
    }

    #[test]
    fn test_collision_mode() {
        let mut prop = PropDefinition::new("grass");
        assert!(collides(&prop));
        prop.collision = CollisionMode::None;
        assert!(!collides(&prop));
    }
}
