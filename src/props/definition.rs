//! Prop definitions: what to place, where, and how it collides.

use serde::{Deserialize, Serialize};

use crate::core::types::{Vec2, Vec3};

/// How instances of a prop are laid out over candidate cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementPattern {
    /// Independent per-cell roll (trees, grass)
    #[default]
    Scattered,
    /// Seed cells that flood into their neighbours (rocks, hills)
    Clustered,
}

/// Whether a prop takes part in collision avoidance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionMode {
    /// Never rejected, never blocks other props
    None,
    /// Grid-radius avoidance against conflicting groups
    #[default]
    Radius,
}

/// A placeable prop type. Loaded once, read-only during placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropDefinition {
    pub name: String,
    /// Collision/resource group tag. Empty means the prop name.
    pub group: String,
    /// Higher priorities claim placement space first
    pub priority: i32,
    pub pattern: PlacementPattern,
    /// Biome names this prop may spawn on
    pub allowed_biomes: Vec<String>,
    /// Per-candidate spawn chance in [0, 1]
    pub probability: f32,
    pub collision: CollisionMode,
    /// Groups this prop keeps its distance from
    pub avoid_groups: Vec<String>,
    /// Skip beach cells
    pub avoid_beaches: bool,

    /// Chance for a cluster to spread to an adjacent cell
    pub cluster_spread_chance: f32,
    /// Fraction the spread chance loses per hop
    pub cluster_decay_rate: f32,
    /// Cluster size cap, seed included
    pub max_cluster_size: u32,

    /// Harvestable props are tracked by the resource ledger
    pub harvestable: bool,
    pub blocks_navigation: bool,
    /// Ground footprint (x, z); `None` uses the placer default for navigation
    /// and a zero collision radius
    pub collision_size: Option<[f32; 2]>,

    /// Visual references; each instance picks one deterministically
    pub visuals: Vec<String>,
    /// Base scale applied to every instance
    pub scale: [f32; 3],
}

impl Default for PropDefinition {
    fn default() -> Self {
        Self {
            name: "prop".to_string(),
            group: String::new(),
            priority: 0,
            pattern: PlacementPattern::Scattered,
            allowed_biomes: Vec::new(),
            probability: 0.05,
            collision: CollisionMode::Radius,
            avoid_groups: Vec::new(),
            avoid_beaches: true,
            cluster_spread_chance: 0.7,
            cluster_decay_rate: 0.3,
            max_cluster_size: 6,
            harvestable: false,
            blocks_navigation: true,
            collision_size: None,
            visuals: Vec::new(),
            scale: [1.0, 1.0, 1.0],
        }
    }
}

impl PropDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self { visuals: vec![name.clone()], name, ..Self::default() }
    }

    /// Effective group tag
    pub fn group(&self) -> &str {
        if self.group.is_empty() { &self.name } else { &self.group }
    }

    pub fn avoids(&self, group: &str) -> bool {
        self.avoid_groups.iter().any(|g| g == group)
    }

    /// Radius derived from the ground footprint
    pub fn collision_radius(&self) -> f32 {
        self.collision_size.map_or(0.0, |[x, z]| x.max(z) * 0.5)
    }

    pub fn footprint(&self) -> Option<Vec2> {
        self.collision_size.map(Vec2::from)
    }

    pub fn base_scale(&self) -> Vec3 {
        Vec3::from(self.scale)
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_pattern(mut self, pattern: PlacementPattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_biomes<I, S>(mut self, biomes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_biomes = biomes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_probability(mut self, probability: f32) -> Self {
        self.probability = probability;
        self
    }

    pub fn with_avoid_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.avoid_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cluster(mut self, spread_chance: f32, decay_rate: f32, max_size: u32) -> Self {
        self.pattern = PlacementPattern::Clustered;
        self.cluster_spread_chance = spread_chance;
        self.cluster_decay_rate = decay_rate;
        self.max_cluster_size = max_size;
        self
    }

    pub fn harvestable(mut self) -> Self {
        self.harvestable = true;
        self
    }

    pub fn with_collision_size(mut self, x: f32, z: f32) -> Self {
        self.collision_size = Some([x, z]);
        self
    }

    pub fn with_visuals<I, S>(mut self, visuals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.visuals = visuals.into_iter().map(Into::into).collect();
        self
    }
}

/// The prop set shipped with the default world.
pub fn default_props() -> Vec<PropDefinition> {
    vec![
        PropDefinition::new("rock")
            .with_group("rock")
            .with_priority(20)
            .with_cluster(0.7, 0.3, 6)
            .with_biomes(["grassland", "dry_plains", "savanna"])
            .with_probability(0.01)
            .with_collision_size(1.0, 1.0)
            .with_visuals(["rock_small", "rock_large"])
            .harvestable(),
        PropDefinition::new("pine_tree")
            .with_group("tree")
            .with_priority(10)
            .with_biomes(["deep_forest", "forest"])
            .with_probability(0.08)
            .with_avoid_groups(["rock"])
            .with_collision_size(1.0, 1.0)
            .with_visuals(["pine_tree_a", "pine_tree_b"])
            .harvestable(),
        PropDefinition::new("oak_tree")
            .with_group("tree")
            .with_priority(9)
            .with_biomes(["swamp", "grassland", "meadow", "bright_meadow"])
            .with_probability(0.03)
            .with_avoid_groups(["rock", "tree"])
            .with_collision_size(1.5, 1.5)
            .harvestable(),
        PropDefinition {
            blocks_navigation: false,
            ..PropDefinition::new("bush")
                .with_priority(1)
                .with_biomes(["forest", "swamp", "meadow", "bright_meadow", "savanna"])
                .with_probability(0.05)
                .with_avoid_groups(["rock", "tree"])
        },
    ]
}
