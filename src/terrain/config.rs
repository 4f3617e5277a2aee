//! Terrain generation configuration.

use serde::{Deserialize, Serialize};

use crate::core::types::Color;

/// Noise source kind for a [`NoiseFieldConfig`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoiseKind {
    /// Fractal Brownian motion over Perlin noise.
    #[default]
    Perlin,
    /// Same value everywhere. Useful for calibration and tests.
    Constant { value: f64 },
}

/// Parameters of one noise field. Immutable once the field is built.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseFieldConfig {
    #[serde(default)]
    pub kind: NoiseKind,
    pub frequency: f64,
    pub seed: u32,
    pub octaves: u32,
}

impl NoiseFieldConfig {
    pub fn perlin(frequency: f64, octaves: u32, seed: u32) -> Self {
        Self { kind: NoiseKind::Perlin, frequency, seed, octaves }
    }

    pub fn constant(value: f64) -> Self {
        Self { kind: NoiseKind::Constant { value }, frequency: 1.0, seed: 0, octaves: 1 }
    }
}

/// A named biome: cells whose biome noise is below `threshold` (and above
/// every lower threshold) get this biome. The highest threshold is a catch-all.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BiomeDefinition {
    pub name: String,
    pub color: Color,
    pub threshold: f32,
}

impl BiomeDefinition {
    pub fn new(name: impl Into<String>, color: Color, threshold: f32) -> Self {
        Self { name: name.into(), color, threshold }
    }
}

/// Configuration for per-chunk surface generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Cells per chunk side
    pub chunk_size: u32,
    /// World size of one cell
    pub pixel_size: f32,

    pub primary_biome_noise: Option<NoiseFieldConfig>,
    pub secondary_biome_noise: Option<NoiseFieldConfig>,
    pub primary_weight: f32,
    pub secondary_weight: f32,
    pub contrast: f32,

    pub enable_height: bool,
    pub height_noise: Option<NoiseFieldConfig>,
    /// Maximum vertical offset in world units
    pub height_variation: f32,
    /// 0..1 multiplier on `height_variation`
    pub height_influence: f32,

    pub enable_water: bool,
    pub water_noise: Option<NoiseFieldConfig>,
    /// Cells with water noise below this are water
    pub water_threshold: f32,
    pub water_color: Color,
    /// Fixed height of the water quad
    pub water_height: f32,

    pub enable_beaches: bool,
    pub beach_noise: Option<NoiseFieldConfig>,
    pub beach_threshold: f32,
    /// Ring radius in cells used to look for nearby water
    pub beach_width: f32,
    pub sand_color: Color,

    pub biomes: Vec<BiomeDefinition>,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self::with_seed(12345)
    }
}

impl TerrainConfig {
    /// Default terrain with every noise field seeded from `seed`.
    pub fn with_seed(seed: u32) -> Self {
        Self {
            chunk_size: 32,
            pixel_size: 1.0,
            primary_biome_noise: Some(NoiseFieldConfig::perlin(0.02, 2, seed)),
            secondary_biome_noise: Some(NoiseFieldConfig::perlin(0.05, 1, seed.wrapping_add(1000))),
            primary_weight: 0.75,
            secondary_weight: 0.25,
            contrast: 1.0,
            enable_height: true,
            height_noise: Some(NoiseFieldConfig::perlin(0.08, 2, seed.wrapping_add(2000))),
            height_variation: 16.0,
            height_influence: 1.0,
            enable_water: true,
            water_noise: Some(NoiseFieldConfig::perlin(0.03, 2, seed.wrapping_add(3000))),
            water_threshold: -0.3,
            water_color: Color::rgb(0.2, 0.4, 0.8),
            water_height: -0.5,
            enable_beaches: true,
            beach_noise: Some(NoiseFieldConfig::perlin(0.15, 1, seed.wrapping_add(4000))),
            beach_threshold: 0.3,
            beach_width: 3.0,
            sand_color: Color::rgb(0.93, 0.87, 0.64),
            biomes: default_biomes(),
        }
    }

    /// World-space edge length of one chunk
    pub fn chunk_world_size(&self) -> f32 {
        self.chunk_size as f32 * self.pixel_size
    }
}

/// The eight grassland-to-savanna biomes shipped with the default world.
pub fn default_biomes() -> Vec<BiomeDefinition> {
    vec![
        BiomeDefinition::new("deep_forest", Color::rgb(0.169, 0.239, 0.075), -0.6),
        BiomeDefinition::new("forest", Color::rgb(0.196, 0.341, 0.133), -0.3),
        BiomeDefinition::new("swamp", Color::rgb(0.38, 0.408, 0.133), -0.1),
        BiomeDefinition::new("grassland", Color::rgb(0.447, 0.569, 0.267), 0.1),
        BiomeDefinition::new("dry_plains", Color::rgb(0.78, 0.69, 0.282), 0.3),
        BiomeDefinition::new("meadow", Color::rgb(0.482, 0.624, 0.2), 0.5),
        BiomeDefinition::new("bright_meadow", Color::rgb(0.545, 0.702, 0.22), 0.7),
        BiomeDefinition::new("savanna", Color::rgb(0.647, 0.753, 0.208), 1.0),
    ]
}
