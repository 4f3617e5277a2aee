//! Procedural terrain surface generation

pub mod config;
pub mod noise_field;
pub mod biome;
pub mod generator;
pub mod water;

pub use config::{BiomeDefinition, NoiseFieldConfig, NoiseKind, TerrainConfig, default_biomes};
pub use noise_field::NoiseField;
pub use biome::BiomeClassifier;
pub use generator::{CellSample, CellTransform, LandSurface, TerrainGenerator};
pub use water::{WaterSurface, WaterSurfaceGenerator};

use crate::core::types::Vec2;
use crate::streaming::ChunkCoord;

/// World XZ position of the center of cell (x, z) in chunk `coord`.
pub fn cell_center(coord: ChunkCoord, chunk_size: u32, pixel_size: f32, x: u32, z: u32) -> Vec2 {
    coord.world_origin(chunk_size as f32 * pixel_size)
        + Vec2::new((x as f32 + 0.5) * pixel_size, (z as f32 + 0.5) * pixel_size)
}
