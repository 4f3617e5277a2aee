//! Pure per-chunk surface generation: biome color, height, water and beach.
//!
//! Everything here is a function of immutable inputs, so a single
//! `TerrainGenerator` can be shared behind an `Arc` by all generation workers.

use bytemuck::{Pod, Zeroable};
use rayon::prelude::*;

use crate::core::error::Error;
use crate::core::types::{Color, Mat4, Result, Vec3};
use crate::streaming::ChunkCoord;
use super::biome::BiomeClassifier;
use super::cell_center;
use super::config::{NoiseFieldConfig, TerrainConfig};
use super::noise_field::NoiseField;
use super::water::{WaterSurface, WaterSurfaceGenerator};

/// Per-cell instance transform: chunk-local position plus scale.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CellTransform {
    pub position: Vec3,
    pub scale: Vec3,
}

impl CellTransform {
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_scale(self.scale)
    }
}

/// Classification of a single world cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellSample {
    pub biome: usize,
    pub water: bool,
    pub beach: bool,
    pub height: f32,
}

/// Land cells of one chunk as parallel per-instance arrays.
///
/// Water cells are not present; they belong to the chunk's [`WaterSurface`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LandSurface {
    pub transforms: Vec<CellTransform>,
    pub colors: Vec<Color>,
    /// Biome index per emitted cell
    pub biomes: Vec<u16>,
    /// Beach flag per emitted cell
    pub beach: Vec<bool>,
    /// Row-major cell index (`z * size + x`) per emitted cell
    pub cells: Vec<u32>,
}

impl LandSurface {
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Check the parallel arrays agree with each other and with the number of
    /// land cells the chunk should have.
    pub fn validate(&self, coord: ChunkCoord, expected_cells: usize) -> Result<()> {
        let n = self.transforms.len();
        let lengths = [self.colors.len(), self.biomes.len(), self.beach.len(), self.cells.len()];
        if lengths.iter().any(|&len| len != n) {
            return Err(Error::InvariantViolation {
                coord,
                detail: format!(
                    "array length mismatch: transforms={} colors={} biomes={} beach={} cells={}",
                    n, lengths[0], lengths[1], lengths[2], lengths[3]
                ),
            });
        }
        if n != expected_cells {
            return Err(Error::InvariantViolation {
                coord,
                detail: format!("expected {} land cells, generated {}", expected_cells, n),
            });
        }
        Ok(())
    }
}

/// Procedural surface generator driven by layered noise fields.
///
/// A missing noise field disables the feature it drives: no height, no water
/// or no beaches. Missing biome fields contribute zero to the biome value.
pub struct TerrainGenerator {
    chunk_size: u32,
    pixel_size: f32,
    classifier: BiomeClassifier,

    primary: Option<NoiseField>,
    secondary: Option<NoiseField>,
    primary_weight: f32,
    secondary_weight: f32,
    contrast: f32,

    height: Option<NoiseField>,
    height_scale: f32,

    water: Option<NoiseField>,
    water_threshold: f32,
    water_height: f32,
    water_color: Color,

    beach: Option<NoiseField>,
    beach_threshold: f32,
    beach_radius: f32,
    sand_color: Color,
}

impl TerrainGenerator {
    /// Create a new terrain generator from configuration
    pub fn new(config: &TerrainConfig) -> Self {
        let build = |enabled: bool, cfg: Option<NoiseFieldConfig>| {
            if enabled { cfg.map(NoiseField::new) } else { None }
        };

        let water = build(config.enable_water, config.water_noise);
        // Beaches only exist next to water
        let beach = build(config.enable_beaches && water.is_some(), config.beach_noise);

        Self {
            chunk_size: config.chunk_size,
            pixel_size: config.pixel_size,
            classifier: BiomeClassifier::build(&config.biomes),
            primary: build(true, config.primary_biome_noise),
            secondary: build(true, config.secondary_biome_noise),
            primary_weight: config.primary_weight,
            secondary_weight: config.secondary_weight,
            contrast: config.contrast,
            height: build(config.enable_height, config.height_noise),
            height_scale: config.height_variation * config.height_influence,
            water,
            water_threshold: config.water_threshold,
            water_height: config.water_height,
            water_color: config.water_color,
            beach,
            beach_threshold: config.beach_threshold,
            beach_radius: config.beach_width * config.pixel_size,
            sand_color: config.sand_color,
        }
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn pixel_size(&self) -> f32 {
        self.pixel_size
    }

    pub fn chunk_world_size(&self) -> f32 {
        self.chunk_size as f32 * self.pixel_size
    }

    /// Cells per chunk
    pub fn cell_count(&self) -> usize {
        (self.chunk_size * self.chunk_size) as usize
    }

    pub fn classifier(&self) -> &BiomeClassifier {
        &self.classifier
    }

    /// Largest absolute vertical offset a land cell can get
    pub fn max_height(&self) -> f32 {
        if self.height.is_some() { self.height_scale.abs() } else { 0.0 }
    }

    pub fn has_water(&self) -> bool {
        self.water.is_some()
    }

    pub fn water_height(&self) -> f32 {
        self.water_height
    }

    pub fn water_color(&self) -> Color {
        self.water_color
    }

    pub fn world_to_chunk(&self, pos: Vec3) -> ChunkCoord {
        ChunkCoord::from_world_pos(pos, self.chunk_world_size())
    }

    /// Weighted, contrasted combination of the two biome fields in [-1, 1].
    pub fn biome_value(&self, x: f32, z: f32) -> f32 {
        let p = self.primary.as_ref().map_or(0.0, |n| n.sample(x, z));
        let s = self.secondary.as_ref().map_or(0.0, |n| n.sample(x, z));
        ((p * self.primary_weight + s * self.secondary_weight) * self.contrast).clamp(-1.0, 1.0)
    }

    pub fn biome_at(&self, x: f32, z: f32) -> usize {
        self.classifier.classify(self.biome_value(x, z))
    }

    pub fn is_water_at(&self, x: f32, z: f32) -> bool {
        self.water
            .as_ref()
            .is_some_and(|n| WaterSurfaceGenerator::is_water(n, self.water_threshold, x, z))
    }

    /// Beach test for a land cell: some point on the ring around it is water
    /// and the beach field at the cell itself exceeds the threshold.
    pub fn is_beach_at(&self, x: f32, z: f32) -> bool {
        let Some(beach) = &self.beach else {
            return false;
        };

        let near_water = (0..8).any(|k| {
            let angle = k as f32 * std::f32::consts::FRAC_PI_4;
            self.is_water_at(
                x + angle.cos() * self.beach_radius,
                z + angle.sin() * self.beach_radius,
            )
        });

        near_water && beach.sample(x, z) > self.beach_threshold
    }

    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        self.height
            .as_ref()
            .map_or(0.0, |n| n.sample(x, z) * self.height_scale)
    }

    /// Full classification of the cell at world (x, z).
    pub fn sample_cell(&self, x: f32, z: f32) -> CellSample {
        let water = self.is_water_at(x, z);
        CellSample {
            biome: self.biome_at(x, z),
            water,
            beach: !water && self.is_beach_at(x, z),
            height: if water { self.water_height } else { self.height_at(x, z) },
        }
    }

    /// Generate the land instances of one chunk.
    pub fn generate_land(&self, coord: ChunkCoord) -> LandSurface {
        let size = self.chunk_size;
        let center = coord.world_center(self.chunk_world_size());
        let capacity = self.cell_count();

        let mut land = LandSurface {
            transforms: Vec::with_capacity(capacity),
            colors: Vec::with_capacity(capacity),
            biomes: Vec::with_capacity(capacity),
            beach: Vec::with_capacity(capacity),
            cells: Vec::with_capacity(capacity),
        };

        for z in 0..size {
            for x in 0..size {
                let world = cell_center(coord, size, self.pixel_size, x, z);
                if self.is_water_at(world.x, world.y) {
                    continue;
                }

                let biome = self.biome_at(world.x, world.y);
                let beach = self.is_beach_at(world.x, world.y);
                let color = if beach { self.sand_color } else { self.classifier.color(biome) };
                let local = world - center;

                land.transforms.push(CellTransform {
                    position: Vec3::new(local.x, self.height_at(world.x, world.y), local.y),
                    scale: Vec3::new(self.pixel_size, 1.0, self.pixel_size),
                });
                land.colors.push(color);
                land.biomes.push(biome as u16);
                land.beach.push(beach);
                land.cells.push(z * size + x);
            }
        }

        land
    }

    /// Generate the water mask of one chunk, if water is enabled.
    pub fn generate_water(&self, coord: ChunkCoord) -> Option<WaterSurface> {
        self.water.as_ref().map(|noise| {
            WaterSurfaceGenerator::generate(
                coord,
                self.chunk_size,
                self.pixel_size,
                noise,
                self.water_threshold,
                self.water_height,
            )
        })
    }

    /// Generate many chunks in parallel on the rayon pool.
    pub fn generate_many(&self, coords: &[ChunkCoord]) -> Vec<(LandSurface, Option<WaterSurface>)> {
        coords
            .par_iter()
            .map(|&coord| (self.generate_land(coord), self.generate_water(coord)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::config::BiomeDefinition;

    fn flat_config(biome_noise: f64) -> TerrainConfig {
        TerrainConfig {
            chunk_size: 4,
            primary_biome_noise: Some(NoiseFieldConfig::constant(biome_noise)),
            secondary_biome_noise: None,
            primary_weight: 1.0,
            secondary_weight: 0.0,
            enable_height: false,
            enable_water: false,
            enable_beaches: false,
            biomes: vec![
                BiomeDefinition::new("low", Color::rgb(1.0, 0.0, 0.0), 0.0),
                BiomeDefinition::new("high", Color::rgb(0.0, 1.0, 0.0), 1.0),
            ],
            ..TerrainConfig::default()
        }
    }

    #[test]
    fn test_constant_noise_single_biome() {
        let low = TerrainGenerator::new(&flat_config(-0.5)).generate_land(ChunkCoord::new(0, 0));
        assert_eq!(low.len(), 16);
        assert!(low.biomes.iter().all(|&b| b == 0));
        assert!(low.colors.iter().all(|&c| c == Color::rgb(1.0, 0.0, 0.0)));

        let high = TerrainGenerator::new(&flat_config(0.5)).generate_land(ChunkCoord::new(-3, 9));
        assert_eq!(high.len(), 16);
        assert!(high.biomes.iter().all(|&b| b == 1));
    }

    #[test]
    fn test_generation_is_bit_identical() {
        let generator = TerrainGenerator::new(&TerrainConfig::default());
        let coord = ChunkCoord::new(3, -2);
        let a = generator.generate_land(coord);
        let b = generator.generate_land(coord);

        let a_bytes: &[u8] = bytemuck::cast_slice(&a.transforms);
        let b_bytes: &[u8] = bytemuck::cast_slice(&b.transforms);
        assert_eq!(a_bytes, b_bytes);
        let a_colors: &[u8] = bytemuck::cast_slice(&a.colors);
        let b_colors: &[u8] = bytemuck::cast_slice(&b.colors);
        assert_eq!(a_colors, b_colors);

        let other = TerrainGenerator::new(&TerrainConfig::default());
        assert_eq!(other.generate_land(coord), a);
    }

    #[test]
    fn test_transforms_are_chunk_local() {
        let generator = TerrainGenerator::new(&flat_config(0.0));
        let land = generator.generate_land(ChunkCoord::new(10, 10));
        assert_eq!(land.transforms[0].position, Vec3::new(-1.5, 0.0, -1.5));
        assert_eq!(land.transforms[15].position, Vec3::new(1.5, 0.0, 1.5));
        assert_eq!(land.transforms[0].scale, Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(land.cells[5], 5);
    }

    #[test]
    fn test_height_offset() {
        let config = TerrainConfig {
            enable_height: true,
            height_noise: Some(NoiseFieldConfig::constant(0.5)),
            height_variation: 16.0,
            height_influence: 0.5,
            ..flat_config(0.0)
        };
        let generator = TerrainGenerator::new(&config);
        let land = generator.generate_land(ChunkCoord::new(0, 0));
        assert!(land.transforms.iter().all(|t| t.position.y == 4.0));
        assert_eq!(generator.max_height(), 8.0);
    }

    #[test]
    fn test_disabled_height_is_flat() {
        let config = TerrainConfig {
            height_noise: Some(NoiseFieldConfig::constant(0.9)),
            ..flat_config(0.0)
        };
        let generator = TerrainGenerator::new(&config);
        assert_eq!(generator.height_at(1.0, 2.0), 0.0);
        assert_eq!(generator.max_height(), 0.0);
    }

    #[test]
    fn test_water_cells_are_excluded() {
        let config = TerrainConfig {
            enable_water: true,
            water_noise: Some(NoiseFieldConfig::constant(-0.9)),
            ..flat_config(0.0)
        };
        let generator = TerrainGenerator::new(&config);
        let coord = ChunkCoord::new(0, 0);
        let land = generator.generate_land(coord);
        let water = generator.generate_water(coord).unwrap();

        assert!(land.is_empty());
        assert_eq!(water.coverage, 1.0);
        assert!(land.validate(coord, 16 - water.water_cell_count()).is_ok());
        assert!(generator.sample_cell(0.5, 0.5).water);
        assert_eq!(generator.sample_cell(0.5, 0.5).height, config.water_height);
    }

    #[test]
    fn test_missing_water_noise_disables_water() {
        let config = TerrainConfig {
            enable_water: true,
            water_noise: None,
            ..flat_config(0.0)
        };
        let generator = TerrainGenerator::new(&config);
        assert!(!generator.has_water());
        assert!(generator.generate_water(ChunkCoord::new(0, 0)).is_none());
        assert_eq!(generator.generate_land(ChunkCoord::new(0, 0)).len(), 16);
    }

    #[test]
    fn test_land_and_water_partition_chunk() {
        let config = TerrainConfig {
            water_threshold: 0.0,
            ..TerrainConfig::default()
        };
        let generator = TerrainGenerator::new(&config);
        for coord in ChunkCoord::new(0, 0).square(2) {
            let land = generator.generate_land(coord);
            let water = generator.generate_water(coord).unwrap();
            assert_eq!(land.len() + water.water_cell_count(), generator.cell_count());
            assert!(land.validate(coord, generator.cell_count() - water.water_cell_count()).is_ok());
            for &cell in &land.cells {
                assert!(!water.mask[cell as usize]);
            }
        }
    }

    #[test]
    fn test_beach_requires_nearby_water() {
        let mut config = TerrainConfig {
            water_threshold: 0.0,
            beach_noise: Some(NoiseFieldConfig::constant(0.9)),
            ..TerrainConfig::default()
        };
        let generator = TerrainGenerator::new(&config);

        let mut beach_cells = 0;
        for coord in ChunkCoord::new(0, 0).square(2) {
            let land = generator.generate_land(coord);
            for (i, &cell) in land.cells.iter().enumerate() {
                let p = cell_center(coord, 32, 1.0, cell % 32, cell / 32);
                let ring_has_water = (0..8).any(|k| {
                    let a = k as f32 * std::f32::consts::FRAC_PI_4;
                    generator.is_water_at(p.x + a.cos() * 3.0, p.y + a.sin() * 3.0)
                });
                assert_eq!(land.beach[i], ring_has_water);
                if land.beach[i] {
                    assert_eq!(land.colors[i], config.sand_color);
                    beach_cells += 1;
                }
            }
        }
        assert!(beach_cells > 0, "expected some shoreline in a 5x5 chunk area");

        // Beach value below threshold never produces sand
        config.beach_noise = Some(NoiseFieldConfig::constant(-0.9));
        let generator = TerrainGenerator::new(&config);
        let land = generator.generate_land(ChunkCoord::new(0, 0));
        assert!(land.beach.iter().all(|&b| !b));
    }

    #[test]
    fn test_beach_keeps_biome_classification() {
        let config = TerrainConfig {
            water_threshold: 0.0,
            beach_noise: Some(NoiseFieldConfig::constant(0.9)),
            ..TerrainConfig::default()
        };
        let generator = TerrainGenerator::new(&config);
        let coord = ChunkCoord::new(1, 1);
        let land = generator.generate_land(coord);
        for (i, &cell) in land.cells.iter().enumerate() {
            let p = cell_center(coord, 32, 1.0, cell % 32, cell / 32);
            assert_eq!(land.biomes[i] as usize, generator.biome_at(p.x, p.y));
        }
    }

    #[test]
    fn test_validate_rejects_mismatch() {
        let generator = TerrainGenerator::new(&flat_config(0.0));
        let coord = ChunkCoord::new(0, 0);
        let mut land = generator.generate_land(coord);
        assert!(land.validate(coord, 16).is_ok());
        assert!(land.validate(coord, 15).is_err());

        land.colors.pop();
        let err = land.validate(coord, 16).unwrap_err();
        assert!(err.to_string().contains("length mismatch"));
    }

    #[test]
    fn test_generate_many_matches_serial() {
        let generator = TerrainGenerator::new(&TerrainConfig::default());
        let coords: Vec<_> = ChunkCoord::new(-1, 4).square(1).collect();
        let parallel = generator.generate_many(&coords);
        for (coord, (land, water)) in coords.iter().zip(parallel) {
            assert_eq!(land, generator.generate_land(*coord));
            assert_eq!(water, generator.generate_water(*coord));
        }
    }

    #[test]
    fn test_world_to_chunk() {
        let generator = TerrainGenerator::new(&TerrainConfig::default());
        assert_eq!(generator.world_to_chunk(Vec3::new(33.0, 0.0, -1.0)), ChunkCoord::new(1, -1));
    }
}
