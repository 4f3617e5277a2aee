//! Water mask generation: one flat quad per chunk, masked per cell.

use image::{Rgba, RgbaImage};

use crate::streaming::ChunkCoord;
use super::cell_center;
use super::noise_field::NoiseField;

/// Boolean water mask over a chunk's S x S cell grid.
#[derive(Clone, Debug, PartialEq)]
pub struct WaterSurface {
    pub coord: ChunkCoord,
    /// Cells per side
    pub size: u32,
    /// Row-major (`z * size + x`) water flags
    pub mask: Vec<bool>,
    /// Water cell count / total cell count
    pub coverage: f32,
    /// Height of the water quad
    pub height: f32,
}

impl WaterSurface {
    /// Only chunks with some water need a quad realized.
    pub fn has_water(&self) -> bool {
        self.coverage > 0.0
    }

    pub fn is_water(&self, x: u32, z: u32) -> bool {
        if x >= self.size || z >= self.size {
            return false;
        }
        self.mask[(z * self.size + x) as usize]
    }

    pub fn water_cell_count(&self) -> usize {
        self.mask.iter().filter(|&&w| w).count()
    }

    /// RGBA mask texture: white, opaque on water and transparent on land.
    pub fn mask_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.size, self.size, |x, z| {
            let alpha = if self.is_water(x, z) { 255 } else { 0 };
            Rgba([255, 255, 255, alpha])
        })
    }
}

/// Pure water mask generator.
pub struct WaterSurfaceGenerator;

impl WaterSurfaceGenerator {
    /// The single water test shared with land generation.
    #[inline]
    pub fn is_water(noise: &NoiseField, threshold: f32, x: f32, z: f32) -> bool {
        noise.sample(x, z) < threshold
    }

    pub fn generate(
        coord: ChunkCoord,
        chunk_size: u32,
        pixel_size: f32,
        noise: &NoiseField,
        threshold: f32,
        height: f32,
    ) -> WaterSurface {
        let total = (chunk_size * chunk_size) as usize;
        let mut mask = Vec::with_capacity(total);

        for z in 0..chunk_size {
            for x in 0..chunk_size {
                let world = cell_center(coord, chunk_size, pixel_size, x, z);
                mask.push(Self::is_water(noise, threshold, world.x, world.y));
            }
        }

        let water_cells = mask.iter().filter(|&&w| w).count();
        let coverage = if total == 0 { 0.0 } else { water_cells as f32 / total as f32 };

        WaterSurface {
            coord,
            size: chunk_size,
            mask,
            coverage,
            height,
        }
    }
}
