//! Chunk grid coordinates

use serde::{Deserialize, Serialize};

use crate::core::types::{Vec2, Vec3};

/// Integer chunk coordinate on the XZ ground plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing world position `pos` (Y ignored).
    pub fn from_world_pos(pos: Vec3, chunk_world_size: f32) -> Self {
        Self {
            x: (pos.x / chunk_world_size).floor() as i32,
            z: (pos.z / chunk_world_size).floor() as i32,
        }
    }

    /// Minimum XZ corner of this chunk in world space
    pub fn world_origin(&self, chunk_world_size: f32) -> Vec2 {
        Vec2::new(self.x as f32 * chunk_world_size, self.z as f32 * chunk_world_size)
    }

    /// XZ center of this chunk in world space
    pub fn world_center(&self, chunk_world_size: f32) -> Vec2 {
        self.world_origin(chunk_world_size) + Vec2::splat(chunk_world_size * 0.5)
    }

    /// Max of |dx| and |dz|
    pub fn chebyshev_distance(&self, other: ChunkCoord) -> u32 {
        self.x.abs_diff(other.x).max(self.z.abs_diff(other.z))
    }

    pub fn distance_squared(&self, other: ChunkCoord) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dz = self.z as i64 - other.z as i64;
        dx.saturating_mul(dx).saturating_add(dz.saturating_mul(dz))
    }

    /// Every coordinate in the square of Chebyshev radius `radius` around
    /// `self`, row by row. Neighbours outside the i32 grid are skipped.
    pub fn square(self, radius: u32) -> impl Iterator<Item = ChunkCoord> {
        let r = radius.min(i32::MAX as u32) as i32;
        (-r..=r).filter_map(move |dx| self.x.checked_add(dx)).flat_map(move |x| {
            (-r..=r).filter_map(move |dz| self.z.checked_add(dz).map(|z| ChunkCoord::new(x, z)))
        })
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}
