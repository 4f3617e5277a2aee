//! Renderer collaborator interface
//!
//! The streaming core never builds render primitives itself. It hands
//! per-instance arrays to a [`ChunkRenderer`] and keeps the returned
//! [`RenderHandle`] for visibility toggling and release.

pub mod headless;

pub use headless::{HeadlessObject, HeadlessRenderer, ObjectKind};

use crate::core::types::{Mat4, Vec2};
use crate::streaming::ChunkCoord;
use crate::terrain::{LandSurface, WaterSurface};

/// Opaque handle to a realized render object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderHandle(pub u64);

/// Everything the world needs from a renderer.
pub trait ChunkRenderer {
    /// Realize a chunk's land instances. `center` is the chunk centre on the
    /// XZ plane; land transforms are relative to it.
    fn create_land(&mut self, coord: ChunkCoord, center: Vec2, land: &LandSurface) -> RenderHandle;

    /// Realize a chunk's flat water quad, masked per cell.
    fn create_water(&mut self, coord: ChunkCoord, center: Vec2, water: &WaterSurface) -> RenderHandle;

    /// Whether a prop visual reference can be resolved.
    fn has_visual(&self, _visual: &str) -> bool {
        true
    }

    /// Realize an instanced batch of one prop visual with world transforms.
    fn create_prop_batch(&mut self, coord: ChunkCoord, visual: &str, transforms: &[Mat4]) -> RenderHandle;

    /// Replace the instances of an existing prop batch.
    fn update_prop_batch(&mut self, handle: RenderHandle, transforms: &[Mat4]);

    fn set_visible(&mut self, handle: RenderHandle, visible: bool);

    /// Destroy the object behind `handle`. Unknown handles are ignored.
    fn release(&mut self, handle: RenderHandle);
}
