//! Pixelworld - an infinite pixel-art world streamed in chunks
//!
//! Terrain (biome, water, beach, height) is a pure function of world position.
//! Chunks are generated on a worker pool around a moving viewpoint, decorated
//! with deterministic props, and harvested resources are remembered across
//! sessions.

pub mod core;
pub mod math;
pub mod terrain;
pub mod streaming;
pub mod render;
pub mod props;
pub mod resources;
pub mod world;
