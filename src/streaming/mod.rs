//! Chunk streaming around a moving viewpoint

pub mod coord;
pub mod config;
pub mod chunk_loader;
pub mod lifecycle;

pub use coord::ChunkCoord;
pub use config::StreamingConfig;
pub use chunk_loader::{ChunkPayload, GenerationPool, JobOutcome, JobResult};
pub use lifecycle::{ChunkEvent, ChunkLifecycleManager, ChunkRecord, FrameStats, LoadState};
