//! Error types for the world streaming crate

use thiserror::Error;

use crate::streaming::ChunkCoord;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invariant violation in chunk {coord}: {detail}")]
    InvariantViolation { coord: ChunkCoord, detail: String },

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}
