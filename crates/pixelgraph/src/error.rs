use thiserror::Error;

use crate::types::Pixel;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Raster has zero size ({width}x{height})")]
    EmptyRaster { width: u32, height: u32 },

    #[error("Raster data length mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Island has no pixels")]
    EmptyIsland,

    #[error("Pixels do not form a single connected island")]
    DisconnectedIsland,

    #[error("Pixel {pixel} is already assigned to edge {edge}")]
    PixelReassigned { pixel: Pixel, edge: usize },

    #[error("{count} skeleton pixels were not reached by the graph walk (first at {first})")]
    UncoveredPixels { count: usize, first: Pixel },

    #[error("Cycle walk starting at {0} did not close")]
    OpenCycle(Pixel),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;
