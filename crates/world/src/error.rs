use thiserror::Error;

use crate::chunk::ChunkCoord;
use crate::object::ObjectId;

/// Contract violations surfaced to world callers.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("world has been shut down")]
    Disposed,
    #[error("chunk {0} is not loaded")]
    ChunkNotLoaded(ChunkCoord),
    #[error("placement rejected: {0}")]
    Placement(#[from] PlacementRejection),
    #[error("invalid chunk record: {0}")]
    Record(#[from] RecordError),
    #[error("chunk workers are no longer running")]
    WorkersUnavailable,
}

/// Why an object or block could not be placed or changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementRejection {
    #[error("footprint leaves the chunk")]
    OutOfChunk,
    #[error("tile ({x}, {y}) is not allowed in this biome")]
    TerrainNotAllowed { x: i32, y: i32 },
    #[error("tile ({x}, {y}) is not walkable")]
    Impassable { x: i32, y: i32 },
    #[error("tile ({x}, {y}) is water or beach")]
    Water { x: i32, y: i32 },
    #[error("overlaps object {0:?}")]
    Overlap(ObjectId),
    #[error("a block already occupies ({x}, {y})")]
    Occupied { x: i32, y: i32 },
    #[error("no block at ({x}, {y})")]
    NoBlock { x: i32, y: i32 },
    #[error("block cannot be flipped")]
    NotFlippable,
    #[error("object {0:?} not found")]
    UnknownObject(ObjectId),
}

/// A persisted record does not describe a valid chunk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("{grid} grid has {len} cells")]
    GridSize { grid: &'static str, len: usize },
    #[error("elevation band {0} out of range")]
    BandOutOfRange(u8),
    #[error("block at ({x}, {y}) lies outside the chunk")]
    BlockOutsideChunk { x: u8, y: u8 },
    #[error("duplicate block at ({x}, {y})")]
    DuplicateBlock { x: u8, y: u8 },
}
