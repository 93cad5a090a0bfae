//! Player-placed blocks layered over generated terrain.

use serde::{Deserialize, Serialize};

use crate::chunk::LocalTile;

/// Kinds of block a player can place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockKind {
    CraftingTable,
    WoodenPlanks,
    HousePlanks,
    WoodenDoor,
    Chest,
    Furnace,
    RoofMiddle,
    RoofCorner,
    HousePart,
}

impl BlockKind {
    pub const fn is_solid(self) -> bool {
        !matches!(self, BlockKind::WoodenDoor)
    }

    /// Building pieces can be mirrored; furniture cannot.
    pub const fn is_flippable(self) -> bool {
        !matches!(
            self,
            BlockKind::CraftingTable | BlockKind::Chest | BlockKind::Furnace
        )
    }

    pub const fn is_interactive(self) -> bool {
        matches!(
            self,
            BlockKind::CraftingTable | BlockKind::Chest | BlockKind::Furnace | BlockKind::WoodenDoor
        )
    }

    /// Seconds needed to break the block by hand.
    pub const fn break_time(self) -> f32 {
        match self {
            BlockKind::Furnace => 8.0,
            BlockKind::RoofMiddle => 6.0,
            BlockKind::CraftingTable | BlockKind::Chest => 4.0,
            _ => 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    North,
    East,
    South,
    West,
}

/// A block sitting on a chunk-local tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedBlock {
    pub position: LocalTile,
    pub kind: BlockKind,
    pub orientation: Orientation,
    pub flipped: bool,
    /// Opaque per-block state, e.g. chest contents.
    pub payload: Vec<u8>,
}

impl PlacedBlock {
    pub fn new(position: LocalTile, kind: BlockKind, orientation: Orientation) -> Self {
        Self {
            position,
            kind,
            orientation,
            flipped: false,
            payload: Vec::new(),
        }
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Mirror the block. Returns false for kinds that cannot flip.
    pub fn toggle_flip(&mut self) -> bool {
        if !self.kind.is_flippable() {
            return false;
        }
        self.flipped = !self.flipped;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn furniture_does_not_flip() {
        let local = LocalTile::new(0, 0).unwrap();
        let mut chest = PlacedBlock::new(local, BlockKind::Chest, Orientation::North);
        assert!(!chest.toggle_flip());
        assert!(!chest.flipped);

        let mut roof = PlacedBlock::new(local, BlockKind::RoofCorner, Orientation::East);
        assert!(roof.toggle_flip());
        assert!(roof.flipped);
        assert!(roof.toggle_flip());
        assert!(!roof.flipped);
    }

    #[test]
    fn doors_are_walkable() {
        assert!(!BlockKind::WoodenDoor.is_solid());
        assert!(BlockKind::Chest.is_solid());
    }
}
