//! Tile codes and the passability predicate.
//!
//! Every cell of a chunk carries exactly one [`TileCode`]. Mountain cliffs,
//! pond edges and shorelines are data-carrying variants so a renderer can pick
//! the right sprite without a lookup table.

use serde::{Deserialize, Serialize};

/// Cardinal side of a tile. `North` points towards +y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    North,
    East,
    South,
    West,
}

impl Side {
    /// All four sides in clockwise order.
    pub const ALL: [Side; 4] = [Side::North, Side::East, Side::South, Side::West];

    /// Tile offset pointing out of this side.
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Side::North => (0, 1),
            Side::East => (1, 0),
            Side::South => (0, -1),
            Side::West => (-1, 0),
        }
    }

    pub const fn opposite(self) -> Side {
        match self {
            Side::North => Side::South,
            Side::East => Side::West,
            Side::South => Side::North,
            Side::West => Side::East,
        }
    }
}

/// Diagonal corner of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Corner {
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::NorthEast,
        Corner::NorthWest,
        Corner::SouthEast,
        Corner::SouthWest,
    ];

    pub const fn offset(self) -> (i32, i32) {
        match self {
            Corner::NorthEast => (1, 1),
            Corner::NorthWest => (-1, 1),
            Corner::SouthEast => (1, -1),
            Corner::SouthWest => (-1, -1),
        }
    }

    /// The two sides meeting at this corner.
    pub const fn sides(self) -> (Side, Side) {
        match self {
            Corner::NorthEast => (Side::North, Side::East),
            Corner::NorthWest => (Side::North, Side::West),
            Corner::SouthEast => (Side::South, Side::East),
            Corner::SouthWest => (Side::South, Side::West),
        }
    }
}

/// One of eight compass directions, used by pond edge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeDir {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl From<Side> for EdgeDir {
    fn from(side: Side) -> Self {
        match side {
            Side::North => EdgeDir::North,
            Side::East => EdgeDir::East,
            Side::South => EdgeDir::South,
            Side::West => EdgeDir::West,
        }
    }
}

impl From<Corner> for EdgeDir {
    fn from(corner: Corner) -> Self {
        match corner {
            Corner::NorthEast => EdgeDir::NorthEast,
            Corner::NorthWest => EdgeDir::NorthWest,
            Corner::SouthEast => EdgeDir::SouthEast,
            Corner::SouthWest => EdgeDir::SouthWest,
        }
    }
}

/// Shape of a cliff tile relative to lower neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CliffPiece {
    /// Exactly one orthogonal side drops.
    Edge(Side),
    /// Two adjacent orthogonal sides drop.
    OuterCorner(Corner),
    /// No orthogonal side drops but the diagonal does.
    InnerCorner(Corner),
}

/// Cap material drawn on top of a cliff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CliffCap {
    /// First mountain layer.
    Grass,
    /// Second layer and above.
    Rock,
}

impl CliffCap {
    pub const fn for_band(band: u8) -> Self {
        if band <= 1 {
            CliffCap::Grass
        } else {
            CliffCap::Rock
        }
    }
}

/// Shore land mask bits.
pub mod shore {
    pub const NORTH: u8 = 1;
    pub const EAST: u8 = 2;
    pub const SOUTH: u8 = 4;
    pub const WEST: u8 = 8;
    pub const ALL: u8 = NORTH | EAST | SOUTH | WEST;
}

/// Terrain category of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TileCode {
    Water,
    Grass,
    Grass2,
    Grass3,
    TallGrass,
    Flower,
    Flower2,
    Flower3,
    Sand,
    Rock,
    Snow,
    Snow2,
    SnowyGrass,
    SnowTallGrass,
    ForestGrass,
    ForestTallGrass,
    RainForestGrass,
    RainForestTallGrass,
    RainForestFlower,
    HauntedGrass,
    HauntedTallGrass,
    HauntedShroom,
    DesertSand,
    DesertGrass,
    DesertRock,
    RuinsGrass,
    RuinsTallGrass,
    RuinsBricks,
    BeachSand,
    BeachGrass,
    BeachShell,
    /// Flat walkable top of a mountain band.
    MountainTop,
    Cliff { piece: CliffPiece, cap: CliffCap },
    Stairs,
    CaveEntrance,
    /// Pond interior.
    Pond,
    /// Pond rim facing land in the given direction.
    PondEdge(EdgeDir),
    /// Shallow beach water; the mask marks orthogonal land neighbours.
    Shore(u8),
}

impl TileCode {
    /// Whether creatures and players may stand on this tile.
    pub const fn is_passable(self) -> bool {
        !matches!(
            self,
            TileCode::Water
                | TileCode::Rock
                | TileCode::DesertRock
                | TileCode::Cliff { .. }
                | TileCode::CaveEntrance
                | TileCode::Pond
        )
    }

    /// Open or shallow water of any kind.
    pub const fn is_water(self) -> bool {
        matches!(
            self,
            TileCode::Water | TileCode::Pond | TileCode::PondEdge(_) | TileCode::Shore(_)
        )
    }

    pub const fn is_beach(self) -> bool {
        matches!(
            self,
            TileCode::BeachSand | TileCode::BeachGrass | TileCode::BeachShell | TileCode::Shore(_)
        )
    }

    pub const fn is_sand(self) -> bool {
        matches!(
            self,
            TileCode::Sand | TileCode::DesertSand | TileCode::BeachSand
        )
    }

    /// Plain ground cover that ecosystem rules may decorate.
    pub const fn is_grass(self) -> bool {
        matches!(
            self,
            TileCode::Grass
                | TileCode::Grass2
                | TileCode::Grass3
                | TileCode::SnowyGrass
                | TileCode::ForestGrass
                | TileCode::RainForestGrass
                | TileCode::HauntedGrass
                | TileCode::DesertGrass
                | TileCode::RuinsGrass
                | TileCode::BeachGrass
        )
    }

    /// Flowers, tall grass and similar decorations.
    pub const fn is_decoration(self) -> bool {
        matches!(
            self,
            TileCode::TallGrass
                | TileCode::Flower
                | TileCode::Flower2
                | TileCode::Flower3
                | TileCode::SnowTallGrass
                | TileCode::ForestTallGrass
                | TileCode::RainForestTallGrass
                | TileCode::RainForestFlower
                | TileCode::HauntedTallGrass
                | TileCode::HauntedShroom
                | TileCode::RuinsTallGrass
        )
    }

    pub const fn is_mountain(self) -> bool {
        matches!(
            self,
            TileCode::MountainTop
                | TileCode::Cliff { .. }
                | TileCode::Stairs
                | TileCode::CaveEntrance
        )
    }

    /// Single character used by the debug tooling.
    pub const fn glyph(self) -> char {
        match self {
            TileCode::Water => '~',
            TileCode::Pond => 'o',
            TileCode::PondEdge(_) => 'c',
            TileCode::Shore(_) => ',',
            TileCode::Sand | TileCode::DesertSand | TileCode::BeachSand => ':',
            TileCode::Rock | TileCode::DesertRock => '#',
            TileCode::Snow | TileCode::Snow2 => '*',
            TileCode::RuinsBricks => '=',
            TileCode::MountainTop => '^',
            TileCode::Cliff { .. } => 'M',
            TileCode::Stairs => 'H',
            TileCode::CaveEntrance => 'C',
            TileCode::Flower | TileCode::Flower2 | TileCode::Flower3 => 'f',
            TileCode::RainForestFlower => 'f',
            TileCode::BeachShell => 's',
            t if t.is_decoration() => '"',
            _ => '.',
        }
    }
}
