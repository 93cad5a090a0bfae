//! Static world objects: trees, decorations, ground cover and collectibles.

use serde::{Deserialize, Serialize};
use tileworld_core::mix64;

use crate::chunk::{WorldPos, TILE_SIZE};

/// Broad placement class of an object kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectClass {
    Tree,
    /// Ground cover such as tall grass.
    Foliage,
    Decor,
    Collectible,
}

/// Constant properties of an object kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectSpec {
    pub width: u8,
    pub height: u8,
    pub collidable: bool,
    pub permanent: bool,
    pub class: ObjectClass,
    /// Footprint starts this many tiles left of the anchor.
    pub anchor_offset: u8,
    /// Clearance kept around the footprint against other trees.
    pub buffer: u8,
}

impl ObjectSpec {
    const fn tree(width: u8, height: u8, buffer: u8) -> Self {
        Self {
            width,
            height,
            collidable: true,
            permanent: true,
            class: ObjectClass::Tree,
            anchor_offset: 1,
            buffer,
        }
    }

    const fn decor(width: u8, height: u8, collidable: bool) -> Self {
        Self {
            width,
            height,
            collidable,
            permanent: true,
            class: ObjectClass::Decor,
            anchor_offset: 0,
            buffer: 0,
        }
    }

    const FOLIAGE: Self = Self {
        width: 1,
        height: 1,
        collidable: false,
        permanent: true,
        class: ObjectClass::Foliage,
        anchor_offset: 0,
        buffer: 0,
    };
}

/// Every kind of static object the world knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    Tree,
    TreeAlt,
    SnowTree,
    HauntedTree,
    RuinsTree,
    RainTree,
    CherryTree,
    BeachTree,
    ApricornTree,
    Cactus,
    DeadTree,
    SmallHauntedTree,
    Bush,
    Vines,
    RuinPole,
    Sunflower,
    TallGrass,
    SnowTallGrass,
    ForestTallGrass,
    RainTallGrass,
    HauntedTallGrass,
    DesertTallGrass,
    RuinsTallGrass,
    ItemBall,
}

impl ObjectKind {
    pub const fn spec(self) -> ObjectSpec {
        match self {
            ObjectKind::Tree
            | ObjectKind::TreeAlt
            | ObjectKind::SnowTree
            | ObjectKind::HauntedTree
            | ObjectKind::RuinsTree
            | ObjectKind::RainTree
            | ObjectKind::CherryTree
            | ObjectKind::BeachTree => ObjectSpec::tree(2, 3, 1),
            ObjectKind::ApricornTree => ObjectSpec::tree(3, 3, 2),
            ObjectKind::Cactus | ObjectKind::DeadTree | ObjectKind::SmallHauntedTree => {
                ObjectSpec::decor(1, 2, true)
            }
            ObjectKind::Bush => ObjectSpec::decor(3, 2, true),
            ObjectKind::Vines | ObjectKind::Sunflower => ObjectSpec::decor(1, 2, false),
            ObjectKind::RuinPole => ObjectSpec::decor(1, 3, true),
            ObjectKind::TallGrass
            | ObjectKind::SnowTallGrass
            | ObjectKind::ForestTallGrass
            | ObjectKind::RainTallGrass
            | ObjectKind::HauntedTallGrass
            | ObjectKind::DesertTallGrass
            | ObjectKind::RuinsTallGrass => ObjectSpec::FOLIAGE,
            ObjectKind::ItemBall => ObjectSpec {
                width: 1,
                height: 1,
                collidable: false,
                permanent: false,
                class: ObjectClass::Collectible,
                anchor_offset: 0,
                buffer: 0,
            },
        }
    }

    pub const fn is_tree(self) -> bool {
        matches!(self.spec().class, ObjectClass::Tree)
    }

    /// Footprint for an object anchored at the given world tile.
    pub const fn footprint_at(self, anchor_x: i32, anchor_y: i32) -> Footprint {
        let spec = self.spec();
        Footprint {
            x: anchor_x - spec.anchor_offset as i32,
            y: anchor_y,
            width: spec.width as i32,
            height: spec.height as i32,
        }
    }
}

/// Axis-aligned tile rectangle in world tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Footprint {
    pub fn contains(&self, tile_x: i32, tile_y: i32) -> bool {
        tile_x >= self.x
            && tile_x < self.x + self.width
            && tile_y >= self.y
            && tile_y < self.y + self.height
    }

    pub fn intersects(&self, other: &Footprint) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    /// Grow by `margin` tiles on every side.
    pub fn expanded(&self, margin: i32) -> Footprint {
        Footprint {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + 2 * margin,
            height: self.height + 2 * margin,
        }
    }

    /// Centre in tile units.
    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    /// Every covered tile, row by row.
    pub fn tiles(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        (self.y..self.y + self.height)
            .flat_map(move |y| (self.x..self.x + self.width).map(move |x| (x, y)))
    }
}

/// Stable object identifier derived from kind and anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl ObjectId {
    pub fn derive(kind: ObjectKind, anchor_x: i32, anchor_y: i32) -> Self {
        let packed = (anchor_x as u32 as u64) | ((anchor_y as u32 as u64) << 32);
        Self(mix64(packed ^ mix64(kind as u64 + 1)))
    }
}

/// An object placed in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    /// Anchor in world tiles.
    pub anchor_x: i32,
    pub anchor_y: i32,
    /// World clock seconds at publication; only set for non-permanent kinds.
    pub spawned_at: Option<f64>,
}

impl StaticObject {
    pub fn new(kind: ObjectKind, anchor_x: i32, anchor_y: i32) -> Self {
        Self {
            id: ObjectId::derive(kind, anchor_x, anchor_y),
            kind,
            anchor_x,
            anchor_y,
            spawned_at: None,
        }
    }

    pub fn footprint(&self) -> Footprint {
        self.kind.footprint_at(self.anchor_x, self.anchor_y)
    }

    pub fn is_collidable(&self) -> bool {
        self.kind.spec().collidable
    }

    pub fn is_permanent(&self) -> bool {
        self.kind.spec().permanent
    }

    /// Footprint centre in world pixels.
    pub fn center(&self) -> WorldPos {
        let (cx, cy) = self.footprint().center();
        WorldPos::new(cx * TILE_SIZE, cy * TILE_SIZE)
    }

    /// True once a non-permanent object has outlived `lifetime` seconds.
    pub fn is_expired(&self, now: f64, lifetime: f64) -> bool {
        match self.spawned_at {
            Some(at) if !self.is_permanent() => now - at >= lifetime,
            _ => false,
        }
    }
}
