use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::biome::BiomeId;
use crate::block::PlacedBlock;
use crate::object::{Footprint, ObjectId, StaticObject};
use crate::tile::TileCode;

/// Chunk edge length in tiles.
pub const CHUNK_SIZE: usize = 16;
/// Tiles per chunk.
pub const CHUNK_AREA: usize = CHUNK_SIZE * CHUNK_SIZE;
/// Tile edge length in world pixels.
pub const TILE_SIZE: f32 = 32.0;
/// Chunk edge length in world pixels.
pub const CHUNK_PIXELS: f32 = CHUNK_SIZE as f32 * TILE_SIZE;

/// Discrete elevation tier. 0 is ground level.
pub type ElevationBand = u8;
/// Highest mountain layer.
pub const MAX_BAND: ElevationBand = 3;

/// Chunk coordinate in chunk space.
/// Ordered by row (`y`) then column (`x`) so iteration sweeps the world line by line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chunk containing the given world tile.
    pub fn from_tile(tile_x: i32, tile_y: i32) -> Self {
        let size = CHUNK_SIZE as i32;
        Self::new(tile_x.div_euclid(size), tile_y.div_euclid(size))
    }

    /// World tile of this chunk's local (0, 0).
    pub fn origin_tile(self) -> (i32, i32) {
        let size = CHUNK_SIZE as i32;
        (self.x * size, self.y * size)
    }

    /// Squared chunk distance.
    pub fn distance_sq(self, other: ChunkCoord) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl Ord for ChunkCoord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.y.cmp(&other.y).then(self.x.cmp(&other.x))
    }
}

impl PartialOrd for ChunkCoord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Chunk-local tile position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalTile {
    pub x: u8,
    pub y: u8,
}

impl LocalTile {
    /// Returns `None` when the position falls outside the chunk.
    pub fn new(x: usize, y: usize) -> Option<Self> {
        (x < CHUNK_SIZE && y < CHUNK_SIZE).then_some(Self {
            x: x as u8,
            y: y as u8,
        })
    }

    pub fn is_valid(self) -> bool {
        (self.x as usize) < CHUNK_SIZE && (self.y as usize) < CHUNK_SIZE
    }
}

/// Split a world tile into its chunk and local position.
pub fn tile_to_chunk(tile_x: i32, tile_y: i32) -> (ChunkCoord, LocalTile) {
    let size = CHUNK_SIZE as i32;
    let coord = ChunkCoord::from_tile(tile_x, tile_y);
    let local = LocalTile {
        x: tile_x.rem_euclid(size) as u8,
        y: tile_y.rem_euclid(size) as u8,
    };
    (coord, local)
}

/// Position in world pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f32,
    pub y: f32,
}

impl WorldPos {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Centre of a world tile.
    pub fn tile_center(tile_x: i32, tile_y: i32) -> Self {
        Self::new(
            (tile_x as f32 + 0.5) * TILE_SIZE,
            (tile_y as f32 + 0.5) * TILE_SIZE,
        )
    }

    /// World tile under this position.
    pub fn tile(self) -> (i32, i32) {
        (
            (self.x / TILE_SIZE).floor() as i32,
            (self.y / TILE_SIZE).floor() as i32,
        )
    }

    pub fn chunk(self) -> ChunkCoord {
        let (tx, ty) = self.tile();
        ChunkCoord::from_tile(tx, ty)
    }

    pub fn distance_sq(self, other: WorldPos) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Dirty flags set whenever chunk data diverges from what was persisted.
    pub struct DirtyFlags: u8 {
        const TILES = 0b0000_0001;
        const OBJECTS = 0b0000_0010;
        const BLOCKS = 0b0000_0100;
    }
}

impl Default for DirtyFlags {
    fn default() -> Self {
        DirtyFlags::empty()
    }
}

/// Row-major square grid covering one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    cells: Vec<T>,
}

impl<T: Copy> Grid<T> {
    pub fn filled(value: T) -> Self {
        Self {
            cells: vec![value; CHUNK_AREA],
        }
    }

    /// Wrap a flat vector; `None` when the length is wrong.
    pub fn from_vec(cells: Vec<T>) -> Option<Self> {
        (cells.len() == CHUNK_AREA).then_some(Self { cells })
    }

    #[inline]
    fn index(x: usize, y: usize) -> usize {
        debug_assert!(x < CHUNK_SIZE && y < CHUNK_SIZE);
        y * CHUNK_SIZE + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.cells[Self::index(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.cells[Self::index(x, y)] = value;
    }

    /// Bounds-checked lookup with signed coordinates.
    pub fn get_signed(&self, x: i32, y: i32) -> Option<T> {
        let size = CHUNK_SIZE as i32;
        if (0..size).contains(&x) && (0..size).contains(&y) {
            Some(self.get(x as usize, y as usize))
        } else {
            None
        }
    }

    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    pub fn into_vec(self) -> Vec<T> {
        self.cells
    }

    pub fn map<U: Copy>(&self, f: impl FnMut(T) -> U) -> Grid<U> {
        Grid {
            cells: self.cells.iter().copied().map(f).collect(),
        }
    }

    /// Iterate `(x, y, value)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, v)| (i % CHUNK_SIZE, i / CHUNK_SIZE, *v))
    }
}

/// A generated or loaded square of the world.
#[derive(Debug, Clone)]
pub struct Chunk {
    coord: ChunkCoord,
    biome: BiomeId,
    tiles: Grid<TileCode>,
    bands: Grid<ElevationBand>,
    objects: Vec<StaticObject>,
    blocks: BTreeMap<LocalTile, PlacedBlock>,
    dirty: DirtyFlags,
}

impl Chunk {
    /// Build a clean chunk from generated grids.
    pub fn new(
        coord: ChunkCoord,
        biome: BiomeId,
        tiles: Grid<TileCode>,
        bands: Grid<ElevationBand>,
    ) -> Self {
        Self {
            coord,
            biome,
            tiles,
            bands,
            objects: Vec::new(),
            blocks: BTreeMap::new(),
            dirty: DirtyFlags::empty(),
        }
    }

    pub(crate) fn from_parts(
        coord: ChunkCoord,
        biome: BiomeId,
        tiles: Grid<TileCode>,
        bands: Grid<ElevationBand>,
        objects: Vec<StaticObject>,
        blocks: BTreeMap<LocalTile, PlacedBlock>,
    ) -> Self {
        Self {
            coord,
            biome,
            tiles,
            bands,
            objects,
            blocks,
            dirty: DirtyFlags::empty(),
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn biome(&self) -> BiomeId {
        self.biome
    }

    pub fn tile(&self, x: usize, y: usize) -> TileCode {
        self.tiles.get(x, y)
    }

    pub fn band(&self, x: usize, y: usize) -> ElevationBand {
        self.bands.get(x, y)
    }

    pub fn tiles(&self) -> &Grid<TileCode> {
        &self.tiles
    }

    pub fn bands(&self) -> &Grid<ElevationBand> {
        &self.bands
    }

    pub fn objects(&self) -> &[StaticObject] {
        &self.objects
    }

    pub fn blocks(&self) -> impl Iterator<Item = &PlacedBlock> {
        self.blocks.values()
    }

    pub fn block(&self, local: LocalTile) -> Option<&PlacedBlock> {
        self.blocks.get(&local)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Overwrite a tile and mark the chunk dirty.
    pub fn set_tile(&mut self, x: usize, y: usize, tile: TileCode) {
        if self.tiles.get(x, y) != tile {
            self.tiles.set(x, y, tile);
            self.dirty.insert(DirtyFlags::TILES);
        }
    }

    /// Install the objects produced by initial placement without dirtying the chunk.
    pub(crate) fn set_generated_objects(&mut self, objects: Vec<StaticObject>) {
        self.objects = objects;
    }

    pub(crate) fn push_object(&mut self, object: StaticObject) {
        self.objects.push(object);
        self.dirty.insert(DirtyFlags::OBJECTS);
    }

    pub(crate) fn remove_object(&mut self, id: ObjectId) -> Option<StaticObject> {
        let index = self.objects.iter().position(|o| o.id == id)?;
        self.dirty.insert(DirtyFlags::OBJECTS);
        Some(self.objects.remove(index))
    }

    /// Give unstamped non-permanent objects their spawn time.
    pub(crate) fn stamp_spawn_times(&mut self, now: f64) {
        for object in &mut self.objects {
            if !object.kind.spec().permanent && object.spawned_at.is_none() {
                object.spawned_at = Some(now);
            }
        }
    }

    pub(crate) fn insert_block(&mut self, block: PlacedBlock) -> Option<PlacedBlock> {
        self.dirty.insert(DirtyFlags::BLOCKS);
        self.blocks.insert(block.position, block)
    }

    pub(crate) fn remove_block(&mut self, local: LocalTile) -> Option<PlacedBlock> {
        let removed = self.blocks.remove(&local);
        if removed.is_some() {
            self.dirty.insert(DirtyFlags::BLOCKS);
        }
        removed
    }

    pub(crate) fn block_mut(&mut self, local: LocalTile) -> Option<&mut PlacedBlock> {
        let block = self.blocks.get_mut(&local)?;
        self.dirty.insert(DirtyFlags::BLOCKS);
        Some(block)
    }

    /// Footprint of a collidable object covering the given local tile, if any.
    pub fn collidable_footprint_at(&self, x: usize, y: usize) -> Option<Footprint> {
        let (ox, oy) = self.coord.origin_tile();
        let (tx, ty) = (ox + x as i32, oy + y as i32);
        self.objects
            .iter()
            .filter(|o| o.kind.spec().collidable)
            .map(StaticObject::footprint)
            .find(|fp| fp.contains(tx, ty))
    }

    /// Tile, object and block passability combined.
    pub fn is_passable_local(&self, x: usize, y: usize) -> bool {
        if !self.tiles.get(x, y).is_passable() {
            return false;
        }
        if let Some(local) = LocalTile::new(x, y) {
            if self.blocks.get(&local).is_some_and(|b| b.kind.is_solid()) {
                return false;
            }
        }
        self.collidable_footprint_at(x, y).is_none()
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn dirty_flags(&self) -> DirtyFlags {
        self.dirty
    }

    pub fn mark_dirty(&mut self, flags: DirtyFlags) {
        self.dirty.insert(flags);
    }

    /// Clear and return the dirty flags.
    pub fn take_dirty_flags(&mut self) -> DirtyFlags {
        let flags = self.dirty;
        self.dirty = DirtyFlags::empty();
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockKind, Orientation};
    use crate::object::ObjectKind;

    fn flat_chunk() -> Chunk {
        Chunk::new(
            ChunkCoord::new(0, 0),
            BiomeId::Plains,
            Grid::filled(TileCode::Grass),
            Grid::filled(0),
        )
    }

    #[test]
    fn coord_order_is_row_major() {
        let mut coords = vec![
            ChunkCoord::new(1, 0),
            ChunkCoord::new(0, 1),
            ChunkCoord::new(-1, 0),
        ];
        coords.sort();
        assert_eq!(
            coords,
            vec![
                ChunkCoord::new(-1, 0),
                ChunkCoord::new(1, 0),
                ChunkCoord::new(0, 1)
            ]
        );
    }

    #[test]
    fn negative_tiles_map_to_negative_chunks() {
        let (coord, local) = tile_to_chunk(-1, -17);
        assert_eq!(coord, ChunkCoord::new(-1, -2));
        assert_eq!((local.x, local.y), (15, 15));

        let pos = WorldPos::new(-0.5, 0.0);
        assert_eq!(pos.tile(), (-1, 0));
        assert_eq!(pos.chunk(), ChunkCoord::new(-1, 0));
    }

    #[test]
    fn new_chunk_is_clean() {
        let mut chunk = flat_chunk();
        assert!(!chunk.is_dirty());
        chunk.set_tile(2, 2, TileCode::Sand);
        assert!(chunk.take_dirty_flags().contains(DirtyFlags::TILES));
        assert!(!chunk.is_dirty());
    }

    #[test]
    fn solid_blocks_and_collidable_objects_block_passage() {
        let mut chunk = flat_chunk();
        assert!(chunk.is_passable_local(4, 4));

        let local = LocalTile::new(4, 4).unwrap();
        chunk.insert_block(PlacedBlock::new(local, BlockKind::Chest, Orientation::North));
        assert!(!chunk.is_passable_local(4, 4));
        assert!(chunk.dirty_flags().contains(DirtyFlags::BLOCKS));

        chunk.push_object(StaticObject::new(ObjectKind::Cactus, 8, 8));
        assert!(!chunk.is_passable_local(8, 8));
        assert!(!chunk.is_passable_local(8, 9));
        assert!(chunk.is_passable_local(8, 10));

        chunk.push_object(StaticObject::new(ObjectKind::TallGrass, 1, 1));
        assert!(chunk.is_passable_local(1, 1));
    }

    #[test]
    fn grid_rejects_wrong_length() {
        assert!(Grid::from_vec(vec![0u8; CHUNK_AREA - 1]).is_none());
        assert!(Grid::from_vec(vec![0u8; CHUNK_AREA]).is_some());
    }

    #[test]
    fn stamp_only_touches_transient_objects() {
        let mut chunk = flat_chunk();
        chunk.set_generated_objects(vec![
            StaticObject::new(ObjectKind::ItemBall, 3, 3),
            StaticObject::new(ObjectKind::Bush, 6, 6),
        ]);
        chunk.stamp_spawn_times(12.5);
        assert_eq!(chunk.objects()[0].spawned_at, Some(12.5));
        assert_eq!(chunk.objects()[1].spawned_at, None);
        assert!(!chunk.is_dirty());
    }
}
