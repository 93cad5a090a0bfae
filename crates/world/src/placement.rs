//! Deterministic static object placement.
//!
//! Trees go first with strict spacing, then ground cover and decor fill the
//! gaps. The same rules back incremental adds through [`validate_addition`].

use std::collections::BTreeMap;

use rand::Rng;
use tileworld_core::{chunk_seed, domain, scoped_rng, SimTick};
use tracing::{debug, instrument};

use crate::biome::{Biome, BiomeId, ObjectWeight};
use crate::chunk::{Chunk, CHUNK_AREA, CHUNK_SIZE};
use crate::config::PlacementConfig;
use crate::error::PlacementRejection;
use crate::object::{Footprint, ObjectClass, ObjectKind, StaticObject};
use crate::tile::TileCode;

/// Extra cells kept around the chunk in the occupancy grid.
const GRID_MARGIN: i32 = 3;

/// Trees and decor stay off open water and loose beach sand.
fn is_shoreline(tile: TileCode) -> bool {
    tile.is_water() || tile == TileCode::BeachSand
}

/// Per-chunk limit for a tree species.
pub fn tree_cap(kind: ObjectKind, biome: BiomeId) -> usize {
    match (kind, biome) {
        (ObjectKind::ApricornTree, _) => 2,
        (_, BiomeId::Forest | BiomeId::RainForest) => 10,
        _ => 4,
    }
}

/// Per-chunk limit for ground cover.
pub fn foliage_cap(biome: BiomeId) -> usize {
    match biome {
        BiomeId::Plains => 45,
        BiomeId::Forest | BiomeId::RainForest => 35,
        BiomeId::Desert => 15,
        BiomeId::Snow => 20,
        _ => 30,
    }
}

/// Local cells covered by a footprint; `None` when any leaves the chunk.
fn local_cells(chunk: &Chunk, footprint: &Footprint) -> Option<Vec<(usize, usize)>> {
    let (ox, oy) = chunk.coord().origin_tile();
    let size = CHUNK_SIZE as i32;
    footprint
        .tiles()
        .map(|(x, y)| {
            let (lx, ly) = (x - ox, y - oy);
            ((0..size).contains(&lx) && (0..size).contains(&ly))
                .then_some((lx as usize, ly as usize))
        })
        .collect()
}

/// Terrain rules shared by generation and incremental adds.
pub fn check_terrain(
    chunk: &Chunk,
    biome: &Biome,
    kind: ObjectKind,
    anchor_x: i32,
    anchor_y: i32,
) -> Result<(), PlacementRejection> {
    let footprint = kind.footprint_at(anchor_x, anchor_y);
    let cells = local_cells(chunk, &footprint).ok_or(PlacementRejection::OutOfChunk)?;
    let (ox, oy) = chunk.coord().origin_tile();
    let class = kind.spec().class;

    for (x, y) in cells {
        let tile = chunk.tile(x, y);
        let (wx, wy) = (ox + x as i32, oy + y as i32);
        let wet = match class {
            ObjectClass::Foliage => tile.is_water(),
            _ => is_shoreline(tile),
        };
        if wet {
            return Err(PlacementRejection::Water { x: wx, y: wy });
        }
        if !tile.is_passable() {
            return Err(PlacementRejection::Impassable { x: wx, y: wy });
        }
        if !biome.allows(tile) {
            return Err(PlacementRejection::TerrainNotAllowed { x: wx, y: wy });
        }
    }

    if class == ObjectClass::Tree {
        for (x, y) in footprint.expanded(1).tiles() {
            let Some(tile) = chunk.tiles().get_signed(x - ox, y - oy) else {
                continue;
            };
            if is_shoreline(tile) {
                return Err(PlacementRejection::Water { x, y });
            }
            if !tile.is_passable() {
                return Err(PlacementRejection::Impassable { x, y });
            }
        }
    }
    Ok(())
}

/// Full validation for an object added after generation.
pub fn validate_addition(
    chunk: &Chunk,
    biome: &Biome,
    kind: ObjectKind,
    anchor_x: i32,
    anchor_y: i32,
) -> Result<(), PlacementRejection> {
    check_terrain(chunk, biome, kind, anchor_x, anchor_y)?;

    let footprint = kind.footprint_at(anchor_x, anchor_y);
    let (ox, oy) = chunk.coord().origin_tile();
    if kind.spec().collidable {
        if let Some(block) = chunk.blocks().find(|b| {
            b.kind.is_solid()
                && footprint.contains(ox + b.position.x as i32, oy + b.position.y as i32)
        }) {
            return Err(PlacementRejection::Occupied {
                x: ox + block.position.x as i32,
                y: oy + block.position.y as i32,
            });
        }
    }

    let spec = kind.spec();
    for other in chunk.objects() {
        let theirs = other.footprint();
        let clash = if spec.class == ObjectClass::Tree && other.kind.is_tree() {
            footprint.expanded(spec.buffer as i32).intersects(&theirs)
                || theirs
                    .expanded(other.kind.spec().buffer as i32)
                    .intersects(&footprint)
        } else {
            footprint.intersects(&theirs)
        };
        if clash {
            return Err(PlacementRejection::Overlap(other.id));
        }
    }
    Ok(())
}

/// Tree occupancy around one chunk for constant-time overlap checks.
struct Occupancy {
    origin: (i32, i32),
    stride: i32,
    /// Bare tree footprints.
    trunks: Vec<bool>,
    /// Footprints grown by their buffer.
    shade: Vec<bool>,
}

impl Occupancy {
    fn new(origin: (i32, i32)) -> Self {
        let stride = CHUNK_SIZE as i32 + 2 * GRID_MARGIN;
        let cells = (stride * stride) as usize;
        Self {
            origin,
            stride,
            trunks: vec![false; cells],
            shade: vec![false; cells],
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let gx = x - self.origin.0 + GRID_MARGIN;
        let gy = y - self.origin.1 + GRID_MARGIN;
        ((0..self.stride).contains(&gx) && (0..self.stride).contains(&gy))
            .then_some((gy * self.stride + gx) as usize)
    }

    fn any(&self, layer: &[bool], footprint: &Footprint) -> bool {
        footprint
            .tiles()
            .filter_map(|(x, y)| self.index(x, y))
            .any(|i| layer[i])
    }

    fn admits(&self, footprint: &Footprint, buffer: u8) -> bool {
        !self.any(&self.trunks, &footprint.expanded(buffer as i32))
            && !self.any(&self.shade, footprint)
    }

    fn mark(&mut self, footprint: &Footprint, buffer: u8) {
        for (x, y) in footprint.tiles() {
            if let Some(i) = self.index(x, y) {
                self.trunks[i] = true;
            }
        }
        for (x, y) in footprint.expanded(buffer as i32).tiles() {
            if let Some(i) = self.index(x, y) {
                self.shade[i] = true;
            }
        }
    }
}

fn pick_weighted<R: Rng>(entries: &[&ObjectWeight], total: f32, rng: &mut R) -> ObjectKind {
    let roll = rng.gen::<f32>() * total;
    let mut cumulative = 0.0;
    for entry in entries {
        cumulative += entry.chance;
        if roll < cumulative {
            return entry.kind;
        }
    }
    entries[entries.len() - 1].kind
}

/// Places trees, decor, ground cover and collectibles for generated chunks.
#[derive(Debug, Clone)]
pub struct ObjectPlacer {
    world_seed: u64,
    config: PlacementConfig,
}

impl ObjectPlacer {
    pub fn new(world_seed: u64, config: PlacementConfig) -> Self {
        Self { world_seed, config }
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    /// Produce the initial object set for a freshly generated chunk.
    #[instrument(skip(self, chunk, biome), fields(chunk_pos = %chunk.coord(), biome = ?biome.id, world_seed = self.world_seed))]
    pub fn place(&self, chunk: &Chunk, biome: &Biome) -> Vec<StaticObject> {
        let coord = chunk.coord();
        let mut rng = scoped_rng(
            self.world_seed,
            chunk_seed(self.world_seed, coord.x, coord.y) ^ domain::PLACEMENT,
            SimTick::ZERO,
        );
        let mut placed = Vec::new();
        let trees = self.place_trees(chunk, biome, &mut rng, &mut placed);
        let others = self.place_ground(chunk, biome, &mut rng, &mut placed);
        debug!(trees, others, "Object placement complete");
        placed
    }

    fn place_trees<R: Rng>(
        &self,
        chunk: &Chunk,
        biome: &Biome,
        rng: &mut R,
        placed: &mut Vec<StaticObject>,
    ) -> usize {
        let species: Vec<&ObjectWeight> =
            biome.objects.iter().filter(|o| o.kind.is_tree()).collect();
        let total: f32 = species.iter().map(|o| o.chance).sum();
        if species.is_empty() || total <= 0.0 {
            return 0;
        }

        let attempts = (CHUNK_AREA as f32 * total * self.config.tree_density).round() as usize;
        let edge = self.config.edge_buffer.min(CHUNK_SIZE / 2 - 1);
        let (ox, oy) = chunk.coord().origin_tile();
        let mut grid = Occupancy::new((ox, oy));
        let mut counts: BTreeMap<ObjectKind, usize> = BTreeMap::new();
        let mut planted = 0;

        for _ in 0..attempts {
            let kind = pick_weighted(&species, total, rng);
            let count = counts.entry(kind).or_default();
            if *count >= tree_cap(kind, biome.id) {
                continue;
            }
            let spec = kind.spec();

            for _ in 0..self.config.tree_candidate_tries {
                let ax = ox + rng.gen_range(edge..CHUNK_SIZE - edge) as i32;
                let ay = oy + rng.gen_range(edge..CHUNK_SIZE - edge) as i32;
                let footprint = kind.footprint_at(ax, ay);

                if !grid.admits(&footprint, spec.buffer)
                    || check_terrain(chunk, biome, kind, ax, ay).is_err()
                    || !self.spaced(placed, kind, &footprint)
                {
                    continue;
                }
                grid.mark(&footprint, spec.buffer);
                placed.push(StaticObject::new(kind, ax, ay));
                *count += 1;
                planted += 1;
                break;
            }
        }
        planted
    }

    /// Centre spacing against every tree already planted.
    fn spaced(&self, placed: &[StaticObject], kind: ObjectKind, footprint: &Footprint) -> bool {
        let (cx, cy) = footprint.center();
        let half = kind.spec().width as f32 / 2.0;
        placed.iter().filter(|o| o.kind.is_tree()).all(|tree| {
            let (tx, ty) = tree.footprint().center();
            let min = self.config.tree_base_spacing
                + (half + tree.kind.spec().width as f32 / 2.0) / 2.0;
            (cx - tx).powi(2) + (cy - ty).powi(2) >= min * min
        })
    }

    fn place_ground<R: Rng>(
        &self,
        chunk: &Chunk,
        biome: &Biome,
        rng: &mut R,
        placed: &mut Vec<StaticObject>,
    ) -> usize {
        let (ox, oy) = chunk.coord().origin_tile();
        let cap = foliage_cap(biome.id);
        let mut foliage = 0;
        let mut added = 0;

        for entry in biome.objects.iter().filter(|o| !o.kind.is_tree()) {
            let is_foliage = entry.kind.spec().class == ObjectClass::Foliage;
            if is_foliage && foliage >= cap {
                continue;
            }
            let density = if is_foliage {
                self.config.foliage_density
            } else {
                self.config.decor_density
            };
            let attempts = (CHUNK_AREA as f32 * entry.chance * density).round() as usize;

            for _ in 0..attempts {
                let ax = ox + rng.gen_range(0..CHUNK_SIZE) as i32;
                let ay = oy + rng.gen_range(0..CHUNK_SIZE) as i32;
                let footprint = entry.kind.footprint_at(ax, ay);

                if check_terrain(chunk, biome, entry.kind, ax, ay).is_err()
                    || placed.iter().any(|o| o.footprint().intersects(&footprint))
                {
                    continue;
                }
                if is_foliage {
                    let near_tree = placed
                        .iter()
                        .filter(|o| o.kind.is_tree())
                        .any(|t| t.footprint().expanded(1).intersects(&footprint));
                    if near_tree || rng.gen::<f32>() >= self.config.foliage_acceptance {
                        continue;
                    }
                } else if placed
                    .iter()
                    .filter(|o| !o.kind.is_tree())
                    .any(|o| o.footprint().expanded(1).intersects(&footprint))
                {
                    continue;
                }

                placed.push(StaticObject::new(entry.kind, ax, ay));
                added += 1;
                if is_foliage {
                    foliage += 1;
                    if foliage >= cap {
                        break;
                    }
                }
            }
        }
        added
    }
}
