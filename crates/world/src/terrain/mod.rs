//! Terrain generation: biome tiles, ecosystem rules, mountains and water.
//!
//! [`TerrainGenerator::generate_chunk`] is a pure function of the world seed
//! and the chunk coordinate, so it can run on any worker thread.

pub mod ecosystem;
pub mod mountain;
pub mod water;

use std::collections::BTreeMap;
use std::sync::Arc;

use tileworld_core::{chunk_seed, domain, scoped_rng, SimTick};
use tracing::{debug, instrument};

use crate::biome::{BiomeId, BiomeSource, BiomeTable};
use crate::chunk::{Chunk, ChunkCoord, Grid, CHUNK_SIZE};
use crate::config::TerrainOptions;
use crate::noise::{fold_seed, ElevationNoise, NoiseConfig, NoiseGenerator};
use crate::tile::TileCode;

/// Deterministic chunk terrain generator.
pub struct TerrainGenerator {
    world_seed: u64,
    table: Arc<BiomeTable>,
    source: BiomeSource,
    options: TerrainOptions,
    tile_noise: NoiseGenerator,
    blend_noise: NoiseGenerator,
    pond_noise: NoiseGenerator,
    elevation: ElevationNoise,
}

impl TerrainGenerator {
    /// Create a new terrain generator from world seed.
    pub fn new(
        world_seed: u64,
        table: Arc<BiomeTable>,
        source: BiomeSource,
        options: TerrainOptions,
    ) -> Self {
        let seed = fold_seed(world_seed);
        Self {
            world_seed,
            table,
            source,
            options,
            tile_noise: NoiseGenerator::new(NoiseConfig::tile_select(seed)),
            blend_noise: NoiseGenerator::new(NoiseConfig::tile_blend(seed)),
            pond_noise: NoiseGenerator::new(NoiseConfig::pond(seed)),
            elevation: ElevationNoise::new(world_seed),
        }
    }

    /// Generator whose biome source follows the options.
    pub fn from_options(world_seed: u64, table: Arc<BiomeTable>, options: TerrainOptions) -> Self {
        let source = match options.fixed_biome {
            Some(id) => BiomeSource::Fixed(id),
            None => BiomeSource::climate(world_seed),
        };
        Self::new(world_seed, table, source, options)
    }

    pub fn world_seed(&self) -> u64 {
        self.world_seed
    }

    pub fn table(&self) -> &Arc<BiomeTable> {
        &self.table
    }

    pub fn biome_source(&self) -> &BiomeSource {
        &self.source
    }

    /// Generate terrain for a chunk at the given position.
    #[instrument(skip(self), fields(chunk_pos = %coord, world_seed = self.world_seed))]
    pub fn generate_chunk(&self, coord: ChunkCoord) -> Chunk {
        let origin = coord.origin_tile();
        let mut rng = scoped_rng(
            self.world_seed,
            chunk_seed(self.world_seed, coord.x, coord.y) ^ domain::TERRAIN,
            SimTick::ZERO,
        );

        let (mut tiles, biomes) = self.base_tiles(origin);
        let dominant = dominant_biome(&biomes);
        let rewrites = ecosystem::smooth(&mut tiles, &biomes, &self.table, self.world_seed, origin);

        let layers = match self.options.forced_mountain_layers {
            Some(layers) => layers,
            None => mountain::roll_layers(self.table.get(dominant).mountain_chance, &mut rng),
        };
        let bands = mountain::build_bands(layers, origin, &self.elevation, &mut rng);

        let ponds_allowed = biomes.map(|id| self.table.get(id).water_features);
        let mask = water::pond_mask(
            origin,
            &self.pond_noise,
            self.options.pond_threshold,
            &bands,
            &ponds_allowed,
            &tiles,
        );
        water::autotile_ponds(&mut tiles, &mask);
        let beaches = biomes.map(|id| id == BiomeId::Beach);
        water::autotile_shores(&mut tiles, &beaches, TileCode::BeachSand);

        let mut stairs = 0;
        let mut cave = None;
        if layers > 0 {
            mountain::assign_tiles(&mut tiles, &bands);
            stairs = mountain::place_stairs(&mut tiles, &bands, &mut rng);
            cave = mountain::place_cave(&mut tiles, &bands, self.options.cave_chance, &mut rng);
        }

        debug!(
            chunk_x = coord.x,
            chunk_y = coord.y,
            biome = ?dominant,
            layers,
            rewrites,
            stairs,
            cave = cave.is_some(),
            "Terrain generation complete"
        );
        Chunk::new(coord, dominant, tiles, bands)
    }

    /// Weighted per-tile selection with border blending.
    fn base_tiles(&self, origin: (i32, i32)) -> (Grid<TileCode>, Grid<BiomeId>) {
        let mut tiles = Grid::filled(TileCode::Grass);
        let mut biomes = Grid::filled(BiomeTable::FALLBACK);

        for y in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let (wx, wy) = (origin.0 + x as i32, origin.1 + y as i32);
                let transition = self.source.sample(wx, wy);
                let (fx, fy) = (wx as f64, wy as f64);

                let chosen = match transition.secondary {
                    Some(secondary)
                        if self.blend_noise.sample_unit(fx, fy)
                            < transition.secondary_probability() =>
                    {
                        secondary
                    }
                    _ => transition.primary,
                };
                let biome = self.table.get(chosen);
                tiles.set(x, y, biome.pick_tile(self.tile_noise.sample_unit(fx, fy)));
                biomes.set(x, y, transition.primary);
            }
        }
        (tiles, biomes)
    }
}

/// Most frequent biome; ties go to the earlier variant.
fn dominant_biome(biomes: &Grid<BiomeId>) -> BiomeId {
    let mut counts: BTreeMap<BiomeId, usize> = BTreeMap::new();
    for &id in biomes.cells() {
        *counts.entry(id).or_default() += 1;
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(BiomeId, usize)>, (id, n)| match best {
            Some((_, top)) if top >= n => best,
            _ => Some((id, n)),
        })
        .map(|(id, _)| id)
        .unwrap_or(BiomeTable::FALLBACK)
}
