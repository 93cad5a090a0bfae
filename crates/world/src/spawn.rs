//! Runtime creature spawning around the player.
//!
//! The manager owns every live creature, indexed by id and by chunk. Terrain
//! queries go through [`SpawnTerrain`] so the manager never reaches into the
//! chunk store directly.

use std::collections::{BTreeMap, BTreeSet};
use std::f32::consts::TAU;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tileworld_core::{domain, scoped_rng, SimTick};
use tracing::{debug, info};

use crate::biome::{BiomeId, BiomeTable};
use crate::chunk::{ChunkCoord, WorldPos, TILE_SIZE};
use crate::config::{NetworkRole, SpawnConfig};
use crate::events::WorldEvent;
use crate::time::{TimeOfDay, WorldClock};

const DEFAULT_DAY_SPECIES: &str = "rattata";
const DEFAULT_NIGHT_SPECIES: &str = "hoothoot";
/// Placement retries for each extra pack member.
const PACK_MEMBER_TRIES: usize = 8;
const MIN_LEVEL: i32 = 1;
const MAX_LEVEL: i32 = 100;

/// Read-only terrain view the spawn manager needs.
pub trait SpawnTerrain {
    fn is_chunk_loaded(&self, coord: ChunkCoord) -> bool;
    fn is_passable(&self, tile_x: i32, tile_y: i32) -> bool;
    fn biome_at(&self, tile_x: i32, tile_y: i32) -> Option<BiomeId>;
}

/// Unique creature id, issued in increasing order by the spawn manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CreatureId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnedCreature {
    pub id: CreatureId,
    pub species: String,
    pub level: u32,
    /// Pixel position.
    pub position: WorldPos,
    /// World clock seconds at spawn.
    pub spawned_at: f64,
    /// Seconds alive.
    pub age: f32,
    /// Leader of the pack this creature spawned with.
    pub pack: Option<CreatureId>,
}

impl SpawnedCreature {
    pub fn chunk(&self) -> ChunkCoord {
        self.position.chunk()
    }
}

/// Why a candidate position was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnRejection {
    Unloaded,
    Impassable,
    ChunkFull,
    TooClose,
}

/// Counters for one spawn manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpawnMetrics {
    pub checks: u64,
    pub rolls_passed: u64,
    pub candidates: u64,
    pub rejected_unloaded: u64,
    pub rejected_impassable: u64,
    pub rejected_chunk_full: u64,
    pub rejected_too_close: u64,
    pub singles: u64,
    pub packs: u64,
    pub pack_members: u64,
    pub despawned: u64,
}

impl SpawnMetrics {
    fn reject(&mut self, reason: SpawnRejection) {
        match reason {
            SpawnRejection::Unloaded => self.rejected_unloaded += 1,
            SpawnRejection::Impassable => self.rejected_impassable += 1,
            SpawnRejection::ChunkFull => self.rejected_chunk_full += 1,
            SpawnRejection::TooClose => self.rejected_too_close += 1,
        }
    }
}

/// Species for a biome and time of day, or the global default when the
/// biome lists none.
fn pick_species<R: Rng>(
    table: &BiomeTable,
    biome: BiomeId,
    time: TimeOfDay,
    rng: &mut R,
) -> String {
    let choices = table.get(biome).creatures.for_time(time);
    match choices.choose(rng) {
        Some(species) => species.clone(),
        None => match time {
            TimeOfDay::Day => DEFAULT_DAY_SPECIES.to_string(),
            TimeOfDay::Night => DEFAULT_NIGHT_SPECIES.to_string(),
        },
    }
}

/// Owns live creatures and runs the periodic spawn check.
pub struct SpawnManager {
    config: SpawnConfig,
    table: Arc<BiomeTable>,
    role: NetworkRole,
    rng: StdRng,
    timer: f32,
    next_id: u64,
    by_id: BTreeMap<CreatureId, SpawnedCreature>,
    by_chunk: BTreeMap<ChunkCoord, BTreeSet<CreatureId>>,
    outbox: Vec<WorldEvent>,
    metrics: SpawnMetrics,
}

impl SpawnManager {
    pub fn new(
        world_seed: u64,
        config: SpawnConfig,
        table: Arc<BiomeTable>,
        role: NetworkRole,
    ) -> Self {
        Self {
            config,
            table,
            role,
            rng: scoped_rng(world_seed, domain::SPAWN, SimTick::ZERO),
            timer: 0.0,
            next_id: 1,
            by_id: BTreeMap::new(),
            by_chunk: BTreeMap::new(),
            outbox: Vec::new(),
            metrics: SpawnMetrics::default(),
        }
    }

    pub fn config(&self) -> &SpawnConfig {
        &self.config
    }

    pub fn metrics(&self) -> &SpawnMetrics {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: CreatureId) -> Option<&SpawnedCreature> {
        self.by_id.get(&id)
    }

    /// Every live creature in id order.
    pub fn all(&self) -> impl Iterator<Item = &SpawnedCreature> {
        self.by_id.values()
    }

    /// Number of creatures indexed under `coord`.
    pub fn chunk_population(&self, coord: ChunkCoord) -> usize {
        self.by_chunk.get(&coord).map_or(0, BTreeSet::len)
    }

    /// Ids indexed under `coord`.
    pub fn creature_ids_in(&self, coord: ChunkCoord) -> Vec<CreatureId> {
        self.by_chunk
            .get(&coord)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Chunks with at least one creature.
    pub fn occupied_chunks(&self) -> Vec<ChunkCoord> {
        self.by_chunk.keys().copied().collect()
    }

    /// Creatures within `radius` pixels of `center`.
    pub fn creatures_near(&self, center: WorldPos, radius: f32) -> Vec<&SpawnedCreature> {
        let radius_sq = radius * radius;
        let low = WorldPos::new(center.x - radius, center.y - radius).chunk();
        let high = WorldPos::new(center.x + radius, center.y + radius).chunk();
        let mut found = Vec::new();
        for cy in low.y..=high.y {
            for cx in low.x..=high.x {
                let Some(ids) = self.by_chunk.get(&ChunkCoord::new(cx, cy)) else {
                    continue;
                };
                found.extend(
                    ids.iter()
                        .filter_map(|id| self.by_id.get(id))
                        .filter(|c| c.position.distance_sq(center) <= radius_sq),
                );
            }
        }
        found.sort_by_key(|c| c.id);
        found
    }

    /// Drain pending network events.
    pub fn take_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Advance ages, expire old creatures and run the spawn check when due.
    /// Returns how many creatures were spawned this tick.
    pub fn tick<T: SpawnTerrain>(
        &mut self,
        delta: f32,
        player: WorldPos,
        clock: &WorldClock,
        terrain: &T,
    ) -> usize {
        if self.role.is_client() {
            for creature in self.by_id.values_mut() {
                creature.age += delta;
            }
            return 0;
        }

        let lifetime = self.config.lifetime_secs;
        let mut expired = Vec::new();
        for creature in self.by_id.values_mut() {
            creature.age += delta;
            if creature.age >= lifetime {
                expired.push(creature.id);
            }
        }
        for id in expired {
            self.despawn(id);
        }

        self.timer += delta;
        if self.timer < self.config.check_interval_secs {
            return 0;
        }
        self.timer = 0.0;
        self.check_spawns(player, clock, terrain)
    }

    /// One spawn check: roll, search the annulus, spawn a single or a pack.
    pub fn check_spawns<T: SpawnTerrain>(
        &mut self,
        player: WorldPos,
        clock: &WorldClock,
        terrain: &T,
    ) -> usize {
        self.metrics.checks += 1;
        if self.rng.gen::<f32>() >= self.config.base_chance {
            return 0;
        }
        self.metrics.rolls_passed += 1;

        let center = player.chunk();
        let radius = self.config.loaded_radius_chunks;
        let loaded: BTreeSet<ChunkCoord> = (-radius..=radius)
            .flat_map(|dy| (-radius..=radius).map(move |dx| center.offset(dx, dy)))
            .filter(|coord| terrain.is_chunk_loaded(*coord))
            .collect();
        if loaded.is_empty() {
            debug!(chunk = %center, "No loaded chunks near player, skipping spawn");
            return 0;
        }

        let (min, max) = (
            self.config.min_distance_tiles.min(self.config.max_distance_tiles),
            self.config.max_distance_tiles.max(self.config.min_distance_tiles),
        );
        for _ in 0..self.config.attempts {
            self.metrics.candidates += 1;
            let angle = self.rng.gen_range(0.0..TAU);
            let tiles = if max > min {
                self.rng.gen_range(min..max)
            } else {
                min
            };
            let distance = tiles * TILE_SIZE;
            let raw = WorldPos::new(
                player.x + angle.cos() * distance,
                player.y + angle.sin() * distance,
            );
            let (tx, ty) = raw.tile();
            let position = WorldPos::tile_center(tx, ty);

            if !loaded.contains(&position.chunk()) {
                self.metrics.reject(SpawnRejection::Unloaded);
                continue;
            }
            if let Err(reason) = self.validate(position, terrain, &[]) {
                self.metrics.reject(reason);
                continue;
            }

            let biome = terrain
                .biome_at(tx, ty)
                .unwrap_or(BiomeTable::FALLBACK);
            let time = clock.time_of_day();
            let species = pick_species(&self.table, biome, time, &mut self.rng);
            let now = clock.seconds();

            if self.rng.gen::<f32>() < self.config.pack_chance {
                return self.spawn_pack(position, species, now, terrain);
            }
            let id = self.insert_new(species, position, now, None);
            self.announce(id);
            self.metrics.singles += 1;
            return 1;
        }
        0
    }

    /// Check a position against terrain, chunk caps and spacing.
    /// Creatures in `pack` are ignored for spacing.
    pub fn validate<T: SpawnTerrain>(
        &self,
        position: WorldPos,
        terrain: &T,
        pack: &[CreatureId],
    ) -> Result<(), SpawnRejection> {
        let coord = position.chunk();
        if !terrain.is_chunk_loaded(coord) {
            return Err(SpawnRejection::Unloaded);
        }
        let (tx, ty) = position.tile();
        if !terrain.is_passable(tx, ty) {
            return Err(SpawnRejection::Impassable);
        }
        if self.chunk_population(coord) >= self.config.max_per_chunk {
            return Err(SpawnRejection::ChunkFull);
        }
        let spacing = self.config.min_spacing_tiles * TILE_SIZE;
        let crowded = self
            .creatures_near(position, spacing)
            .iter()
            .any(|c| !pack.contains(&c.id) && c.position.distance_sq(position) < spacing * spacing);
        if crowded {
            return Err(SpawnRejection::TooClose);
        }
        Ok(())
    }

    fn spawn_pack<T: SpawnTerrain>(
        &mut self,
        anchor: WorldPos,
        species: String,
        now: f64,
        terrain: &T,
    ) -> usize {
        let (low, high) = (
            self.config.pack_min.min(self.config.pack_max),
            self.config.pack_max.max(self.config.pack_min),
        );
        let size = self.rng.gen_range(low..=high).max(1);
        let leader = self.insert_new(species.clone(), anchor, now, None);
        let mut members = vec![leader];
        let mut tiles = BTreeSet::from([anchor.tile()]);
        let reach = self.config.pack_radius_tiles * TILE_SIZE / 2.0;

        for _ in 1..size {
            let mut placed = false;
            for _ in 0..PACK_MEMBER_TRIES {
                let angle = self.rng.gen_range(0.0..TAU);
                let distance = self.rng.gen_range(0.0..=reach);
                let position = WorldPos::new(
                    anchor.x + angle.cos() * distance,
                    anchor.y + angle.sin() * distance,
                );
                if tiles.contains(&position.tile()) {
                    continue;
                }
                match self.validate(position, terrain, &members) {
                    Ok(()) => {
                        tiles.insert(position.tile());
                        let id = self.insert_new(species.clone(), position, now, Some(leader));
                        members.push(id);
                        placed = true;
                        break;
                    }
                    Err(reason) => self.metrics.reject(reason),
                }
            }
            if !placed {
                debug!(leader = leader.0, "Skipped pack member without a valid position");
            }
        }

        if members.len() > 1 {
            if let Some(creature) = self.by_id.get_mut(&leader) {
                creature.pack = Some(leader);
            }
            self.metrics.packs += 1;
            self.metrics.pack_members += members.len() as u64;
            info!(
                leader = leader.0,
                species = %species,
                members = members.len(),
                "Spawned creature pack"
            );
        } else {
            self.metrics.singles += 1;
        }
        for &id in &members {
            self.announce(id);
        }
        members.len()
    }

    fn level_at(&mut self, position: WorldPos) -> u32 {
        let tiles_from_origin = (position.x.powi(2) + position.y.powi(2)).sqrt() / TILE_SIZE;
        let base = 2 + (tiles_from_origin / self.config.level_distance_tiles.max(1.0)) as i32;
        let spread = self.config.level_variance.max(0);
        let variance = self.rng.gen_range(-spread..=spread);
        (base + variance).clamp(MIN_LEVEL, MAX_LEVEL) as u32
    }

    fn insert_new(
        &mut self,
        species: String,
        position: WorldPos,
        now: f64,
        pack: Option<CreatureId>,
    ) -> CreatureId {
        let id = CreatureId(self.next_id);
        self.next_id += 1;
        let creature = SpawnedCreature {
            id,
            species,
            level: self.level_at(position),
            position,
            spawned_at: now,
            age: 0.0,
            pack,
        };
        debug!(
            id = id.0,
            species = %creature.species,
            level = creature.level,
            chunk = %creature.chunk(),
            "Spawned creature"
        );
        self.index(creature);
        id
    }

    fn announce(&mut self, id: CreatureId) {
        if let Some(creature) = self.by_id.get(&id) {
            self.outbox.push(WorldEvent::CreatureSpawned(creature.clone()));
        }
    }

    fn index(&mut self, creature: SpawnedCreature) {
        self.by_chunk
            .entry(creature.chunk())
            .or_default()
            .insert(creature.id);
        self.by_id.insert(creature.id, creature);
    }

    fn unindex(&mut self, id: CreatureId) -> Option<SpawnedCreature> {
        let creature = self.by_id.remove(&id)?;
        let coord = creature.chunk();
        if let Some(ids) = self.by_chunk.get_mut(&coord) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_chunk.remove(&coord);
            }
        }
        Some(creature)
    }

    fn despawn(&mut self, id: CreatureId) -> Option<SpawnedCreature> {
        let creature = self.unindex(id)?;
        self.metrics.despawned += 1;
        debug!(id = id.0, age = creature.age, "Despawned creature");
        if !self.role.is_client() {
            self.outbox.push(WorldEvent::CreatureDespawned(id));
        }
        Some(creature)
    }

    /// Explicit removal, e.g. on capture.
    pub fn remove(&mut self, id: CreatureId) -> Option<SpawnedCreature> {
        self.despawn(id)
    }

    /// Move a creature, re-bucketing it when it crosses a chunk border.
    pub fn relocate(&mut self, id: CreatureId, position: WorldPos) -> bool {
        let Some(creature) = self.by_id.get_mut(&id) else {
            return false;
        };
        let old = creature.chunk();
        creature.position = position;
        let new = position.chunk();
        if old != new {
            if let Some(ids) = self.by_chunk.get_mut(&old) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.by_chunk.remove(&old);
                }
            }
            self.by_chunk.entry(new).or_default().insert(id);
        }
        true
    }

    /// Insert a creature announced by the server.
    pub fn apply_remote_spawn(&mut self, creature: SpawnedCreature) {
        self.next_id = self.next_id.max(creature.id.0 + 1);
        self.unindex(creature.id);
        self.index(creature);
    }

    /// Remove a creature the server despawned.
    pub fn apply_remote_despawn(&mut self, id: CreatureId) -> bool {
        self.unindex(id).is_some()
    }
}
