//! The world facade: the one object the rest of the game talks to.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::biome::{BiomeId, BiomeTable};
use crate::block::{BlockKind, Orientation, PlacedBlock};
use crate::chunk::{tile_to_chunk, Chunk, ChunkCoord, WorldPos};
use crate::config::WorldConfig;
use crate::error::{PlacementRejection, WorldError};
use crate::events::WorldEvent;
use crate::object::{ObjectId, ObjectKind, StaticObject};
use crate::persist::{ChunkPersistence, ChunkRecord, RegionStore};
use crate::placement::validate_addition;
use crate::spawn::{SpawnManager, SpawnMetrics, SpawnTerrain, SpawnedCreature};
use crate::store::ChunkStore;
use crate::streaming::StreamingMetrics;
use crate::time::WorldClock;

/// What one call to [`World::tick`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub chunks_inserted: usize,
    pub requests: usize,
    pub evicted: usize,
    pub objects_expired: usize,
    pub creatures_spawned: usize,
}

fn passable_in(store: &ChunkStore, tile_x: i32, tile_y: i32) -> bool {
    let (coord, local) = tile_to_chunk(tile_x, tile_y);
    store
        .get(coord)
        .is_some_and(|chunk| chunk.is_passable_local(local.x as usize, local.y as usize))
}

/// Spawn manager's view of the resident chunks.
struct StoreTerrain<'a> {
    store: &'a ChunkStore,
}

impl SpawnTerrain for StoreTerrain<'_> {
    fn is_chunk_loaded(&self, coord: ChunkCoord) -> bool {
        self.store.contains(coord)
    }

    fn is_passable(&self, tile_x: i32, tile_y: i32) -> bool {
        passable_in(self.store, tile_x, tile_y)
    }

    fn biome_at(&self, tile_x: i32, tile_y: i32) -> Option<BiomeId> {
        let (coord, _) = tile_to_chunk(tile_x, tile_y);
        self.store.get(coord).map(Chunk::biome)
    }
}

pub struct World {
    config: WorldConfig,
    table: Arc<BiomeTable>,
    clock: WorldClock,
    store: ChunkStore,
    spawns: SpawnManager,
    events: Vec<WorldEvent>,
}

impl World {
    pub fn new(
        config: WorldConfig,
        table: Arc<BiomeTable>,
        persistence: Arc<dyn ChunkPersistence>,
    ) -> Result<Self> {
        let store = ChunkStore::new(&config, Arc::clone(&table), persistence)?;
        let spawns = SpawnManager::new(
            config.seed,
            config.spawn.clone(),
            Arc::clone(&table),
            config.role,
        );
        info!(seed = config.seed, role = ?config.role, "World created");
        Ok(Self {
            clock: WorldClock::new(config.clock.clone()),
            config,
            table,
            store,
            spawns,
            events: Vec::new(),
        })
    }

    /// Open a world persisted as region files under `world_dir`.
    pub fn open<P: AsRef<Path>>(
        config: WorldConfig,
        table: Arc<BiomeTable>,
        world_dir: P,
    ) -> Result<Self> {
        let regions = RegionStore::new(world_dir)?;
        Self::new(config, table, Arc::new(regions))
    }

    fn ensure_live(&self) -> Result<(), WorldError> {
        if self.store.is_disposed() {
            Err(WorldError::Disposed)
        } else {
            Ok(())
        }
    }

    fn emit(&mut self, event: WorldEvent) {
        if !self.config.role.is_client() {
            self.events.push(event);
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn table(&self) -> &Arc<BiomeTable> {
        &self.table
    }

    pub fn clock(&self) -> &WorldClock {
        &self.clock
    }

    /// World clock seconds.
    pub fn now(&self) -> f64 {
        self.clock.seconds()
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn spawns(&self) -> &SpawnManager {
        &self.spawns
    }

    pub fn streaming_metrics(&self) -> &StreamingMetrics {
        self.store.metrics()
    }

    pub fn spawn_metrics(&self) -> &SpawnMetrics {
        self.spawns.metrics()
    }

    pub fn chunk_at(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.store.get(coord)
    }

    /// False for tiles in chunks that are not loaded.
    pub fn is_passable(&self, tile_x: i32, tile_y: i32) -> bool {
        passable_in(&self.store, tile_x, tile_y)
    }

    pub fn biome_at(&self, tile_x: i32, tile_y: i32) -> Option<BiomeId> {
        let (coord, _) = tile_to_chunk(tile_x, tile_y);
        self.store.get(coord).map(Chunk::biome)
    }

    /// Objects whose footprint centre lies within `radius` pixels of `(x, y)`.
    pub fn objects_near(&self, x: f32, y: f32, radius: f32) -> Vec<StaticObject> {
        let center = WorldPos::new(x, y);
        let radius = radius.max(0.0);
        let min = WorldPos::new(x - radius, y - radius).tile();
        let max = WorldPos::new(x + radius, y + radius).tile();
        let low = ChunkCoord::from_tile(min.0, min.1);
        let high = ChunkCoord::from_tile(max.0, max.1);

        let mut found = Vec::new();
        for cy in low.y..=high.y {
            for cx in low.x..=high.x {
                let Some(chunk) = self.store.get(ChunkCoord::new(cx, cy)) else {
                    continue;
                };
                found.extend(
                    chunk
                        .objects()
                        .iter()
                        .filter(|o| o.center().distance_sq(center) <= radius * radius)
                        .cloned(),
                );
            }
        }
        found
    }

    /// Creatures within `radius` pixels of `(x, y)`, ordered by id.
    pub fn creatures_near(&self, x: f32, y: f32, radius: f32) -> Vec<SpawnedCreature> {
        self.spawns
            .creatures_near(WorldPos::new(x, y), radius)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Queue loads for the interest set around `player`.
    pub fn request_chunks_around(&mut self, player: WorldPos) -> Result<usize, WorldError> {
        let issued = self.store.pump(player.chunk())?;
        self.events.extend(self.store.take_events());
        Ok(issued)
    }

    /// Advance the world by `delta` seconds with the player at `player`.
    #[instrument(skip(self), fields(tick = self.clock.tick.0))]
    pub fn tick(&mut self, delta: f32, player: WorldPos) -> Result<TickReport, WorldError> {
        self.ensure_live()?;
        self.clock.advance(delta);
        let now = self.clock.seconds();

        let mut report = TickReport {
            chunks_inserted: self.store.drain_completions(now).len(),
            ..TickReport::default()
        };
        report.requests = self.store.pump(player.chunk())?;
        report.evicted = self.store.evict()?;
        report.objects_expired = self.expire_objects(now);

        let terrain = StoreTerrain { store: &self.store };
        report.creatures_spawned = self.spawns.tick(delta, player, &self.clock, &terrain);

        self.events.extend(self.store.take_events());
        self.events.extend(self.spawns.take_events());
        debug!(?report, "World tick");
        Ok(report)
    }

    /// Remove transient objects past their lifetime. Clients wait for the
    /// server's removal events instead.
    fn expire_objects(&mut self, now: f64) -> usize {
        if self.config.role.is_client() {
            return 0;
        }
        let lifetime = self.config.object_lifetime_secs;
        let mut removed = Vec::new();
        for chunk in self.store.chunks_mut() {
            let expired: Vec<ObjectId> = chunk
                .objects()
                .iter()
                .filter(|o| o.is_expired(now, lifetime))
                .map(|o| o.id)
                .collect();
            for id in expired {
                if chunk.remove_object(id).is_some() {
                    removed.push((chunk.coord(), id));
                }
            }
        }
        let count = removed.len();
        for (chunk, id) in removed {
            self.emit(WorldEvent::ObjectRemoved { chunk, id });
        }
        count
    }

    /// Place an object with its anchor at a world tile, re-running the
    /// terrain and footprint rules.
    pub fn add_object(
        &mut self,
        kind: ObjectKind,
        tile_x: i32,
        tile_y: i32,
    ) -> Result<ObjectId, WorldError> {
        self.ensure_live()?;
        let now = self.clock.seconds();
        let (coord, _) = tile_to_chunk(tile_x, tile_y);
        let chunk = self
            .store
            .get_mut(coord)
            .ok_or(WorldError::ChunkNotLoaded(coord))?;
        validate_addition(chunk, self.table.get(chunk.biome()), kind, tile_x, tile_y)?;

        let mut object = StaticObject::new(kind, tile_x, tile_y);
        if !object.is_permanent() {
            object.spawned_at = Some(now);
        }
        let id = object.id;
        chunk.push_object(object.clone());
        debug!(chunk_pos = %coord, ?kind, tile_x, tile_y, "Object added");
        self.emit(WorldEvent::ObjectAdded {
            chunk: coord,
            object,
        });
        Ok(id)
    }

    pub fn remove_object(&mut self, id: ObjectId) -> Result<StaticObject, WorldError> {
        self.ensure_live()?;
        let removed = self
            .store
            .chunks_mut()
            .find_map(|chunk| chunk.remove_object(id).map(|object| (chunk.coord(), object)));
        let (chunk, object) =
            removed.ok_or(WorldError::Placement(PlacementRejection::UnknownObject(id)))?;
        self.emit(WorldEvent::ObjectRemoved { chunk, id });
        Ok(object)
    }

    pub fn place_block(
        &mut self,
        tile_x: i32,
        tile_y: i32,
        kind: BlockKind,
        orientation: Orientation,
    ) -> Result<(), WorldError> {
        self.ensure_live()?;
        let (coord, local) = tile_to_chunk(tile_x, tile_y);
        let chunk = self
            .store
            .get_mut(coord)
            .ok_or(WorldError::ChunkNotLoaded(coord))?;
        let (x, y) = (local.x as usize, local.y as usize);
        if !chunk.tile(x, y).is_passable() {
            return Err(PlacementRejection::Impassable { x: tile_x, y: tile_y }.into());
        }
        if chunk.block(local).is_some() || chunk.collidable_footprint_at(x, y).is_some() {
            return Err(PlacementRejection::Occupied { x: tile_x, y: tile_y }.into());
        }

        let block = PlacedBlock::new(local, kind, orientation);
        chunk.insert_block(block.clone());
        self.emit(WorldEvent::BlockPlaced {
            chunk: coord,
            block,
        });
        Ok(())
    }

    pub fn remove_block(&mut self, tile_x: i32, tile_y: i32) -> Result<PlacedBlock, WorldError> {
        self.ensure_live()?;
        let (coord, local) = tile_to_chunk(tile_x, tile_y);
        let chunk = self
            .store
            .get_mut(coord)
            .ok_or(WorldError::ChunkNotLoaded(coord))?;
        let block = chunk
            .remove_block(local)
            .ok_or(PlacementRejection::NoBlock { x: tile_x, y: tile_y })?;
        self.emit(WorldEvent::BlockRemoved {
            chunk: coord,
            position: local,
        });
        Ok(block)
    }

    /// Mirror a building block. Returns the new flipped state.
    pub fn toggle_block_flip(&mut self, tile_x: i32, tile_y: i32) -> Result<bool, WorldError> {
        self.ensure_live()?;
        let (coord, local) = tile_to_chunk(tile_x, tile_y);
        let chunk = self
            .store
            .get_mut(coord)
            .ok_or(WorldError::ChunkNotLoaded(coord))?;
        let kind = chunk
            .block(local)
            .map(|b| b.kind)
            .ok_or(PlacementRejection::NoBlock { x: tile_x, y: tile_y })?;
        if !kind.is_flippable() {
            return Err(PlacementRejection::NotFlippable.into());
        }
        let block = chunk
            .block_mut(local)
            .ok_or(PlacementRejection::NoBlock { x: tile_x, y: tile_y })?;
        block.toggle_flip();
        let (flipped, block) = (block.flipped, block.clone());
        self.emit(WorldEvent::BlockPlaced {
            chunk: coord,
            block,
        });
        Ok(flipped)
    }

    /// Take every event produced since the last call.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn apply_remote_chunk(&mut self, record: ChunkRecord) -> Result<ChunkCoord, WorldError> {
        self.store.apply_remote_chunk(record)
    }

    /// Apply a change announced by the server. Changes to chunks this
    /// client does not hold are dropped; the full chunk arrives later.
    pub fn apply_remote_event(&mut self, event: WorldEvent) -> Result<(), WorldError> {
        self.ensure_live()?;
        match event {
            WorldEvent::CreatureSpawned(creature) => self.spawns.apply_remote_spawn(creature),
            WorldEvent::CreatureDespawned(id) => {
                self.spawns.apply_remote_despawn(id);
            }
            WorldEvent::ChunkRequested(_) => {}
            chunk_event => {
                let Some(coord) = chunk_event.chunk() else {
                    return Ok(());
                };
                let Some(chunk) = self.store.get_mut(coord) else {
                    debug!(chunk_pos = %coord, kind = chunk_event.kind(), "Remote event for unloaded chunk");
                    return Ok(());
                };
                match chunk_event {
                    WorldEvent::ObjectAdded { object, .. } | WorldEvent::ObjectUpdated { object, .. } => {
                        chunk.remove_object(object.id);
                        chunk.push_object(object);
                    }
                    WorldEvent::ObjectRemoved { id, .. } => {
                        chunk.remove_object(id);
                    }
                    WorldEvent::BlockPlaced { block, .. } => {
                        chunk.insert_block(block);
                    }
                    WorldEvent::BlockRemoved { position, .. } => {
                        chunk.remove_block(position);
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Flush dirty chunks, stop the workers and dispose the world.
    pub fn shutdown(&mut self) -> Result<usize, WorldError> {
        let flushed = self.store.shutdown()?;
        info!(flushed, creatures = self.spawns.len(), "World shut down");
        Ok(flushed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{CHUNK_SIZE, TILE_SIZE};
    use crate::config::{NetworkRole, StreamingConfig, TerrainOptions};
    use crate::persist::MemoryStore;
    use crate::worker::ChunkPipeline;
    use std::time::{Duration, Instant};

    fn flat_config(role: NetworkRole) -> WorldConfig {
        WorldConfig {
            workers: 1,
            role,
            terrain: TerrainOptions {
                forced_mountain_layers: Some(0),
                fixed_biome: Some(BiomeId::Plains),
                pond_threshold: 2.0,
                ..TerrainOptions::default()
            },
            streaming: StreamingConfig {
                interest_radius: 1,
                hysteresis: 1,
                max_requests_per_tick: 16,
                tick_budget_ms: 50,
            },
            object_lifetime_secs: 1.0,
            ..WorldConfig::default()
        }
    }

    fn world(role: NetworkRole) -> World {
        World::new(
            flat_config(role),
            Arc::new(BiomeTable::default()),
            Arc::new(MemoryStore::new()),
        )
        .unwrap()
    }

    fn player() -> WorldPos {
        WorldPos::tile_center(8, 8)
    }

    fn load_home(world: &mut World) {
        let deadline = Instant::now() + Duration::from_secs(30);
        while world.chunk_at(ChunkCoord::new(0, 0)).is_none() && Instant::now() < deadline {
            world.tick(0.01, player()).unwrap();
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(world.chunk_at(ChunkCoord::new(0, 0)).is_some());
    }

    fn drop_item_ball(world: &mut World) -> ObjectId {
        let size = CHUNK_SIZE as i32;
        for ty in 0..size {
            for tx in 0..size {
                if let Ok(id) = world.add_object(ObjectKind::ItemBall, tx, ty) {
                    return id;
                }
            }
        }
        panic!("no free tile for an item ball");
    }

    #[test]
    fn unloaded_tiles_are_not_passable() {
        let mut world = world(NetworkRole::Singleplayer);
        assert!(!world.is_passable(8, 8));
        load_home(&mut world);
        assert!(!world.is_passable(40 * CHUNK_SIZE as i32, 0));
        assert_eq!(world.biome_at(3, 3), Some(BiomeId::Plains));
    }

    #[test]
    fn object_mutations_emit_events() {
        let mut world = world(NetworkRole::Singleplayer);
        load_home(&mut world);
        world.drain_events();

        let id = drop_item_ball(&mut world);
        assert!(world.chunk_at(ChunkCoord::new(0, 0)).unwrap().is_dirty());
        let events = world.drain_events();
        assert!(matches!(events.as_slice(), [WorldEvent::ObjectAdded { .. }]));

        let removed = world.remove_object(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(matches!(
            world.remove_object(id),
            Err(WorldError::Placement(PlacementRejection::UnknownObject(_)))
        ));
        assert!(world
            .drain_events()
            .iter()
            .any(|e| matches!(e, WorldEvent::ObjectRemoved { id: gone, .. } if *gone == id)));
    }

    #[test]
    fn item_balls_expire() {
        let mut world = world(NetworkRole::Singleplayer);
        load_home(&mut world);
        let id = drop_item_ball(&mut world);
        let center = WorldPos::tile_center(8, 8);
        let near = world.objects_near(center.x, center.y, 64.0 * TILE_SIZE);
        assert!(near.iter().any(|o| o.id == id));

        world.tick(0.6, player()).unwrap();
        world.tick(0.6, player()).unwrap();
        let chunk = world.chunk_at(ChunkCoord::new(0, 0)).unwrap();
        assert!(chunk.objects().iter().all(|o| o.id != id));
        assert!(world
            .drain_events()
            .iter()
            .any(|e| matches!(e, WorldEvent::ObjectRemoved { .. })));
    }

    #[test]
    fn blocks_follow_occupancy_rules() {
        let mut world = world(NetworkRole::Singleplayer);
        load_home(&mut world);

        let mut spot = None;
        'search: for ty in 0..CHUNK_SIZE as i32 {
            for tx in 0..CHUNK_SIZE as i32 {
                if world
                    .place_block(tx, ty, BlockKind::Chest, Orientation::South)
                    .is_ok()
                {
                    spot = Some((tx, ty));
                    break 'search;
                }
            }
        }
        let (tx, ty) = spot.expect("free tile for a chest");
        assert!(!world.is_passable(tx, ty));
        assert!(matches!(
            world.place_block(tx, ty, BlockKind::Furnace, Orientation::North),
            Err(WorldError::Placement(PlacementRejection::Occupied { .. }))
        ));
        assert!(matches!(
            world.toggle_block_flip(tx, ty),
            Err(WorldError::Placement(PlacementRejection::NotFlippable))
        ));

        world.remove_block(tx, ty).unwrap();
        world
            .place_block(tx, ty, BlockKind::RoofCorner, Orientation::East)
            .unwrap();
        assert!(world.toggle_block_flip(tx, ty).unwrap());
        world.remove_block(tx, ty).unwrap();
        assert!(matches!(
            world.remove_block(tx, ty),
            Err(WorldError::Placement(PlacementRejection::NoBlock { .. }))
        ));
        assert!(matches!(
            world.place_block(9000, 0, BlockKind::Chest, Orientation::North),
            Err(WorldError::ChunkNotLoaded(_))
        ));
    }

    #[test]
    fn client_applies_remote_state() {
        let mut world = world(NetworkRole::Client);
        world.request_chunks_around(player()).unwrap();
        let requested = world.drain_events();
        assert!(requested
            .iter()
            .any(|e| *e == WorldEvent::ChunkRequested(ChunkCoord::new(0, 0))));

        let pipeline = ChunkPipeline::from_config(
            &flat_config(NetworkRole::Authoritative),
            Arc::new(BiomeTable::default()),
        );
        let record = pipeline.build(ChunkCoord::new(0, 0)).to_record();
        world.apply_remote_chunk(record).unwrap();

        let ball = StaticObject::new(ObjectKind::ItemBall, 1, 1);
        world
            .apply_remote_event(WorldEvent::ObjectAdded {
                chunk: ChunkCoord::new(0, 0),
                object: ball.clone(),
            })
            .unwrap();
        let chunk = world.chunk_at(ChunkCoord::new(0, 0)).unwrap();
        assert_eq!(
            chunk.objects().iter().filter(|o| o.id == ball.id).count(),
            1
        );
        assert!(world.drain_events().is_empty());
    }

    #[test]
    fn shutdown_disposes_world() {
        let mut world = world(NetworkRole::Singleplayer);
        load_home(&mut world);
        drop_item_ball(&mut world);
        assert!(world.shutdown().unwrap() >= 1);
        assert!(matches!(world.tick(0.1, player()), Err(WorldError::Disposed)));
        assert!(matches!(
            world.add_object(ObjectKind::ItemBall, 2, 2),
            Err(WorldError::Disposed)
        ));
    }
}
