use std::collections::{BTreeMap, HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use lru::LruCache;
use tracing::{debug, info, warn};

use crate::biome::BiomeTable;
use crate::chunk::{Chunk, ChunkCoord, DirtyFlags};
use crate::config::{NetworkRole, WorldConfig};
use crate::error::WorldError;
use crate::events::WorldEvent;
use crate::persist::{ChunkPersistence, ChunkRecord, NullStore};
use crate::streaming::{StreamingMetrics, StreamingScheduler};
use crate::worker::{ChunkPipeline, Completion, Job, LoadSource, WorkerPool};

/// What a call to [`ChunkStore::request`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    AlreadyLoaded,
    /// A load for this chunk is already queued or running.
    InFlight,
    /// Brought back synchronously from the hot cache.
    Restored,
    /// Client role: waiting for the server to send the chunk.
    Awaiting,
    Submitted,
}

/// Resident chunk arena plus the machinery that fills and drains it.
///
/// Only the owning thread touches `chunks`; workers communicate exclusively
/// through job and completion channels.
pub struct ChunkStore {
    role: NetworkRole,
    /// Deterministic iteration order for eviction and flushing.
    chunks: BTreeMap<ChunkCoord, Chunk>,
    in_flight: HashSet<ChunkCoord>,
    /// Chunks with a save job running, with the dirty flags that job covers.
    saving: HashMap<ChunkCoord, DirtyFlags>,
    awaiting_remote: HashSet<ChunkCoord>,
    hot: LruCache<ChunkCoord, ChunkRecord>,
    workers: WorkerPool,
    persistence: Arc<dyn ChunkPersistence>,
    scheduler: StreamingScheduler,
    metrics: StreamingMetrics,
    outbox: Vec<WorldEvent>,
    disposed: bool,
}

impl ChunkStore {
    /// Start the worker pool. Client worlds never touch local persistence.
    pub fn new(
        config: &WorldConfig,
        table: Arc<BiomeTable>,
        persistence: Arc<dyn ChunkPersistence>,
    ) -> Result<Self> {
        let persistence: Arc<dyn ChunkPersistence> = if config.role.is_client() {
            Arc::new(NullStore)
        } else {
            persistence
        };
        let pipeline = Arc::new(ChunkPipeline::from_config(config, table));
        let workers = WorkerPool::spawn(config.workers, pipeline, Arc::clone(&persistence))?;
        let capacity = NonZeroUsize::new(config.hot_cache_capacity).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            role: config.role,
            chunks: BTreeMap::new(),
            in_flight: HashSet::new(),
            saving: HashMap::new(),
            awaiting_remote: HashSet::new(),
            hot: LruCache::new(capacity),
            workers,
            persistence,
            scheduler: StreamingScheduler::new(config.streaming.clone()),
            metrics: StreamingMetrics::default(),
            outbox: Vec::new(),
            disposed: false,
        })
    }

    fn ensure_live(&self) -> Result<(), WorldError> {
        if self.disposed {
            Err(WorldError::Disposed)
        } else {
            Ok(())
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    pub fn get_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub(crate) fn chunks_mut(&mut self) -> impl Iterator<Item = &mut Chunk> {
        self.chunks.values_mut()
    }

    pub fn loaded_coords(&self) -> Vec<ChunkCoord> {
        self.chunks.keys().copied().collect()
    }

    /// Requested but not yet resident.
    pub fn is_pending(&self, coord: ChunkCoord) -> bool {
        self.in_flight.contains(&coord) || self.awaiting_remote.contains(&coord)
    }

    pub fn pending_count(&self) -> usize {
        self.in_flight.len() + self.awaiting_remote.len()
    }

    pub fn is_saving(&self, coord: ChunkCoord) -> bool {
        self.saving.contains_key(&coord)
    }

    pub fn hot_cache_len(&self) -> usize {
        self.hot.len()
    }

    pub fn metrics(&self) -> &StreamingMetrics {
        &self.metrics
    }

    pub fn scheduler(&self) -> &StreamingScheduler {
        &self.scheduler
    }

    pub fn take_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Ask for a chunk. Never blocks; repeated calls coalesce.
    pub fn request(&mut self, coord: ChunkCoord) -> Result<RequestOutcome, WorldError> {
        self.ensure_live()?;
        if self.chunks.contains_key(&coord) {
            return Ok(RequestOutcome::AlreadyLoaded);
        }
        if self.in_flight.contains(&coord) {
            return Ok(RequestOutcome::InFlight);
        }

        if self.role.is_client() {
            if self.awaiting_remote.insert(coord) {
                self.outbox.push(WorldEvent::ChunkRequested(coord));
            }
            return Ok(RequestOutcome::Awaiting);
        }

        if let Some(record) = self.hot.pop(&coord) {
            match Chunk::from_record(record) {
                Ok(chunk) => {
                    self.chunks.insert(coord, chunk);
                    self.metrics.chunks_restored += 1;
                    debug!(chunk_pos = %coord, "Restored chunk from hot cache");
                    return Ok(RequestOutcome::Restored);
                }
                Err(err) => {
                    warn!(chunk_pos = %coord, error = %err, "Dropping invalid hot cache entry")
                }
            }
        }

        if !self.workers.submit(Job::Load(coord)) {
            return Err(WorldError::WorkersUnavailable);
        }
        self.in_flight.insert(coord);
        self.metrics.requests_submitted += 1;
        Ok(RequestOutcome::Submitted)
    }

    /// Re-prioritize around `center` and submit requests within the per-tick
    /// count and wall-clock budgets. Returns how many requests went out.
    pub fn pump(&mut self, center: ChunkCoord) -> Result<usize, WorldError> {
        self.ensure_live()?;
        let chunks = &self.chunks;
        let in_flight = &self.in_flight;
        let awaiting = &self.awaiting_remote;
        self.scheduler.plan(center, |coord| {
            !chunks.contains_key(&coord) && !in_flight.contains(&coord) && !awaiting.contains(&coord)
        });

        let config = self.scheduler.config();
        let max_requests = config.max_requests_per_tick.max(1);
        let deadline = Instant::now() + Duration::from_millis(config.tick_budget_ms);

        let mut issued = 0;
        while issued < max_requests {
            if issued > 0 && Instant::now() >= deadline {
                break;
            }
            let Some(coord) = self.scheduler.pop() else {
                break;
            };
            match self.request(coord)? {
                RequestOutcome::Submitted | RequestOutcome::Restored | RequestOutcome::Awaiting => {
                    issued += 1
                }
                RequestOutcome::AlreadyLoaded | RequestOutcome::InFlight => {}
            }
        }
        self.metrics.queue_size = self.scheduler.queue_len();
        Ok(issued)
    }

    /// Insert finished loads and settle finished saves. Returns the newly
    /// resident coordinates.
    pub fn drain_completions(&mut self, now: f64) -> Vec<ChunkCoord> {
        let mut inserted = Vec::new();
        for completion in self.workers.drain() {
            match completion {
                Completion::Loaded { coord, chunk, source } => {
                    self.in_flight.remove(&coord);
                    if self.chunks.contains_key(&coord) {
                        continue;
                    }
                    match source {
                        LoadSource::Generated => self.metrics.chunks_generated += 1,
                        LoadSource::Disk => self.metrics.chunks_loaded += 1,
                    }
                    if !self.scheduler.is_wanted(coord) {
                        self.metrics.late_arrivals += 1;
                    }
                    let mut chunk = *chunk;
                    chunk.stamp_spawn_times(now);
                    self.chunks.insert(coord, chunk);
                    inserted.push(coord);
                }
                Completion::Saved { coord, result } => self.settle_save(coord, result),
            }
        }
        inserted
    }

    fn settle_save(&mut self, coord: ChunkCoord, result: Result<(), String>) {
        let flags = self.saving.remove(&coord).unwrap_or(DirtyFlags::empty());
        match result {
            Ok(()) => {
                self.metrics.saves_completed += 1;
                debug!(chunk_pos = %coord, "Chunk saved");
            }
            Err(err) => {
                self.metrics.saves_failed += 1;
                warn!(chunk_pos = %coord, error = %err, "Chunk save failed, keeping chunk resident");
                if let Some(chunk) = self.chunks.get_mut(&coord) {
                    chunk.mark_dirty(flags);
                }
            }
        }
    }

    /// Drop chunks outside the interest radius plus hysteresis. Dirty chunks
    /// are saved first and stay resident until the save lands.
    pub fn evict(&mut self) -> Result<usize, WorldError> {
        self.ensure_live()?;
        let scheduler = &self.scheduler;
        let stale: Vec<ChunkCoord> = self
            .chunks
            .keys()
            .copied()
            .filter(|coord| scheduler.should_evict(*coord))
            .collect();

        let mut evicted = 0;
        for coord in stale {
            if self.saving.contains_key(&coord) {
                continue;
            }
            let Some(chunk) = self.chunks.get_mut(&coord) else {
                continue;
            };

            if self.role.is_client() {
                self.chunks.remove(&coord);
                evicted += 1;
                continue;
            }

            if chunk.is_dirty() {
                let flags = chunk.take_dirty_flags();
                let record = chunk.to_record();
                if !self.workers.submit(Job::Save(Box::new(record))) {
                    chunk.mark_dirty(flags);
                    return Err(WorldError::WorkersUnavailable);
                }
                self.saving.insert(coord, flags);
                continue;
            }

            if let Some(chunk) = self.chunks.remove(&coord) {
                self.hot.put(coord, chunk.to_record());
                evicted += 1;
            }
        }

        let scheduler = &self.scheduler;
        self.awaiting_remote
            .retain(|coord| !scheduler.should_evict(*coord));

        self.metrics.evictions += evicted as u64;
        Ok(evicted)
    }

    /// Insert a chunk received from the server.
    pub fn apply_remote_chunk(&mut self, record: ChunkRecord) -> Result<ChunkCoord, WorldError> {
        self.ensure_live()?;
        let chunk = Chunk::from_record(record)?;
        let coord = chunk.coord();
        self.awaiting_remote.remove(&coord);
        self.chunks.insert(coord, chunk);
        self.metrics.chunks_received += 1;
        debug!(chunk_pos = %coord, "Applied remote chunk");
        Ok(coord)
    }

    /// Synchronously write every dirty chunk. Only safe once no save jobs
    /// remain in flight.
    fn flush_dirty(&mut self) -> usize {
        if self.role.is_client() {
            return 0;
        }
        let mut written = 0;
        for (coord, chunk) in self.chunks.iter_mut() {
            if !chunk.is_dirty() {
                continue;
            }
            let flags = chunk.take_dirty_flags();
            match self.persistence.save(&chunk.to_record()) {
                Ok(()) => {
                    written += 1;
                    self.metrics.saves_completed += 1;
                }
                Err(err) => {
                    self.metrics.saves_failed += 1;
                    warn!(chunk_pos = %coord, error = %err, "Flush failed");
                    chunk.mark_dirty(flags);
                }
            }
        }
        written
    }

    /// Finish queued jobs, flush dirty chunks and stop the workers. Every
    /// later operation returns [`WorldError::Disposed`].
    pub fn shutdown(&mut self) -> Result<usize, WorldError> {
        self.ensure_live()?;
        self.workers.shutdown();
        for completion in self.workers.drain() {
            if let Completion::Saved { coord, result } = completion {
                self.settle_save(coord, result);
            }
        }
        self.in_flight.clear();
        let written = self.flush_dirty();
        self.disposed = true;
        info!(
            flushed = written,
            resident = self.chunks.len(),
            "Chunk store shut down"
        );
        Ok(written)
    }
}
