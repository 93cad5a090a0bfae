//! Background chunk production.
//!
//! Workers only see immutable inputs (the biome table and the seed) plus the
//! shared persistence backend. They hand finished chunks back through a
//! completion channel; the owning thread inserts them.

use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use tracing::{debug, info, warn};

use crate::biome::BiomeTable;
use crate::chunk::{Chunk, ChunkCoord};
use crate::config::WorldConfig;
use crate::persist::{ChunkPersistence, ChunkRecord};
use crate::placement::ObjectPlacer;
use crate::terrain::TerrainGenerator;

/// Terrain generation followed by object placement.
pub struct ChunkPipeline {
    terrain: TerrainGenerator,
    placer: ObjectPlacer,
}

impl ChunkPipeline {
    pub fn new(terrain: TerrainGenerator, placer: ObjectPlacer) -> Self {
        Self { terrain, placer }
    }

    pub fn from_config(config: &WorldConfig, table: Arc<BiomeTable>) -> Self {
        Self::new(
            TerrainGenerator::from_options(config.seed, table, config.terrain.clone()),
            ObjectPlacer::new(config.seed, config.placement.clone()),
        )
    }

    pub fn terrain(&self) -> &TerrainGenerator {
        &self.terrain
    }

    pub fn placer(&self) -> &ObjectPlacer {
        &self.placer
    }

    /// Build a fully populated chunk. Pure in `coord` and the seed.
    pub fn build(&self, coord: ChunkCoord) -> Chunk {
        let mut chunk = self.terrain.generate_chunk(coord);
        let biome = self.terrain.table().get(chunk.biome());
        let objects = self.placer.place(&chunk, biome);
        chunk.set_generated_objects(objects);
        chunk
    }
}

#[derive(Debug)]
pub enum Job {
    Load(ChunkCoord),
    Save(Box<ChunkRecord>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Generated,
    Disk,
}

#[derive(Debug)]
pub enum Completion {
    Loaded {
        coord: ChunkCoord,
        chunk: Box<Chunk>,
        source: LoadSource,
    },
    Saved {
        coord: ChunkCoord,
        result: Result<(), String>,
    },
}

/// Fixed-size pool of named worker threads fed by an MPMC job queue.
pub struct WorkerPool {
    jobs: Option<Sender<Job>>,
    completions: Receiver<Completion>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        count: usize,
        pipeline: Arc<ChunkPipeline>,
        persistence: Arc<dyn ChunkPersistence>,
    ) -> Result<Self> {
        let (job_tx, job_rx) = unbounded::<Job>();
        let (done_tx, done_rx) = unbounded::<Completion>();
        let count = count.max(1);

        let mut handles = Vec::with_capacity(count);
        for index in 0..count {
            let jobs = job_rx.clone();
            let done = done_tx.clone();
            let pipeline = Arc::clone(&pipeline);
            let persistence = Arc::clone(&persistence);
            let handle = std::thread::Builder::new()
                .name(format!("chunk-worker-{index}"))
                .spawn(move || worker_loop(jobs, done, &pipeline, persistence.as_ref()))
                .with_context(|| format!("failed to spawn chunk worker {index}"))?;
            handles.push(handle);
        }
        info!(workers = count, "Chunk workers started");

        Ok(Self {
            jobs: Some(job_tx),
            completions: done_rx,
            handles,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Queue a job. Returns false once the pool has shut down.
    pub fn submit(&self, job: Job) -> bool {
        match &self.jobs {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        }
    }

    /// Completions ready right now, without blocking.
    pub fn drain(&self) -> Vec<Completion> {
        let mut ready = Vec::new();
        loop {
            match self.completions.try_recv() {
                Ok(completion) => ready.push(completion),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        ready
    }

    /// Close the job queue, let workers finish what is queued, then join them.
    /// Completions produced meanwhile stay available through `drain`.
    pub fn shutdown(&mut self) {
        if self.jobs.take().is_none() {
            return;
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("Chunk worker panicked during shutdown");
            }
        }
        info!("Chunk workers stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    jobs: Receiver<Job>,
    done: Sender<Completion>,
    pipeline: &ChunkPipeline,
    persistence: &dyn ChunkPersistence,
) {
    for job in jobs.iter() {
        let completion = match job {
            Job::Load(coord) => load_or_generate(coord, pipeline, persistence),
            Job::Save(record) => {
                let coord = record.coord;
                let result = persistence.save(&record).map_err(|err| format!("{err:#}"));
                Completion::Saved { coord, result }
            }
        };
        if done.send(completion).is_err() {
            break;
        }
    }
}

fn load_or_generate(
    coord: ChunkCoord,
    pipeline: &ChunkPipeline,
    persistence: &dyn ChunkPersistence,
) -> Completion {
    match persistence.load(coord) {
        Ok(Some(record)) => match Chunk::from_record(record) {
            Ok(chunk) => {
                debug!(chunk_pos = %coord, "Loaded chunk from storage");
                return Completion::Loaded {
                    coord,
                    chunk: Box::new(chunk),
                    source: LoadSource::Disk,
                };
            }
            Err(err) => warn!(chunk_pos = %coord, error = %err, "Stored chunk invalid, regenerating"),
        },
        Ok(None) => {}
        Err(err) => warn!(chunk_pos = %coord, error = %err, "Chunk load failed, regenerating"),
    }

    Completion::Loaded {
        coord,
        chunk: Box::new(pipeline.build(coord)),
        source: LoadSource::Generated,
    }
}
