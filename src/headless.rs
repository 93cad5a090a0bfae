use crate::config::DriverConfig;
use crate::scripted_path::ScriptedPath;
use anyhow::{Context, Result};
use rand::RngCore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tileworld_core::SimTick;
use tileworld_testkit::{
    EventRecord, JsonlSink, MetricsReportBuilder, MetricsSink, PersistenceMetrics,
    SpawningMetrics, StreamingReport, TestExecutionMetrics,
};
use tileworld_world::{BiomeTable, RegionStore, World, WorldPos};
use tracing::{info, warn};

pub struct HeadlessOptions {
    pub config: DriverConfig,
    pub scripted_path: Option<PathBuf>,
    pub reset_world: bool,
    pub events_log: Option<PathBuf>,
    pub metrics_out: Option<PathBuf>,
}

pub fn run(opts: HeadlessOptions) -> Result<()> {
    let cfg = &opts.config;
    let (save_path, cleanup_save_path) = prepare_save_dir(cfg.save_dir.as_deref(), opts.reset_world)?;

    let table = match &cfg.biomes_file {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read biome table {}", path.display()))?;
            Arc::new(BiomeTable::from_json(&json)?)
        }
        None => Arc::new(BiomeTable::default()),
    };
    let mut path = match &opts.scripted_path {
        Some(file) => ScriptedPath::from_path(file)
            .with_context(|| format!("failed to load scripted path {}", file.display()))?,
        None => ScriptedPath::new(cfg.path.clone()),
    };
    let mut events = opts
        .events_log
        .as_ref()
        .map(JsonlSink::create)
        .transpose()?;

    let regions = Arc::new(RegionStore::new(&save_path)?);
    let mut world = World::new(cfg.world.clone(), table, regions.clone())?;
    let started = Instant::now();
    let mut player = WorldPos::tile_center(0, 0);
    let mut tick = SimTick::ZERO;

    for _ in 0..cfg.ticks {
        player = path.advance(cfg.tick_secs, player);
        world.tick(cfg.tick_secs, player)?;
        tick = tick.advance(1);

        for event in world.drain_events() {
            if let Some(sink) = events.as_mut() {
                let payload = serde_json::to_string(&event)?;
                sink.write(&EventRecord {
                    tick,
                    kind: event.kind(),
                    payload: &payload,
                })?;
            }
        }
        if tick.0 % 200 == 0 {
            info!(
                tick = tick.0,
                chunk = %player.chunk(),
                resident = world.store().len(),
                creatures = world.spawns().len(),
                clock = %world.clock().clock_string(),
                "Headless progress"
            );
        }
    }

    let flushed = world.shutdown()?;
    let streaming = world.streaming_metrics().clone();
    let spawning = world.spawn_metrics().clone();
    println!("{}", serde_json::to_string_pretty(&streaming)?);
    println!("{}", serde_json::to_string_pretty(&spawning)?);

    if let Some(out) = &opts.metrics_out {
        let report = MetricsReportBuilder::new("headless_walk")
            .seed(cfg.world.seed)
            .streaming(StreamingReport {
                requests_submitted: streaming.requests_submitted,
                chunks_generated: streaming.chunks_generated,
                chunks_loaded: streaming.chunks_loaded,
                chunks_restored: streaming.chunks_restored,
                evictions: streaming.evictions,
                ticks_to_converge: None,
            })
            .spawning(SpawningMetrics {
                checks: spawning.checks,
                singles: spawning.singles,
                packs: spawning.packs,
                despawned: spawning.despawned,
                alive: world.spawns().len(),
                rejected: spawning.rejected_unloaded
                    + spawning.rejected_impassable
                    + spawning.rejected_chunk_full
                    + spawning.rejected_too_close,
            })
            .persistence(PersistenceMetrics {
                chunks_saved: (streaming.saves_completed as usize).max(flushed),
                chunks_loaded: streaming.chunks_loaded as usize,
                save_failures: streaming.saves_failed as usize,
                bytes_written: regions.bytes_written(),
            })
            .execution(TestExecutionMetrics {
                duration_seconds: started.elapsed().as_secs_f64(),
                ticks: Some(cfg.ticks),
                assertions_checked: None,
            })
            .build();
        MetricsSink::create(out)?.write(&report)?;
        info!(path = %out.display(), "Metrics written");
    }

    if cleanup_save_path {
        if let Err(err) = std::fs::remove_dir_all(&save_path) {
            warn!(%err, path = %save_path.display(), "Failed to remove ephemeral save dir");
        }
    }
    Ok(())
}

fn prepare_save_dir(save_dir: Option<&Path>, reset_world: bool) -> Result<(PathBuf, bool)> {
    let cleanup = save_dir.is_none();

    let save_path = match save_dir {
        Some(path) => path.to_path_buf(),
        None => {
            let mut rng = rand::thread_rng();
            let suffix = rng.next_u64();
            std::env::temp_dir()
                .join("tileworld_headless")
                .join(format!("run_{suffix:016x}"))
        }
    };

    if reset_world && save_dir.is_some() {
        if save_path.parent().is_none() {
            anyhow::bail!(
                "refusing to reset save dir with no parent: {}",
                save_path.display()
            );
        }
        if save_path.exists() {
            std::fs::remove_dir_all(&save_path)
                .with_context(|| format!("failed to reset save dir {}", save_path.display()))?;
        }
    }

    std::fs::create_dir_all(&save_path)
        .with_context(|| format!("failed to create save dir {}", save_path.display()))?;

    Ok((save_path, cleanup))
}
