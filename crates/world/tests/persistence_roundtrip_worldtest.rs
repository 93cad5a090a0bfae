//! Persistence Roundtrip Worldtest
//!
//! Edits a world, shuts it down, and reopens it from the same region
//! directory.
//! Focus areas:
//! - Shutdown flushes dirty chunks to region files
//! - A reopened world serves edited chunks from disk, not from generation
//! - Blocks and objects survive with their exact state
//! - A corrupt region file is treated as missing and the chunk regenerates

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tileworld_core::SimTick;
use tileworld_testkit::{
    scratch_dir, EventRecord, JsonlSink, MetricsReportBuilder, MetricsSink, PersistenceMetrics,
    TestExecutionMetrics, TestResult,
};
use tileworld_world::{
    BiomeId, BiomeTable, BlockKind, ChunkCoord, ChunkPersistence, ChunkRecord, ObjectKind,
    Orientation, RegionStore, StreamingConfig, TerrainOptions, World, WorldConfig, WorldPos,
    CHUNK_SIZE,
};

const WORLD_SEED: u64 = 8675309;
const HOME: ChunkCoord = ChunkCoord { x: 0, y: 0 };

fn config() -> WorldConfig {
    WorldConfig {
        seed: WORLD_SEED,
        workers: 2,
        terrain: TerrainOptions {
            forced_mountain_layers: Some(0),
            fixed_biome: Some(BiomeId::Plains),
            pond_threshold: 2.0,
            ..TerrainOptions::default()
        },
        streaming: StreamingConfig {
            interest_radius: 1,
            hysteresis: 1,
            max_requests_per_tick: 8,
            tick_budget_ms: 20,
        },
        ..WorldConfig::default()
    }
}

fn open(dir: &Path) -> World {
    World::open(config(), Arc::new(BiomeTable::default()), dir).expect("open world")
}

fn player() -> WorldPos {
    WorldPos::tile_center(8, 8)
}

fn load_home(world: &mut World) {
    let deadline = Instant::now() + Duration::from_secs(30);
    while world.chunk_at(HOME).is_none() {
        assert!(Instant::now() < deadline, "home chunk never loaded");
        world.tick(0.05, player()).expect("tick");
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Place a chest and an item ball on the first free tiles of the home chunk.
fn edit_home(world: &mut World) -> (i32, i32) {
    let size = CHUNK_SIZE as i32;
    let free: Vec<(i32, i32)> = (0..size)
        .flat_map(|y| (0..size).map(move |x| (x, y)))
        .filter(|&(x, y)| world.is_passable(x, y))
        .collect();
    let &(bx, by) = free
        .iter()
        .find(|&&(x, y)| {
            world
                .place_block(x, y, BlockKind::Chest, Orientation::East)
                .is_ok()
        })
        .expect("no free tile for a chest");
    let placed_ball = free
        .iter()
        .filter(|&&tile| tile != (bx, by))
        .any(|&(x, y)| world.add_object(ObjectKind::ItemBall, x, y).is_ok());
    assert!(placed_ball, "no free tile for an item ball");
    (bx, by)
}

#[test]
fn persistence_roundtrip_worldtest() {
    let test_start = Instant::now();
    let dir = scratch_dir("tileworld-persistence-worldtest").expect("scratch dir");

    let output_path = std::env::temp_dir().join("tileworld_persistence_roundtrip_worldtest.jsonl");
    let mut sink = JsonlSink::create(&output_path).expect("create event log");
    sink.write(&EventRecord {
        tick: SimTick::ZERO,
        kind: "TestStart",
        payload: &format!("seed={WORLD_SEED} dir={}", dir.display()),
    })
    .expect("write start");

    println!("\n=== Persistence Roundtrip Worldtest ===");
    println!("  World dir: {}", dir.display());

    // Phase 1: edit and shut down
    let mut world = open(&dir);
    load_home(&mut world);
    let (bx, by) = edit_home(&mut world);
    let edited: ChunkRecord = world.chunk_at(HOME).expect("home resident").to_record();
    let flushed = world.shutdown().expect("shutdown");
    assert!(flushed >= 1, "shutdown flushed nothing");
    sink.write(&EventRecord {
        tick: world.clock().tick,
        kind: "Shutdown",
        payload: &format!("flushed={flushed}"),
    })
    .expect("write shutdown");
    println!("Phase 1: chest at {bx},{by}, {flushed} chunks flushed");

    // Phase 2: the region file holds the edited record
    let regions = RegionStore::new(&dir).expect("region store");
    assert!(regions.region_exists(HOME));
    let stored = regions
        .load(HOME)
        .expect("read region")
        .expect("home chunk saved");
    assert_eq!(stored, edited);
    println!("Phase 2: stored record matches the edited chunk");

    // Phase 3: reopen and read back through the world
    let mut world = open(&dir);
    load_home(&mut world);
    let reloaded = world.chunk_at(HOME).expect("home resident").to_record();
    assert_eq!(reloaded, edited);
    assert!(!world.is_passable(bx, by), "chest no longer blocks its tile");
    assert!(world.streaming_metrics().chunks_loaded >= 1);
    let metrics = world.streaming_metrics().clone();
    world.shutdown().expect("shutdown");
    println!(
        "Phase 3: reopened world loaded {} chunks from disk",
        metrics.chunks_loaded
    );

    // Phase 4: a corrupt region falls back to generation
    let region_file = dir.join("r.0.0.rg");
    fs::write(&region_file, b"definitely not a region").expect("corrupt region");
    let mut world = open(&dir);
    load_home(&mut world);
    let home = world.chunk_at(HOME).expect("home resident");
    assert_eq!(home.block_count(), 0, "corrupt region still produced blocks");
    assert!(world.streaming_metrics().chunks_generated >= 1);
    world.shutdown().expect("shutdown");
    sink.write(&EventRecord {
        tick: SimTick(4),
        kind: "CorruptRegionRecovered",
        payload: &region_file.display().to_string(),
    })
    .expect("write recovery");
    println!("Phase 4: corrupt region regenerated");

    let bytes_written = fs::read_dir(&dir)
        .expect("list world dir")
        .filter_map(|entry| entry.ok()?.metadata().ok())
        .map(|meta| meta.len())
        .sum();
    let report = MetricsReportBuilder::new("persistence_roundtrip_worldtest")
        .result(TestResult::Pass)
        .seed(WORLD_SEED)
        .persistence(PersistenceMetrics {
            chunks_saved: flushed,
            chunks_loaded: metrics.chunks_loaded as usize,
            save_failures: metrics.saves_failed as usize,
            bytes_written,
        })
        .execution(TestExecutionMetrics {
            duration_seconds: test_start.elapsed().as_secs_f64(),
            ticks: None,
            assertions_checked: None,
        })
        .build();
    let metrics_path = std::env::temp_dir().join("tileworld_persistence_roundtrip_metrics.json");
    MetricsSink::create(&metrics_path)
        .and_then(|sink| sink.write(&report))
        .expect("write metrics");

    fs::remove_dir_all(&dir).ok();
    println!("Total test time: {}ms", test_start.elapsed().as_millis());
    println!("Event log: {}", output_path.display());
    println!("=== Test PASSED ===\n");
}
