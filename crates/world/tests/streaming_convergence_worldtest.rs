//! Streaming Convergence Worldtest
//!
//! Moves a player between distant points and checks that the resident chunk
//! set converges on the interest set each time.
//! Focus areas:
//! - Resident set equals the interest disc once the player stands still
//! - A converged set stays put while the player keeps standing still
//! - Chunks outside radius plus hysteresis are evicted after a jump
//! - Returning players get chunks back from the hot cache or from storage
//! - No chunk is requested twice while its load is in flight
//!
//! Override the per-phase tick limit with `TILEWORLD_STREAM_TICKS`.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tileworld_core::SimTick;
use tileworld_testkit::{
    env_override, EventRecord, JsonlSink, MetricsReportBuilder, MetricsSink, StreamingReport,
    TestExecutionMetrics, TestResult,
};
use tileworld_world::{
    interest_set, BiomeId, BiomeTable, ChunkCoord, MemoryStore, StreamingConfig, TerrainOptions,
    World, WorldConfig, WorldPos, CHUNK_SIZE,
};

const WORLD_SEED: u64 = 20240601;
const INTEREST_RADIUS: i32 = 2;
const HYSTERESIS: i32 = 1;
const TICK_SECS: f32 = 0.05;
const STEADY_TICKS: u64 = 50;

fn config() -> WorldConfig {
    WorldConfig {
        seed: WORLD_SEED,
        workers: 2,
        terrain: TerrainOptions {
            fixed_biome: Some(BiomeId::Forest),
            ..TerrainOptions::default()
        },
        streaming: StreamingConfig {
            interest_radius: INTEREST_RADIUS,
            hysteresis: HYSTERESIS,
            max_requests_per_tick: 4,
            tick_budget_ms: 20,
        },
        ..WorldConfig::default()
    }
}

fn chunk_center(coord: ChunkCoord) -> WorldPos {
    let (ox, oy) = coord.origin_tile();
    let half = CHUNK_SIZE as i32 / 2;
    WorldPos::tile_center(ox + half, oy + half)
}

/// Tick until the resident set matches the interest disc. Returns ticks used.
fn converge(world: &mut World, center: ChunkCoord, max_ticks: u64, sink: &mut JsonlSink) -> u64 {
    let wanted: BTreeSet<ChunkCoord> = interest_set(center, INTEREST_RADIUS).into_iter().collect();
    let player = chunk_center(center);

    for tick in 1..=max_ticks {
        let report = world.tick(TICK_SECS, player).expect("tick");
        let resident: BTreeSet<ChunkCoord> = world.store().loaded_coords().into_iter().collect();
        if resident == wanted && world.store().pending_count() == 0 {
            sink.write(&EventRecord {
                tick: world.clock().tick,
                kind: "Converged",
                payload: &format!("center={center} ticks={tick} resident={}", resident.len()),
            })
            .expect("write converged");
            return tick;
        }
        if report.chunks_inserted == 0 {
            std::thread::sleep(Duration::from_millis(2));
        }
    }
    panic!(
        "resident set did not converge around {center} within {max_ticks} ticks ({} resident, {} pending)",
        world.store().len(),
        world.store().pending_count()
    );
}

/// Keep ticking in place and check that nothing is loaded or evicted.
fn hold_steady(world: &mut World, center: ChunkCoord, sink: &mut JsonlSink) {
    let player = chunk_center(center);
    let resident: BTreeSet<ChunkCoord> = world.store().loaded_coords().into_iter().collect();
    let evictions = world.streaming_metrics().evictions;
    let submitted = world.streaming_metrics().requests_submitted;

    for _ in 0..STEADY_TICKS {
        let report = world.tick(TICK_SECS, player).expect("tick");
        assert_eq!(report.requests, 0, "steady player triggered requests");
        assert_eq!(report.evicted, 0, "steady player triggered evictions");
        let now: BTreeSet<ChunkCoord> = world.store().loaded_coords().into_iter().collect();
        assert_eq!(now, resident, "resident set drifted around {center}");
    }
    assert_eq!(world.streaming_metrics().evictions, evictions);
    assert_eq!(world.streaming_metrics().requests_submitted, submitted);
    assert_eq!(world.store().pending_count(), 0);

    sink.write(&EventRecord {
        tick: world.clock().tick,
        kind: "HeldSteady",
        payload: &format!("center={center} ticks={STEADY_TICKS}"),
    })
    .expect("write steady");
}

#[test]
fn streaming_convergence_worldtest() {
    let test_start = Instant::now();
    let max_ticks: u64 = env_override("TILEWORLD_STREAM_TICKS", 4000).max(1);

    let output_path = std::env::temp_dir().join("tileworld_streaming_convergence_worldtest.jsonl");
    let mut sink = JsonlSink::create(&output_path).expect("create event log");
    sink.write(&EventRecord {
        tick: SimTick::ZERO,
        kind: "TestStart",
        payload: &format!("seed={WORLD_SEED} radius={INTEREST_RADIUS}"),
    })
    .expect("write start");

    println!("\n=== Streaming Convergence Worldtest ===");
    println!("  Interest radius: {INTEREST_RADIUS}, hysteresis: {HYSTERESIS}");

    let mut world = World::new(
        config(),
        Arc::new(BiomeTable::default()),
        Arc::new(MemoryStore::new()),
    )
    .expect("create world");

    // Phase 1: cold start at the origin
    let home = ChunkCoord::new(0, 0);
    let first = converge(&mut world, home, max_ticks, &mut sink);
    let disc = interest_set(home, INTEREST_RADIUS).len() as u64;
    assert_eq!(world.streaming_metrics().chunks_generated, disc);
    assert_eq!(
        world.streaming_metrics().requests_submitted,
        disc,
        "a chunk was requested more than once"
    );
    println!("Phase 1: {disc} chunks resident after {first} ticks");
    hold_steady(&mut world, home, &mut sink);
    println!("Phase 1: resident set held for {STEADY_TICKS} ticks");

    // Phase 2: jump far away, everything at home must go
    let away = ChunkCoord::new(12, -9);
    let second = converge(&mut world, away, max_ticks, &mut sink);
    let evict_limit = ((INTEREST_RADIUS + HYSTERESIS) as i64).pow(2);
    for coord in world.store().loaded_coords() {
        assert!(
            coord.distance_sq(away) <= evict_limit,
            "{coord} should have been evicted"
        );
    }
    assert!(world.streaming_metrics().evictions >= disc);
    println!(
        "Phase 2: converged after {second} ticks, {} evictions",
        world.streaming_metrics().evictions
    );

    // Phase 3: come home, chunks return without regeneration
    let generated_before = world.streaming_metrics().chunks_generated;
    let third = converge(&mut world, home, max_ticks, &mut sink);
    hold_steady(&mut world, home, &mut sink);
    let metrics = world.streaming_metrics().clone();
    assert_eq!(
        metrics.chunks_generated, generated_before,
        "returning home regenerated chunks"
    );
    assert!(metrics.chunks_restored + metrics.chunks_loaded >= disc);
    println!(
        "Phase 3: converged after {third} ticks ({} restored, {} loaded)",
        metrics.chunks_restored, metrics.chunks_loaded
    );

    world.shutdown().expect("shutdown");

    let report = MetricsReportBuilder::new("streaming_convergence_worldtest")
        .result(TestResult::Pass)
        .seed(WORLD_SEED)
        .streaming(StreamingReport {
            requests_submitted: metrics.requests_submitted,
            chunks_generated: metrics.chunks_generated,
            chunks_loaded: metrics.chunks_loaded,
            chunks_restored: metrics.chunks_restored,
            evictions: metrics.evictions,
            ticks_to_converge: Some(first),
        })
        .execution(TestExecutionMetrics {
            duration_seconds: test_start.elapsed().as_secs_f64(),
            ticks: Some(first + second + third + 2 * STEADY_TICKS),
            assertions_checked: None,
        })
        .build();
    let metrics_path = std::env::temp_dir().join("tileworld_streaming_convergence_metrics.json");
    MetricsSink::create(&metrics_path)
        .and_then(|sink| sink.write(&report))
        .expect("write metrics");

    println!("Total test time: {}ms", test_start.elapsed().as_millis());
    println!("Event log: {}", output_path.display());
    println!("=== Test PASSED ===\n");
}
