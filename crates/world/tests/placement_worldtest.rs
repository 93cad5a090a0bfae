//! Placement Worldtest
//!
//! Generates a region of climate-driven chunks and checks every placed
//! object against the placement rules:
//! - Footprints stay inside their chunk, on passable tiles the chunk's biome allows
//! - No two objects overlap, and trees keep their buffer from each other
//! - Species caps hold per chunk
//! - Collidable objects block passability, ground cover does not
//!
//! Override the region size with `TILEWORLD_PLACEMENT_RADIUS`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tileworld_core::SimTick;
use tileworld_testkit::{
    env_override, EventRecord, JsonlSink, MetricsReportBuilder, MetricsSink, PlacementMetrics,
    TestExecutionMetrics, TestResult,
};
use tileworld_world::{
    tree_cap, BiomeTable, ChunkCoord, ChunkPipeline, ObjectKind, WorldConfig, CHUNK_SIZE,
};

const WORLD_SEED: u64 = 31337;

#[test]
fn placement_worldtest() {
    let test_start = Instant::now();
    let radius: i32 = env_override("TILEWORLD_PLACEMENT_RADIUS", 3).max(0);
    let table = Arc::new(BiomeTable::default());
    let config = WorldConfig {
        seed: WORLD_SEED,
        ..WorldConfig::default()
    };
    let pipeline = ChunkPipeline::from_config(&config, Arc::clone(&table));

    let output_path = std::env::temp_dir().join("tileworld_placement_worldtest.jsonl");
    let mut sink = JsonlSink::create(&output_path).expect("create event log");
    sink.write(&EventRecord {
        tick: SimTick::ZERO,
        kind: "TestStart",
        payload: &format!("seed={WORLD_SEED} radius={radius}"),
    })
    .expect("write start");

    println!("\n=== Placement Worldtest ===");

    let mut metrics = PlacementMetrics::default();
    let mut checks = 0usize;
    let mut chunks = 0usize;
    let size = CHUNK_SIZE as i32;

    for cy in -radius..=radius {
        for cx in -radius..=radius {
            let coord = ChunkCoord::new(cx, cy);
            let chunk = pipeline.build(coord);
            let biome = table.get(chunk.biome());
            let (ox, oy) = coord.origin_tile();
            let objects = chunk.objects();
            chunks += 1;

            let mut per_kind: BTreeMap<ObjectKind, usize> = BTreeMap::new();
            for object in objects {
                *per_kind.entry(object.kind).or_default() += 1;
                *metrics
                    .by_kind
                    .entry(format!("{:?}", object.kind))
                    .or_insert(0) += 1;
                metrics.objects_placed += 1;
                if object.kind.is_tree() {
                    metrics.trees += 1;
                }

                for (tx, ty) in object.footprint().tiles() {
                    let (lx, ly) = (tx - ox, ty - oy);
                    assert!(
                        (0..size).contains(&lx) && (0..size).contains(&ly),
                        "{:?} in {coord} leaves its chunk",
                        object.kind
                    );
                    let tile = chunk.tile(lx as usize, ly as usize);
                    assert!(tile.is_passable(), "{:?} sits on {tile:?}", object.kind);
                    assert!(biome.allows(tile), "{:?} sits on foreign {tile:?}", object.kind);
                    if object.is_collidable() {
                        assert!(!chunk.is_passable_local(lx as usize, ly as usize));
                    }
                    checks += 3;
                }
            }

            for (i, a) in objects.iter().enumerate() {
                for b in &objects[i + 1..] {
                    assert!(
                        !a.footprint().intersects(&b.footprint()),
                        "{:?} overlaps {:?} in {coord}",
                        a,
                        b
                    );
                    if a.kind.is_tree() && b.kind.is_tree() {
                        let grown = a.footprint().expanded(a.kind.spec().buffer as i32);
                        assert!(!grown.intersects(&b.footprint()), "trees too close in {coord}");
                    }
                    checks += 1;
                }
            }

            for (kind, count) in per_kind.iter().filter(|(k, _)| k.is_tree()) {
                assert!(
                    *count <= tree_cap(*kind, biome.id),
                    "{kind:?} cap exceeded in {coord}: {count}"
                );
            }

            sink.write(&EventRecord {
                tick: SimTick(chunks as u64),
                kind: "ChunkChecked",
                payload: &format!("{coord} biome={:?} objects={}", chunk.biome(), objects.len()),
            })
            .expect("write chunk");
        }
    }

    assert!(metrics.objects_placed > 0, "no objects placed in the region");
    metrics.avg_objects_per_chunk = metrics.objects_placed as f64 / chunks as f64;

    println!("  Chunks: {chunks}");
    println!("  Objects: {} ({} trees)", metrics.objects_placed, metrics.trees);
    println!("  Checks: {checks}");

    let report = MetricsReportBuilder::new("placement_worldtest")
        .result(TestResult::Pass)
        .seed(WORLD_SEED)
        .placement(metrics)
        .execution(TestExecutionMetrics {
            duration_seconds: test_start.elapsed().as_secs_f64(),
            ticks: None,
            assertions_checked: Some(checks),
        })
        .build();
    let metrics_path = std::env::temp_dir().join("tileworld_placement_worldtest_metrics.json");
    MetricsSink::create(&metrics_path)
        .and_then(|sink| sink.write(&report))
        .expect("write metrics");

    println!("Total test time: {}ms", test_start.elapsed().as_millis());
    println!("Event log: {}", output_path.display());
    println!("=== Test PASSED ===\n");
}
