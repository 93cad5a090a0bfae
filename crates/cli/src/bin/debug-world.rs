//! Debug World Tool
//!
//! Visualizes and measures world generation without running a full world.
//!
//! Usage:
//!   debug-world tiles --seed 12345 --chunk 0,0
//!   debug-world bands --seed 12345 --chunk 3,-1 --layers 3
//!   debug-world biomes --seed 12345 --region -4,-4,4,4
//!   debug-world stats --seed 12345 --region -3,-3,3,3 --output target/world_stats.json

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tileworld_testkit::{
    MetricsReportBuilder, MetricsSink, PlacementMetrics, TerrainMetrics, TestExecutionMetrics,
};
use tileworld_world::{
    BiomeId, BiomeSource, BiomeTable, ChunkCoord, ChunkPipeline, WorldConfig, CHUNK_SIZE,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect tileworld generation", long_about = None)]
struct Cli {
    /// World seed
    #[arg(long, global = true, default_value_t = 12345)]
    seed: u64,
    /// Biome table JSON; the built-in table is used when omitted
    #[arg(long, global = true)]
    biomes_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// ASCII tile map of one chunk
    Tiles(ChunkArgs),
    /// Elevation band map of one chunk
    Bands(ChunkArgs),
    /// Biome map of a chunk region
    Biomes {
        /// Chunk region as min_x,min_y,max_x,max_y
        #[arg(long, value_parser = parse_region, default_value = "-2,-2,2,2")]
        region: Region,
    },
    /// Generation and placement statistics
    Stats {
        /// Chunk region as min_x,min_y,max_x,max_y
        #[arg(long, value_parser = parse_region, default_value = "-2,-2,2,2")]
        region: Region,
        /// Write a JSON metrics report here
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct ChunkArgs {
    /// Chunk coordinate as x,y
    #[arg(long, value_parser = parse_coord, default_value = "0,0")]
    chunk: ChunkCoord,
    /// Force the number of mountain layers (0 for flat)
    #[arg(long)]
    layers: Option<u8>,
    /// Pin every tile to one biome, e.g. Desert
    #[arg(long, value_parser = parse_biome)]
    biome: Option<BiomeId>,
}

#[derive(Debug, Clone, Copy)]
struct Region {
    min: ChunkCoord,
    max: ChunkCoord,
}

impl Region {
    fn coords(self) -> impl Iterator<Item = ChunkCoord> {
        (self.min.y..=self.max.y)
            .flat_map(move |y| (self.min.x..=self.max.x).map(move |x| ChunkCoord::new(x, y)))
    }
}

fn parse_ints(raw: &str, expected: usize) -> Result<Vec<i32>, String> {
    let parts: Vec<i32> = raw
        .split(',')
        .map(|p| p.trim().parse::<i32>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<_, _>>()?;
    if parts.len() != expected {
        return Err(format!("expected {expected} comma-separated integers"));
    }
    Ok(parts)
}

fn parse_coord(raw: &str) -> Result<ChunkCoord, String> {
    let v = parse_ints(raw, 2)?;
    Ok(ChunkCoord::new(v[0], v[1]))
}

fn parse_region(raw: &str) -> Result<Region, String> {
    let v = parse_ints(raw, 4)?;
    if v[0] > v[2] || v[1] > v[3] {
        return Err("region min must not exceed max".to_string());
    }
    Ok(Region {
        min: ChunkCoord::new(v[0], v[1]),
        max: ChunkCoord::new(v[2], v[3]),
    })
}

fn parse_biome(raw: &str) -> Result<BiomeId, String> {
    BiomeId::all()
        .iter()
        .copied()
        .find(|id| format!("{id:?}").eq_ignore_ascii_case(raw))
        .ok_or_else(|| format!("unknown biome {raw:?}"))
}

fn load_table(path: Option<&PathBuf>) -> Result<Arc<BiomeTable>> {
    let Some(path) = path else {
        return Ok(Arc::new(BiomeTable::default()));
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read biome table {}", path.display()))?;
    let table = BiomeTable::from_json(&json)
        .with_context(|| format!("invalid biome table {}", path.display()))?;
    info!(path = %path.display(), biomes = table.iter().count(), "Loaded biome table");
    Ok(Arc::new(table))
}

fn pipeline(seed: u64, table: Arc<BiomeTable>, args: Option<&ChunkArgs>) -> ChunkPipeline {
    let mut config = WorldConfig {
        seed,
        ..WorldConfig::default()
    };
    if let Some(args) = args {
        config.terrain.forced_mountain_layers = args.layers;
        config.terrain.fixed_biome = args.biome;
    }
    ChunkPipeline::from_config(&config, table)
}

fn check_layers(args: &ChunkArgs) -> Result<()> {
    if args.layers.is_some_and(|l| l > 3) {
        bail!("at most 3 mountain layers are supported");
    }
    Ok(())
}

fn render_grid(cell: impl Fn(usize, usize) -> char) -> String {
    let mut out = String::with_capacity(CHUNK_SIZE * (CHUNK_SIZE + 1));
    for y in 0..CHUNK_SIZE {
        for x in 0..CHUNK_SIZE {
            out.push(cell(x, y));
        }
        out.push('\n');
    }
    out
}

fn print_tiles(seed: u64, table: Arc<BiomeTable>, args: &ChunkArgs) {
    let chunk = pipeline(seed, table, Some(args)).build(args.chunk);
    let (ox, oy) = args.chunk.origin_tile();
    println!(
        "Chunk {} biome {:?} ({} objects, seed {})",
        args.chunk,
        chunk.biome(),
        chunk.objects().len(),
        seed
    );
    let grid = render_grid(|x, y| {
        let (tx, ty) = (ox + x as i32, oy + y as i32);
        if chunk
            .objects()
            .iter()
            .any(|o| o.anchor_x == tx && o.anchor_y == ty && o.kind.is_tree())
        {
            'T'
        } else {
            chunk.tile(x, y).glyph()
        }
    });
    print!("{grid}");
}

fn print_bands(seed: u64, table: Arc<BiomeTable>, args: &ChunkArgs) {
    let chunk = pipeline(seed, table, Some(args)).build(args.chunk);
    println!("Chunk {} elevation bands (seed {})", args.chunk, seed);
    let grid = render_grid(|x, y| {
        char::from_digit(chunk.band(x, y) as u32, 10).unwrap_or('?')
    });
    print!("{grid}");
}

fn print_biomes(seed: u64, region: Region) {
    let source = BiomeSource::climate(seed);
    println!(
        "Biome map (seed {}) chunks {} to {}",
        seed, region.min, region.max
    );
    let (min_x, min_y) = region.min.origin_tile();
    let (end_x, end_y) = region.max.offset(1, 1).origin_tile();
    // One glyph per 2x2 tiles keeps wide regions readable.
    for ty in (min_y..end_y).step_by(2) {
        let row: String = (min_x..end_x)
            .step_by(2)
            .map(|tx| source.sample(tx, ty).primary.glyph())
            .collect();
        println!("{row}");
    }
    println!();
    for id in BiomeId::all() {
        println!("  {} = {:?}", id.glyph(), id);
    }
}

fn run_stats(seed: u64, table: Arc<BiomeTable>, region: Region, output: Option<PathBuf>) -> Result<()> {
    let started = Instant::now();
    let pipeline = pipeline(seed, Arc::clone(&table), None);

    let mut terrain = TerrainMetrics::default();
    let mut placement = PlacementMetrics::default();
    let mut gen_total_us = 0u128;
    let mut place_total_us = 0u128;

    for coord in region.coords() {
        let t0 = Instant::now();
        let chunk = pipeline.terrain().generate_chunk(coord);
        let gen_us = t0.elapsed().as_micros();

        let t1 = Instant::now();
        let objects = pipeline
            .placer()
            .place(&chunk, table.get(chunk.biome()));
        place_total_us += t1.elapsed().as_micros();
        debug!(chunk_pos = %coord, gen_us, objects = objects.len(), "Chunk measured");

        gen_total_us += gen_us;
        terrain.max_gen_time_us = terrain.max_gen_time_us.max(gen_us);
        terrain.chunks_generated += 1;
        if chunk.bands().cells().iter().any(|&b| b > 0) {
            terrain.mountain_chunks += 1;
        }
        terrain.water_tiles += chunk.tiles().cells().iter().filter(|t| t.is_water()).count();
        *terrain
            .biomes
            .entry(format!("{:?}", chunk.biome()))
            .or_insert(0) += 1;

        for object in &objects {
            placement.objects_placed += 1;
            if object.kind.is_tree() {
                placement.trees += 1;
            }
            *placement
                .by_kind
                .entry(format!("{:?}", object.kind))
                .or_insert(0) += 1;
        }
    }

    let chunks = terrain.chunks_generated.max(1) as f64;
    terrain.avg_gen_time_us = gen_total_us as f64 / chunks;
    terrain.chunks_per_second = if gen_total_us > 0 {
        chunks / (gen_total_us as f64 / 1_000_000.0)
    } else {
        0.0
    };
    placement.avg_objects_per_chunk = placement.objects_placed as f64 / chunks;
    placement.avg_place_time_us = place_total_us as f64 / chunks;

    println!("Seed {seed}, chunks {} to {}", region.min, region.max);
    println!("  chunks generated:   {}", terrain.chunks_generated);
    println!("  avg gen time:       {:.1} us", terrain.avg_gen_time_us);
    println!("  mountain chunks:    {}", terrain.mountain_chunks);
    println!("  water tiles:        {}", terrain.water_tiles);
    println!("  objects placed:     {} ({} trees)", placement.objects_placed, placement.trees);
    let mut ranked: BTreeMap<usize, Vec<&String>> = BTreeMap::new();
    for (name, count) in &terrain.biomes {
        ranked.entry(*count).or_default().push(name);
    }
    for (count, names) in ranked.iter().rev() {
        for name in names {
            println!("  biome {name:<12} {count}");
        }
    }

    if let Some(path) = output {
        let report = MetricsReportBuilder::new("debug_world_stats")
            .seed(seed)
            .terrain(terrain)
            .placement(placement)
            .execution(TestExecutionMetrics {
                duration_seconds: started.elapsed().as_secs_f64(),
                ..TestExecutionMetrics::default()
            })
            .build();
        MetricsSink::create(&path)?.write(&report)?;
        info!(path = %path.display(), "Metrics written");
    }
    Ok(())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let table = load_table(cli.biomes_file.as_ref())?;

    match cli.command {
        Command::Tiles(args) => {
            check_layers(&args)?;
            print_tiles(cli.seed, table, &args)
        }
        Command::Bands(args) => {
            check_layers(&args)?;
            print_bands(cli.seed, table, &args)
        }
        Command::Biomes { region } => print_biomes(cli.seed, region),
        Command::Stats { region, output } => run_stats(cli.seed, table, region, output)?,
    }
    Ok(())
}
