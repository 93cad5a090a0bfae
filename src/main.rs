mod config;
mod headless;
mod scripted_path;

use anyhow::Result;
use std::env;
use std::path::PathBuf;
use tracing::info;

use crate::config::DriverConfig;
use crate::headless::HeadlessOptions;

fn main() -> Result<()> {
    // WARN by default; RUST_LOG overrides.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    info!("Starting tileworld v{}", env!("CARGO_PKG_VERSION"));

    let cli = CliOptions::parse(env::args().skip(1));
    let mut config = match &cli.config {
        Some(path) => DriverConfig::load_from_path(path),
        None => DriverConfig::load(),
    };
    if let Some(seed) = cli.world_seed {
        config.world.seed = seed;
    }
    if let Some(ticks) = cli.max_ticks {
        config.ticks = ticks;
    }
    if let Some(dir) = cli.save_dir {
        config.save_dir = Some(dir);
    }
    if cli.no_save {
        config.save_dir = None;
    }

    headless::run(HeadlessOptions {
        config,
        scripted_path: cli.scripted_path,
        reset_world: cli.reset_world,
        events_log: cli.events_log,
        metrics_out: cli.metrics_out,
    })
}

#[derive(Debug, Default)]
struct CliOptions {
    config: Option<PathBuf>,
    save_dir: Option<PathBuf>,
    no_save: bool,
    reset_world: bool,
    world_seed: Option<u64>,
    max_ticks: Option<u64>,
    scripted_path: Option<PathBuf>,
    events_log: Option<PathBuf>,
    metrics_out: Option<PathBuf>,
}

impl CliOptions {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Self {
        let mut opts = CliOptions::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => opts.config = next_path(&mut args, "--config"),
                "--save-dir" => opts.save_dir = next_path(&mut args, "--save-dir"),
                "--no-save" => opts.no_save = true,
                "--reset-world" => opts.reset_world = true,
                "--world-seed" => opts.world_seed = next_number(&mut args, "--world-seed"),
                "--max-ticks" => opts.max_ticks = next_number(&mut args, "--max-ticks"),
                "--scripted-path" => {
                    opts.scripted_path = next_path(&mut args, "--scripted-path")
                }
                "--events-log" => opts.events_log = next_path(&mut args, "--events-log"),
                "--metrics" => opts.metrics_out = next_path(&mut args, "--metrics"),
                other => tracing::warn!(arg = %other, "Ignoring unknown argument"),
            }
        }
        opts
    }
}

fn next_path<I: Iterator<Item = String>>(args: &mut I, flag: &str) -> Option<PathBuf> {
    let path = args.next().map(PathBuf::from);
    if path.is_none() {
        tracing::error!("{flag} requires a path");
    }
    path
}

fn next_number<I: Iterator<Item = String>>(args: &mut I, flag: &str) -> Option<u64> {
    let Some(raw) = args.next() else {
        tracing::error!("{flag} requires an integer");
        return None;
    };
    match raw.parse::<u64>() {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::error!(%err, value = %raw, "{flag} must be an integer");
            None
        }
    }
}
