use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};
use tileworld_world::WorldConfig;
use tracing::warn;

use crate::scripted_path::PathStep;

pub const DEFAULT_CONFIG_PATH: &str = "config/tileworld.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Ticks to simulate.
    pub ticks: u64,
    /// Seconds per tick.
    pub tick_secs: f32,
    /// Region files go here; an ephemeral directory is used when unset.
    pub save_dir: Option<PathBuf>,
    /// Optional biome table JSON replacing the built-in table.
    pub biomes_file: Option<PathBuf>,
    /// Player route; an empty list walks the built-in loop.
    pub path: Vec<PathStep>,
    pub world: WorldConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            ticks: 1200,
            tick_secs: 1.0 / 20.0,
            save_dir: None,
            biomes_file: None,
            path: Vec::new(),
            world: WorldConfig::default(),
        }
    }
}

impl DriverConfig {
    /// Load configuration from the default path.
    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<DriverConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    DriverConfig::default()
                }
            },
            Err(err) => {
                if path != Path::new(DEFAULT_CONFIG_PATH)
                    || err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                } else {
                    warn!("Config not found at {}. Using defaults", path.display());
                }
                DriverConfig::default()
            }
        }
    }
}
