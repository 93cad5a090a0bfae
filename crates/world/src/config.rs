//! Tunables for every world subsystem.
//!
//! All structs deserialize with `#[serde(default)]`, so a config file only
//! needs the keys it wants to override.

use serde::{Deserialize, Serialize};

use crate::biome::BiomeId;

/// Which side of a networked session this world runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkRole {
    #[default]
    Singleplayer,
    /// Hosts the session and emits synchronization events.
    Authoritative,
    /// Receives chunks and creatures from a remote authority.
    Client,
}

impl NetworkRole {
    pub fn is_client(self) -> bool {
        matches!(self, NetworkRole::Client)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TerrainOptions {
    /// Overrides the per-chunk mountain layer roll. `Some(0)` forces flat terrain.
    pub forced_mountain_layers: Option<u8>,
    /// Probability that a mountainous chunk gets a cave entrance.
    pub cave_chance: f64,
    /// Pin every tile to one biome instead of the climate field.
    pub fixed_biome: Option<BiomeId>,
    /// Noise level above which pond water forms.
    pub pond_threshold: f64,
}

impl Default for TerrainOptions {
    fn default() -> Self {
        Self {
            forced_mountain_layers: None,
            cave_chance: 0.025,
            fixed_biome: None,
            pond_threshold: 0.66,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Scales the tree attempt count.
    pub tree_density: f32,
    /// Candidate positions tried per tree attempt.
    pub tree_candidate_tries: usize,
    /// Tiles kept clear of trees along the chunk border.
    pub edge_buffer: usize,
    /// Base centre spacing between trees, in tiles.
    pub tree_base_spacing: f32,
    pub foliage_density: f32,
    pub decor_density: f32,
    /// Chance a valid foliage candidate is kept.
    pub foliage_acceptance: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            tree_density: 0.6,
            tree_candidate_tries: 15,
            edge_buffer: 1,
            tree_base_spacing: 2.0,
            foliage_density: 0.4,
            decor_density: 0.35,
            foliage_acceptance: 0.65,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub check_interval_secs: f32,
    /// Chance a check attempts to spawn at all.
    pub base_chance: f32,
    pub attempts: usize,
    /// Inner radius of the spawn annulus, in tiles.
    pub min_distance_tiles: f32,
    /// Outer radius of the spawn annulus, in tiles.
    pub max_distance_tiles: f32,
    /// Chunks around the player considered for spawning.
    pub loaded_radius_chunks: i32,
    pub max_per_chunk: usize,
    pub min_spacing_tiles: f32,
    pub pack_chance: f32,
    pub pack_min: usize,
    pub pack_max: usize,
    pub pack_radius_tiles: f32,
    pub lifetime_secs: f32,
    /// Distance from the origin per extra creature level, in tiles.
    pub level_distance_tiles: f32,
    pub level_variance: i32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 2.5,
            base_chance: 0.25,
            attempts: 10,
            min_distance_tiles: 5.0,
            max_distance_tiles: 15.0,
            loaded_radius_chunks: 1,
            max_per_chunk: 4,
            min_spacing_tiles: 2.0,
            pack_chance: 0.15,
            pack_min: 2,
            pack_max: 5,
            pack_radius_tiles: 2.5,
            lifetime_secs: 120.0,
            level_distance_tiles: 50.0,
            level_variance: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Chunks within this radius of the player are wanted.
    pub interest_radius: i32,
    /// Extra radius before a loaded chunk is evicted.
    pub hysteresis: i32,
    pub max_requests_per_tick: usize,
    /// Wall-clock budget for submitting requests each tick.
    pub tick_budget_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            interest_radius: 3,
            hysteresis: 1,
            max_requests_per_tick: 8,
            tick_budget_ms: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Real seconds per in-game minute.
    pub seconds_per_game_minute: f64,
    pub start_hour: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            seconds_per_game_minute: 0.5,
            start_hour: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorldConfig {
    pub seed: u64,
    /// Background generation threads.
    pub workers: usize,
    pub role: NetworkRole,
    pub terrain: TerrainOptions,
    pub placement: PlacementConfig,
    pub spawn: SpawnConfig,
    pub streaming: StreamingConfig,
    pub clock: ClockConfig,
    /// Lifetime of non-permanent objects such as item balls.
    pub object_lifetime_secs: f64,
    /// Evicted clean chunks kept in memory for quick reloads.
    pub hot_cache_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            workers: 4,
            role: NetworkRole::Singleplayer,
            terrain: TerrainOptions::default(),
            placement: PlacementConfig::default(),
            spawn: SpawnConfig::default(),
            streaming: StreamingConfig::default(),
            clock: ClockConfig::default(),
            object_lifetime_secs: 300.0,
            hot_cache_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: WorldConfig =
            serde_json::from_str(r#"{"seed": 7, "spawn": {"pack_chance": 1.0}, "role": "client"}"#)
                .unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.role, NetworkRole::Client);
        assert_eq!(cfg.spawn.pack_chance, 1.0);
        assert_eq!(cfg.spawn.max_per_chunk, 4);
        assert_eq!(cfg.streaming, StreamingConfig::default());
    }

    #[test]
    fn fixed_biome_is_optional() {
        let opts: TerrainOptions =
            serde_json::from_str(r#"{"fixed_biome": "Desert", "forced_mountain_layers": 0}"#)
                .unwrap();
        assert_eq!(opts.fixed_biome, Some(BiomeId::Desert));
        assert_eq!(opts.forced_mountain_layers, Some(0));
        assert_eq!(opts.cave_chance, 0.025);
    }
}
