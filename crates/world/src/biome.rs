//! Biome system for terrain generation.
//!
//! A [`BiomeTable`] holds immutable per-biome rules: which tiles may appear,
//! their weighted distribution, the objects and creatures each biome hosts.
//! A [`BiomeSource`] maps world tiles to a [`BiomeTransition`] using
//! temperature and moisture noise.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::noise::{fold_seed, NoiseConfig, NoiseGenerator, SimplexGenerator};
use crate::object::ObjectKind;
use crate::tile::TileCode;
use crate::time::TimeOfDay;

/// Biome identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BiomeId {
    Plains,
    Forest,
    Snow,
    Desert,
    Haunted,
    RainForest,
    BigMountains,
    Ruins,
    Beach,
}

impl BiomeId {
    /// Get all biome IDs (for iteration).
    pub fn all() -> &'static [BiomeId] {
        &[
            BiomeId::Plains,
            BiomeId::Forest,
            BiomeId::Snow,
            BiomeId::Desert,
            BiomeId::Haunted,
            BiomeId::RainForest,
            BiomeId::BigMountains,
            BiomeId::Ruins,
            BiomeId::Beach,
        ]
    }

    /// Whether tiles of these two biomes may be mixed along a border.
    pub fn is_compatible_with(self, other: BiomeId) -> bool {
        use BiomeId::*;
        if self == other {
            return true;
        }
        matches!(
            (self, other),
            (Plains, Forest)
                | (Plains, Desert)
                | (Plains, Haunted)
                | (Forest, Plains)
                | (Forest, RainForest)
                | (Forest, Snow)
                | (Forest, Haunted)
                | (Desert, Plains)
                | (Snow, Forest)
                | (Snow, Haunted)
                | (Haunted, Plains)
                | (Haunted, Forest)
                | (Haunted, Snow)
                | (RainForest, Forest)
        )
    }

    /// Single character used by the debug tooling.
    pub fn glyph(self) -> char {
        match self {
            BiomeId::Plains => 'P',
            BiomeId::Forest => 'F',
            BiomeId::Snow => 'S',
            BiomeId::Desert => 'D',
            BiomeId::Haunted => 'H',
            BiomeId::RainForest => 'R',
            BiomeId::BigMountains => 'M',
            BiomeId::Ruins => 'U',
            BiomeId::Beach => 'B',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileWeight {
    pub tile: TileCode,
    pub weight: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectWeight {
    pub kind: ObjectKind,
    /// Per-tile spawn chance.
    pub chance: f32,
}

/// Species names by time of day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatureTable {
    #[serde(default)]
    pub day: Vec<String>,
    #[serde(default)]
    pub night: Vec<String>,
}

impl CreatureTable {
    pub fn for_time(&self, time: TimeOfDay) -> &[String] {
        match time {
            TimeOfDay::Day => &self.day,
            TimeOfDay::Night => &self.night,
        }
    }
}

/// Immutable rules for one biome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Biome {
    pub id: BiomeId,
    pub name: String,
    #[serde(default)]
    pub allowed_tiles: Vec<TileCode>,
    pub tile_weights: Vec<TileWeight>,
    #[serde(default)]
    pub objects: Vec<ObjectWeight>,
    #[serde(default)]
    pub creatures: CreatureTable,
    #[serde(default = "default_temperature")]
    pub base_temperature: f32,
    /// Probability that a chunk of this biome raises mountains.
    #[serde(default)]
    pub mountain_chance: f32,
    /// Whether ponds may form.
    #[serde(default)]
    pub water_features: bool,
}

fn default_temperature() -> f32 {
    0.5
}

impl Biome {
    /// Map a roll in `[0, 1]` onto the cumulative tile distribution.
    pub fn pick_tile(&self, roll: f64) -> TileCode {
        let total: f64 = self.tile_weights.iter().map(|w| w.weight as f64).sum();
        let target = roll.clamp(0.0, 1.0) * total;
        let mut cumulative = 0.0;
        for entry in &self.tile_weights {
            cumulative += entry.weight as f64;
            if target < cumulative {
                return entry.tile;
            }
        }
        self.tile_weights
            .last()
            .map(|w| w.tile)
            .unwrap_or(TileCode::Grass)
    }

    pub fn allows(&self, tile: TileCode) -> bool {
        self.allowed_tiles.contains(&tile)
    }

    /// Most common plain ground tile of this biome.
    pub fn ground_tile(&self) -> TileCode {
        self.tile_weights
            .iter()
            .filter(|w| w.tile.is_grass())
            .max_by(|a, b| a.weight.total_cmp(&b.weight))
            .or_else(|| self.tile_weights.first())
            .map(|w| w.tile)
            .unwrap_or(TileCode::Grass)
    }

    /// Decorative tiles this biome allows, in distribution order.
    pub fn decorations(&self) -> Vec<TileCode> {
        self.allowed_tiles
            .iter()
            .copied()
            .filter(|t| t.is_decoration())
            .collect()
    }

    pub fn object_chance(&self, kind: ObjectKind) -> f32 {
        self.objects
            .iter()
            .find(|o| o.kind == kind)
            .map(|o| o.chance)
            .unwrap_or(0.0)
    }

    fn normalize(&mut self) -> Result<(), BiomeTableError> {
        self.tile_weights.retain(|w| w.weight > 0.0);
        let total: f32 = self.tile_weights.iter().map(|w| w.weight).sum();
        if self.tile_weights.is_empty() || total <= 0.0 {
            return Err(BiomeTableError::EmptyDistribution(self.id));
        }
        for entry in &mut self.tile_weights {
            entry.weight = entry.weight / total * 100.0;
        }
        for entry in &self.tile_weights {
            if !self.allowed_tiles.contains(&entry.tile) {
                self.allowed_tiles.push(entry.tile);
            }
        }
        self.objects.retain(|o| o.chance > 0.0);
        Ok(())
    }
}

/// Errors raised while loading a biome table.
#[derive(Debug, Error)]
pub enum BiomeTableError {
    #[error("failed to parse biome table: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("biome {0:?} has no positive tile weights")]
    EmptyDistribution(BiomeId),
    #[error("biome {0:?} is defined twice")]
    DuplicateBiome(BiomeId),
    #[error("biome table lacks the fallback biome {0:?}")]
    MissingDefault(BiomeId),
}

/// Lookup from [`BiomeId`] to its rules.
#[derive(Debug, Clone)]
pub struct BiomeTable {
    biomes: BTreeMap<BiomeId, Biome>,
    fallback: BiomeId,
}

impl BiomeTable {
    pub const FALLBACK: BiomeId = BiomeId::Plains;

    /// Build a table from explicit biome rules.
    pub fn from_biomes(biomes: Vec<Biome>) -> Result<Self, BiomeTableError> {
        let mut map = BTreeMap::new();
        for mut biome in biomes {
            biome.normalize()?;
            let id = biome.id;
            if map.insert(id, biome).is_some() {
                return Err(BiomeTableError::DuplicateBiome(id));
            }
        }
        if !map.contains_key(&Self::FALLBACK) {
            return Err(BiomeTableError::MissingDefault(Self::FALLBACK));
        }
        Ok(Self {
            biomes: map,
            fallback: Self::FALLBACK,
        })
    }

    /// Parse a JSON array of biomes. Weights are normalized to 100.
    pub fn from_json(json: &str) -> Result<Self, BiomeTableError> {
        let biomes: Vec<Biome> = serde_json::from_str(json)?;
        Self::from_biomes(biomes)
    }

    pub fn to_json(&self) -> Result<String, BiomeTableError> {
        let biomes: Vec<&Biome> = self.biomes.values().collect();
        Ok(serde_json::to_string_pretty(&biomes)?)
    }

    /// Rules for `id`, or the fallback biome when the table lacks it.
    pub fn get(&self, id: BiomeId) -> &Biome {
        match self.biomes.get(&id) {
            Some(biome) => biome,
            None => {
                tracing::debug!(?id, fallback = ?self.fallback, "Unknown biome, using fallback");
                &self.biomes[&self.fallback]
            }
        }
    }

    pub fn contains(&self, id: BiomeId) -> bool {
        self.biomes.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Biome> {
        self.biomes.values()
    }
}

impl Default for BiomeTable {
    fn default() -> Self {
        let biomes = builtin_biomes()
            .into_iter()
            .map(|mut b| {
                let _ = b.normalize();
                (b.id, b)
            })
            .collect();
        Self {
            biomes,
            fallback: Self::FALLBACK,
        }
    }
}

fn weights(entries: &[(TileCode, f32)]) -> Vec<TileWeight> {
    entries
        .iter()
        .map(|&(tile, weight)| TileWeight { tile, weight })
        .collect()
}

fn objects(entries: &[(ObjectKind, f32)]) -> Vec<ObjectWeight> {
    entries
        .iter()
        .map(|&(kind, chance)| ObjectWeight { kind, chance })
        .collect()
}

fn species(day: &[&str], night: &[&str]) -> CreatureTable {
    CreatureTable {
        day: day.iter().map(|s| s.to_string()).collect(),
        night: night.iter().map(|s| s.to_string()).collect(),
    }
}

fn builtin_biomes() -> Vec<Biome> {
    use ObjectKind as O;
    use TileCode as T;

    vec![
        Biome {
            id: BiomeId::Plains,
            name: "Plains".into(),
            allowed_tiles: Vec::new(),
            tile_weights: weights(&[
                (T::Grass, 55.0),
                (T::Grass2, 20.0),
                (T::Grass3, 10.0),
                (T::TallGrass, 8.0),
                (T::Flower, 4.0),
                (T::Flower2, 3.0),
            ]),
            objects: objects(&[
                (O::Tree, 0.08),
                (O::TreeAlt, 0.04),
                (O::CherryTree, 0.02),
                (O::Bush, 0.05),
                (O::Sunflower, 0.04),
                (O::TallGrass, 0.35),
                (O::ItemBall, 0.01),
            ]),
            creatures: species(
                &["pidgey", "rattata", "sentret", "bidoof"],
                &["hoothoot", "zubat", "oddish"],
            ),
            base_temperature: 0.5,
            mountain_chance: 0.25,
            water_features: false,
        },
        Biome {
            id: BiomeId::Forest,
            name: "Forest".into(),
            allowed_tiles: Vec::new(),
            tile_weights: weights(&[
                (T::ForestGrass, 60.0),
                (T::Grass, 20.0),
                (T::ForestTallGrass, 12.0),
                (T::Flower, 5.0),
                (T::Grass2, 3.0),
            ]),
            objects: objects(&[
                (O::Tree, 0.25),
                (O::TreeAlt, 0.15),
                (O::ApricornTree, 0.03),
                (O::Bush, 0.08),
                (O::Vines, 0.05),
                (O::ForestTallGrass, 0.4),
                (O::ItemBall, 0.01),
            ]),
            creatures: species(
                &["caterpie", "weedle", "pidgey", "pikachu"],
                &["hoothoot", "gastly", "spinarak"],
            ),
            base_temperature: 0.5,
            mountain_chance: 0.2,
            water_features: true,
        },
        Biome {
            id: BiomeId::Snow,
            name: "Snow".into(),
            allowed_tiles: Vec::new(),
            tile_weights: weights(&[
                (T::Snow, 55.0),
                (T::Snow2, 15.0),
                (T::SnowyGrass, 20.0),
                (T::SnowTallGrass, 10.0),
            ]),
            objects: objects(&[
                (O::SnowTree, 0.2),
                (O::DeadTree, 0.03),
                (O::SnowTallGrass, 0.25),
            ]),
            creatures: species(&["snover", "swinub", "snorunt"], &["sneasel", "snorunt"]),
            base_temperature: 0.1,
            mountain_chance: 0.4,
            water_features: false,
        },
        Biome {
            id: BiomeId::Desert,
            name: "Desert".into(),
            allowed_tiles: Vec::new(),
            tile_weights: weights(&[
                (T::DesertSand, 65.0),
                (T::Sand, 15.0),
                (T::DesertGrass, 15.0),
                (T::DesertRock, 5.0),
            ]),
            objects: objects(&[
                (O::Cactus, 0.12),
                (O::DeadTree, 0.04),
                (O::DesertTallGrass, 0.15),
            ]),
            creatures: species(&["sandshrew", "trapinch", "cacnea"], &["sandile", "zubat"]),
            base_temperature: 0.9,
            mountain_chance: 0.3,
            water_features: false,
        },
        Biome {
            id: BiomeId::Haunted,
            name: "Haunted".into(),
            allowed_tiles: Vec::new(),
            tile_weights: weights(&[
                (T::HauntedGrass, 60.0),
                (T::HauntedTallGrass, 15.0),
                (T::HauntedShroom, 10.0),
                (T::Grass3, 15.0),
            ]),
            objects: objects(&[
                (O::HauntedTree, 0.2),
                (O::SmallHauntedTree, 0.08),
                (O::HauntedTallGrass, 0.3),
            ]),
            creatures: species(
                &["misdreavus", "murkrow"],
                &["gastly", "haunter", "duskull", "misdreavus"],
            ),
            base_temperature: 0.4,
            mountain_chance: 0.15,
            water_features: false,
        },
        Biome {
            id: BiomeId::RainForest,
            name: "Rain Forest".into(),
            allowed_tiles: Vec::new(),
            tile_weights: weights(&[
                (T::RainForestGrass, 60.0),
                (T::RainForestTallGrass, 15.0),
                (T::RainForestFlower, 8.0),
                (T::ForestGrass, 17.0),
            ]),
            objects: objects(&[
                (O::RainTree, 0.28),
                (O::ApricornTree, 0.02),
                (O::Vines, 0.1),
                (O::Bush, 0.05),
                (O::RainTallGrass, 0.4),
            ]),
            creatures: species(&["tropius", "treecko", "paras"], &["oddish", "venonat"]),
            base_temperature: 0.75,
            mountain_chance: 0.1,
            water_features: true,
        },
        Biome {
            id: BiomeId::BigMountains,
            name: "Big Mountains".into(),
            allowed_tiles: Vec::new(),
            tile_weights: weights(&[
                (T::Grass, 45.0),
                (T::Grass3, 25.0),
                (T::SnowyGrass, 20.0),
                (T::Rock, 10.0),
            ]),
            objects: objects(&[
                (O::SnowTree, 0.05),
                (O::Tree, 0.05),
                (O::Bush, 0.03),
                (O::TallGrass, 0.2),
            ]),
            creatures: species(&["geodude", "onix", "machop"], &["zubat", "geodude"]),
            base_temperature: 0.3,
            mountain_chance: 0.9,
            water_features: false,
        },
        Biome {
            id: BiomeId::Ruins,
            name: "Ruins".into(),
            allowed_tiles: Vec::new(),
            tile_weights: weights(&[
                (T::RuinsGrass, 55.0),
                (T::RuinsBricks, 15.0),
                (T::RuinsTallGrass, 15.0),
                (T::Grass, 15.0),
            ]),
            objects: objects(&[
                (O::RuinsTree, 0.1),
                (O::RuinPole, 0.05),
                (O::RuinsTallGrass, 0.3),
                (O::ItemBall, 0.02),
            ]),
            creatures: species(&["unown", "bronzor"], &["unown", "gastly"]),
            base_temperature: 0.5,
            mountain_chance: 0.1,
            water_features: false,
        },
        Biome {
            id: BiomeId::Beach,
            name: "Beach".into(),
            allowed_tiles: Vec::new(),
            tile_weights: weights(&[
                (T::BeachSand, 60.0),
                (T::BeachGrass, 15.0),
                (T::BeachShell, 5.0),
                (T::Water, 20.0),
            ]),
            objects: objects(&[(O::BeachTree, 0.08), (O::ItemBall, 0.01)]),
            creatures: species(&["wingull", "krabby", "staryu"], &["staryu", "shellder"]),
            base_temperature: 0.7,
            mountain_chance: 0.0,
            water_features: false,
        },
    ]
}

/// Biome assignment of one tile during generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiomeTransition {
    pub primary: BiomeId,
    pub secondary: Option<BiomeId>,
    /// 1.0 is pure primary; lower values lean towards the secondary.
    pub blend: f32,
}

impl BiomeTransition {
    pub fn pure(primary: BiomeId) -> Self {
        Self {
            primary,
            secondary: None,
            blend: 1.0,
        }
    }

    /// Mixing only matters when a secondary exists and the blend is not saturated.
    pub fn is_mixing(&self) -> bool {
        self.secondary.is_some() && self.blend < 0.95
    }

    /// Chance that a tile draws from the secondary distribution.
    pub fn secondary_probability(&self) -> f64 {
        if self.is_mixing() {
            (1.0 - self.blend as f64) * 0.5
        } else {
            0.0
        }
    }
}

const COLD: f64 = 0.35;
const HOT: f64 = 0.65;
const DRY: f64 = 0.35;
const WET: f64 = 0.65;
/// Climate distance from a threshold over which borders blend.
const TRANSITION_WIDTH: f64 = 0.06;
/// World-tile displacement of the climate lookup.
const WARP_STRENGTH: f64 = 40.0;
/// Offsets probed to find the neighbouring biome across a border.
const PROBE_OFFSETS: [(f64, f64); 2] = [(100.0, 100.0), (200.0, -250.0)];

/// Temperature and moisture noise with domain warp.
pub struct ClimateField {
    temperature: NoiseGenerator,
    moisture: NoiseGenerator,
    warp_x: SimplexGenerator,
    warp_y: SimplexGenerator,
    variety: NoiseGenerator,
}

impl ClimateField {
    pub fn new(world_seed: u64) -> Self {
        let seed = fold_seed(world_seed);
        Self {
            temperature: NoiseGenerator::new(NoiseConfig::temperature(seed)),
            moisture: NoiseGenerator::new(NoiseConfig::moisture(seed)),
            warp_x: SimplexGenerator::new(NoiseConfig::warp(seed)),
            warp_y: SimplexGenerator::new(NoiseConfig::warp(seed.wrapping_add(1))),
            variety: NoiseGenerator::new(NoiseConfig::variety(seed)),
        }
    }

    /// `(temperature, moisture)` in `[0, 1]` at a world tile.
    pub fn climate(&self, x: f64, y: f64) -> (f64, f64) {
        let wx = x + self.warp_x.sample_2d(x, y) * WARP_STRENGTH;
        let wy = y + self.warp_y.sample_2d(x, y) * WARP_STRENGTH;
        (
            stretch(self.temperature.sample_2d(wx, wy)),
            stretch(self.moisture.sample_2d(wx, wy)),
        )
    }

    fn classify(&self, x: f64, y: f64, temperature: f64, moisture: f64) -> BiomeId {
        let variety = self.variety.sample_unit(x, y);

        if variety > 0.8 && temperature < 0.6 {
            return BiomeId::BigMountains;
        }
        let moderate = |v: f64| (0.42..0.58).contains(&v);
        if moderate(temperature) && moderate(moisture) && variety < 0.15 {
            return BiomeId::Ruins;
        }

        if temperature < COLD {
            if moisture < DRY && variety > 0.5 {
                BiomeId::Haunted
            } else {
                BiomeId::Snow
            }
        } else if temperature > HOT {
            if moisture < DRY {
                BiomeId::Desert
            } else if moisture > WET {
                BiomeId::RainForest
            } else if variety > 0.65 {
                BiomeId::Beach
            } else {
                BiomeId::Plains
            }
        } else if moisture > WET {
            BiomeId::Forest
        } else if moisture < DRY {
            if variety > 0.6 {
                BiomeId::Haunted
            } else {
                BiomeId::Plains
            }
        } else if variety > 0.55 {
            BiomeId::Forest
        } else {
            BiomeId::Plains
        }
    }

    /// Biome at a world tile, ignoring transitions.
    pub fn biome_at(&self, x: f64, y: f64) -> BiomeId {
        let (t, m) = self.climate(x, y);
        self.classify(x, y, t, m)
    }

    pub fn sample(&self, x: f64, y: f64) -> BiomeTransition {
        let (t, m) = self.climate(x, y);
        let primary = self.classify(x, y, t, m);

        let border_distance = [COLD, HOT]
            .iter()
            .map(|th| (t - th).abs())
            .chain([DRY, WET].iter().map(|th| (m - th).abs()))
            .fold(f64::MAX, f64::min);
        if border_distance >= TRANSITION_WIDTH {
            return BiomeTransition::pure(primary);
        }

        let secondary = PROBE_OFFSETS.iter().find_map(|&(dx, dy)| {
            let (px, py) = (x + dx, y + dy);
            let (pt, pm) = self.climate(px, py);
            let candidate = self.classify(px, py, pt, pm);
            (candidate != primary && primary.is_compatible_with(candidate)).then_some(candidate)
        });

        match secondary {
            Some(secondary) => BiomeTransition {
                primary,
                secondary: Some(secondary),
                blend: (border_distance / TRANSITION_WIDTH).clamp(0.0, 1.0) as f32,
            },
            None => BiomeTransition::pure(primary),
        }
    }
}

fn stretch(raw: f64) -> f64 {
    (raw * 0.75 + 0.5).clamp(0.0, 1.0)
}

/// Where the generator gets per-tile biome assignments from.
pub enum BiomeSource {
    Climate(ClimateField),
    /// Every tile belongs to one biome. Used by tools and tests.
    Fixed(BiomeId),
}

impl BiomeSource {
    pub fn climate(world_seed: u64) -> Self {
        BiomeSource::Climate(ClimateField::new(world_seed))
    }

    pub fn sample(&self, tile_x: i32, tile_y: i32) -> BiomeTransition {
        match self {
            BiomeSource::Climate(field) => field.sample(tile_x as f64, tile_y as f64),
            BiomeSource::Fixed(id) => BiomeTransition::pure(*id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_normalized() {
        let table = BiomeTable::default();
        for id in BiomeId::all() {
            let biome = table.get(*id);
            let total: f32 = biome.tile_weights.iter().map(|w| w.weight).sum();
            assert!((total - 100.0).abs() < 0.01, "{:?} sums to {}", id, total);
            for w in &biome.tile_weights {
                assert!(biome.allows(w.tile));
            }
        }
    }

    #[test]
    fn pick_tile_covers_distribution() {
        let table = BiomeTable::default();
        let plains = table.get(BiomeId::Plains);
        assert_eq!(plains.pick_tile(0.0), TileCode::Grass);
        assert_eq!(plains.pick_tile(0.999), TileCode::Flower2);
        assert_eq!(plains.pick_tile(1.0), TileCode::Flower2);
    }

    #[test]
    fn json_weights_are_normalized_and_allowed_set_completed() {
        let json = r#"[
            {"id": "Plains", "name": "Plains",
             "tile_weights": [{"tile": "Grass", "weight": 3}, {"tile": "Sand", "weight": 1}]}
        ]"#;
        let table = BiomeTable::from_json(json).unwrap();
        let plains = table.get(BiomeId::Plains);
        assert!((plains.tile_weights[0].weight - 75.0).abs() < 1e-4);
        assert!(plains.allows(TileCode::Sand));
        // Missing biomes fall back.
        assert_eq!(table.get(BiomeId::Desert).id, BiomeId::Plains);
    }

    #[test]
    fn json_errors_are_reported() {
        let empty = r#"[{"id": "Plains", "name": "P", "tile_weights": []}]"#;
        assert!(matches!(
            BiomeTable::from_json(empty),
            Err(BiomeTableError::EmptyDistribution(BiomeId::Plains))
        ));

        let no_default = r#"[{"id": "Snow", "name": "S", "tile_weights": [{"tile": "Snow", "weight": 1}]}]"#;
        assert!(matches!(
            BiomeTable::from_json(no_default),
            Err(BiomeTableError::MissingDefault(_))
        ));

        assert!(matches!(
            BiomeTable::from_json("not json"),
            Err(BiomeTableError::Parse(_))
        ));
    }

    #[test]
    fn table_json_roundtrip() {
        let table = BiomeTable::default();
        let json = table.to_json().unwrap();
        let back = BiomeTable::from_json(&json).unwrap();
        for id in BiomeId::all() {
            let (a, b) = (table.get(*id), back.get(*id));
            assert_eq!(a.id, b.id);
            assert_eq!(a.allowed_tiles, b.allowed_tiles);
            assert_eq!(a.objects, b.objects);
            assert_eq!(a.creatures, b.creatures);
            for (wa, wb) in a.tile_weights.iter().zip(&b.tile_weights) {
                assert_eq!(wa.tile, wb.tile);
                assert!((wa.weight - wb.weight).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn compatibility_is_symmetric_and_excludes_desert_snow() {
        for a in BiomeId::all() {
            for b in BiomeId::all() {
                assert_eq!(a.is_compatible_with(*b), b.is_compatible_with(*a));
            }
        }
        assert!(!BiomeId::Desert.is_compatible_with(BiomeId::Snow));
        assert!(BiomeId::Desert.is_compatible_with(BiomeId::Plains));
    }

    #[test]
    fn transitions_only_pair_compatible_biomes() {
        let field = ClimateField::new(1234);
        for x in (-600..600).step_by(37) {
            for y in (-600..600).step_by(41) {
                let t = field.sample(x as f64, y as f64);
                assert!((0.0..=1.0).contains(&t.blend));
                if let Some(secondary) = t.secondary {
                    assert!(t.primary.is_compatible_with(secondary));
                    assert_ne!(t.primary, secondary);
                }
            }
        }
    }

    #[test]
    fn climate_field_is_deterministic() {
        let a = ClimateField::new(77);
        let b = ClimateField::new(77);
        for x in -20..20 {
            assert_eq!(
                a.biome_at(x as f64 * 13.0, 5.0),
                b.biome_at(x as f64 * 13.0, 5.0)
            );
        }
    }

    #[test]
    fn fixed_source_never_mixes() {
        let source = BiomeSource::Fixed(BiomeId::Desert);
        let t = source.sample(10, -10);
        assert_eq!(t.primary, BiomeId::Desert);
        assert_eq!(t.secondary_probability(), 0.0);
    }
}
