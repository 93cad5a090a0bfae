//! Noise generation utilities for terrain generation.
//!
//! Provides deterministic noise functions for climate, tile selection,
//! mountain elevation and water masks. All coordinates are world tiles.

use noise::{NoiseFn, Perlin, Simplex};

/// Configuration for multi-octave noise generation.
#[derive(Debug, Clone)]
pub struct NoiseConfig {
    /// Number of octaves (layers of detail)
    pub octaves: u32,
    /// Frequency multiplier between octaves
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves (persistence)
    pub persistence: f64,
    /// Base frequency (scale)
    pub frequency: f64,
    /// Seed for deterministic generation
    pub seed: u32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            frequency: 1.0,
            seed: 0,
        }
    }
}

/// Fold a 64-bit world seed into the 32 bits the noise crate accepts.
pub fn fold_seed(world_seed: u64) -> u32 {
    (world_seed ^ (world_seed >> 32)) as u32
}

impl NoiseConfig {
    /// Temperature field for biome assignment.
    pub fn temperature(seed: u32) -> Self {
        Self {
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            frequency: 0.004,
            seed: seed.wrapping_add(3000),
        }
    }

    /// Moisture field for biome assignment.
    pub fn moisture(seed: u32) -> Self {
        Self {
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            frequency: 0.004,
            seed: seed.wrapping_add(4000),
        }
    }

    /// Low-frequency warp applied to climate lookups.
    pub fn warp(seed: u32) -> Self {
        Self {
            octaves: 2,
            lacunarity: 2.0,
            persistence: 0.5,
            frequency: 0.002,
            seed: seed.wrapping_add(5000),
        }
    }

    /// Variety noise that breaks up uniform climate bands.
    pub fn variety(seed: u32) -> Self {
        Self {
            octaves: 3,
            lacunarity: 2.2,
            persistence: 0.5,
            frequency: 0.01,
            seed: seed.wrapping_add(6000),
        }
    }

    /// Per-tile distribution sampling.
    pub fn tile_select(seed: u32) -> Self {
        Self {
            octaves: 2,
            lacunarity: 2.0,
            persistence: 0.5,
            frequency: 0.21,
            seed: seed.wrapping_add(7000),
        }
    }

    /// Decides primary vs secondary biome near borders.
    pub fn tile_blend(seed: u32) -> Self {
        Self {
            octaves: 2,
            lacunarity: 2.0,
            persistence: 0.5,
            frequency: 0.13,
            seed: seed.wrapping_add(8000),
        }
    }

    pub fn elevation_coarse(seed: u32) -> Self {
        Self {
            octaves: 2,
            lacunarity: 2.0,
            persistence: 0.5,
            frequency: 0.05,
            seed: seed.wrapping_add(9000),
        }
    }

    pub fn elevation_detail(seed: u32) -> Self {
        Self {
            octaves: 3,
            lacunarity: 2.3,
            persistence: 0.4,
            frequency: 0.18,
            seed: seed.wrapping_add(10_000),
        }
    }

    pub fn ridge(seed: u32) -> Self {
        Self {
            octaves: 2,
            lacunarity: 2.0,
            persistence: 0.5,
            frequency: 0.09,
            seed: seed.wrapping_add(11_000),
        }
    }

    /// Pond placement mask.
    pub fn pond(seed: u32) -> Self {
        Self {
            octaves: 3,
            lacunarity: 2.0,
            persistence: 0.5,
            frequency: 0.08,
            seed: seed.wrapping_add(12_000),
        }
    }
}

/// Noise generator using Perlin noise.
pub struct NoiseGenerator {
    perlin: Perlin,
    config: NoiseConfig,
}

impl NoiseGenerator {
    /// Create a new noise generator with the given configuration.
    pub fn new(config: NoiseConfig) -> Self {
        Self {
            perlin: Perlin::new(config.seed),
            config,
        }
    }

    /// Generate noise value at 2D coordinates with multi-octave sampling.
    ///
    /// Returns value in range [-1.0, 1.0].
    pub fn sample_2d(&self, x: f64, y: f64) -> f64 {
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.config.frequency;
        let mut max_value = 0.0;

        for _ in 0..self.config.octaves {
            value += self.perlin.get([x * frequency, y * frequency]) * amplitude;
            max_value += amplitude;

            amplitude *= self.config.persistence;
            frequency *= self.config.lacunarity;
        }

        (value / max_value).clamp(-1.0, 1.0)
    }

    /// Sample noise and map to a specific range.
    pub fn sample_2d_range(&self, x: f64, y: f64, min: f64, max: f64) -> f64 {
        let noise = self.sample_2d(x, y);
        (noise + 1.0) * 0.5 * (max - min) + min
    }

    /// Sample mapped onto [0.0, 1.0].
    pub fn sample_unit(&self, x: f64, y: f64) -> f64 {
        self.sample_2d_range(x, y, 0.0, 1.0)
    }
}

/// Simplex noise generator.
pub struct SimplexGenerator {
    simplex: Simplex,
    config: NoiseConfig,
}

impl SimplexGenerator {
    /// Create a new simplex noise generator with the given configuration.
    pub fn new(config: NoiseConfig) -> Self {
        Self {
            simplex: Simplex::new(config.seed),
            config,
        }
    }

    /// Generate noise value at 2D coordinates with multi-octave sampling.
    ///
    /// Returns value in range [-1.0, 1.0].
    pub fn sample_2d(&self, x: f64, y: f64) -> f64 {
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.config.frequency;
        let mut max_value = 0.0;

        for _ in 0..self.config.octaves {
            value += self.simplex.get([x * frequency, y * frequency]) * amplitude;
            max_value += amplitude;

            amplitude *= self.config.persistence;
            frequency *= self.config.lacunarity;
        }

        (value / max_value).clamp(-1.0, 1.0)
    }

    /// Ridged variant: peaks where the base noise crosses zero. Range [0.0, 1.0].
    pub fn sample_ridged(&self, x: f64, y: f64) -> f64 {
        1.0 - self.sample_2d(x, y).abs()
    }
}

/// Largest perturbation the elevation noise adds to the radial profile.
pub const ELEVATION_NOISE_AMPLITUDE: f64 = 0.1;
/// Largest perturbation applied to band thresholds.
pub const THRESHOLD_JITTER: f64 = 0.03;

/// Three-layer noise used to roughen mountain elevation.
pub struct ElevationNoise {
    coarse: NoiseGenerator,
    detail: NoiseGenerator,
    ridge: SimplexGenerator,
}

impl ElevationNoise {
    /// Create a new elevation noise stack from a world seed.
    pub fn new(world_seed: u64) -> Self {
        let seed = fold_seed(world_seed);
        Self {
            coarse: NoiseGenerator::new(NoiseConfig::elevation_coarse(seed)),
            detail: NoiseGenerator::new(NoiseConfig::elevation_detail(seed)),
            ridge: SimplexGenerator::new(NoiseConfig::ridge(seed)),
        }
    }

    /// Combined perturbation in `[-ELEVATION_NOISE_AMPLITUDE, ELEVATION_NOISE_AMPLITUDE]`.
    pub fn offset(&self, x: f64, y: f64) -> f64 {
        let coarse = self.coarse.sample_2d(x, y);
        let detail = self.detail.sample_2d(x, y);
        let ridge = self.ridge.sample_ridged(x, y) * 2.0 - 1.0;
        (coarse * 0.5 + detail * 0.3 + ridge * 0.2) * ELEVATION_NOISE_AMPLITUDE
    }

    /// Threshold jitter in `[-THRESHOLD_JITTER, THRESHOLD_JITTER]`.
    pub fn jitter(&self, x: f64, y: f64) -> f64 {
        self.detail.sample_2d(x + 517.0, y - 211.0) * THRESHOLD_JITTER
    }
}
