//! Layered simplex noise for the three climate channels.
//!
//! Every channel owns its own noise function, seeded independently, so
//! height, temperature and moisture never correlate through a shared seed.
//! Sampling takes `&self` only and keeps no state between calls.

use noise::{NoiseFn, Simplex};
use serde::{Deserialize, Serialize};

/// Seeds for one world. Created once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldSeed {
    pub root: u32,
    pub height: u32,
    pub temperature: u32,
    pub moisture: u32,
}

impl WorldSeed {
    pub const TEMPERATURE_OFFSET: u32 = 1000;
    pub const MOISTURE_OFFSET: u32 = 2000;

    pub fn from_root(root: u32) -> Self {
        Self {
            root,
            height: root,
            temperature: root.wrapping_add(Self::TEMPERATURE_OFFSET),
            moisture: root.wrapping_add(Self::MOISTURE_OFFSET),
        }
    }
}

/// Octave parameters for a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseConfig {
    pub scale: f64,
    pub octaves: u32,
    pub persistence: f64,
    pub lacunarity: f64,
}

impl NoiseConfig {
    pub const HEIGHT: NoiseConfig = NoiseConfig { scale: 0.01, octaves: 4, persistence: 0.5, lacunarity: 2.0 };
    pub const TEMPERATURE: NoiseConfig = NoiseConfig { scale: 0.008, octaves: 3, persistence: 0.6, lacunarity: 2.1 };
    pub const MOISTURE: NoiseConfig = NoiseConfig { scale: 0.012, octaves: 3, persistence: 0.4, lacunarity: 1.9 };
}

/// Climate values for one coordinate, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSample {
    pub height: f64,
    pub temperature: f64,
    pub moisture: f64,
}

/// Temperature drops by this much per unit of `|y|`.
const LATITUDE_PENALTY_PER_TILE: f64 = 0.5 / 1000.0;

struct Channel {
    noise: Simplex,
    config: NoiseConfig,
}

impl Channel {
    fn new(seed: u32, config: NoiseConfig) -> Self {
        Self { noise: Simplex::new(seed), config }
    }

    /// Sum of octaves normalized by total amplitude, remapped from `[-1, 1]` to `[0, 1]`.
    fn octaves(&self, x: f64, y: f64) -> f64 {
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.config.scale;
        let mut max_value = 0.0;

        for _ in 0..self.config.octaves {
            value += self.noise.get([x * frequency, y * frequency]) * amplitude;
            max_value += amplitude;
            amplitude *= self.config.persistence;
            frequency *= self.config.lacunarity;
        }

        if max_value == 0.0 {
            return 0.5;
        }
        ((value / max_value + 1.0) / 2.0).clamp(0.0, 1.0)
    }
}

/// Per-coordinate climate synthesis for one world.
pub struct NoiseField {
    height: Channel,
    temperature: Channel,
    moisture: Channel,
}

impl NoiseField {
    pub fn new(seed: WorldSeed) -> Self {
        Self::with_configs(seed, NoiseConfig::HEIGHT, NoiseConfig::TEMPERATURE, NoiseConfig::MOISTURE)
    }

    pub fn with_configs(seed: WorldSeed, height: NoiseConfig, temperature: NoiseConfig, moisture: NoiseConfig) -> Self {
        Self {
            height: Channel::new(seed.height, height),
            temperature: Channel::new(seed.temperature, temperature),
            moisture: Channel::new(seed.moisture, moisture),
        }
    }

    pub fn height(&self, x: i32, y: i32) -> f64 {
        self.height.octaves(x as f64, y as f64)
    }

    /// Cooler away from `y = 0`.
    pub fn temperature(&self, x: i32, y: i32) -> f64 {
        let latitude = (y as f64).abs() * LATITUDE_PENALTY_PER_TILE;
        (self.temperature.octaves(x as f64, y as f64) - latitude).clamp(0.0, 1.0)
    }

    pub fn moisture(&self, x: i32, y: i32) -> f64 {
        self.moisture.octaves(x as f64, y as f64)
    }

    pub fn sample(&self, x: i32, y: i32) -> ClimateSample {
        ClimateSample {
            height: self.height(x, y),
            temperature: self.temperature(x, y),
            moisture: self.moisture(x, y),
        }
    }
}
