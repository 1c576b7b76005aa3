//! Settlement placement.
//!
//! Every tile gets its own random stream, seeded from a hash of
//! `(world seed, x, y)`. Nothing is shared between tiles, so tiles can be
//! evaluated in any order, on any thread, with identical results.
//!
//! Draw order from a tile's stream (changing it changes every world):
//! 1. trial: settlement exists if `draw < probability(biome)`
//! 2. tier roll: picks the kind from cumulative bands
//! 3. population within the kind's range
//! 4. name: prefix flag, suffix flag, then prefix word (if flagged),
//!    root word, suffix word (if flagged)
//! 5. description phrase

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::biome::Biome;

const PREFIXES: [&str; 20] = [
    "Old", "New", "North", "South", "East", "West", "Upper", "Lower", "Great", "Little",
    "High", "Deep", "Green", "Red", "White", "Black", "Silver", "Golden", "Iron", "Stone",
];

const ROOTS: [&str; 30] = [
    "haven", "ford", "bridge", "hill", "vale", "moor", "wood", "field", "gate", "port",
    "brook", "marsh", "grove", "ridge", "peak", "hollow", "meadow", "springs", "falls", "rock",
    "castle", "tower", "keep", "hall", "court", "manor", "mill", "cross", "chapel", "abbey",
];

const SUFFIXES: [&str; 20] = [
    "ton", "ham", "burg", "wick", "by", "thorpe", "ford", "stead", "worth", "field",
    "wood", "hill", "dale", "mount", "view", "side", "end", "land", "mere", "shire",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementKind {
    City,
    Town,
    Village,
    Hamlet,
    Farm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementSize {
    Large,
    Medium,
    Small,
    Tiny,
}

impl SettlementKind {
    pub fn size(self) -> SettlementSize {
        match self {
            SettlementKind::City => SettlementSize::Large,
            SettlementKind::Town => SettlementSize::Medium,
            SettlementKind::Village => SettlementSize::Small,
            SettlementKind::Hamlet | SettlementKind::Farm => SettlementSize::Tiny,
        }
    }

    /// Population range, `min..max` (max exclusive).
    fn population_range(self) -> (u32, u32) {
        match self {
            SettlementKind::City => (5000, 20000),
            SettlementKind::Town => (1000, 5000),
            SettlementKind::Village => (200, 1000),
            SettlementKind::Hamlet => (50, 200),
            SettlementKind::Farm => (5, 20),
        }
    }

    /// People per tile, used to turn population into footprint area.
    fn density(self) -> f64 {
        match self {
            SettlementKind::City => 60.0,
            SettlementKind::Town => 35.0,
            SettlementKind::Village => 18.0,
            SettlementKind::Hamlet => 10.0,
            SettlementKind::Farm => 4.0,
        }
    }

    fn phrases(self) -> [&'static str; 3] {
        match self {
            SettlementKind::City => ["A bustling metropolis", "A grand city", "A thriving urban center"],
            SettlementKind::Town => ["A prosperous town", "A well-established settlement", "A growing community"],
            SettlementKind::Village => ["A quiet village", "A peaceful settlement", "A small community"],
            SettlementKind::Hamlet => ["A tiny hamlet", "A small cluster of homes", "A modest settlement"],
            SettlementKind::Farm => ["An isolated farmstead", "A rural homestead", "A working farm"],
        }
    }
}

impl SettlementSize {
    /// Minimum distance from an already placed settlement of this size.
    pub fn spacing(self) -> f64 {
        match self {
            SettlementSize::Large => 20.0,
            SettlementSize::Medium => 15.0,
            SettlementSize::Small => 10.0,
            SettlementSize::Tiny => 8.0,
        }
    }

    fn min_radius(self) -> f64 {
        match self {
            SettlementSize::Large => 6.0,
            SettlementSize::Medium => 4.0,
            SettlementSize::Small => 2.5,
            SettlementSize::Tiny => 1.5,
        }
    }
}

const MAX_FOOTPRINT_RADIUS: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FootprintTile {
    pub x: i32,
    pub y: i32,
    /// Density in `(0, 1]`, `1.0` at the center.
    pub intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub radius: f64,
    pub tiles: Vec<FootprintTile>,
}

impl Footprint {
    pub fn intensity_at(&self, x: i32, y: i32) -> Option<f64> {
        self.tiles.iter().find(|t| t.x == x && t.y == y).map(|t| t.intensity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub name: String,
    pub kind: SettlementKind,
    pub size: SettlementSize,
    pub population: u32,
    pub x: i32,
    pub y: i32,
    pub description: String,
    pub footprint: Footprint,
}

impl Settlement {
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        ((self.x as f64 - x).powi(2) + (self.y as f64 - y).powi(2)).sqrt()
    }
}

/// Per-biome trial probabilities and the biomes that favor larger settlements.
/// Tuned constants; their exact values shape every generated world.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementTable {
    pub probabilities: BTreeMap<Biome, f64>,
    pub favorable: Vec<Biome>,
}

impl SettlementTable {
    /// Same probability for every biome. Water is still excluded.
    pub fn uniform(probability: f64) -> Self {
        Self {
            probabilities: Biome::ALL.into_iter().map(|b| (b, probability)).collect(),
            ..Self::default()
        }
    }

    pub fn probability(&self, biome: Biome) -> f64 {
        if biome.is_water() {
            return 0.0;
        }
        self.probabilities.get(&biome).copied().unwrap_or(0.0)
    }

    fn is_favorable(&self, biome: Biome) -> bool {
        self.favorable.contains(&biome)
    }
}

impl Default for SettlementTable {
    fn default() -> Self {
        let probabilities = BTreeMap::from([
            (Biome::Ocean, 0.0),
            (Biome::ShallowOcean, 0.0),
            (Biome::Beach, 0.0),
            (Biome::Desert, 0.0001),
            (Biome::Grassland, 0.0001),
            (Biome::Forest, 0.00005),
            (Biome::Jungle, 0.0005),
            (Biome::Swamp, 0.0),
            (Biome::Lake, 0.0),
            (Biome::River, 0.0),
            (Biome::Tundra, 0.0),
            (Biome::Taiga, 0.0),
            (Biome::Mountain, 0.0),
            (Biome::SnowyMountain, 0.0),
            (Biome::Hills, 0.00005),
            (Biome::Savanna, 0.0),
            (Biome::Alpine, 0.0005),
            (Biome::Volcanic, 0.0005),
        ]);
        Self {
            probabilities,
            favorable: vec![Biome::Grassland, Biome::River, Biome::Lake],
        }
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn coord_hash(seed: u32, x: i32, y: i32, salt: u64) -> u64 {
    let mut h = splitmix64(seed as u64 ^ salt.rotate_left(32));
    h = splitmix64(h ^ x as u32 as u64);
    splitmix64(h ^ ((y as u32 as u64) << 32))
}

/// Uniform value in `[0, 1)` derived from two coordinates, for footprint edges.
fn edge_noise(seed: u32, cx: i32, cy: i32, x: i32, y: i32) -> f64 {
    let h = splitmix64(coord_hash(seed, cx, cy, 0x0F00_7F1A) ^ coord_hash(seed, x, y, 0x0000_ED6E));
    (h >> 11) as f64 / (1u64 << 53) as f64
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn biome_phrase(biome: Biome) -> &'static str {
    match biome {
        Biome::Grassland => "nestled in fertile plains",
        Biome::Forest => "surrounded by dense woodlands",
        Biome::Hills => "perched on rolling hills",
        Biome::River => "built along a flowing river",
        Biome::Lake => "situated by a pristine lake",
        Biome::Beach => "built along the coastline",
        Biome::Mountain => "carved into the mountainside",
        Biome::Desert => "built around a desert oasis",
        Biome::Savanna => "spread across the savanna",
        Biome::Taiga => "built in the northern wilderness",
        _ => "in a remote location",
    }
}

/// Decides, per tile, whether a settlement is centered there.
#[derive(Debug, Clone)]
pub struct SettlementPlacer {
    seed: u32,
    table: SettlementTable,
}

impl SettlementPlacer {
    pub fn new(seed: u32) -> Self {
        Self::with_table(seed, SettlementTable::default())
    }

    pub fn with_table(seed: u32, table: SettlementTable) -> Self {
        Self { seed, table }
    }

    fn tile_stream(&self, x: i32, y: i32) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(coord_hash(self.seed, x, y, 0x5E77_1E))
    }

    pub fn evaluate(&self, x: i32, y: i32, biome: Biome) -> Option<Settlement> {
        let probability = self.table.probability(biome);
        if probability <= 0.0 {
            return None;
        }

        let mut rng = self.tile_stream(x, y);
        if rng.r#gen::<f64>() >= probability {
            return None;
        }

        let kind = self.pick_kind(rng.r#gen::<f64>(), biome);
        let (min, max) = kind.population_range();
        let population = min + (rng.r#gen::<f64>() * (max - min) as f64) as u32;
        let name = Self::pick_name(&mut rng);
        let phrases = kind.phrases();
        let phrase = phrases[(rng.r#gen::<f64>() * phrases.len() as f64) as usize];
        let size = kind.size();

        Some(Settlement {
            name,
            kind,
            size,
            population,
            x,
            y,
            description: format!("{} {}.", phrase, biome_phrase(biome)),
            footprint: self.footprint(x, y, kind, population),
        })
    }

    fn pick_kind(&self, roll: f64, biome: Biome) -> SettlementKind {
        let (city, town, village) = if self.table.is_favorable(biome) {
            (0.05, 0.15, 0.4)
        } else {
            (0.02, 0.08, 0.25)
        };

        if roll < city {
            SettlementKind::City
        } else if roll < town {
            SettlementKind::Town
        } else if roll < village {
            SettlementKind::Village
        } else if roll < 0.7 {
            SettlementKind::Hamlet
        } else {
            SettlementKind::Farm
        }
    }

    fn pick_name(rng: &mut ChaCha8Rng) -> String {
        let use_prefix = rng.r#gen::<f64>() < 0.4;
        let use_suffix = rng.r#gen::<f64>() < 0.8;

        let mut name = String::new();
        if use_prefix {
            name.push_str(PREFIXES[rng.gen_range(0..PREFIXES.len())]);
            name.push(' ');
        }
        name.push_str(&capitalize(ROOTS[rng.gen_range(0..ROOTS.len())]));
        if use_suffix {
            name.push_str(SUFFIXES[rng.gen_range(0..SUFFIXES.len())]);
        }
        name
    }

    /// Footprint radius from population and kind density, clamped to the
    /// size's minimum and a global maximum.
    fn radius(kind: SettlementKind, population: u32) -> f64 {
        let area = (population as f64 / kind.density()).max(1.0);
        (area / std::f64::consts::PI)
            .sqrt()
            .clamp(kind.size().min_radius(), MAX_FOOTPRINT_RADIUS)
    }

    /// Irregular region around the center. A tile at distance `d` belongs to
    /// the footprint when `d` is within the locally jittered edge
    /// (80-100% of the radius); its intensity is `1 - d / (radius + 1)`.
    pub fn footprint(&self, cx: i32, cy: i32, kind: SettlementKind, population: u32) -> Footprint {
        let radius = Self::radius(kind, population);
        let reach = radius.ceil() as i32;
        let mut tiles = Vec::new();

        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let (Some(x), Some(y)) = (cx.checked_add(dx), cy.checked_add(dy)) else {
                    continue;
                };
                let d = ((dx * dx + dy * dy) as f64).sqrt();
                let edge = radius * (0.8 + 0.2 * edge_noise(self.seed, cx, cy, x, y));
                if d > edge {
                    continue;
                }
                tiles.push(FootprintTile {
                    x,
                    y,
                    intensity: 1.0 - d / (radius + 1.0),
                });
            }
        }

        Footprint { radius, tiles }
    }
}
