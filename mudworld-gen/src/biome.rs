//! Biome classification.
//!
//! An ordered cascade of threshold rules over (height, temperature,
//! moisture). The first matching rule wins, so the rule order is part of the
//! world format: reordering it changes every world already generated.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    Ocean,
    ShallowOcean,
    Beach,
    Desert,
    Grassland,
    Forest,
    Jungle,
    Swamp,
    Lake,
    River,
    Tundra,
    Taiga,
    Mountain,
    SnowyMountain,
    Hills,
    Savanna,
    Alpine,
    Volcanic,
}

/// Static presentation data, consumed by map renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BiomeInfo {
    pub id: u8,
    pub name: &'static str,
    pub description: &'static str,
    pub color: &'static str,
    pub glyph: char,
}

impl Biome {
    pub const ALL: [Biome; 18] = [
        Biome::Ocean,
        Biome::ShallowOcean,
        Biome::Beach,
        Biome::Desert,
        Biome::Grassland,
        Biome::Forest,
        Biome::Jungle,
        Biome::Swamp,
        Biome::Lake,
        Biome::River,
        Biome::Tundra,
        Biome::Taiga,
        Biome::Mountain,
        Biome::SnowyMountain,
        Biome::Hills,
        Biome::Savanna,
        Biome::Alpine,
        Biome::Volcanic,
    ];

    pub fn classify(height: f64, temperature: f64, moisture: f64) -> Biome {
        // Water bands beat everything else.
        if height < 0.2 {
            return if height < 0.1 { Biome::Ocean } else { Biome::ShallowOcean };
        }
        if height < 0.25 {
            return Biome::Beach;
        }

        if height > 0.8 {
            return if temperature < 0.3 {
                Biome::SnowyMountain
            } else if height > 0.9 && temperature > 0.7 {
                Biome::Volcanic
            } else {
                Biome::Mountain
            };
        }

        if height > 0.6 {
            return if temperature < 0.4 { Biome::Alpine } else { Biome::Hills };
        }

        if height > 0.25 && height < 0.4 && moisture > 0.8 {
            return Biome::Lake;
        }

        // Cold
        if temperature < 0.3 {
            return if moisture > 0.5 { Biome::Taiga } else { Biome::Tundra };
        }

        // Hot
        if temperature > 0.7 {
            return if moisture < 0.3 {
                Biome::Desert
            } else if moisture > 0.7 {
                Biome::Jungle
            } else {
                Biome::Savanna
            };
        }

        // Temperate
        if moisture > 0.8 {
            Biome::Swamp
        } else if moisture > 0.6 {
            Biome::Forest
        } else if moisture > 0.3 {
            Biome::Grassland
        } else {
            Biome::Desert
        }
    }

    pub fn is_water(self) -> bool {
        matches!(self, Biome::Ocean | Biome::ShallowOcean | Biome::Lake | Biome::River)
    }

    /// Stable identifier used in persisted rows.
    pub fn key(self) -> &'static str {
        match self {
            Biome::Ocean => "ocean",
            Biome::ShallowOcean => "shallow_ocean",
            Biome::Beach => "beach",
            Biome::Desert => "desert",
            Biome::Grassland => "grassland",
            Biome::Forest => "forest",
            Biome::Jungle => "jungle",
            Biome::Swamp => "swamp",
            Biome::Lake => "lake",
            Biome::River => "river",
            Biome::Tundra => "tundra",
            Biome::Taiga => "taiga",
            Biome::Mountain => "mountain",
            Biome::SnowyMountain => "snowy_mountain",
            Biome::Hills => "hills",
            Biome::Savanna => "savanna",
            Biome::Alpine => "alpine",
            Biome::Volcanic => "volcanic",
        }
    }

    pub fn from_key(key: &str) -> Option<Biome> {
        Biome::ALL.into_iter().find(|b| b.key() == key)
    }

    pub fn info(self) -> &'static BiomeInfo {
        match self {
            Biome::Ocean => &BiomeInfo { id: 1, name: "Ocean", description: "Deep blue waters", color: "#1e3a5f", glyph: '~' },
            Biome::ShallowOcean => &BiomeInfo { id: 2, name: "Shallow Ocean", description: "Light blue coastal waters", color: "#2e5f8f", glyph: '≈' },
            Biome::Beach => &BiomeInfo { id: 3, name: "Beach", description: "Sandy coastline", color: "#f4d03f", glyph: '.' },
            Biome::Desert => &BiomeInfo { id: 4, name: "Desert", description: "Hot, dry sands", color: "#f7dc6f", glyph: 'd' },
            Biome::Grassland => &BiomeInfo { id: 5, name: "Grassland", description: "Rolling green plains", color: "#58d68d", glyph: 'g' },
            Biome::Forest => &BiomeInfo { id: 6, name: "Forest", description: "Dense woodland", color: "#27ae60", glyph: 'T' },
            Biome::Jungle => &BiomeInfo { id: 7, name: "Jungle", description: "Tropical rainforest", color: "#1e8449", glyph: 'J' },
            Biome::Swamp => &BiomeInfo { id: 8, name: "Swamp", description: "Murky wetlands", color: "#52c41a", glyph: 'S' },
            Biome::Lake => &BiomeInfo { id: 9, name: "Lake", description: "Fresh water lake", color: "#3498db", glyph: 'L' },
            Biome::River => &BiomeInfo { id: 10, name: "River", description: "Flowing water", color: "#5dade2", glyph: 'r' },
            Biome::Tundra => &BiomeInfo { id: 11, name: "Tundra", description: "Cold, barren land", color: "#d5dbdb", glyph: 't' },
            Biome::Taiga => &BiomeInfo { id: 12, name: "Taiga", description: "Northern coniferous forest", color: "#196f3d", glyph: 'P' },
            Biome::Mountain => &BiomeInfo { id: 13, name: "Mountain", description: "Rocky peaks", color: "#85929e", glyph: '^' },
            Biome::SnowyMountain => &BiomeInfo { id: 14, name: "Snowy Mountain", description: "Snow-capped peaks", color: "#f8f9fa", glyph: 'A' },
            Biome::Hills => &BiomeInfo { id: 15, name: "Hills", description: "Rolling hills", color: "#a9dfbf", glyph: 'h' },
            Biome::Savanna => &BiomeInfo { id: 16, name: "Savanna", description: "Tropical grassland", color: "#f1c40f", glyph: 's' },
            Biome::Alpine => &BiomeInfo { id: 17, name: "Alpine", description: "High mountain meadows", color: "#abebc6", glyph: 'a' },
            Biome::Volcanic => &BiomeInfo { id: 18, name: "Volcanic", description: "Active volcanic region", color: "#e74c3c", glyph: 'V' },
        }
    }

    /// Human-readable summary of a tile, e.g.
    /// "Rolling green plains in a flat, temperate, moderate region."
    pub fn describe(self, height: f64, temperature: f64, moisture: f64) -> String {
        let height_desc = if height > 0.8 {
            "elevated"
        } else if height > 0.6 {
            "hilly"
        } else if height > 0.4 {
            "rolling"
        } else {
            "flat"
        };
        let temp_desc = if temperature > 0.7 {
            "hot"
        } else if temperature > 0.4 {
            "temperate"
        } else {
            "cold"
        };
        let moist_desc = if moisture > 0.7 {
            "humid"
        } else if moisture > 0.4 {
            "moderate"
        } else {
            "dry"
        };

        format!("{} in a {}, {}, {} region.", self.info().description, height_desc, temp_desc, moist_desc)
    }
}

impl std::fmt::Display for Biome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.info().name)
    }
}
