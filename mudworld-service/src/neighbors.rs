//! Surroundings of a tile: nearby biomes, nearby settlements and the
//! settlement footprint the tile sits in, if any.

use std::collections::BTreeSet;

use mudworld_gen::{Biome, Settlement, SettlementKind, SettlementSize, Tile};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    /// Compass direction of an offset. `y` grows southward.
    pub fn from_offset(dx: i32, dy: i32) -> Direction {
        match (dx.signum(), dy.signum()) {
            (1, 1) => Direction::SouthEast,
            (1, -1) => Direction::NorthEast,
            (-1, 1) => Direction::SouthWest,
            (-1, -1) => Direction::NorthWest,
            (1, _) => Direction::East,
            (-1, _) => Direction::West,
            (_, 1) => Direction::South,
            _ => Direction::North,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::NorthEast => "northeast",
            Direction::East => "east",
            Direction::SouthEast => "southeast",
            Direction::South => "south",
            Direction::SouthWest => "southwest",
            Direction::West => "west",
            Direction::NorthWest => "northwest",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyBiome {
    pub biome: Biome,
    pub distance: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbySettlement {
    pub name: String,
    pub kind: SettlementKind,
    pub size: SettlementSize,
    pub population: u32,
    pub x: i32,
    pub y: i32,
    pub description: String,
    pub distance: f64,
}

/// The settlement footprint a tile belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementMembership {
    pub name: String,
    pub kind: SettlementKind,
    pub size: SettlementSize,
    pub intensity: f64,
    pub is_center: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileWithNeighborInfo {
    #[serde(flatten)]
    pub tile: Tile,
    pub nearby_biomes: Vec<NearbyBiome>,
    pub nearby_settlements: Vec<NearbySettlement>,
    pub settlement: Option<SettlementMembership>,
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Offsets on the square ring at Chebyshev distance `radius`, `dx` outer
/// and `dy` inner, both ascending.
pub fn perimeter(radius: i32) -> impl Iterator<Item = (i32, i32)> {
    (-radius..=radius).flat_map(move |dx| {
        (-radius..=radius)
            .filter(move |dy| dx.abs() == radius || dy.abs() == radius)
            .map(move |dy| (dx, dy))
    })
}

/// Collects distinct biomes other than the center's, in discovery order.
pub struct BiomeScan {
    seen: BTreeSet<Biome>,
    found: Vec<NearbyBiome>,
    limit: usize,
}

impl BiomeScan {
    pub fn new(center: Biome, limit: usize) -> Self {
        Self {
            seen: BTreeSet::from([center]),
            found: Vec::new(),
            limit,
        }
    }

    pub fn is_full(&self) -> bool {
        self.found.len() >= self.limit
    }

    pub fn offer(&mut self, dx: i32, dy: i32, biome: Biome) {
        if self.is_full() || !self.seen.insert(biome) {
            return;
        }
        self.found.push(NearbyBiome {
            biome,
            distance: round1(((dx * dx + dy * dy) as f64).sqrt()),
            direction: Direction::from_offset(dx, dy),
        });
    }

    pub fn finish(self) -> Vec<NearbyBiome> {
        self.found
    }
}

/// Settlements within `radius` of `(x, y)`, nearest first.
pub fn nearby_settlements(x: i32, y: i32, radius: i32, settlements: &[Settlement]) -> Vec<NearbySettlement> {
    let mut nearby: Vec<(f64, &Settlement)> = settlements
        .iter()
        .map(|s| (s.distance_to(x as f64, y as f64), s))
        .filter(|(d, _)| *d <= radius as f64)
        .collect();
    nearby.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| (a.1.y, a.1.x).cmp(&(b.1.y, b.1.x))));

    nearby
        .into_iter()
        .map(|(distance, s)| NearbySettlement {
            name: s.name.clone(),
            kind: s.kind,
            size: s.size,
            population: s.population,
            x: s.x,
            y: s.y,
            description: s.description.clone(),
            distance: round1(distance),
        })
        .collect()
}

/// The closest settlement whose footprint covers `(x, y)`.
pub fn membership(x: i32, y: i32, settlements: &[Settlement]) -> Option<SettlementMembership> {
    settlements
        .iter()
        .filter_map(|s| {
            let is_center = s.x == x && s.y == y;
            let intensity = if is_center { Some(1.0) } else { s.footprint.intensity_at(x, y) };
            intensity.map(|intensity| (s.distance_to(x as f64, y as f64), s, intensity, is_center))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, s, intensity, is_center)| SettlementMembership {
            name: s.name.clone(),
            kind: s.kind,
            size: s.size,
            intensity,
            is_center,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mudworld_gen::SettlementPlacer;

    #[test]
    fn test_directions() {
        assert_eq!(Direction::from_offset(1, 1), Direction::SouthEast);
        assert_eq!(Direction::from_offset(2, -1), Direction::NorthEast);
        assert_eq!(Direction::from_offset(-1, 3), Direction::SouthWest);
        assert_eq!(Direction::from_offset(-4, -4), Direction::NorthWest);
        assert_eq!(Direction::from_offset(3, 0), Direction::East);
        assert_eq!(Direction::from_offset(-3, 0), Direction::West);
        assert_eq!(Direction::from_offset(0, 2), Direction::South);
        assert_eq!(Direction::from_offset(0, -2), Direction::North);
        assert_eq!(Direction::NorthWest.to_string(), "northwest");
    }

    #[test]
    fn test_perimeter_ring() {
        let ring: Vec<_> = perimeter(1).collect();
        assert_eq!(ring.len(), 8);
        assert_eq!(ring[0], (-1, -1));
        assert!(!ring.contains(&(0, 0)));
        assert_eq!(perimeter(5).count(), 40);
        assert!(perimeter(3).all(|(dx, dy)| dx.abs().max(dy.abs()) == 3));
    }

    #[test]
    fn test_biome_scan_skips_seen_and_stops() {
        let mut scan = BiomeScan::new(Biome::Grassland, 2);
        scan.offer(1, 0, Biome::Grassland);
        scan.offer(1, 1, Biome::Forest);
        scan.offer(-1, 0, Biome::Forest);
        assert!(!scan.is_full());
        scan.offer(0, -2, Biome::Hills);
        scan.offer(2, 2, Biome::Desert);
        assert!(scan.is_full());

        let found = scan.finish();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], NearbyBiome { biome: Biome::Forest, distance: 1.4, direction: Direction::SouthEast });
        assert_eq!(found[1], NearbyBiome { biome: Biome::Hills, distance: 2.0, direction: Direction::North });
    }

    fn settlement(x: i32, y: i32, kind: SettlementKind, population: u32) -> Settlement {
        Settlement {
            name: format!("S{}:{}", x, y),
            kind,
            size: kind.size(),
            population,
            x,
            y,
            description: String::new(),
            footprint: SettlementPlacer::new(3).footprint(x, y, kind, population),
        }
    }

    #[test]
    fn test_nearby_settlements_sorted_and_bounded() {
        let all = vec![
            settlement(30, 40, SettlementKind::Village, 300),
            settlement(3, 4, SettlementKind::Farm, 10),
            settlement(60, 0, SettlementKind::Town, 2000),
        ];
        let nearby = nearby_settlements(0, 0, 50, &all);
        assert_eq!(nearby.len(), 2);
        assert_eq!((nearby[0].x, nearby[0].distance), (3, 5.0));
        assert_eq!((nearby[1].x, nearby[1].distance), (30, 50.0));
    }

    #[test]
    fn test_membership() {
        let city = settlement(100, 100, SettlementKind::City, 15_000);
        let all = vec![city.clone()];

        let center = membership(100, 100, &all).unwrap();
        assert!(center.is_center);
        assert_eq!(center.intensity, 1.0);

        let edge = membership(101, 100, &all).unwrap();
        assert!(!edge.is_center);
        assert!(edge.intensity < 1.0);
        assert_eq!(edge.name, city.name);

        assert!(membership(200, 200, &all).is_none());
    }
}
