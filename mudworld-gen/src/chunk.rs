//! Tile and chunk data model.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::biome::Biome;
use crate::settlement::Settlement;

/// Tiles per chunk edge. Fixed for the lifetime of a world.
pub const CHUNK_SIZE: i32 = 50;

/// Tiles per chunk.
pub const CHUNK_AREA: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Lowest chunk coordinate whose whole tile range fits in `i32`.
pub const MIN_CHUNK: i32 = i32::MIN.div_euclid(CHUNK_SIZE) + 1;

/// Highest chunk coordinate whose whole tile range fits in `i32`.
pub const MAX_CHUNK: i32 = (i32::MAX - (CHUNK_SIZE - 1)).div_euclid(CHUNK_SIZE);

/// Chunk coordinates. A chunk covers tiles
/// `[x * CHUNK_SIZE, (x + 1) * CHUNK_SIZE)` on each axis.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
}

impl ChunkPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Owning chunk of a tile. Floor division, so `-1` maps to chunk `-1`.
    pub fn of_tile(x: i32, y: i32) -> Self {
        Self {
            x: x.div_euclid(CHUNK_SIZE),
            y: y.div_euclid(CHUNK_SIZE),
        }
    }

    /// True when every tile of the chunk has an `i32` coordinate.
    pub fn in_bounds(self) -> bool {
        (MIN_CHUNK..=MAX_CHUNK).contains(&self.x) && (MIN_CHUNK..=MAX_CHUNK).contains(&self.y)
    }

    /// Absolute coordinate of the chunk's first tile. Saturates for chunks
    /// outside [`ChunkPos::in_bounds`].
    pub fn origin(self) -> (i32, i32) {
        (self.x.saturating_mul(CHUNK_SIZE), self.y.saturating_mul(CHUNK_SIZE))
    }

    /// Inclusive tile rectangle `(min_x, max_x, min_y, max_y)`, if in bounds.
    pub fn tile_bounds(self) -> Option<(i32, i32, i32, i32)> {
        if !self.in_bounds() {
            return None;
        }
        let (ox, oy) = self.origin();
        Some((ox, ox + CHUNK_SIZE - 1, oy, oy + CHUNK_SIZE - 1))
    }

    pub fn contains(self, x: i32, y: i32) -> bool {
        Self::of_tile(x, y) == self
    }

    /// Row-major index of an absolute coordinate inside this chunk.
    pub fn local_index(self, x: i32, y: i32) -> Option<usize> {
        if !self.contains(x, y) {
            return None;
        }
        Some((y.rem_euclid(CHUNK_SIZE) * CHUNK_SIZE + x.rem_euclid(CHUNK_SIZE)) as usize)
    }
}

impl std::fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// One generated world tile. A pure function of `(x, y, seed)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    pub chunk_x: i32,
    pub chunk_y: i32,
    pub biome: Biome,
    pub height: f64,
    pub temperature: f64,
    pub moisture: f64,
    pub description: String,
    pub seed: u32,
}

impl Tile {
    pub fn chunk(&self) -> ChunkPos {
        ChunkPos::new(self.chunk_x, self.chunk_y)
    }
}

/// Aggregates over all tiles of a chunk.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChunkStats {
    pub biomes: BTreeMap<Biome, u32>,
    pub average_height: f64,
    pub average_temperature: f64,
    pub average_moisture: f64,
}

/// Running sums, fed in row-major order by both the generator and the
/// reconstruction path so the two produce identical floating point results.
#[derive(Debug, Default)]
pub(crate) struct StatsAccumulator {
    biomes: BTreeMap<Biome, u32>,
    total_height: f64,
    total_temperature: f64,
    total_moisture: f64,
    count: usize,
}

impl StatsAccumulator {
    pub(crate) fn add(&mut self, tile: &Tile) {
        *self.biomes.entry(tile.biome).or_insert(0) += 1;
        self.total_height += tile.height;
        self.total_temperature += tile.temperature;
        self.total_moisture += tile.moisture;
        self.count += 1;
    }

    pub(crate) fn finish(self) -> ChunkStats {
        if self.count == 0 {
            return ChunkStats::default();
        }
        let n = self.count as f64;
        ChunkStats {
            biomes: self.biomes,
            average_height: self.total_height / n,
            average_temperature: self.total_temperature / n,
            average_moisture: self.total_moisture / n,
        }
    }
}

/// A `CHUNK_SIZE x CHUNK_SIZE` block of tiles in row-major order
/// (`tiles[dy * CHUNK_SIZE + dx]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub pos: ChunkPos,
    pub tiles: Vec<Tile>,
    pub stats: ChunkStats,
    pub settlements: Vec<Settlement>,
}

impl Chunk {
    /// Rebuilds a chunk from persisted tiles. Tiles may arrive in any order;
    /// the set must cover every coordinate of the chunk exactly once.
    pub fn from_tiles(pos: ChunkPos, tiles: Vec<Tile>, mut settlements: Vec<Settlement>) -> Result<Chunk> {
        if tiles.len() != CHUNK_AREA {
            bail!("chunk {} needs {} tiles, got {}", pos, CHUNK_AREA, tiles.len());
        }

        let mut slots: Vec<Option<Tile>> = vec![None; CHUNK_AREA];
        for tile in tiles {
            let Some(index) = pos.local_index(tile.x, tile.y) else {
                bail!("tile ({}, {}) does not belong to chunk {}", tile.x, tile.y, pos);
            };
            if slots[index].replace(tile).is_some() {
                bail!("duplicate tile at index {} of chunk {}", index, pos);
            }
        }

        let mut acc = StatsAccumulator::default();
        let mut ordered = Vec::with_capacity(CHUNK_AREA);
        for tile in slots.into_iter().flatten() {
            acc.add(&tile);
            ordered.push(tile);
        }

        settlements.retain(|s| pos.contains(s.x, s.y));
        settlements.sort_by_key(|s| (s.y, s.x));

        Ok(Chunk {
            pos,
            tiles: ordered,
            stats: acc.finish(),
            settlements,
        })
    }

    pub fn tile_at(&self, x: i32, y: i32) -> Option<&Tile> {
        self.pos
            .local_index(x, y)
            .and_then(|i| self.tiles.get(i))
            .filter(|t| t.x == x && t.y == y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_partition() {
        assert_eq!(ChunkPos::of_tile(49, 0), ChunkPos::new(0, 0));
        assert_eq!(ChunkPos::of_tile(50, 0), ChunkPos::new(1, 0));
        assert_eq!(ChunkPos::of_tile(-1, 0), ChunkPos::new(-1, 0));
        assert_eq!(ChunkPos::of_tile(-50, -51), ChunkPos::new(-1, -2));
        assert_eq!(ChunkPos::of_tile(0, -1), ChunkPos::new(0, -1));
    }

    #[test]
    fn test_local_index() {
        let pos = ChunkPos::new(-1, 2);
        assert_eq!(pos.origin(), (-50, 100));
        assert_eq!(pos.local_index(-50, 100), Some(0));
        assert_eq!(pos.local_index(-1, 100), Some(49));
        assert_eq!(pos.local_index(-50, 101), Some(50));
        assert_eq!(pos.local_index(-1, 149), Some(CHUNK_AREA - 1));
        assert_eq!(pos.local_index(0, 100), None);
    }

    #[test]
    fn test_bounds_at_i32_extremes() {
        assert!(ChunkPos::new(MAX_CHUNK, MIN_CHUNK).in_bounds());
        assert!(!ChunkPos::new(MAX_CHUNK + 1, 0).in_bounds());
        assert!(!ChunkPos::new(0, MIN_CHUNK - 1).in_bounds());
        assert!(!ChunkPos::new(50_000_000, 0).in_bounds());

        let (min_x, max_x, min_y, max_y) = ChunkPos::new(MAX_CHUNK, MIN_CHUNK).tile_bounds().unwrap();
        assert_eq!(max_x - min_x, CHUNK_SIZE - 1);
        assert_eq!(max_y - min_y, CHUNK_SIZE - 1);
        assert!(max_x > i32::MAX - CHUNK_SIZE);
        assert!(min_y < i32::MIN + CHUNK_SIZE);

        // The chunk holding i32::MAX is cut off by the integer range.
        let edge = ChunkPos::of_tile(i32::MAX - 1, 0);
        assert_eq!(edge.x, MAX_CHUNK + 1);
        assert!(edge.tile_bounds().is_none());
        assert_eq!(ChunkPos::new(50_000_000, 0).origin(), (i32::MAX, 0));
        assert_eq!(edge.local_index(i32::MAX, 0), Some(47));
        assert!(ChunkPos::of_tile(i32::MIN, i32::MIN).tile_bounds().is_none());
    }

    fn flat_tile(x: i32, y: i32) -> Tile {
        let pos = ChunkPos::of_tile(x, y);
        Tile {
            x,
            y,
            chunk_x: pos.x,
            chunk_y: pos.y,
            biome: Biome::Grassland,
            height: 0.5,
            temperature: 0.5,
            moisture: 0.5,
            description: String::new(),
            seed: 1,
        }
    }

    #[test]
    fn test_from_tiles_rejects_partial() {
        let tiles: Vec<Tile> = (0..10).map(|x| flat_tile(x, 0)).collect();
        assert!(Chunk::from_tiles(ChunkPos::new(0, 0), tiles, vec![]).is_err());
    }

    #[test]
    fn test_from_tiles_orders_row_major() {
        let pos = ChunkPos::new(0, 0);
        let mut tiles = Vec::new();
        for x in (0..CHUNK_SIZE).rev() {
            for y in 0..CHUNK_SIZE {
                tiles.push(flat_tile(x, y));
            }
        }
        let chunk = Chunk::from_tiles(pos, tiles, vec![]).unwrap();
        assert_eq!((chunk.tiles[0].x, chunk.tiles[0].y), (0, 0));
        assert_eq!((chunk.tiles[1].x, chunk.tiles[1].y), (1, 0));
        assert_eq!((chunk.tiles[50].x, chunk.tiles[50].y), (0, 1));
        assert_eq!(chunk.stats.biomes[&Biome::Grassland], CHUNK_AREA as u32);
        assert_eq!(chunk.tile_at(7, 9).map(|t| (t.x, t.y)), Some((7, 9)));
        assert!(chunk.tile_at(50, 0).is_none());
    }
}
