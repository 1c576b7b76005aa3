use anyhow::{Result, bail};

use crate::chunk::{CHUNK_AREA, CHUNK_SIZE, Chunk, ChunkPos, StatsAccumulator, Tile};
use crate::settlement::Settlement;

/// Accumulates one chunk's tiles, running stats and settlements.
///
/// Tiles must be pushed in row-major order; stats are summed as they arrive
/// so a rebuilt chunk (see [`Chunk::from_tiles`]) matches bit for bit.
pub struct ChunkBuilder {
    pos: ChunkPos,
    tiles: Vec<Tile>,
    stats: StatsAccumulator,
    settlements: Vec<Settlement>,
}

impl ChunkBuilder {
    pub fn new(pos: ChunkPos) -> Self {
        Self {
            pos,
            tiles: Vec::with_capacity(CHUNK_AREA),
            stats: StatsAccumulator::default(),
            settlements: Vec::new(),
        }
    }

    /// Absolute coordinate of the next tile expected, or `None` when full.
    pub fn next_coord(&self) -> Option<(i32, i32)> {
        let i = self.tiles.len() as i32;
        if i >= CHUNK_SIZE * CHUNK_SIZE {
            return None;
        }
        let (ox, oy) = self.pos.origin();
        Some((ox.checked_add(i % CHUNK_SIZE)?, oy.checked_add(i / CHUNK_SIZE)?))
    }

    pub fn push_tile(&mut self, tile: Tile) -> Result<()> {
        match self.next_coord() {
            Some(expected) if expected == (tile.x, tile.y) => {
                self.stats.add(&tile);
                self.tiles.push(tile);
                Ok(())
            }
            Some(expected) => bail!(
                "chunk {}: expected tile {:?}, got ({}, {})",
                self.pos, expected, tile.x, tile.y
            ),
            None => bail!("chunk {} is already full", self.pos),
        }
    }

    /// Keeps the settlement unless an accepted one is closer than that
    /// settlement's spacing. Returns whether it was kept.
    pub fn offer_settlement(&mut self, settlement: Settlement) -> bool {
        let crowded = self.settlements.iter().any(|existing| {
            existing.distance_to(settlement.x as f64, settlement.y as f64) < existing.size.spacing()
        });
        if crowded {
            return false;
        }
        self.settlements.push(settlement);
        true
    }

    /// Settlements come out in row-major order of their centers.
    pub fn build(mut self) -> Result<Chunk> {
        if self.tiles.len() != CHUNK_AREA {
            bail!("chunk {} incomplete: {} of {} tiles", self.pos, self.tiles.len(), CHUNK_AREA);
        }
        self.settlements.sort_by_key(|s| (s.y, s.x));
        Ok(Chunk {
            pos: self.pos,
            tiles: self.tiles,
            stats: self.stats.finish(),
            settlements: self.settlements,
        })
    }
}
