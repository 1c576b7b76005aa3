//! In-memory tile store.
//!
//! Data is lost on restart. Useful for development and tests.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use mudworld_gen::{Biome, ChunkPos, Settlement, Tile, WorldSeed};
use parking_lot::RwLock;

use crate::TileStore;

/// Tiles keyed by coordinate, settlements keyed by center. First write wins.
#[derive(Default)]
pub struct MemoryTileStore {
    tiles: RwLock<HashMap<(i32, i32), Tile>>,
    settlements: RwLock<BTreeMap<(i32, i32), Settlement>>,
    seed: RwLock<Option<WorldSeed>>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settlement_count(&self) -> usize {
        self.settlements.read().len()
    }
}

#[async_trait]
impl TileStore for MemoryTileStore {
    async fn get_tile(&self, x: i32, y: i32) -> Result<Option<Tile>> {
        Ok(self.tiles.read().get(&(x, y)).cloned())
    }

    async fn get_chunk_tiles(&self, chunk_x: i32, chunk_y: i32) -> Result<Vec<Tile>> {
        let Some((min_x, max_x, min_y, max_y)) = ChunkPos::new(chunk_x, chunk_y).tile_bounds() else {
            return Ok(Vec::new());
        };
        let tiles = self.tiles.read();
        let mut found = Vec::new();
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                if let Some(tile) = tiles.get(&(x, y)) {
                    found.push(tile.clone());
                }
            }
        }
        Ok(found)
    }

    async fn insert_tiles(&self, tiles: &[Tile]) -> Result<()> {
        let mut stored = self.tiles.write();
        for tile in tiles {
            stored.entry((tile.x, tile.y)).or_insert_with(|| tile.clone());
        }
        Ok(())
    }

    async fn insert_settlements(&self, settlements: &[Settlement]) -> Result<()> {
        let mut stored = self.settlements.write();
        for s in settlements {
            stored.entry((s.x, s.y)).or_insert_with(|| s.clone());
        }
        Ok(())
    }

    async fn settlements_in_area(&self, min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> Result<Vec<Settlement>> {
        Ok(self
            .settlements
            .read()
            .values()
            .filter(|s| s.x >= min_x && s.x <= max_x && s.y >= min_y && s.y <= max_y)
            .cloned()
            .collect())
    }

    async fn tile_count(&self) -> Result<u64> {
        Ok(self.tiles.read().len() as u64)
    }

    async fn biome_distribution(&self) -> Result<BTreeMap<Biome, u64>> {
        let mut counts = BTreeMap::new();
        for tile in self.tiles.read().values() {
            *counts.entry(tile.biome).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn load_active_seed(&self) -> Result<Option<WorldSeed>> {
        Ok(*self.seed.read())
    }

    async fn save_active_seed(&self, seed: WorldSeed) -> Result<()> {
        *self.seed.write() = Some(seed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mudworld_gen::{CHUNK_AREA, MAX_CHUNK, MIN_CHUNK, SettlementTable, TerrainGenerator, WorldGenerator};

    fn generator() -> TerrainGenerator {
        TerrainGenerator::with_table(WorldSeed::from_root(4242), SettlementTable::uniform(0.01))
    }

    #[tokio::test]
    async fn test_insert_tiles_is_idempotent() {
        let store = MemoryTileStore::new();
        let chunk = generator().generate_chunk(ChunkPos::new(2, -3)).unwrap();

        store.insert_tiles(&chunk.tiles).await.unwrap();
        let first = store.get_chunk_tiles(2, -3).await.unwrap().len();
        store.insert_tiles(&chunk.tiles).await.unwrap();
        let second = store.get_chunk_tiles(2, -3).await.unwrap().len();

        assert_eq!(first, chunk.tiles.len());
        assert_eq!(first, second);
        assert_eq!(store.tile_count().await.unwrap(), chunk.tiles.len() as u64);
    }

    #[tokio::test]
    async fn test_biome_distribution() {
        let store = MemoryTileStore::new();
        assert!(store.biome_distribution().await.unwrap().is_empty());

        let world = generator();
        let chunks: Vec<_> = [(0, 0), (1, 0), (-3, 5)]
            .into_iter()
            .map(|(x, y)| world.generate_chunk(ChunkPos::new(x, y)).unwrap())
            .collect();
        for chunk in &chunks {
            store.insert_tiles(&chunk.tiles).await.unwrap();
        }
        store.insert_tiles(&chunks[0].tiles).await.unwrap();

        let mut expected: BTreeMap<Biome, u64> = BTreeMap::new();
        for chunk in &chunks {
            for (biome, n) in &chunk.stats.biomes {
                *expected.entry(*biome).or_insert(0) += *n as u64;
            }
        }
        let distribution = store.biome_distribution().await.unwrap();
        assert_eq!(distribution, expected);
        assert_eq!(distribution.values().sum::<u64>(), store.tile_count().await.unwrap());
        assert_eq!(store.tile_count().await.unwrap(), 3 * CHUNK_AREA as u64);
    }

    #[tokio::test]
    async fn test_partial_chunk_and_single_tile() {
        let store = MemoryTileStore::new();
        let chunk = generator().generate_chunk(ChunkPos::new(-1, 0)).unwrap();
        store.insert_tiles(&chunk.tiles[..100]).await.unwrap();

        assert_eq!(store.get_chunk_tiles(-1, 0).await.unwrap().len(), 100);
        assert!(store.get_chunk_tiles(0, 0).await.unwrap().is_empty());

        let first = &chunk.tiles[0];
        assert_eq!(store.get_tile(first.x, first.y).await.unwrap().as_ref(), Some(first));
        assert!(store.get_tile(first.x, first.y + 30).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_settlements_in_area() {
        let store = MemoryTileStore::new();
        let world = generator();
        let settlements: Vec<Settlement> = (0..8)
            .flat_map(|i| world.generate_chunk(ChunkPos::new(i, 0)).unwrap().settlements)
            .collect();
        assert!(!settlements.is_empty());

        store.insert_settlements(&settlements).await.unwrap();
        store.insert_settlements(&settlements).await.unwrap();
        assert_eq!(store.settlement_count(), settlements.len());

        let first_chunk = store.settlements_in_area(0, 49, 0, 49).await.unwrap();
        assert!(first_chunk.iter().all(|s| s.x <= 49 && s.y <= 49));
        let everything = store.settlements_in_area(i32::MIN, i32::MAX, i32::MIN, i32::MAX).await.unwrap();
        assert_eq!(everything.len(), settlements.len());
    }

    #[tokio::test]
    async fn test_chunk_tiles_at_i32_edge() {
        let store = MemoryTileStore::new();
        assert!(store.get_chunk_tiles(MAX_CHUNK + 1, 0).await.unwrap().is_empty());
        assert!(store.get_chunk_tiles(i32::MIN, i32::MAX).await.unwrap().is_empty());

        let chunk = generator().generate_chunk(ChunkPos::new(MAX_CHUNK, MIN_CHUNK)).unwrap();
        store.insert_tiles(&chunk.tiles).await.unwrap();
        assert_eq!(store.get_chunk_tiles(MAX_CHUNK, MIN_CHUNK).await.unwrap().len(), CHUNK_AREA);
    }

    #[tokio::test]
    async fn test_seed_record() {
        let store = MemoryTileStore::new();
        assert!(store.load_active_seed().await.unwrap().is_none());
        store.save_active_seed(WorldSeed::from_root(9)).await.unwrap();
        assert_eq!(store.load_active_seed().await.unwrap(), Some(WorldSeed::from_root(9)));
    }
}
