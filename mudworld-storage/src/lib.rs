use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use mudworld_gen::{Biome, Settlement, Tile, WorldSeed};

pub mod cache;
pub mod memory;
pub mod postgres;

pub use cache::{LruHotCache, chunk_key, tile_key};
pub use memory::MemoryTileStore;
pub use postgres::PostgresTileStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Memory,   // Process-local, lost on exit
    Postgres, // Durable
}

impl std::str::FromStr for StorageMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" | "none" => Ok(StorageMode::Memory),
            "postgres" | "pg" | "postgresql" => Ok(StorageMode::Postgres),
            other => bail!("unknown storage mode {:?} (expected memory or postgres)", other),
        }
    }
}

/// Durable tile and settlement persistence.
#[async_trait]
pub trait TileStore: Send + Sync {
    async fn get_tile(&self, x: i32, y: i32) -> Result<Option<Tile>>;

    /// Every stored tile of the chunk, in no particular order.
    /// May return anywhere from zero to all of the chunk's tiles.
    async fn get_chunk_tiles(&self, chunk_x: i32, chunk_y: i32) -> Result<Vec<Tile>>;

    /// Insert tiles. Tiles already stored at the same coordinate are skipped,
    /// never duplicated and never an error.
    async fn insert_tiles(&self, tiles: &[Tile]) -> Result<()>;

    /// Insert settlements, idempotent by center coordinate.
    async fn insert_settlements(&self, settlements: &[Settlement]) -> Result<()>;

    /// Settlements whose center lies in the inclusive rectangle.
    async fn settlements_in_area(&self, min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> Result<Vec<Settlement>>;

    async fn tile_count(&self) -> Result<u64>;

    /// Stored tiles per biome. Biomes with no tiles are absent.
    async fn biome_distribution(&self) -> Result<BTreeMap<Biome, u64>>;

    async fn load_active_seed(&self) -> Result<Option<WorldSeed>>;
    async fn save_active_seed(&self, seed: WorldSeed) -> Result<()>;
}

/// Fast volatile cache. Any call may fail; callers treat failure as a miss.
#[async_trait]
pub trait HotCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;
}
