use anyhow::Result;

pub mod biome;
pub mod builder;
pub mod chunk;
pub mod climate;
pub mod settlement;
pub mod terrain;

pub use biome::{Biome, BiomeInfo};
pub use builder::ChunkBuilder;
pub use chunk::{CHUNK_AREA, CHUNK_SIZE, Chunk, MAX_CHUNK, MIN_CHUNK, ChunkPos, ChunkStats, Tile};
pub use climate::{ClimateSample, NoiseConfig, NoiseField, WorldSeed};
pub use settlement::{Footprint, FootprintTile, Settlement, SettlementKind, SettlementPlacer, SettlementSize, SettlementTable};
pub use terrain::TerrainGenerator;

/// A source of whole chunks.
///
/// Implementations must be pure: the same chunk position always yields the
/// same chunk, regardless of call order or the thread it runs on.
pub trait WorldGenerator: Send + Sync {
    fn generate_chunk(&self, pos: ChunkPos) -> Result<Chunk>;

    /// Seed this generator was built from. Stamped on every tile it produces.
    fn seed(&self) -> WorldSeed;
}
