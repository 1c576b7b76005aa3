use anyhow::{Result, bail};

use crate::WorldGenerator;
use crate::biome::Biome;
use crate::builder::ChunkBuilder;
use crate::chunk::{Chunk, ChunkPos, Tile};
use crate::climate::{NoiseField, WorldSeed};
use crate::settlement::{SettlementPlacer, SettlementTable};

/// Layered-noise terrain with biome classification and settlement placement.
///
/// The noise tables are built once per world and shared read-only by every
/// worker that generates chunks.
pub struct TerrainGenerator {
    seed: WorldSeed,
    noise: NoiseField,
    settlements: SettlementPlacer,
}

impl TerrainGenerator {
    pub fn new(seed: WorldSeed) -> Self {
        Self::with_table(seed, SettlementTable::default())
    }

    pub fn with_table(seed: WorldSeed, table: SettlementTable) -> Self {
        Self {
            seed,
            noise: NoiseField::new(seed),
            settlements: SettlementPlacer::with_table(seed.root, table),
        }
    }

    /// A single tile, computed without generating its chunk.
    pub fn tile(&self, x: i32, y: i32) -> Tile {
        let sample = self.noise.sample(x, y);
        let biome = Biome::classify(sample.height, sample.temperature, sample.moisture);
        let pos = ChunkPos::of_tile(x, y);

        Tile {
            x,
            y,
            chunk_x: pos.x,
            chunk_y: pos.y,
            biome,
            height: sample.height,
            temperature: sample.temperature,
            moisture: sample.moisture,
            description: biome.describe(sample.height, sample.temperature, sample.moisture),
            seed: self.seed.root,
        }
    }
}

impl WorldGenerator for TerrainGenerator {
    /// Generates a chunk tile by tile in row-major order.
    ///
    /// # Pipeline (per tile)
    /// 1. Sample height, temperature and moisture from the noise field
    /// 2. Classify the biome
    /// 3. Run the tile's settlement trial
    ///
    /// Settlement candidates are then offered column by column (x outer,
    /// y inner); each is kept unless it crowds one already placed.
    fn generate_chunk(&self, pos: ChunkPos) -> Result<Chunk> {
        if !pos.in_bounds() {
            bail!("chunk {} lies outside the i32 tile range", pos);
        }
        let mut builder = ChunkBuilder::new(pos);
        let mut candidates = Vec::new();

        while let Some((x, y)) = builder.next_coord() {
            let tile = self.tile(x, y);
            let biome = tile.biome;
            builder.push_tile(tile)?;
            candidates.extend(self.settlements.evaluate(x, y, biome));
        }

        candidates.sort_by_key(|s| (s.x, s.y));
        for settlement in candidates {
            builder.offer_settlement(settlement);
        }

        builder.build()
    }

    fn seed(&self) -> WorldSeed {
        self.seed
    }
}
