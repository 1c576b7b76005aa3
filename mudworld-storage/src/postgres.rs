use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use mudworld_gen::{Biome, Settlement, Tile, WorldSeed};
use tokio_postgres::{NoTls, Row};

use crate::TileStore;

pub struct PostgresTileStore {
    pool: Pool,
}

const TILE_COLUMNS: &str = "x, y, chunk_x, chunk_y, biome, height, temperature, moisture, description, seed";

impl PostgresTileStore {
    pub async fn new(connection_string: &str) -> Result<Self> {
        let mut cfg = Config::new();
        cfg.url = Some(connection_string.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .context("Failed to create Postgres pool")?;

        // Ensure connections work and schema exists
        let storage = Self { pool };
        storage.init_schema().await?;

        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let client = self.pool.get().await.context("Failed to get DB connection")?;

        client.batch_execute("
            CREATE TABLE IF NOT EXISTS world_tiles (
                x INT,
                y INT,
                chunk_x INT NOT NULL,
                chunk_y INT NOT NULL,
                biome TEXT NOT NULL,
                height DOUBLE PRECISION NOT NULL,
                temperature DOUBLE PRECISION NOT NULL,
                moisture DOUBLE PRECISION NOT NULL,
                description TEXT NOT NULL,
                seed BIGINT NOT NULL,
                created_at TIMESTAMP DEFAULT NOW(),
                PRIMARY KEY (x, y)
            );
            CREATE INDEX IF NOT EXISTS idx_world_tiles_chunk ON world_tiles (chunk_x, chunk_y);

            CREATE TABLE IF NOT EXISTS settlements (
                x INT,
                y INT,
                name TEXT NOT NULL,
                data JSONB NOT NULL,
                created_at TIMESTAMP DEFAULT NOW(),
                PRIMARY KEY (x, y)
            );

            CREATE TABLE IF NOT EXISTS world_seeds (
                id SERIAL PRIMARY KEY,
                seed BIGINT NOT NULL,
                active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP DEFAULT NOW()
            );
        ").await.context("Failed to init world schema")?;

        Ok(())
    }

    fn row_to_tile(row: &Row) -> Result<Tile> {
        let key: String = row.get(4);
        let biome = Biome::from_key(&key).with_context(|| format!("Unknown biome {:?} in world_tiles", key))?;
        let seed: i64 = row.get(9);
        Ok(Tile {
            x: row.get(0),
            y: row.get(1),
            chunk_x: row.get(2),
            chunk_y: row.get(3),
            biome,
            height: row.get(5),
            temperature: row.get(6),
            moisture: row.get(7),
            description: row.get(8),
            seed: seed as u32,
        })
    }
}

#[async_trait]
impl TileStore for PostgresTileStore {
    async fn get_tile(&self, x: i32, y: i32) -> Result<Option<Tile>> {
        let client = self.pool.get().await.context("Failed to get DB connection")?;
        let sql = format!("SELECT {} FROM world_tiles WHERE x = $1 AND y = $2", TILE_COLUMNS);
        let row = client.query_opt(&sql, &[&x, &y]).await.context("Failed to load tile")?;
        row.as_ref().map(Self::row_to_tile).transpose()
    }

    async fn get_chunk_tiles(&self, chunk_x: i32, chunk_y: i32) -> Result<Vec<Tile>> {
        let client = self.pool.get().await.context("Failed to get DB connection")?;
        let sql = format!("SELECT {} FROM world_tiles WHERE chunk_x = $1 AND chunk_y = $2", TILE_COLUMNS);
        let rows = client.query(&sql, &[&chunk_x, &chunk_y]).await.context("Failed to load chunk tiles")?;
        rows.iter().map(Self::row_to_tile).collect()
    }

    async fn insert_tiles(&self, tiles: &[Tile]) -> Result<()> {
        if tiles.is_empty() {
            return Ok(());
        }
        let client = self.pool.get().await.context("Failed to get DB connection")?;

        // One round trip per batch, columns passed as parallel arrays
        let xs: Vec<i32> = tiles.iter().map(|t| t.x).collect();
        let ys: Vec<i32> = tiles.iter().map(|t| t.y).collect();
        let cxs: Vec<i32> = tiles.iter().map(|t| t.chunk_x).collect();
        let cys: Vec<i32> = tiles.iter().map(|t| t.chunk_y).collect();
        let biomes: Vec<&str> = tiles.iter().map(|t| t.biome.key()).collect();
        let heights: Vec<f64> = tiles.iter().map(|t| t.height).collect();
        let temperatures: Vec<f64> = tiles.iter().map(|t| t.temperature).collect();
        let moistures: Vec<f64> = tiles.iter().map(|t| t.moisture).collect();
        let descriptions: Vec<&str> = tiles.iter().map(|t| t.description.as_str()).collect();
        let seeds: Vec<i64> = tiles.iter().map(|t| t.seed as i64).collect();

        let sql = format!(
            "INSERT INTO world_tiles ({})
             SELECT * FROM UNNEST($1::INT[], $2::INT[], $3::INT[], $4::INT[], $5::TEXT[],
                                  $6::FLOAT8[], $7::FLOAT8[], $8::FLOAT8[], $9::TEXT[], $10::BIGINT[])
             ON CONFLICT (x, y) DO NOTHING",
            TILE_COLUMNS
        );
        client.execute(
            &sql,
            &[&xs, &ys, &cxs, &cys, &biomes, &heights, &temperatures, &moistures, &descriptions, &seeds],
        ).await.context("Failed to insert tiles")?;

        Ok(())
    }

    async fn insert_settlements(&self, settlements: &[Settlement]) -> Result<()> {
        if settlements.is_empty() {
            return Ok(());
        }
        let client = self.pool.get().await.context("Failed to get DB connection")?;

        for s in settlements {
            let data = serde_json::to_value(s).context("Failed to encode settlement")?;
            client.execute(
                "INSERT INTO settlements (x, y, name, data)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (x, y) DO NOTHING",
                &[&s.x, &s.y, &s.name, &data],
            ).await.context("Failed to insert settlement")?;
        }
        Ok(())
    }

    async fn settlements_in_area(&self, min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> Result<Vec<Settlement>> {
        let client = self.pool.get().await.context("Failed to get DB connection")?;
        let rows = client.query(
            "SELECT data FROM settlements
             WHERE x BETWEEN $1 AND $2 AND y BETWEEN $3 AND $4",
            &[&min_x, &max_x, &min_y, &max_y],
        ).await.context("Failed to load settlements")?;

        rows.iter()
            .map(|row| {
                let data: serde_json::Value = row.get(0);
                serde_json::from_value(data).context("Failed to decode settlement")
            })
            .collect()
    }

    async fn tile_count(&self) -> Result<u64> {
        let client = self.pool.get().await.context("Failed to get DB connection")?;
        let row = client.query_one("SELECT COUNT(*) FROM world_tiles", &[]).await.context("Failed to count tiles")?;
        let count: i64 = row.get(0);
        Ok(count as u64)
    }

    async fn biome_distribution(&self) -> Result<BTreeMap<Biome, u64>> {
        let client = self.pool.get().await.context("Failed to get DB connection")?;
        let rows = client.query(
            "SELECT biome, COUNT(*) FROM world_tiles GROUP BY biome",
            &[],
        ).await.context("Failed to load biome distribution")?;

        rows.iter()
            .map(|row| {
                let key: String = row.get(0);
                let count: i64 = row.get(1);
                let biome = Biome::from_key(&key).with_context(|| format!("Unknown biome {:?} in world_tiles", key))?;
                Ok((biome, count as u64))
            })
            .collect()
    }

    async fn load_active_seed(&self) -> Result<Option<WorldSeed>> {
        let client = self.pool.get().await.context("Failed to get DB connection")?;
        let row = client.query_opt(
            "SELECT seed FROM world_seeds WHERE active ORDER BY created_at DESC, id DESC LIMIT 1",
            &[],
        ).await.context("Failed to load world seed")?;

        Ok(row.map(|row| {
            let seed: i64 = row.get(0);
            WorldSeed::from_root(seed as u32)
        }))
    }

    async fn save_active_seed(&self, seed: WorldSeed) -> Result<()> {
        let mut client = self.pool.get().await.context("Failed to get DB connection")?;
        let tx = client.transaction().await.context("Failed to open transaction")?;
        tx.execute("UPDATE world_seeds SET active = FALSE WHERE active", &[])
            .await
            .context("Failed to retire active world seed")?;
        tx.execute(
            "INSERT INTO world_seeds (seed, active) VALUES ($1, TRUE)",
            &[&(seed.root as i64)],
        ).await.context("Failed to save world seed")?;
        tx.commit().await.context("Failed to commit world seed")?;
        Ok(())
    }
}
