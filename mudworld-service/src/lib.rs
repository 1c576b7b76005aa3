use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::Context;
use mudworld_gen::{Biome, CHUNK_AREA, Chunk, ChunkPos, Tile, WorldGenerator, WorldSeed};
use mudworld_metrics::{MetricsSnapshot, WorldMetrics};
use mudworld_storage::{HotCache, TileStore, chunk_key, tile_key};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub mod config;
pub mod error;
pub mod inflight;
pub mod neighbors;
pub mod pool;

pub use config::WorldSettings;
pub use error::{PoolError, WorldError, WorldResult};
pub use neighbors::{Direction, NearbyBiome, NearbySettlement, SettlementMembership, TileWithNeighborInfo};
pub use pool::{PoolStats, WorkerPool};

use inflight::{Flight, InFlight};
use neighbors::BiomeScan;

type ChunkOutcome = WorldResult<Arc<Chunk>>;

#[derive(Debug, Clone, Serialize)]
pub struct WorldStats {
    pub seed: WorldSeed,
    /// Tiles in the persistent store.
    pub total_tiles: u64,
    /// Stored tiles in whole-chunk units, rounded up.
    pub total_chunks: u64,
    pub biome_distribution: BTreeMap<Biome, u64>,
    pub metrics: MetricsSnapshot,
    pub pool: PoolStats,
    pub report: String,
}

/// Picks the world seed once at start-up.
///
/// An explicit seed wins and becomes the active record. Otherwise the
/// active record is reused, and a fresh random seed is saved if there is none.
pub async fn resolve_seed(store: &dyn TileStore, explicit: Option<u32>) -> anyhow::Result<WorldSeed> {
    let active = store.load_active_seed().await.context("Failed to load active world seed")?;

    let seed = match (explicit, active) {
        (Some(root), Some(active)) if active.root == root => return Ok(active),
        (Some(root), _) => WorldSeed::from_root(root),
        (None, Some(active)) => {
            log::info!("Using stored world seed {}", active.root);
            return Ok(active);
        }
        (None, None) => WorldSeed::from_root(rand::random::<u32>()),
    };

    store.save_active_seed(seed).await.context("Failed to save world seed")?;
    log::info!("Active world seed is now {}", seed.root);
    Ok(seed)
}

/// Read path for tiles and chunks: hot cache, then tile store, then
/// generation on the worker pool, with at most one generation per chunk in
/// flight.
pub struct WorldService {
    generator: Arc<dyn WorldGenerator>,
    store: Arc<dyn TileStore>,
    cache: Option<Arc<dyn HotCache>>,
    metrics: Arc<WorldMetrics>,
    pool: WorkerPool<Chunk>,
    inflight: InFlight<ChunkPos, ChunkOutcome>,
    settings: WorldSettings,
    shutting_down: AtomicBool,
}

impl WorldService {
    pub fn new(
        generator: Arc<dyn WorldGenerator>,
        store: Arc<dyn TileStore>,
        cache: Option<Arc<dyn HotCache>>,
        metrics: Arc<WorldMetrics>,
        settings: WorldSettings,
    ) -> anyhow::Result<Self> {
        let pool = WorkerPool::new(settings.pool_size, settings.queue_capacity)?;
        log::info!(
            "World service ready (seed {}, cache {})",
            generator.seed().root,
            if cache.is_some() { "enabled" } else { "disabled" }
        );

        Ok(Self {
            generator,
            store,
            cache,
            metrics,
            pool,
            inflight: InFlight::new(),
            settings,
            shutting_down: AtomicBool::new(false),
        })
    }

    pub fn seed(&self) -> WorldSeed {
        self.generator.seed()
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    fn ensure_running(&self) -> WorldResult<()> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(WorldError::ShuttingDown);
        }
        Ok(())
    }

    // --- Hot cache. Failures degrade to a miss. ---

    async fn cache_get<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    self.metrics.record_cache_hit();
                    Some(value)
                }
                Err(e) => {
                    log::warn!("Discarding undecodable cache entry {}: {}", key, e);
                    self.metrics.record_cache_error();
                    self.metrics.record_cache_miss();
                    None
                }
            },
            Ok(None) => {
                self.metrics.record_cache_miss();
                None
            }
            Err(e) => {
                log::warn!("Hot cache get {} failed, treating as miss: {:#}", key, e);
                self.metrics.record_cache_error();
                self.metrics.record_cache_miss();
                None
            }
        }
    }

    async fn cache_put<T: Serialize + Sync + ?Sized>(&self, key: &str, value: &T) {
        let Some(cache) = self.cache.as_ref() else { return };
        let payload = match serde_json::to_vec(value) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("Failed to encode cache entry {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = cache.set_with_ttl(key, &payload, self.settings.cache_ttl).await {
            log::warn!("Hot cache set {} failed: {:#}", key, e);
            self.metrics.record_cache_error();
        }
    }

    // --- Chunks ---

    pub async fn get_chunk(&self, chunk_x: i32, chunk_y: i32) -> ChunkOutcome {
        self.ensure_running()?;
        let pos = ChunkPos::new(chunk_x, chunk_y);
        if !pos.in_bounds() {
            return Err(WorldError::OutOfBounds { pos });
        }

        if let Some(chunk) = self.cache_get::<Chunk>(&chunk_key(pos)).await {
            return Ok(Arc::new(chunk));
        }

        // A follower whose leader was dropped before finishing joins again,
        // and may become the leader itself.
        loop {
            match self.inflight.join(pos) {
                Flight::Leader(guard) => {
                    let outcome = self.load_or_generate(pos).await;
                    guard.complete(outcome.clone());
                    return outcome;
                }
                Flight::Follower(waiter) => {
                    self.metrics.record_coalesced();
                    log::debug!("Chunk {} already in flight, waiting", pos);
                    if let Some(outcome) = waiter.wait().await {
                        return outcome;
                    }
                    self.ensure_running()?;
                    log::debug!("Leader for chunk {} went away, rejoining", pos);
                }
            }
        }
    }

    async fn load_or_generate(&self, pos: ChunkPos) -> ChunkOutcome {
        if let Some(chunk) = self.load_stored_chunk(pos).await? {
            let chunk = Arc::new(chunk);
            self.cache_put(&chunk_key(pos), chunk.as_ref()).await;
            return Ok(chunk);
        }

        let generator = self.generator.clone();
        let start = Instant::now();
        let chunk = match self.pool.submit(move || generator.generate_chunk(pos)).await {
            Ok(chunk) => chunk,
            Err(e) => {
                self.metrics.record_generation_failure();
                log::error!("Generation of chunk {} failed: {}", pos, e);
                return Err(WorldError::from_pool(pos, e));
            }
        };
        let elapsed = start.elapsed();
        self.metrics.record_generation(elapsed);

        let biomes: Vec<&str> = chunk.stats.biomes.keys().map(|b| b.key()).collect();
        log::info!(
            "Generated chunk {} in {:.1} ms ({} settlements): {}",
            pos,
            elapsed.as_secs_f64() * 1000.0,
            chunk.settlements.len(),
            biomes.join(", ")
        );

        self.persist(&chunk).await;
        let chunk = Arc::new(chunk);
        self.cache_put(&chunk_key(pos), chunk.as_ref()).await;
        Ok(chunk)
    }

    /// A chunk rebuilt from the store, or `None` unless every tile is there.
    async fn load_stored_chunk(&self, pos: ChunkPos) -> WorldResult<Option<Chunk>> {
        let start = Instant::now();
        let tiles = self.store.get_chunk_tiles(pos.x, pos.y).await;
        self.metrics.record_store_read(start.elapsed());
        let tiles = tiles.map_err(WorldError::store)?;

        if tiles.len() != CHUNK_AREA {
            self.metrics.record_store_miss();
            if !tiles.is_empty() {
                log::debug!("Chunk {} partially stored ({} of {} tiles)", pos, tiles.len(), CHUNK_AREA);
            }
            return Ok(None);
        }

        let Some((min_x, max_x, min_y, max_y)) = pos.tile_bounds() else {
            return Err(WorldError::OutOfBounds { pos });
        };
        let settlements = self
            .store
            .settlements_in_area(min_x, max_x, min_y, max_y)
            .await
            .map_err(WorldError::store)?;

        match Chunk::from_tiles(pos, tiles, settlements) {
            Ok(chunk) => {
                self.metrics.record_store_hit();
                Ok(Some(chunk))
            }
            Err(e) => {
                log::error!("Stored chunk {} is inconsistent, regenerating: {:#}", pos, e);
                self.metrics.record_store_miss();
                Ok(None)
            }
        }
    }

    /// Write failures are logged only; the caller still gets the chunk.
    async fn persist(&self, chunk: &Chunk) {
        let start = Instant::now();
        let saved = async {
            self.store.insert_tiles(&chunk.tiles).await.context("insert tiles")?;
            self.store.insert_settlements(&chunk.settlements).await.context("insert settlements")?;
            anyhow::Ok(())
        }
        .await;

        match saved {
            Ok(()) => self.metrics.record_save(start.elapsed()),
            Err(e) => {
                self.metrics.record_save_failure();
                log::error!("Failed to persist chunk {}: {:#}", chunk.pos, e);
            }
        }
    }

    // --- Tiles ---

    /// One tile, generating its chunk if needed.
    ///
    /// Bounded by `max_tile_attempts`; running out is `TileUnavailable`.
    pub async fn tile(&self, x: i32, y: i32) -> WorldResult<Tile> {
        self.ensure_running()?;
        let key = tile_key(x, y);
        let pos = ChunkPos::of_tile(x, y);
        if !pos.in_bounds() {
            return Err(WorldError::OutOfBounds { pos });
        }
        let attempts = self.settings.max_tile_attempts.max(1);

        for attempt in 1..=attempts {
            if let Some(tile) = self.cache_get::<Tile>(&key).await {
                return Ok(tile);
            }

            let start = Instant::now();
            let stored = self.store.get_tile(x, y).await;
            self.metrics.record_store_read(start.elapsed());
            if let Some(tile) = stored.map_err(WorldError::store)? {
                self.metrics.record_store_hit();
                self.cache_put(&key, &tile).await;
                return Ok(tile);
            }
            self.metrics.record_store_miss();

            let chunk = self.get_chunk(pos.x, pos.y).await?;
            if let Some(tile) = chunk.tile_at(x, y) {
                self.cache_put(&key, tile).await;
                return Ok(tile.clone());
            }
            log::warn!("Chunk {} has no tile ({}, {}) (attempt {}/{})", pos, x, y, attempt, attempts);
        }

        log::error!("Tile ({}, {}) unavailable after {} attempts", x, y, attempts);
        Err(WorldError::TileUnavailable { x, y, attempts })
    }

    /// A tile plus its surroundings.
    pub async fn get_tile(&self, x: i32, y: i32) -> WorldResult<TileWithNeighborInfo> {
        let tile = self.tile(x, y).await?;
        let nearby_biomes = self.scan_nearby_biomes(&tile).await;

        let r = self.settings.settlement_search_radius;
        let settlements = self
            .store
            .settlements_in_area(x.saturating_sub(r), x.saturating_add(r), y.saturating_sub(r), y.saturating_add(r))
            .await
            .map_err(WorldError::store)?;

        Ok(TileWithNeighborInfo {
            nearby_settlements: neighbors::nearby_settlements(x, y, r, &settlements),
            settlement: neighbors::membership(x, y, &settlements),
            nearby_biomes,
            tile,
        })
    }

    /// Expanding square rings around the tile until enough distinct biomes
    /// are found. Neighbor failures are skipped.
    async fn scan_nearby_biomes(&self, center: &Tile) -> Vec<NearbyBiome> {
        let mut scan = BiomeScan::new(center.biome, self.settings.max_nearby_biomes);

        'rings: for radius in 1..=self.settings.neighbor_radius {
            for (dx, dy) in neighbors::perimeter(radius) {
                if scan.is_full() {
                    break 'rings;
                }
                let (Some(x), Some(y)) = (center.x.checked_add(dx), center.y.checked_add(dy)) else {
                    continue;
                };
                match self.tile(x, y).await {
                    Ok(tile) => scan.offer(dx, dy, tile.biome),
                    Err(e) => log::debug!("Skipping neighbor ({}, {}): {}", x, y, e),
                }
            }
        }

        scan.finish()
    }

    // --- Lifecycle ---

    /// Store totals plus this process's counters.
    pub async fn stats(&self) -> WorldResult<WorldStats> {
        let total_tiles = self.store.tile_count().await.map_err(WorldError::store)?;
        let biome_distribution = self.store.biome_distribution().await.map_err(WorldError::store)?;

        Ok(WorldStats {
            seed: self.seed(),
            total_tiles,
            total_chunks: total_tiles.div_ceil(CHUNK_AREA as u64),
            biome_distribution,
            metrics: self.metrics.snapshot(),
            pool: self.pool.stats(),
            report: self.metrics.generate_report(),
        })
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Rejects new requests, fails callers still waiting on another
    /// request's generation, then drains the worker pool.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let aborted = self.inflight.abort_all(Err(WorldError::ShuttingDown));
        if aborted > 0 {
            log::info!("Released waiters of {} in-flight chunks", aborted);
        }
        self.pool.shutdown(self.settings.shutdown_timeout).await;
    }
}
