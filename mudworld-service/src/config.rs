use std::time::Duration;

/// Tunables for [`crate::WorldService`]. The world seed is not here; it is
/// resolved once and carried by the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSettings {
    /// Generation worker threads.
    pub pool_size: usize,
    /// Tasks allowed to wait for a worker before `submit` itself waits.
    pub queue_capacity: usize,
    pub cache_ttl: Duration,
    pub shutdown_timeout: Duration,
    /// Lookups of a single tile before giving up with `TileUnavailable`.
    pub max_tile_attempts: u32,
    pub neighbor_radius: i32,
    pub max_nearby_biomes: usize,
    pub settlement_search_radius: i32,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            pool_size: 4,
            queue_capacity: 64,
            cache_ttl: Duration::from_secs(60 * 60),
            shutdown_timeout: Duration::from_secs(10),
            max_tile_attempts: 3,
            neighbor_radius: 5,
            max_nearby_biomes: 5,
            settlement_search_radius: 50,
        }
    }
}
