use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use lru::LruCache;
use mudworld_gen::ChunkPos;
use parking_lot::Mutex;

use crate::HotCache;

pub fn chunk_key(pos: ChunkPos) -> String {
    format!("chunk:{}:{}", pos.x, pos.y)
}

pub fn tile_key(x: i32, y: i32) -> String {
    format!("tile:{}:{}", x, y)
}

struct Entry {
    expires_at: Instant,
    payload: Vec<u8>,
}

/// In-process hot cache: LRU eviction by entry count plus per-entry TTL.
/// Expired entries are dropped lazily on read.
pub struct LruHotCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl LruHotCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl HotCache for LruHotCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => return Ok(Some(entry.payload.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let entry = Entry {
            expires_at: Instant::now() + ttl,
            payload: value.to_vec(),
        };
        self.entries.lock().put(key.to_string(), entry);
        Ok(())
    }
}
