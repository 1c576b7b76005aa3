use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Monotonic counters for the read/generate path. Reset only on restart.
#[derive(Debug)]
pub struct WorldMetrics {
    // Hot cache
    pub cache_hits: AtomicUsize,
    pub cache_misses: AtomicUsize,
    pub cache_errors: AtomicUsize,

    // Tile store
    pub store_hits: AtomicUsize,
    pub store_misses: AtomicUsize,
    pub total_store_read_us: AtomicU64,
    pub store_reads: AtomicUsize,
    pub chunks_saved: AtomicUsize,
    pub total_save_time_us: AtomicU64,
    pub save_failures: AtomicUsize,

    // Generation
    pub chunks_generated: AtomicUsize,
    pub total_generation_time_us: AtomicU64,
    pub max_generation_time_us: AtomicU64,
    pub generation_failures: AtomicUsize,

    // Single-flight
    pub coalesced_requests: AtomicUsize,

    pub start_time: Instant,
}

impl Default for WorldMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`WorldMetrics`] with derived rates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: f64,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_errors: usize,
    pub cache_hit_rate: f64,
    pub store_hits: usize,
    pub store_misses: usize,
    pub store_hit_rate: f64,
    pub average_store_read_ms: f64,
    pub chunks_saved: usize,
    pub save_failures: usize,
    pub average_save_ms: f64,
    pub chunks_generated: usize,
    pub generation_failures: usize,
    pub average_generation_ms: f64,
    pub max_generation_ms: f64,
    pub coalesced_requests: usize,
}

fn rate(hits: usize, misses: usize) -> f64 {
    let total = hits + misses;
    if total > 0 { (hits as f64 / total as f64) * 100.0 } else { 0.0 }
}

fn average_ms(total_us: u64, count: usize) -> f64 {
    if count > 0 { total_us as f64 / 1000.0 / count as f64 } else { 0.0 }
}

impl WorldMetrics {
    pub fn new() -> Self {
        Self {
            cache_hits: AtomicUsize::new(0),
            cache_misses: AtomicUsize::new(0),
            cache_errors: AtomicUsize::new(0),
            store_hits: AtomicUsize::new(0),
            store_misses: AtomicUsize::new(0),
            total_store_read_us: AtomicU64::new(0),
            store_reads: AtomicUsize::new(0),
            chunks_saved: AtomicUsize::new(0),
            total_save_time_us: AtomicU64::new(0),
            save_failures: AtomicUsize::new(0),
            chunks_generated: AtomicUsize::new(0),
            total_generation_time_us: AtomicU64::new(0),
            max_generation_time_us: AtomicU64::new(0),
            generation_failures: AtomicUsize::new(0),
            coalesced_requests: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A cache operation failed; callers treat it as a miss.
    pub fn record_cache_error(&self) {
        self.cache_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_read(&self, duration: Duration) {
        self.store_reads.fetch_add(1, Ordering::Relaxed);
        self.total_store_read_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_store_hit(&self) {
        self.store_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_miss(&self) {
        self.store_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_save(&self, duration: Duration) {
        self.chunks_saved.fetch_add(1, Ordering::Relaxed);
        self.total_save_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_save_failure(&self) {
        self.save_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_generation(&self, duration: Duration) {
        self.chunks_generated.fetch_add(1, Ordering::Relaxed);
        let us = duration.as_micros() as u64;
        self.total_generation_time_us.fetch_add(us, Ordering::Relaxed);
        self.max_generation_time_us.fetch_max(us, Ordering::Relaxed);
    }

    pub fn record_generation_failure(&self) {
        self.generation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A request joined a generation already in flight for its chunk.
    pub fn record_coalesced(&self) {
        self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let store_hits = self.store_hits.load(Ordering::Relaxed);
        let store_misses = self.store_misses.load(Ordering::Relaxed);
        let chunks_saved = self.chunks_saved.load(Ordering::Relaxed);
        let chunks_generated = self.chunks_generated.load(Ordering::Relaxed);

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs_f64(),
            cache_hits,
            cache_misses,
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
            cache_hit_rate: rate(cache_hits, cache_misses),
            store_hits,
            store_misses,
            store_hit_rate: rate(store_hits, store_misses),
            average_store_read_ms: average_ms(
                self.total_store_read_us.load(Ordering::Relaxed),
                self.store_reads.load(Ordering::Relaxed),
            ),
            chunks_saved,
            save_failures: self.save_failures.load(Ordering::Relaxed),
            average_save_ms: average_ms(self.total_save_time_us.load(Ordering::Relaxed), chunks_saved),
            chunks_generated,
            generation_failures: self.generation_failures.load(Ordering::Relaxed),
            average_generation_ms: average_ms(self.total_generation_time_us.load(Ordering::Relaxed), chunks_generated),
            max_generation_ms: self.max_generation_time_us.load(Ordering::Relaxed) as f64 / 1000.0,
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
        }
    }

    pub fn generate_report(&self) -> String {
        let s = self.snapshot();
        format!(
            "MudWorld Generation Report\n\
             ==========================\n\
             Uptime: {:.2}s\n\n\
             [Generation]\n\
             Chunks Generated: {}\n\
             Failures: {}\n\
             Avg Time: {:.2} ms/chunk\n\
             Max Time: {:.2} ms\n\
             Coalesced Requests: {}\n\n\
             [Tile Store]\n\
             Hits: {}\n\
             Misses: {}\n\
             Hit Rate: {:.1}%\n\
             Avg Read: {:.2} ms\n\
             Chunks Saved: {} ({} failed)\n\
             Avg Save: {:.2} ms/chunk\n\n\
             [Hot Cache]\n\
             Hits: {}\n\
             Misses: {}\n\
             Errors: {}\n\
             Hit Rate: {:.1}%\n",
            s.uptime_secs,
            s.chunks_generated, s.generation_failures, s.average_generation_ms, s.max_generation_ms,
            s.coalesced_requests,
            s.store_hits, s.store_misses, s.store_hit_rate, s.average_store_read_ms,
            s.chunks_saved, s.save_failures, s.average_save_ms,
            s.cache_hits, s.cache_misses, s.cache_errors, s.cache_hit_rate
        )
    }
}
