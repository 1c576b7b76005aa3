use std::sync::Arc;

use mudworld_gen::ChunkPos;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("worker pool is closed")]
    Closed,
    #[error("task {task_id} panicked: {message}")]
    TaskPanicked { task_id: u64, message: String },
    #[error("task {task_id} failed: {message}")]
    TaskFailed { task_id: u64, message: String },
    #[error("task abandoned after shutdown timeout")]
    ShutdownTimeout,
    #[error("task result channel dropped")]
    Cancelled,
}

/// Errors returned to callers of the world service.
///
/// `Clone` so a single generation outcome can be handed to every caller
/// waiting on the same chunk.
#[derive(Debug, Clone, Error)]
pub enum WorldError {
    /// Store read failed. The caller may retry.
    #[error("tile store error: {0:#}")]
    Store(Arc<anyhow::Error>),

    #[error("generation of chunk {pos} failed: {source}")]
    Generation { pos: ChunkPos, source: PoolError },

    #[error("tile ({x}, {y}) unavailable after {attempts} attempts")]
    TileUnavailable { x: i32, y: i32, attempts: u32 },

    /// Some tile of the chunk has no `i32` coordinate.
    #[error("chunk {pos} lies outside the world")]
    OutOfBounds { pos: ChunkPos },

    #[error("world service is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl WorldError {
    pub fn store(err: anyhow::Error) -> Self {
        WorldError::Store(Arc::new(err))
    }

    /// Sorts a pool failure into a task failure or a pool-level failure.
    pub fn from_pool(pos: ChunkPos, err: PoolError) -> Self {
        match err {
            PoolError::TaskPanicked { .. } | PoolError::TaskFailed { .. } => WorldError::Generation { pos, source: err },
            other => WorldError::Pool(other),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, WorldError::Store(_))
    }
}

pub type WorldResult<T> = Result<T, WorldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_sorted() {
        let pos = ChunkPos::new(1, 2);
        let failed = PoolError::TaskFailed { task_id: 7, message: "boom".into() };
        assert!(matches!(WorldError::from_pool(pos, failed), WorldError::Generation { .. }));
        assert!(matches!(WorldError::from_pool(pos, PoolError::Closed), WorldError::Pool(PoolError::Closed)));
    }

    #[test]
    fn test_messages() {
        let err = WorldError::TileUnavailable { x: 3, y: -4, attempts: 3 };
        assert_eq!(err.to_string(), "tile (3, -4) unavailable after 3 attempts");
        let err = WorldError::store(anyhow::anyhow!("connection reset"));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("connection reset"));
        let err = WorldError::OutOfBounds { pos: ChunkPos::new(50_000_000, 0) };
        assert_eq!(err.to_string(), "chunk 50000000,0 lies outside the world");
        assert!(!err.is_retryable());
    }
}
