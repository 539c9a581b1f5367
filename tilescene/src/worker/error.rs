//! Worker pool and tile build errors.

use thiserror::Error;

/// Errors raised by the worker pool.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkerError {
    /// Pool size outside `1..=254`.
    #[error("Invalid worker pool size: {0} (must be between 1 and 254)")]
    InvalidPoolSize(usize),

    /// A worker rejected its init handshake.
    #[error("Worker {worker_id} failed its handshake: {reason}")]
    HandshakeFailed { worker_id: u8, reason: String },

    /// A worker did not acknowledge its init message in time.
    #[error("Worker {worker_id} did not acknowledge init within {timeout_ms}ms")]
    HandshakeTimeout { worker_id: u8, timeout_ms: u64 },

    /// The worker task is gone and its channel is closed.
    #[error("Worker {0} is disconnected")]
    Disconnected(u8),

    /// No worker with this id exists in the pool.
    #[error("Unknown worker id: {0}")]
    UnknownWorker(u8),
}

/// Errors from building a single tile.
///
/// These never abort a rebuild; the tile is recorded as failed and the
/// generation counts it as finished.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// The worker has not received a scene config yet.
    #[error("No scene config has been sent to this worker")]
    NoConfig,

    /// The worker has not completed its handshake.
    #[error("Worker is not initialized")]
    NotInitialized,

    /// The raw tile data could not be obtained or decoded.
    #[error("Tile data unavailable: {0}")]
    Source(String),

    /// Geometry construction failed.
    #[error("Geometry build failed: {0}")]
    Geometry(String),
}
