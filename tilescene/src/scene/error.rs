//! Scene errors.

use thiserror::Error;

use crate::config::ConfigError;
use crate::coord::CoordError;
use crate::render::RenderError;
use crate::worker::WorkerError;

/// Errors surfaced by [`Scene`](super::Scene).
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Scene config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid camera input: {0}")]
    Coord(#[from] CoordError),

    /// Worker pool creation or messaging failed. Fatal during startup.
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// The main loop observed state that only a logic defect can produce.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
}
