//! Scene telemetry for observability and debugging.
//!
//! Counters are lock-free atomics so they can be read from any thread while
//! the main loop updates them.
//!
//! # Architecture
//!
//! ```text
//! Scene / workers ─────► SceneMetrics ─────► SceneSnapshot ─────► CLI, logs
//!                        (atomic counters)   (point-in-time copy)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tilescene::telemetry::SceneMetrics;
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(SceneMetrics::new());
//! metrics.tile_dispatched();
//! metrics.tile_built();
//!
//! let snapshot = metrics.snapshot();
//! println!("Tiles built: {}", snapshot.tiles_built);
//! ```

mod metrics;
mod snapshot;
mod timer;

pub use metrics::SceneMetrics;
pub use snapshot::SceneSnapshot;
pub use timer::TileSetTimer;
