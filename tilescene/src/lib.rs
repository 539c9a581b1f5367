//! TileScene - tiled vector map scene core
//!
//! This library manages the lifecycle of map tiles for a vector map renderer:
//! which tiles the camera needs, which worker builds each one, when cached
//! tiles are evicted, how config changes trigger coalesced rebuilds, how
//! frames are scheduled and how feature picks resolve through an offscreen
//! selection buffer.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                          Scene                             │
//! │  ViewState · TileCache · BuildSession · SelectionPicker    │
//! │                    RenderScheduler                         │
//! └──────────┬──────────────────────────────────┬──────────────┘
//!            │ WorkerRequest                    │ RenderBackend
//!            ▼                                  ▼
//! ┌──────────────────────┐           ┌──────────────────────┐
//! │ WorkerPool           │           │ GPU / headless       │
//! │  WorkerRuntime × N   │           │ backend              │
//! │   └─ TileBuilder     │           └──────────────────────┘
//! └──────────┬───────────┘
//!            │ WorkerEvent
//!            └──────────► Scene::render (next tick)
//! ```
//!
//! Geometry building is pluggable through [`worker::TileBuilder`] and drawing
//! through [`render::RenderBackend`]; [`render::HeadlessBackend`] records
//! calls instead of drawing and is used by the CLI and the tests.

pub mod build;
pub mod config;
pub mod coord;
pub mod logging;
pub mod pick;
pub mod render;
pub mod scene;
pub mod source;
pub mod telemetry;
pub mod tile;
pub mod worker;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
