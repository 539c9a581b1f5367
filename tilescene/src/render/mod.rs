//! Rendering collaborator interface and frame scheduling.
//!
//! The scene does not talk to a GPU directly. Everything that touches GPU
//! state goes through a [`RenderBackend`], which is only ever called from the
//! main loop. [`RenderScheduler`] decides when a frame is drawn and in what
//! order; [`StyleRegistry`] holds the compiled programs per style.
//!
//! [`HeadlessBackend`] records calls instead of drawing, for tests and for
//! the CLI.

mod headless;
mod scheduler;
mod styles;

pub use headless::{DrawCall, HeadlessBackend};
pub use scheduler::{FrameHook, FrameStats, RenderScheduler};
pub use styles::{CompiledStyle, StyleRegistry};

use std::fmt;

use thiserror::Error;

use crate::config::StyleConfig;
use crate::coord::MeterPoint;
use crate::tile::StyleGeometry;

/// Errors reported by a render backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("Failed to compile {kind} program for style '{style}': {reason}")]
    Compile {
        style: String,
        kind: ProgramKind,
        reason: String,
    },

    #[error("Failed to upload geometry for style '{style}': {reason}")]
    Upload { style: String, reason: String },

    #[error("Render backend error: {0}")]
    Backend(String),
}

/// Backend handle to uploaded geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryHandle(u64);

impl GeometryHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Backend handle to a compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(u64);

impl ProgramHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Which of a style's programs to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Draws to the screen.
    Main,
    /// Draws encoded feature ids into the pick buffer.
    Selection,
}

impl fmt::Display for ProgramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramKind::Main => write!(f, "main"),
            ProgramKind::Selection => write!(f, "selection"),
        }
    }
}

/// Render target of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTarget {
    Screen,
    /// Offscreen color+depth target for the pick pass.
    PickBuffer { width: u32, height: u32 },
}

/// Uniforms shared by every draw in a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    /// Device size in pixels.
    pub resolution: (f64, f64),
    /// Aspect scaling, `(1, h/w)` or `(w/h, 1)` style.
    pub aspect: (f64, f64),
    /// Seconds since the scene started.
    pub time: f64,
    pub zoom: f64,
    /// View center in meters.
    pub center: MeterPoint,
    pub meters_per_pixel: f64,
    /// Lowest draw order across renderable tiles.
    pub order_min: i32,
    /// Width of the half-open draw-order range `[min, max + 1)`.
    pub order_range: i32,
}

/// Uniforms for a single tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileUniforms {
    /// Northwest corner in meters.
    pub min: MeterPoint,
    /// Extent in meters.
    pub span: MeterPoint,
    /// Tile-local coordinate range.
    pub tile_scale: u32,
}

/// GPU-facing operations used by the scene.
///
/// Only the main loop calls these.
pub trait RenderBackend {
    fn compile_program(
        &mut self,
        style: &str,
        kind: ProgramKind,
        config: &StyleConfig,
    ) -> Result<ProgramHandle, RenderError>;

    fn upload_geometry(
        &mut self,
        style: &str,
        geometry: &StyleGeometry,
    ) -> Result<GeometryHandle, RenderError>;

    fn release_geometry(&mut self, handle: GeometryHandle);

    /// Resizes the screen target, in device pixels.
    fn resize(&mut self, width: u32, height: u32);

    fn begin_pass(&mut self, target: PassTarget);

    fn end_pass(&mut self);

    /// Per-frame style update, called even when the style draws nothing.
    fn update_style(&mut self, _style: &str, _time: f64) {}

    /// Binds a program and its frame uniforms.
    fn setup_program(
        &mut self,
        program: ProgramHandle,
        frame: &FrameUniforms,
    ) -> Result<(), RenderError>;

    /// Draws geometry and returns the number of primitives drawn.
    fn draw_geometry(
        &mut self,
        program: ProgramHandle,
        tile: &TileUniforms,
        geometry: GeometryHandle,
    ) -> usize;

    /// Reads one pixel of the pick buffer.
    fn read_pick_pixel(&mut self, x: u32, y: u32) -> [u8; 4];
}
