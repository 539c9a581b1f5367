//! Dirty-flag frame scheduling.
//!
//! A frame is only drawn when something visible changed since the last one.
//! The scene drives the sequence:
//!
//! ```text
//! begin_frame() ─► order_range() ─► draw_pass(Main) ─► [draw_pass(Selection)] ─► end_frame()
//!   │ not dirty / view not ready
//!   └─► skip
//! ```

use std::time::Instant;

use tracing::{info, warn};

use super::{FrameUniforms, ProgramKind, RenderBackend, StyleRegistry, TileUniforms};
use crate::coord::TileScale;
use crate::tile::Tile;

/// Callback run before or after a drawn frame, given the frame number.
pub type FrameHook = Box<dyn FnMut(u64) + Send>;

/// Summary of a drawn frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameStats {
    pub frame: u64,
    /// Primitives drawn in the main pass.
    pub render_count: usize,
    /// Renderable tiles.
    pub tiles: usize,
    pub order_min: i32,
    pub order_range: i32,
    /// Whether a pick pass was rendered.
    pub pick_pass: bool,
}

/// Decides when frames are drawn and draws styles across tiles.
pub struct RenderScheduler {
    dirty: bool,
    animated: bool,
    frame: u64,
    last_render_count: Option<usize>,
    started: Instant,
    pre_hook: Option<FrameHook>,
    post_hook: Option<FrameHook>,
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderScheduler {
    /// Creates a scheduler whose first frame is dirty.
    pub fn new() -> Self {
        Self {
            dirty: true,
            animated: false,
            frame: 0,
            last_render_count: None,
            started: Instant::now(),
            pre_hook: None,
            post_hook: None,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// In animated mode every drawn frame schedules the next one.
    pub fn set_animated(&mut self, animated: bool) {
        self.animated = animated;
    }

    pub fn is_animated(&self) -> bool {
        self.animated
    }

    /// Frames drawn so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Seconds since the scheduler was created.
    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn set_pre_hook(&mut self, hook: FrameHook) {
        self.pre_hook = Some(hook);
    }

    pub fn set_post_hook(&mut self, hook: FrameHook) {
        self.post_hook = Some(hook);
    }

    /// Starts a frame if one is needed.
    ///
    /// Returns false, leaving the dirty flag untouched, when the frame is
    /// clean or the view is not ready. Otherwise clears the flag, runs the
    /// pre-hook and returns true.
    pub fn begin_frame(&mut self, view_ready: bool) -> bool {
        if !self.dirty || !view_ready {
            return false;
        }
        self.dirty = false;
        self.frame += 1;

        if let Some(hook) = self.pre_hook.as_mut() {
            hook(self.frame);
        }
        true
    }

    /// Draw-order range across tiles as `(min, range)` of `[min, max + 1)`.
    pub fn order_range(tiles: &[&Tile]) -> (i32, i32) {
        let bounds = tiles
            .iter()
            .map(|t| t.order)
            .reduce(|a, b| a.union(&b));

        match bounds {
            Some(order) => (order.min, order.max + 1 - order.min),
            None => (0, 1),
        }
    }

    /// Draws every style across `tiles` with the programs of `kind`.
    ///
    /// A style's program is set up at most once, and only if at least one
    /// tile has geometry for it. Returns the number of primitives drawn.
    pub fn draw_pass<B>(
        &mut self,
        backend: &mut B,
        styles: &StyleRegistry,
        tiles: &[&Tile],
        frame: &FrameUniforms,
        kind: ProgramKind,
        tile_scale: TileScale,
    ) -> usize
    where
        B: RenderBackend + ?Sized,
    {
        let mut count = 0;

        for (name, style) in styles.iter() {
            if kind == ProgramKind::Main {
                backend.update_style(name, frame.time);
            }

            let Some(program) = style.program(kind) else {
                continue;
            };

            let mut ready = false;
            for tile in tiles {
                let Some(geometry) = tile.geometry.get(name) else {
                    continue;
                };

                if !ready {
                    if let Err(e) = backend.setup_program(program, frame) {
                        warn!(style = %name, error = %e, "Program setup failed, skipping style");
                        break;
                    }
                    ready = true;
                }

                let uniforms = TileUniforms {
                    min: tile.min,
                    span: tile.span,
                    tile_scale: tile_scale.get(),
                };
                count += backend.draw_geometry(program, &uniforms, *geometry);
            }
        }

        count
    }

    /// Finishes a drawn frame.
    pub fn end_frame(&mut self, stats: &FrameStats) {
        if self.last_render_count != Some(stats.render_count) {
            info!(
                primitives = stats.render_count,
                tiles = stats.tiles,
                "Rendered frame"
            );
        }
        self.last_render_count = Some(stats.render_count);

        if let Some(hook) = self.post_hook.as_mut() {
            hook(self.frame);
        }

        if self.animated {
            self.dirty = true;
        }
    }
}
