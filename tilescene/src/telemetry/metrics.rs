//! Atomic scene counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::SceneSnapshot;

/// Lock-free counters updated by the scene.
///
/// Share it with `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct SceneMetrics {
    started: Instant,

    tiles_dispatched: AtomicU64,
    tiles_built: AtomicU64,
    tiles_failed: AtomicU64,
    tiles_evicted: AtomicU64,
    late_replies: AtomicU64,

    rebuilds_started: AtomicU64,
    rebuilds_completed: AtomicU64,
    rebuilds_superseded: AtomicU64,

    frames_rendered: AtomicU64,
    pick_passes: AtomicU64,
    picks_requested: AtomicU64,
    picks_resolved: AtomicU64,

    selection_map_size: AtomicU64,
}

impl Default for SceneMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneMetrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            tiles_dispatched: AtomicU64::new(0),
            tiles_built: AtomicU64::new(0),
            tiles_failed: AtomicU64::new(0),
            tiles_evicted: AtomicU64::new(0),
            late_replies: AtomicU64::new(0),
            rebuilds_started: AtomicU64::new(0),
            rebuilds_completed: AtomicU64::new(0),
            rebuilds_superseded: AtomicU64::new(0),
            frames_rendered: AtomicU64::new(0),
            pick_passes: AtomicU64::new(0),
            picks_requested: AtomicU64::new(0),
            picks_resolved: AtomicU64::new(0),
            selection_map_size: AtomicU64::new(0),
        }
    }

    // =========================================================================
    // Tiles
    // =========================================================================

    pub fn tile_dispatched(&self) {
        self.tiles_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_built(&self) {
        self.tiles_built.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_failed(&self) {
        self.tiles_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tiles_evicted(&self, count: usize) {
        self.tiles_evicted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn late_reply(&self) {
        self.late_replies.fetch_add(1, Ordering::Relaxed);
    }

    // =========================================================================
    // Rebuilds
    // =========================================================================

    pub fn rebuild_started(&self) {
        self.rebuilds_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rebuild_completed(&self) {
        self.rebuilds_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rebuild_superseded(&self) {
        self.rebuilds_superseded.fetch_add(1, Ordering::Relaxed);
    }

    // =========================================================================
    // Frames and picking
    // =========================================================================

    pub fn frame_rendered(&self) {
        self.frames_rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pick_pass(&self) {
        self.pick_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pick_requested(&self) {
        self.picks_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pick_resolved(&self) {
        self.picks_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_selection_map_size(&self, size: usize) {
        self.selection_map_size
            .store(size as u64, Ordering::Relaxed);
    }

    /// Copies all counters.
    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            uptime: self.started.elapsed(),
            tiles_dispatched: self.tiles_dispatched.load(Ordering::Relaxed),
            tiles_built: self.tiles_built.load(Ordering::Relaxed),
            tiles_failed: self.tiles_failed.load(Ordering::Relaxed),
            tiles_evicted: self.tiles_evicted.load(Ordering::Relaxed),
            late_replies: self.late_replies.load(Ordering::Relaxed),
            rebuilds_started: self.rebuilds_started.load(Ordering::Relaxed),
            rebuilds_completed: self.rebuilds_completed.load(Ordering::Relaxed),
            rebuilds_superseded: self.rebuilds_superseded.load(Ordering::Relaxed),
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            pick_passes: self.pick_passes.load(Ordering::Relaxed),
            picks_requested: self.picks_requested.load(Ordering::Relaxed),
            picks_resolved: self.picks_resolved.load(Ordering::Relaxed),
            selection_map_size: self.selection_map_size.load(Ordering::Relaxed),
        }
    }
}
