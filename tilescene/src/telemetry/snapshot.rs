//! Point-in-time copy of scene counters.

use std::time::Duration;

/// Scene counters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SceneSnapshot {
    pub uptime: Duration,

    pub tiles_dispatched: u64,
    pub tiles_built: u64,
    pub tiles_failed: u64,
    pub tiles_evicted: u64,
    /// Replies for tiles no longer in the cache.
    pub late_replies: u64,

    pub rebuilds_started: u64,
    pub rebuilds_completed: u64,
    pub rebuilds_superseded: u64,

    pub frames_rendered: u64,
    pub pick_passes: u64,
    pub picks_requested: u64,
    pub picks_resolved: u64,

    /// Total entries in all workers' selection maps.
    pub selection_map_size: u64,
}

impl SceneSnapshot {
    /// Tiles dispatched but not yet replied to.
    pub fn tiles_in_flight(&self) -> u64 {
        self.tiles_dispatched
            .saturating_sub(self.tiles_built + self.tiles_failed)
    }

    /// Fraction of builds that failed, 0.0 to 1.0.
    pub fn failure_rate(&self) -> f64 {
        let finished = self.tiles_built + self.tiles_failed;
        if finished == 0 {
            0.0
        } else {
            self.tiles_failed as f64 / finished as f64
        }
    }

    /// Frames per second over the scene's lifetime.
    pub fn frames_per_second(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.frames_rendered as f64 / secs
        } else {
            0.0
        }
    }
}
