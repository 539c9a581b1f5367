//! Tile-set load timing.

use std::time::{Duration, Instant};

/// Measures how long a set of tiles takes to load.
///
/// The timer starts when the first tile of a set begins loading and stops
/// once no tile is loading any more.
#[derive(Debug, Default)]
pub struct TileSetTimer {
    started: Option<Instant>,
}

impl TileSetTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the timer if it is not already running. Returns true if it started.
    pub fn start(&mut self) -> bool {
        if self.started.is_some() {
            return false;
        }
        self.started = Some(Instant::now());
        true
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Stops the timer and returns the elapsed time, if it was running.
    pub fn stop(&mut self) -> Option<Duration> {
        self.started.take().map(|start| start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_once_stop_once() {
        let mut timer = TileSetTimer::new();
        assert!(timer.stop().is_none());

        assert!(timer.start());
        assert!(!timer.start());
        assert!(timer.is_running());

        assert!(timer.stop().is_some());
        assert!(!timer.is_running());
        assert!(timer.stop().is_none());
    }
}
