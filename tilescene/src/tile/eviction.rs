//! Zoom-hysteresis eviction policy.
//!
//! On a zoom change the scene keeps tiles within a band of zoom levels and
//! evicts the rest. A small zoom step widens the band on the side the camera
//! zoomed away from, so rapid back-and-forth zooming does not throw away and
//! rebuild the same tiles.
//!
//! # State Machine
//!
//! ```text
//!            start_zoom()                 finish_zoom()
//!   Idle ----------------> Zooming ----------------------> Idle (one sweep)
//!     |                                                       ^
//!     +---------------------- finish_zoom() ------------------+
//! ```
//!
//! While `Zooming`, individual tile removals are suppressed; the sweep at the
//! end of the gesture handles them all at once.

/// Range of zoom levels whose tiles are retained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomBand {
    pub below: f64,
    pub above: f64,
}

impl ZoomBand {
    /// Band containing exactly one level.
    pub fn exact(zoom: f64) -> Self {
        Self {
            below: zoom,
            above: zoom,
        }
    }

    /// Band retained after zooming from `last_zoom` to `zoom`.
    ///
    /// If the step is within `hysteresis`, the band is widened by `hysteresis`
    /// on the side opposite the zoom direction. Larger steps, no previous
    /// zoom, or no change at all keep exactly `[zoom, zoom]`.
    pub fn retained(last_zoom: Option<f64>, zoom: f64, hysteresis: f64) -> Self {
        let mut band = Self::exact(zoom);

        if let Some(last) = last_zoom {
            if (zoom - last).abs() <= hysteresis {
                if zoom > last {
                    band.below = zoom - hysteresis;
                } else if zoom < last {
                    band.above = zoom + hysteresis;
                }
            }
        }

        band
    }

    /// Caps both ends at the source's maximum zoom.
    pub fn capped(self, max_zoom: Option<u8>) -> Self {
        match max_zoom {
            Some(max) => Self {
                below: self.below.min(max as f64),
                above: self.above.min(max as f64),
            },
            None => self,
        }
    }

    pub fn contains(&self, z: u8) -> bool {
        let z = z as f64;
        z >= self.below && z <= self.above
    }
}

/// Tracks zoom gestures for the eviction policy.
#[derive(Debug, Clone)]
pub struct ZoomTracker {
    hysteresis: f64,
    /// Zoom level when the active gesture started.
    gesture_origin: Option<Option<f64>>,
}

impl ZoomTracker {
    pub fn new(hysteresis: f64) -> Self {
        Self {
            hysteresis,
            gesture_origin: None,
        }
    }

    pub fn hysteresis(&self) -> f64 {
        self.hysteresis
    }

    /// Whether a continuous zoom gesture is in progress.
    pub fn is_zooming(&self) -> bool {
        self.gesture_origin.is_some()
    }

    /// Begins a zoom gesture at the current zoom.
    pub fn start_zoom(&mut self, current: Option<f64>) {
        if self.gesture_origin.is_none() {
            self.gesture_origin = Some(current);
        }
    }

    /// Ends any gesture and returns the band to retain at `zoom`.
    ///
    /// The band is measured from where the gesture started, or from
    /// `previous` when the zoom was set directly.
    pub fn finish_zoom(&mut self, previous: Option<f64>, zoom: f64) -> ZoomBand {
        let last = match self.gesture_origin.take() {
            Some(origin) => origin,
            None => previous,
        };
        ZoomBand::retained(last, zoom, self.hysteresis)
    }
}
