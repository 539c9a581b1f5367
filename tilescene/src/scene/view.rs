//! Camera and viewport state.

use crate::coord::{
    lng_lat_to_meters, meters_per_pixel, Bounds, CoordError, MeterPoint, MAX_ZOOM,
};

/// Center, zoom and viewport, with the world-space bounds derived from them.
///
/// Every setter recomputes the derived values before returning, so readers
/// never observe bounds from a partially applied update.
#[derive(Debug, Clone)]
pub struct ViewState {
    center: Option<(f64, f64)>,
    center_meters: MeterPoint,
    zoom: Option<f64>,
    css_size: (f64, f64),
    device_pixel_ratio: f64,
    device_size: (u32, u32),
    view_buffer_px: f64,
    meters_per_pixel: f64,
    bounds: Option<Bounds>,
    buffered: Option<Bounds>,
}

impl ViewState {
    pub fn new(device_pixel_ratio: f64, view_buffer_px: f64) -> Self {
        Self {
            center: None,
            center_meters: MeterPoint::default(),
            zoom: None,
            css_size: (0.0, 0.0),
            device_pixel_ratio,
            device_size: (0, 0),
            view_buffer_px,
            meters_per_pixel: 0.0,
            bounds: None,
            buffered: None,
        }
    }

    /// Sets the center in degrees.
    pub fn set_center(&mut self, lng: f64, lat: f64) -> Result<(), CoordError> {
        let meters = lng_lat_to_meters(lng, lat)?;
        self.center = Some((lng, lat));
        self.center_meters = meters;
        self.update_bounds();
        Ok(())
    }

    /// Sets the (fractional) zoom level.
    pub fn set_zoom(&mut self, zoom: f64) -> Result<(), CoordError> {
        if !(0.0..=MAX_ZOOM as f64).contains(&zoom) {
            return Err(CoordError::InvalidZoom(zoom));
        }
        self.zoom = Some(zoom);
        self.update_bounds();
        Ok(())
    }

    /// Sets the viewport size in CSS pixels.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.css_size = (width.max(0.0), height.max(0.0));
        self.device_size = (
            (self.css_size.0 * self.device_pixel_ratio).round() as u32,
            (self.css_size.1 * self.device_pixel_ratio).round() as u32,
        );
        self.update_bounds();
    }

    /// Center, zoom and a non-empty viewport are all known.
    pub fn is_ready(&self) -> bool {
        self.center.is_some()
            && self.zoom.is_some()
            && self.device_size.0 > 0
            && self.device_size.1 > 0
    }

    pub fn center(&self) -> Option<(f64, f64)> {
        self.center
    }

    pub fn center_meters(&self) -> MeterPoint {
        self.center_meters
    }

    pub fn zoom(&self) -> Option<f64> {
        self.zoom
    }

    /// Integer zoom level of the tiles that cover the view.
    pub fn tile_zoom(&self) -> Option<u8> {
        self.zoom.map(|z| z.floor() as u8)
    }

    /// Tile zoom capped at a source's maximum.
    pub fn capped_zoom(&self, max_zoom: Option<u8>) -> Option<u8> {
        self.tile_zoom().map(|z| match max_zoom {
            Some(max) => z.min(max),
            None => z,
        })
    }

    pub fn css_size(&self) -> (f64, f64) {
        self.css_size
    }

    pub fn device_size(&self) -> (u32, u32) {
        self.device_size
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    /// Device width over height, as `(w / h, 1)`.
    pub fn aspect(&self) -> (f64, f64) {
        let (w, h) = self.device_size;
        if h == 0 {
            (1.0, 1.0)
        } else {
            (w as f64 / h as f64, 1.0)
        }
    }

    pub fn meters_per_pixel(&self) -> f64 {
        self.meters_per_pixel
    }

    /// Visible area in meters.
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Visible area grown by the view buffer, used for tile visibility.
    pub fn buffered_bounds(&self) -> Option<Bounds> {
        self.buffered
    }

    fn update_bounds(&mut self) {
        let (Some(zoom), Some(_)) = (self.zoom, self.center) else {
            return;
        };

        self.meters_per_pixel = meters_per_pixel(zoom);
        let half = MeterPoint::new(
            self.css_size.0 * self.meters_per_pixel / 2.0,
            self.css_size.1 * self.meters_per_pixel / 2.0,
        );
        let c = self.center_meters;
        let bounds = Bounds::new(
            MeterPoint::new(c.x - half.x, c.y - half.y),
            MeterPoint::new(c.x + half.x, c.y + half.y),
        );

        self.bounds = Some(bounds);
        self.buffered = Some(bounds.expanded(self.view_buffer_px * self.meters_per_pixel));
    }
}
