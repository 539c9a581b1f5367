//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (longitude/latitude),
//! Web Mercator meters and the tile grid the scene is built from.
//!
//! All scene-side geometry (view bounds, tile bounds, distances) is expressed
//! in Web Mercator meters. Tile-local geometry built by workers uses the
//! [`TileScale`] range instead and is mapped to meters by the tile span.

mod types;

pub use types::{
    Bounds, CoordError, MeterPoint, TileCoord, TileKey, TileScale, DEFAULT_TILE_SCALE, MAX_LAT,
    MAX_ZOOM, MIN_LAT, MIN_LON, TILE_SIZE_PX,
};

use std::f64::consts::PI;

/// Half the circumference of the earth in Web Mercator meters.
pub const HALF_CIRCUMFERENCE_METERS: f64 = 20_037_508.342_789_244;

/// Meters covered by one screen pixel at the given (fractional) zoom level.
#[inline]
pub fn meters_per_pixel(zoom: f64) -> f64 {
    let min_zoom_meters_per_pixel = HALF_CIRCUMFERENCE_METERS * 2.0 / TILE_SIZE_PX as f64;
    min_zoom_meters_per_pixel / 2.0_f64.powf(zoom)
}

/// Converts geographic coordinates to Web Mercator meters.
///
/// # Arguments
///
/// * `lng` - Longitude in degrees (-180.0 to 180.0)
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
#[inline]
pub fn lng_lat_to_meters(lng: f64, lat: f64) -> Result<MeterPoint, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=180.0).contains(&lng) {
        return Err(CoordError::InvalidLongitude(lng));
    }

    let x = lng * HALF_CIRCUMFERENCE_METERS / 180.0;
    let y = ((90.0 + lat) * PI / 360.0).tan().ln() / (PI / 180.0);
    let y = y * HALF_CIRCUMFERENCE_METERS / 180.0;

    Ok(MeterPoint::new(x, y))
}

/// Returns the northwest corner of a tile in Web Mercator meters.
#[inline]
pub fn tile_origin_meters(x: u64, y: u64, zoom: u8) -> MeterPoint {
    let tile_meters = TILE_SIZE_PX as f64 * meters_per_pixel(zoom as f64);
    MeterPoint::new(
        x as f64 * tile_meters - HALF_CIRCUMFERENCE_METERS,
        -(y as f64 * tile_meters - HALF_CIRCUMFERENCE_METERS),
    )
}

/// Returns the tile containing a point in meters, clamped to the grid.
#[inline]
pub fn tile_at_meters(point: MeterPoint, zoom: u8) -> TileCoord {
    let tile_meters = TILE_SIZE_PX as f64 * meters_per_pixel(zoom as f64);
    let last = (1u64 << zoom).saturating_sub(1) as f64;

    let x = ((point.x + HALF_CIRCUMFERENCE_METERS) / tile_meters)
        .floor()
        .clamp(0.0, last);
    let y = ((HALF_CIRCUMFERENCE_METERS - point.y) / tile_meters)
        .floor()
        .clamp(0.0, last);

    TileCoord::new(x as u32, y as u32, zoom)
}

/// Enumerates all tiles at `zoom` intersecting the given bounds.
///
/// Tiles are returned row by row from the northwest corner.
pub fn tiles_covering(bounds: &Bounds, zoom: u8) -> Vec<TileCoord> {
    let nw = tile_at_meters(MeterPoint::new(bounds.sw.x, bounds.ne.y), zoom);
    let se = tile_at_meters(MeterPoint::new(bounds.ne.x, bounds.sw.y), zoom);

    let mut tiles = Vec::with_capacity(((se.x - nw.x + 1) * (se.y - nw.y + 1)) as usize);
    for y in nw.y..=se.y {
        for x in nw.x..=se.x {
            tiles.push(TileCoord::new(x, y, zoom));
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_zero_meters() {
        let point = lng_lat_to_meters(0.0, 0.0).unwrap();
        assert!(point.x.abs() < 1e-6);
        assert!(point.y.abs() < 1e-6);
    }

    #[test]
    fn test_invalid_latitude() {
        let result = lng_lat_to_meters(0.0, 90.0);
        assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
    }

    #[test]
    fn test_invalid_longitude() {
        let result = lng_lat_to_meters(181.0, 0.0);
        assert!(matches!(result, Err(CoordError::InvalidLongitude(_))));
    }

    #[test]
    fn test_meters_per_pixel_halves_each_zoom() {
        let z0 = meters_per_pixel(0.0);
        let z1 = meters_per_pixel(1.0);
        assert!((z0 / z1 - 2.0).abs() < 1e-9);
        assert!((z0 - 156_543.033_928_041).abs() < 1e-3);
    }

    #[test]
    fn test_zoom_zero_tile_spans_world() {
        let nw = tile_origin_meters(0, 0, 0);
        let se = tile_origin_meters(1, 1, 0);
        assert!((nw.x + HALF_CIRCUMFERENCE_METERS).abs() < 1e-6);
        assert!((nw.y - HALF_CIRCUMFERENCE_METERS).abs() < 1e-6);
        assert!((se.x - HALF_CIRCUMFERENCE_METERS).abs() < 1e-6);
        assert!((se.y + HALF_CIRCUMFERENCE_METERS).abs() < 1e-6);
    }

    #[test]
    fn test_tile_at_meters_roundtrip() {
        // New York City
        let point = lng_lat_to_meters(-74.0060, 40.7128).unwrap();
        let tile = tile_at_meters(point, 16);
        assert_eq!(tile, TileCoord::new(19295, 24640, 16));

        let origin = tile_origin_meters(tile.x.into(), tile.y.into(), tile.z);
        assert!(origin.x <= point.x);
        assert!(origin.y >= point.y);
    }

    #[test]
    fn test_tile_at_meters_clamps_to_grid() {
        let far = MeterPoint::new(HALF_CIRCUMFERENCE_METERS * 2.0, -HALF_CIRCUMFERENCE_METERS * 2.0);
        let tile = tile_at_meters(far, 3);
        assert_eq!(tile, TileCoord::new(7, 7, 3));
    }

    #[test]
    fn test_tiles_covering_quadrant() {
        let bounds = Bounds::new(
            MeterPoint::new(1.0, 1.0),
            MeterPoint::new(HALF_CIRCUMFERENCE_METERS - 1.0, HALF_CIRCUMFERENCE_METERS - 1.0),
        );
        let tiles = tiles_covering(&bounds, 2);
        // Northeast quadrant at z2 is x in 2..=3, y in 0..=1
        assert_eq!(tiles.len(), 4);
        assert_eq!(tiles[0], TileCoord::new(2, 0, 2));
        assert_eq!(tiles[3], TileCoord::new(3, 1, 2));
    }
}
