//! Coordinate types for the tile grid and Web Mercator meter space.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Maximum latitude supported by Web Mercator projection.
pub const MAX_LAT: f64 = 85.05112878;

/// Minimum latitude supported by Web Mercator projection.
pub const MIN_LAT: f64 = -85.05112878;

/// Minimum longitude.
pub const MIN_LON: f64 = -180.0;

/// Maximum tile zoom level accepted by the scene.
pub const MAX_ZOOM: u8 = 24;

/// Screen size of one tile in CSS pixels.
pub const TILE_SIZE_PX: u32 = 256;

/// Default range of tile-local coordinates (`[0, 4096]`).
pub const DEFAULT_TILE_SCALE: u32 = 4096;

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("Invalid latitude: {0} (must be between -85.05112878 and 85.05112878)")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    #[error("Invalid zoom: {0} (must be between 0 and 24)")]
    InvalidZoom(f64),

    #[error("Invalid tile {0}: x and y must be below 2^z, z at most 24")]
    InvalidTile(TileCoord),
}

/// A point in Web Mercator meters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeterPoint {
    pub x: f64,
    pub y: f64,
}

impl MeterPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another point.
    pub fn manhattan_distance(&self, other: &MeterPoint) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// Axis-aligned box in meters, southwest and northeast corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub sw: MeterPoint,
    pub ne: MeterPoint,
}

impl Bounds {
    pub fn new(sw: MeterPoint, ne: MeterPoint) -> Self {
        Self { sw, ne }
    }

    /// Returns a box grown by `buffer` meters on every side.
    pub fn expanded(&self, buffer: f64) -> Self {
        Self {
            sw: MeterPoint::new(self.sw.x - buffer, self.sw.y - buffer),
            ne: MeterPoint::new(self.ne.x + buffer, self.ne.y + buffer),
        }
    }

    /// Returns true if the two boxes overlap (touching edges count).
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.sw.x <= other.ne.x
            && self.ne.x >= other.sw.x
            && self.sw.y <= other.ne.y
            && self.ne.y >= other.sw.y
    }

    pub fn center(&self) -> MeterPoint {
        MeterPoint::new(
            (self.sw.x + self.ne.x) / 2.0,
            (self.sw.y + self.ne.y) / 2.0,
        )
    }
}

/// A tile grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Column (0 = west).
    pub x: u32,
    /// Row (0 = north).
    pub y: u32,
    /// Zoom level.
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Checks the coordinate lies on the grid of its zoom level.
    pub fn validate(&self) -> Result<(), CoordError> {
        if self.z > MAX_ZOOM {
            return Err(CoordError::InvalidTile(*self));
        }
        let tiles = 1u64 << self.z;
        if u64::from(self.x) >= tiles || u64::from(self.y) >= tiles {
            return Err(CoordError::InvalidTile(*self));
        }
        Ok(())
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.x, self.y, self.z)
    }
}

/// Cache key for a tile: grid coordinate plus the id of the source it is built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub source: Arc<str>,
    pub coord: TileCoord,
}

impl TileKey {
    pub fn new(source: Arc<str>, coord: TileCoord) -> Self {
        Self { source, coord }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.coord)
    }
}

/// Range of tile-local coordinates, `[0, scale]` on both axes.
///
/// Carried explicitly through the options into each tile descriptor so that
/// the scene and every worker agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TileScale(u32);

impl TileScale {
    pub fn new(scale: u32) -> Self {
        Self(scale.max(1))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for TileScale {
    fn default() -> Self {
        Self(DEFAULT_TILE_SCALE)
    }
}
