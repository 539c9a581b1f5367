//! Geometry payloads produced by workers.
//!
//! Workers return CPU-side geometry per style. The main thread uploads it to
//! the render backend, after which the tile only keeps backend handles.

use std::collections::BTreeMap;

use crate::coord::{MeterPoint, TileCoord, TileKey, TileScale};

/// Geometry for one style within one tile, ready for upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleGeometry {
    /// Interleaved vertex data, opaque to the scene.
    pub vertex_data: Vec<u8>,

    /// Number of vertices in `vertex_data`.
    pub vertex_count: usize,
}

impl StyleGeometry {
    pub fn new(vertex_data: Vec<u8>, vertex_count: usize) -> Self {
        Self {
            vertex_data,
            vertex_count,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.vertex_data.len()
    }
}

/// Draw-order range of the features in a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderRange {
    pub min: i32,
    pub max: i32,
}

impl OrderRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Smallest range containing both.
    pub fn union(&self, other: &OrderRange) -> OrderRange {
        OrderRange {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

impl Default for OrderRange {
    fn default() -> Self {
        Self { min: 0, max: 0 }
    }
}

/// Build statistics reported with each tile.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TileDebug {
    pub features: usize,
    pub geometry_bytes: usize,
    pub build_ms: f64,
}

/// Output of a tile builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileGeometry {
    pub styles: BTreeMap<String, StyleGeometry>,
    pub order: OrderRange,
}

/// Everything a worker needs to build a tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileDescriptor {
    pub key: TileKey,
    pub coord: TileCoord,
    /// Northwest corner in meters.
    pub min: MeterPoint,
    /// Southeast corner in meters.
    pub max: MeterPoint,
    pub tile_scale: TileScale,
}

/// A successfully built tile, as returned by a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltTile {
    pub key: TileKey,
    pub geometry: TileGeometry,
    pub debug: TileDebug,
}
