//! Tile entity and tile cache.
//!
//! A [`Tile`] is created when its coordinate enters the desired tile set,
//! updated when a worker finishes building it and on every camera change,
//! and destroyed on eviction. Tiles are owned exclusively by the
//! [`TileCache`]; other components refer to them by [`TileKey`].
//!
//! # Merge Precedence
//!
//! When a build result arrives for a cached tile, [`Tile::merge_built`]
//! applies it with these rules:
//!
//! - **Incoming wins**: geometry, draw-order range, debug stats, load state.
//! - **Cached wins**: coordinate, bounds, owning worker, visibility, center distance.
//!
//! Geometry handles that are replaced are handed back for release.

mod cache;
mod eviction;
mod geometry;

pub use cache::TileCache;
pub use eviction::{ZoomBand, ZoomTracker};
pub use geometry::{
    BuiltTile, OrderRange, StyleGeometry, TileDebug, TileDescriptor, TileGeometry,
};

use std::collections::BTreeMap;

use crate::coord::{tile_origin_meters, Bounds, MeterPoint, TileCoord, TileKey, TileScale};
use crate::render::GeometryHandle;
use crate::worker::WorkerId;

/// A map tile and its renderable state.
#[derive(Debug)]
pub struct Tile {
    pub key: TileKey,

    /// Northwest corner in meters.
    pub min: MeterPoint,

    /// Southeast corner in meters.
    pub max: MeterPoint,

    /// Extent in meters (`max - min`, y is negative).
    pub span: MeterPoint,

    pub bounds: Bounds,

    /// Worker that builds this tile and holds its selection map.
    pub worker: WorkerId,

    /// At least one build has completed and geometry is attached.
    pub loaded: bool,

    /// A build has been dispatched and no reply has arrived yet.
    pub loading: bool,

    /// Error from the most recent build, if it failed.
    pub error: Option<String>,

    /// Intersects the buffered viewport.
    pub visible: bool,

    /// Distance from the viewport center, in meters.
    pub center_dist: f64,

    /// Backend geometry per style.
    pub geometry: BTreeMap<String, GeometryHandle>,

    pub order: OrderRange,

    pub debug: TileDebug,
}

impl Tile {
    /// Creates an unloaded tile owned by `worker`.
    pub fn new(key: TileKey, worker: WorkerId) -> Self {
        let TileCoord { x, y, z } = key.coord;
        let (x, y) = (u64::from(x), u64::from(y));
        let min = tile_origin_meters(x, y, z);
        let max = tile_origin_meters(x + 1, y + 1, z);
        let span = MeterPoint::new(max.x - min.x, max.y - min.y);
        let bounds = Bounds::new(MeterPoint::new(min.x, max.y), MeterPoint::new(max.x, min.y));

        Self {
            key,
            min,
            max,
            span,
            bounds,
            worker,
            loaded: false,
            loading: false,
            error: None,
            visible: false,
            center_dist: f64::INFINITY,
            geometry: BTreeMap::new(),
            order: OrderRange::default(),
            debug: TileDebug::default(),
        }
    }

    pub fn coord(&self) -> TileCoord {
        self.key.coord
    }

    /// Recomputes visibility and center distance against the buffered view.
    pub fn update_visibility(&mut self, buffered: &Bounds, center: &MeterPoint) {
        self.visible = self.bounds.intersects(buffered);
        self.center_dist = self.bounds.center().manhattan_distance(center);
    }

    /// Whether this tile belongs to the current (capped) zoom level.
    pub fn is_in_zoom(&self, capped_zoom: u8, max_zoom: Option<u8>) -> bool {
        let z = match max_zoom {
            Some(max) => self.key.coord.z.min(max),
            None => self.key.coord.z,
        };
        z == capped_zoom
    }

    /// Whether the tile can be drawn this frame.
    pub fn is_renderable(&self) -> bool {
        self.loaded && self.visible
    }

    /// Builds the message payload describing this tile to a worker.
    pub fn descriptor(&self, tile_scale: TileScale) -> TileDescriptor {
        TileDescriptor {
            key: self.key.clone(),
            coord: self.key.coord,
            min: self.min,
            max: self.max,
            tile_scale,
        }
    }

    /// Marks the tile as having a build in flight.
    pub fn mark_loading(&mut self) {
        self.loading = true;
    }

    /// Applies a successful build result.
    ///
    /// Returns the previously attached handles, which the caller must release,
    /// and the style geometry that still needs uploading.
    pub fn merge_built(
        &mut self,
        built: BuiltTile,
    ) -> (Vec<GeometryHandle>, BTreeMap<String, StyleGeometry>) {
        let released = self.take_geometry();

        self.order = built.geometry.order;
        self.debug = built.debug;
        self.error = None;
        self.loading = false;
        self.loaded = true;

        (released, built.geometry.styles)
    }

    /// Applies a failed build result.
    ///
    /// The tile is left without renderable geometry; returned handles must be
    /// released by the caller.
    pub fn merge_failed(&mut self, error: String) -> Vec<GeometryHandle> {
        self.error = Some(error);
        self.loading = false;
        self.loaded = false;
        self.take_geometry()
    }

    /// Attaches uploaded geometry for a style.
    pub fn attach_geometry(&mut self, style: impl Into<String>, handle: GeometryHandle) {
        self.geometry.insert(style.into(), handle);
    }

    /// Detaches all geometry handles.
    pub fn take_geometry(&mut self) -> Vec<GeometryHandle> {
        std::mem::take(&mut self.geometry).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::HALF_CIRCUMFERENCE_METERS;
    use std::sync::Arc;

    fn key(x: u32, y: u32, z: u8) -> TileKey {
        TileKey::new(Arc::from("test"), TileCoord::new(x, y, z))
    }

    #[test]
    fn test_new_tile_bounds() {
        let tile = Tile::new(key(0, 0, 1), WorkerId::new(0));
        assert!((tile.min.x + HALF_CIRCUMFERENCE_METERS).abs() < 1e-6);
        assert!((tile.min.y - HALF_CIRCUMFERENCE_METERS).abs() < 1e-6);
        assert!(tile.max.x.abs() < 1e-6);
        assert!(tile.max.y.abs() < 1e-6);
        assert!(tile.span.x > 0.0);
        assert!(tile.span.y < 0.0);
        assert!(!tile.loaded);
        assert!(!tile.visible);
    }

    #[test]
    fn test_last_column_bounds_do_not_overflow() {
        let tile = Tile::new(key(u32::MAX, u32::MAX, 24), WorkerId::new(0));
        assert!(tile.span.x > 0.0);
        assert!(tile.max.x > tile.min.x);
    }

    #[test]
    fn test_visibility_against_view() {
        let mut tile = Tile::new(key(1, 0, 1), WorkerId::new(0));
        // Northeast quadrant of the world
        let view = Bounds::new(MeterPoint::new(10.0, 10.0), MeterPoint::new(100.0, 100.0));
        tile.update_visibility(&view, &view.center());
        assert!(tile.visible);

        let far = Bounds::new(
            MeterPoint::new(-1000.0, -1000.0),
            MeterPoint::new(-100.0, -100.0),
        );
        tile.update_visibility(&far, &far.center());
        assert!(!tile.visible);
    }

    #[test]
    fn test_is_in_zoom_caps_at_source_max() {
        let tile = Tile::new(key(0, 0, 16), WorkerId::new(0));
        assert!(tile.is_in_zoom(16, None));
        assert!(!tile.is_in_zoom(15, None));
        assert!(tile.is_in_zoom(14, Some(14)));
    }

    #[test]
    fn test_merge_built_keeps_view_state_and_returns_old_handles() {
        let mut tile = Tile::new(key(0, 0, 1), WorkerId::new(1));
        tile.visible = true;
        tile.center_dist = 42.0;
        tile.mark_loading();
        tile.attach_geometry("polygons", GeometryHandle::new(7));

        let mut styles = BTreeMap::new();
        styles.insert("lines".to_string(), StyleGeometry::new(vec![0; 12], 3));
        let built = BuiltTile {
            key: tile.key.clone(),
            geometry: TileGeometry {
                styles,
                order: OrderRange::new(2, 5),
            },
            debug: TileDebug {
                features: 3,
                geometry_bytes: 12,
                build_ms: 1.5,
            },
        };

        let (released, pending) = tile.merge_built(built);

        assert_eq!(released, vec![GeometryHandle::new(7)]);
        assert_eq!(pending.len(), 1);
        assert!(tile.geometry.is_empty());
        assert!(tile.loaded);
        assert!(!tile.loading);
        assert_eq!(tile.order, OrderRange::new(2, 5));
        assert_eq!(tile.debug.features, 3);
        // Cached fields preserved
        assert!(tile.visible);
        assert_eq!(tile.center_dist, 42.0);
        assert_eq!(tile.worker, WorkerId::new(1));
    }

    #[test]
    fn test_merge_failed_drops_geometry() {
        let mut tile = Tile::new(key(0, 0, 1), WorkerId::new(0));
        tile.loaded = true;
        tile.attach_geometry("polygons", GeometryHandle::new(3));

        let released = tile.merge_failed("bad data".to_string());

        assert_eq!(released, vec![GeometryHandle::new(3)]);
        assert!(!tile.loaded);
        assert!(!tile.is_renderable());
        assert_eq!(tile.error.as_deref(), Some("bad data"));
    }
}
