//! Tile cache keyed by [`TileKey`].

use std::collections::HashMap;

use tracing::debug;

use super::{Tile, ZoomBand};
use crate::coord::{Bounds, MeterPoint, TileKey};

/// Owner of all tiles in the scene.
///
/// The cache is only ever touched from the main loop. Workers never see it;
/// their replies are merged in by the scene.
#[derive(Debug, Default)]
pub struct TileCache {
    tiles: HashMap<TileKey, Tile>,
}

impl TileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a tile, returning any tile previously stored under the same key.
    pub fn insert(&mut self, tile: Tile) -> Option<Tile> {
        self.tiles.insert(tile.key.clone(), tile)
    }

    pub fn get(&self, key: &TileKey) -> Option<&Tile> {
        self.tiles.get(key)
    }

    pub fn get_mut(&mut self, key: &TileKey) -> Option<&mut Tile> {
        self.tiles.get_mut(key)
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.tiles.contains_key(key)
    }

    /// Removes a tile. The caller releases its geometry.
    pub fn remove(&mut self, key: &TileKey) -> Option<Tile> {
        self.tiles.remove(key)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &TileKey> {
        self.tiles.keys()
    }

    /// Calls `f` for every tile currently intersecting the view.
    pub fn for_each_visible<F>(&self, mut f: F)
    where
        F: FnMut(&Tile),
    {
        self.tiles.values().filter(|t| t.visible).for_each(|t| f(t));
    }

    /// Recomputes visibility and center distance of every tile.
    pub fn update_visibility(&mut self, buffered: &Bounds, center: &MeterPoint) {
        for tile in self.tiles.values_mut() {
            tile.update_visibility(buffered, center);
        }
    }

    /// Tiles that are both loaded and visible, nearest to the center first.
    pub fn renderable(&self) -> Vec<&Tile> {
        let mut tiles: Vec<&Tile> = self.tiles.values().filter(|t| t.is_renderable()).collect();
        tiles.sort_by(|a, b| {
            a.center_dist
                .total_cmp(&b.center_dist)
                .then_with(|| a.key.cmp(&b.key))
        });
        tiles
    }

    /// Keys of tiles whose zoom level falls outside `band`.
    pub fn keys_outside(&self, band: &ZoomBand) -> Vec<TileKey> {
        self.tiles
            .values()
            .filter(|t| !band.contains(t.key.coord.z))
            .map(|t| t.key.clone())
            .collect()
    }

    /// Removes and returns every tile outside `band`, in a single sweep.
    pub fn evict_outside(&mut self, band: &ZoomBand) -> Vec<Tile> {
        let keys = self.keys_outside(band);
        let mut evicted = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(tile) = self.tiles.remove(&key) {
                debug!(
                    tile = %key,
                    below = band.below,
                    above = band.above,
                    "Evicted tile outside zoom band"
                );
                evicted.push(tile);
            }
        }
        evicted
    }

    /// Whether any cached tile still has a build in flight.
    pub fn any_loading(&self) -> bool {
        self.tiles.values().any(|t| t.loading)
    }

    /// Sum of a per-tile statistic over tiles accepted by `filter`.
    pub fn debug_sum<V, F>(&self, value: V, filter: F) -> f64
    where
        V: Fn(&Tile) -> f64,
        F: Fn(&Tile) -> bool,
    {
        self.tiles.values().filter(|t| filter(t)).map(value).sum()
    }

    /// Average of a per-tile statistic over all cached tiles.
    pub fn debug_average<V, F>(&self, value: V, filter: F) -> f64
    where
        V: Fn(&Tile) -> f64,
        F: Fn(&Tile) -> bool,
    {
        if self.tiles.is_empty() {
            return 0.0;
        }
        self.debug_sum(value, filter) / self.tiles.len() as f64
    }

    /// Removes every tile.
    pub fn drain(&mut self) -> Vec<Tile> {
        self.tiles.drain().map(|(_, tile)| tile).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;
    use crate::worker::WorkerId;
    use std::sync::Arc;

    fn tile(x: u32, y: u32, z: u8) -> Tile {
        Tile::new(
            TileKey::new(Arc::from("test"), TileCoord::new(x, y, z)),
            WorkerId::new(0),
        )
    }

    #[test]
    fn test_insert_get_remove() {
        let mut cache = TileCache::new();
        let t = tile(1, 2, 3);
        let key = t.key.clone();

        assert!(cache.insert(t).is_none());
        assert!(cache.contains(&key));
        assert_eq!(cache.get(&key).unwrap().coord(), TileCoord::new(1, 2, 3));
        assert_eq!(cache.len(), 1);

        assert!(cache.remove(&key).is_some());
        assert!(cache.is_empty());
        assert!(cache.remove(&key).is_none());
    }

    #[test]
    fn test_evict_outside_band() {
        let mut cache = TileCache::new();
        for z in 3..=8 {
            cache.insert(tile(0, 0, z));
        }

        let evicted = cache.evict_outside(&ZoomBand { below: 4.0, above: 6.0 });

        let mut zooms: Vec<u8> = evicted.iter().map(|t| t.coord().z).collect();
        zooms.sort();
        assert_eq!(zooms, vec![3, 7, 8]);
        assert_eq!(cache.len(), 3);
        assert!(cache.iter().all(|t| (4..=6).contains(&t.coord().z)));
    }

    #[test]
    fn test_renderable_requires_loaded_and_visible() {
        let mut cache = TileCache::new();
        let mut a = tile(0, 0, 2);
        a.loaded = true;
        a.visible = true;
        a.center_dist = 10.0;
        let mut b = tile(1, 0, 2);
        b.loaded = true;
        b.visible = true;
        b.center_dist = 5.0;
        let mut c = tile(2, 0, 2);
        c.loaded = true;
        let mut d = tile(3, 0, 2);
        d.visible = true;
        for t in [a, b, c, d] {
            cache.insert(t);
        }

        let renderable: Vec<u32> = cache.renderable().iter().map(|t| t.coord().x).collect();
        assert_eq!(renderable, vec![1, 0]);

        let mut visible = 0;
        cache.for_each_visible(|_| visible += 1);
        assert_eq!(visible, 3);
    }

    #[test]
    fn test_debug_aggregates() {
        let mut cache = TileCache::new();
        let mut a = tile(0, 0, 1);
        a.debug.features = 4;
        let mut b = tile(1, 0, 1);
        b.debug.features = 6;
        cache.insert(a);
        cache.insert(b);

        let sum = cache.debug_sum(|t| t.debug.features as f64, |_| true);
        let avg = cache.debug_average(|t| t.debug.features as f64, |_| true);
        assert_eq!(sum, 10.0);
        assert_eq!(avg, 5.0);
        assert_eq!(TileCache::new().debug_average(|_| 1.0, |_| true), 0.0);
    }
}
