//! Tile source descriptor.
//!
//! The scene never fetches raw tile data itself. A [`TileSource`] only names
//! where the data comes from and the zoom range it covers; the descriptor is
//! shipped to every worker with each config sync so that builders can fetch
//! and decode tiles on their side.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Description of a tile data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileSource {
    /// Source id, used as part of every tile key.
    pub name: String,

    /// URL template for raw tile data (e.g. `https://tiles.example/{z}/{x}/{y}.mvt`).
    #[serde(default)]
    pub url: String,

    /// Highest zoom level the source provides. Beyond this, the scene overzooms.
    #[serde(default)]
    pub max_zoom: Option<u8>,
}

impl TileSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            max_zoom: None,
        }
    }

    pub fn with_max_zoom(mut self, max_zoom: u8) -> Self {
        self.max_zoom = Some(max_zoom);
        self
    }

    /// Caps a zoom level at the source maximum, if there is one.
    pub fn cap_zoom(&self, zoom: f64) -> f64 {
        match self.max_zoom {
            Some(max) => zoom.min(max as f64),
            None => zoom,
        }
    }

    /// Shared source id for tile keys.
    pub fn id(&self) -> Arc<str> {
        Arc::from(self.name.as_str())
    }

    /// Expands the URL template for a tile.
    pub fn url_for(&self, x: u32, y: u32, z: u8) -> String {
        self.url
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
            .replace("{z}", &z.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_zoom() {
        let source = TileSource::new("osm", "").with_max_zoom(16);
        assert_eq!(source.cap_zoom(18.5), 16.0);
        assert_eq!(source.cap_zoom(12.0), 12.0);

        let unbounded = TileSource::new("osm", "");
        assert_eq!(unbounded.cap_zoom(18.5), 18.5);
    }

    #[test]
    fn test_url_for() {
        let source = TileSource::new("osm", "https://tiles.example/{z}/{x}/{y}.mvt");
        assert_eq!(
            source.url_for(10, 20, 5),
            "https://tiles.example/5/10/20.mvt"
        );
    }

    #[test]
    fn test_deserialize_defaults() {
        let source: TileSource = serde_json::from_str(r#"{"name": "osm"}"#).unwrap();
        assert_eq!(source.name, "osm");
        assert!(source.url.is_empty());
        assert!(source.max_zoom.is_none());
    }
}
