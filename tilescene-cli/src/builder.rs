//! Procedural tile builder for headless runs.
//!
//! Every visible layer rule becomes a grid of square features covering the
//! tile. No tile data is fetched; the output only depends on the tile
//! coordinate and the config.
//!
//! # Vertex Layout
//!
//! ```text
//! [x, y, order, r, g, b, a]   7 × f32, little endian
//! ```
//!
//! `rgba` is the selection color of the feature, `(0, 0, 0, 1)` for styles
//! that take no part in the pick pass.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tilescene::config::SceneConfig;
use tilescene::source::TileSource;
use tilescene::tile::{OrderRange, StyleGeometry, TileDescriptor, TileGeometry};
use tilescene::worker::{BuildContext, BuildError, Feature, TileBuilder};

/// Default number of cells per tile side.
pub const DEFAULT_GRID_CELLS: u32 = 4;

const VERTICES_PER_CELL: usize = 6;

/// Builds a grid of cells per visible rule.
#[derive(Debug, Clone)]
pub struct GridBuilder {
    cells: u32,
}

impl GridBuilder {
    pub fn new(cells: u32) -> Self {
        Self {
            cells: cells.max(1),
        }
    }
}

impl Default for GridBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_CELLS)
    }
}

impl TileBuilder for GridBuilder {
    fn build(
        &self,
        tile: &TileDescriptor,
        config: &SceneConfig,
        _source: &TileSource,
        ctx: &mut BuildContext<'_>,
    ) -> Result<TileGeometry, BuildError> {
        let step = tile.tile_scale.get() as f32 / self.cells as f32;
        let mut geometry = TileGeometry::default();
        let mut order: Option<OrderRange> = None;

        for (path, rule) in config.rules() {
            let Some(style) = rule.style.as_ref().filter(|s| s.is_visible()) else {
                continue;
            };
            let style_name = style.style_name();
            let selectable = config
                .styles
                .get(style_name)
                .map_or(true, |s| s.selection);
            let layer_order = style.order.unwrap_or(0);
            let layer_range = OrderRange::new(layer_order, layer_order);
            order = Some(order.map_or(layer_range, |o| o.union(&layer_range)));

            let out = geometry
                .styles
                .entry(style_name.to_string())
                .or_insert_with(StyleGeometry::default);

            for cy in 0..self.cells {
                for cx in 0..self.cells {
                    let color = if selectable {
                        let feature = Feature::new(feature_id(tile, &path, cx, cy), path.clone())
                            .with_property("tile", tile.key.to_string())
                            .with_property("cell", format!("{},{}", cx, cy));
                        ctx.register_feature(feature).to_rgba_f32()
                    } else {
                        ctx.count_feature();
                        [0.0, 0.0, 0.0, 1.0]
                    };

                    let x0 = cx as f32 * step;
                    let y0 = cy as f32 * step;
                    push_quad(out, [x0, y0, x0 + step, y0 + step], layer_order as f32, color);
                }
            }
        }

        geometry.order = order.unwrap_or_default();
        Ok(geometry)
    }
}

fn feature_id(tile: &TileDescriptor, layer: &str, cx: u32, cy: u32) -> u64 {
    let mut hasher = DefaultHasher::new();
    tile.coord.hash(&mut hasher);
    layer.hash(&mut hasher);
    (cx, cy).hash(&mut hasher);
    hasher.finish()
}

/// Appends two triangles covering `[x0, y0, x1, y1]`.
fn push_quad(out: &mut StyleGeometry, rect: [f32; 4], order: f32, color: [f32; 4]) {
    let [x0, y0, x1, y1] = rect;
    let corners = [(x0, y0), (x1, y0), (x1, y1), (x0, y0), (x1, y1), (x0, y1)];
    for (x, y) in corners {
        for v in [x, y, order, color[0], color[1], color[2], color[3]] {
            out.vertex_data.extend_from_slice(&v.to_le_bytes());
        }
    }
    out.vertex_count += VERTICES_PER_CELL;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_layout() {
        let mut out = StyleGeometry::default();
        push_quad(&mut out, [0.0, 0.0, 1.0, 1.0], 2.0, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(out.vertex_count, 6);
        assert_eq!(out.byte_len(), 6 * 7 * 4);
        assert_eq!(&out.vertex_data[8..12], &2.0f32.to_le_bytes());
    }

    #[test]
    fn test_cells_at_least_one() {
        assert_eq!(GridBuilder::new(0).cells, 1);
    }
}
