//! Tile request URL construction.
//!
//! The engine only needs a deterministic mapping from `(coord, lod)` to a
//! URL. [`TemplateUrlBuilder`] covers the common `{z}/{x}/{y}` style servers;
//! anything richer can implement [`TileUrlBuilder`] directly.
//!
//! # Placeholders
//!
//! | Placeholder | Value |
//! |-------------|-------|
//! | `{z}`       | zoom level |
//! | `{x}`       | column |
//! | `{y}`       | row |
//! | `{lod}`     | level of detail |
//! | `{scale}`   | `2^lod` |
//! | `{size}`    | `tile_size << lod` |

use crate::coord::TileCoord;

/// Builds the request URL for one tile at one LOD.
pub trait TileUrlBuilder: Send + Sync {
    /// Returns the URL for `coord` rendered at `lod`.
    fn build_url(&self, coord: &TileCoord, lod: u8) -> String;
}

/// URL builder backed by a placeholder template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateUrlBuilder {
    template: String,
    tile_size: u32,
}

impl TemplateUrlBuilder {
    /// Creates a builder for `template` serving tiles of `tile_size` pixels
    /// at LOD 0.
    pub fn new(template: impl Into<String>, tile_size: u32) -> Self {
        Self {
            template: template.into(),
            tile_size,
        }
    }

    /// The template this builder expands.
    pub fn template(&self) -> &str {
        &self.template
    }
}

impl TileUrlBuilder for TemplateUrlBuilder {
    fn build_url(&self, coord: &TileCoord, lod: u8) -> String {
        let scale = 1u64 << lod;
        let size = u64::from(self.tile_size) << lod;
        self.template
            .replace("{z}", &coord.zoom.to_string())
            .replace("{x}", &coord.col.to_string())
            .replace("{y}", &coord.row.to_string())
            .replace("{lod}", &lod.to_string())
            .replace("{scale}", &scale.to_string())
            .replace("{size}", &size.to_string())
    }
}

impl<F> TileUrlBuilder for F
where
    F: Fn(&TileCoord, u8) -> String + Send + Sync,
{
    fn build_url(&self, coord: &TileCoord, lod: u8) -> String {
        self(coord, lod)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xyz_template() {
        let builder = TemplateUrlBuilder::new("https://tiles.test/{z}/{x}/{y}.png", 256);
        let url = builder.build_url(&TileCoord::new(3, 7, 5), 0);
        assert_eq!(url, "https://tiles.test/5/7/3.png");
    }

    #[test]
    fn test_scale_and_size_follow_lod() {
        let builder = TemplateUrlBuilder::new("/{z}/{x}/{y}@{scale}x?size={size}&lod={lod}", 256);
        let url = builder.build_url(&TileCoord::new(1, 2, 3), 2);
        assert_eq!(url, "/3/2/1@4x?size=1024&lod=2");
    }

    #[test]
    fn test_unknown_placeholders_untouched() {
        let builder = TemplateUrlBuilder::new("/{z}/{quadkey}", 256);
        assert_eq!(builder.build_url(&TileCoord::new(0, 0, 1), 0), "/1/{quadkey}");
    }

    #[test]
    fn test_closure_builder() {
        let builder = |coord: &TileCoord, lod: u8| format!("tile-{}-{}", coord, lod);
        assert_eq!(builder.build_url(&TileCoord::new(1, 1, 2), 1), "tile-2/1/1-1");
    }
}
