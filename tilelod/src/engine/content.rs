//! Drawable tile content.
//!
//! A [`TileContent`] is an immutable, ordered stack of layers painted bottom
//! to top. Display hosts bind a container to it and replace the whole stack
//! when the tile is refreshed.

use std::fmt;

use image::RgbaImage;
use serde::Serialize;

use crate::cache::TileImage;
use crate::compose::Surface;
use crate::coord::TileKey;
use crate::engine::fetch::PendingTile;

/// One drawable layer.
#[derive(Debug, Clone)]
pub enum Layer {
    /// The exact cached tile.
    Exact(TileImage),
    /// A crop of a coarser cached tile.
    Ancestor(TileImage),
    /// Finer cached tiles assembled into one surface.
    Composite(TileImage),
    /// The exact tile, still being fetched.
    Pending(PendingTile),
}

/// Layer discriminant, for summaries and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Exact,
    Ancestor,
    Composite,
    Pending,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerKind::Exact => "exact",
            LayerKind::Ancestor => "ancestor",
            LayerKind::Composite => "composite",
            LayerKind::Pending => "pending",
        };
        f.write_str(name)
    }
}

impl Layer {
    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::Exact(_) => LayerKind::Exact,
            Layer::Ancestor(_) => LayerKind::Ancestor,
            Layer::Composite(_) => LayerKind::Composite,
            Layer::Pending(_) => LayerKind::Pending,
        }
    }

    /// The image to draw right now, if any.
    ///
    /// A pending layer has one only once its fetch has finished.
    pub fn image(&self) -> Option<TileImage> {
        match self {
            Layer::Exact(image) | Layer::Ancestor(image) | Layer::Composite(image) => {
                Some(TileImage::clone(image))
            }
            Layer::Pending(pending) => pending.image(),
        }
    }
}

/// How a tile's content was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    /// Exact cache hit.
    Exact,
    /// An ancestor at exactly the needed resolution.
    Ancestor,
    /// Finer tiles fully covered the footprint.
    Composite,
    /// Best-effort placeholders with a fetch on top.
    Fetching,
    /// The coordinate is outside the tile pyramid.
    Empty,
}

impl fmt::Display for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentSource::Exact => "exact",
            ContentSource::Ancestor => "ancestor",
            ContentSource::Composite => "composite",
            ContentSource::Fetching => "fetching",
            ContentSource::Empty => "empty",
        };
        f.write_str(name)
    }
}

/// The drawable content of one tile.
#[derive(Debug, Clone)]
pub struct TileContent {
    /// Requested tile and the LOD it was resolved at.
    pub key: TileKey,
    /// Edge length in pixels every layer is drawn at.
    pub size: u32,
    /// Layers, bottom first.
    pub layers: Vec<Layer>,
    /// Every pixel is backed by exact cached data.
    pub complete: bool,
    pub source: ContentSource,
}

impl TileContent {
    pub(crate) fn single(key: TileKey, size: u32, layer: Layer, source: ContentSource) -> Self {
        Self {
            key,
            size,
            layers: vec![layer],
            complete: true,
            source,
        }
    }

    pub(crate) fn empty(key: TileKey, size: u32) -> Self {
        Self {
            key,
            size,
            layers: Vec::new(),
            complete: false,
            source: ContentSource::Empty,
        }
    }

    pub fn layer_kinds(&self) -> Vec<LayerKind> {
        self.layers.iter().map(Layer::kind).collect()
    }

    /// The in-flight fetch, when the content is still waiting on one.
    pub fn pending(&self) -> Option<&PendingTile> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::Pending(pending) => Some(pending),
            _ => None,
        })
    }

    /// Paint every layer that has an image into one `size` × `size` image.
    ///
    /// Pixels no layer covers stay transparent.
    pub fn flatten(&self) -> RgbaImage {
        let mut surface = Surface::square(self.size);
        let bounds = surface.bounds();
        for image in self.layers.iter().filter_map(Layer::image) {
            surface.draw(&image, bounds);
        }
        surface.into_image()
    }

    pub fn summary(&self) -> ContentSummary {
        ContentSummary {
            zoom: self.key.coord.zoom,
            row: self.key.coord.row,
            col: self.key.coord.col,
            lod: self.key.lod,
            size: self.size,
            source: self.source,
            complete: self.complete,
            layers: self.layer_kinds(),
        }
    }
}

/// Serializable description of a [`TileContent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentSummary {
    pub zoom: u8,
    pub row: u32,
    pub col: u32,
    pub lod: u8,
    pub size: u32,
    pub source: ContentSource,
    pub complete: bool,
    pub layers: Vec<LayerKind>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;
    use image::Rgba;
    use std::sync::Arc;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);

    fn key() -> TileKey {
        TileKey::new(TileCoord::new(0, 0, 1), 0)
    }

    #[test]
    fn test_flatten_paints_top_layer_last() {
        let half = RgbaImage::from_fn(4, 4, |x, _| if x < 2 { GREEN } else { Rgba([0, 0, 0, 0]) });
        let content = TileContent {
            key: key(),
            size: 4,
            layers: vec![
                Layer::Ancestor(Arc::new(RgbaImage::from_pixel(4, 4, RED))),
                Layer::Composite(Arc::new(half)),
            ],
            complete: false,
            source: ContentSource::Fetching,
        };

        let flat = content.flatten();
        assert_eq!(*flat.get_pixel(0, 0), GREEN);
        assert_eq!(*flat.get_pixel(3, 3), RED);
    }

    #[test]
    fn test_flatten_scales_to_content_size() {
        let content = TileContent::single(
            key(),
            8,
            Layer::Exact(Arc::new(RgbaImage::from_pixel(2, 2, RED))),
            ContentSource::Exact,
        );
        let flat = content.flatten();
        assert_eq!(flat.dimensions(), (8, 8));
        assert_eq!(*flat.get_pixel(7, 7), RED);
    }

    #[test]
    fn test_empty_content() {
        let content = TileContent::empty(key(), 4);
        assert!(content.layers.is_empty());
        assert!(!content.complete);
        assert!(content.pending().is_none());
        assert_eq!(content.flatten().get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_summary_serializes_kinds() {
        let content = TileContent::single(
            key(),
            4,
            Layer::Ancestor(Arc::new(RgbaImage::new(4, 4))),
            ContentSource::Ancestor,
        );
        let summary = content.summary();
        assert_eq!(summary.layers, vec![LayerKind::Ancestor]);
        assert_eq!(summary.source, ContentSource::Ancestor);
        assert_eq!(ContentSource::Fetching.to_string(), "fetching");
    }

    #[test]
    fn test_layer_kind_display() {
        assert_eq!(LayerKind::Exact.to_string(), "exact");
        assert_eq!(LayerKind::Ancestor.to_string(), "ancestor");
        assert_eq!(LayerKind::Composite.to_string(), "composite");
        assert_eq!(LayerKind::Pending.to_string(), "pending");
    }
}
