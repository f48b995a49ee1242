//! Ancestor lookup: fill a tile from a coarser cached tile.
//!
//! An ancestor `levels_above` zoom levels up covers `2^levels_above` tiles
//! along each axis, so it has to be rendered at `lod + levels_above` to give
//! the same pixel density as the target at `lod`. The walk starts at the
//! target cell itself (`levels_above = 0`, other LODs of the same cell) and
//! moves toward zoom 0, keeping the closest match. The bound handed to each
//! mipmap search only ever tightens, so a closer zoom level wins ties.

use std::sync::Arc;

use tracing::trace;

use crate::cache::{TileImage, TileStore};
use crate::compose::surface::{Rect, Surface};
use crate::coord::TileCoord;

/// Where a target tile sits inside an ancestor drawn at
/// `tile_size << levels_above` pixels per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AncestorRegion {
    /// Left edge of the target, in ancestor-space pixels.
    pub x: u64,
    /// Top edge of the target, in ancestor-space pixels.
    pub y: u64,
    /// Side length of the target, always `tile_size`.
    pub size: u64,
    /// Side length of the whole ancestor, `tile_size << levels_above`.
    pub extent: u64,
}

impl AncestorRegion {
    /// Map the region onto an ancestor image of the given pixel size.
    ///
    /// Sizes never collapse below one source pixel.
    pub fn source_rect(&self, width: u32, height: u32) -> Rect {
        let scale = |offset: u64, length: u32| -> (u32, u32) {
            let length = u64::from(length);
            let start = (offset * length / self.extent).min(length.saturating_sub(1));
            let span = (self.size * length / self.extent).max(1);
            (start as u32, span.min(length - start) as u32)
        };
        let (x, w) = scale(self.x, width);
        let (y, h) = scale(self.y, height);
        Rect::new(x, y, w, h)
    }
}

/// Compute the sub-region of the ancestor `levels_above` levels up that
/// corresponds to `target`.
///
/// Returns `None` if the ancestor would lie above zoom 0.
pub fn ancestor_region(target: &TileCoord, levels_above: u8, tile_size: u32) -> Option<AncestorRegion> {
    let ancestor = target.ancestor(levels_above)?;
    let tile_size = u64::from(tile_size);
    let offset_col = u64::from(target.col - (ancestor.col << levels_above));
    let offset_row = u64::from(target.row - (ancestor.row << levels_above));

    Some(AncestorRegion {
        x: offset_col * tile_size,
        y: offset_row * tile_size,
        size: tile_size,
        extent: tile_size << levels_above,
    })
}

/// A tile synthesised from a coarser (or same-cell, other-LOD) cached image.
#[derive(Debug, Clone)]
pub struct LargerTile {
    /// Cropped and scaled image at `tile_size << lod` pixels per side.
    pub image: TileImage,
    /// Distance between the ancestor image's LOD and the LOD it would need.
    pub difference: u32,
    /// The cell the image came from.
    pub ancestor: TileCoord,
    /// Zoom levels between the ancestor and the target.
    pub levels_above: u8,
    /// The target's footprint inside the ancestor.
    pub region: AncestorRegion,
}

/// Find the best ancestor image for `coord` at `lod` and crop it.
///
/// Returns `None` if no ancestor at any level has cached data, or if `coord`
/// lies outside the pyramid.
pub fn resolve_from_larger(
    store: &TileStore,
    coord: TileCoord,
    lod: u8,
    tile_size: u32,
) -> Option<LargerTile> {
    if !coord.is_valid() {
        return None;
    }

    let mut best: Option<(TileImage, u32, u8)> = None;
    let mut bound: Option<u32> = None;

    for levels_above in 0..=coord.zoom {
        let Some(ancestor) = coord.ancestor(levels_above) else {
            break;
        };
        let Some(mipmap) = store.mipmap(&ancestor) else {
            continue;
        };

        let target = i32::from(lod) + i32::from(levels_above);
        if let (Some(image), Some(difference)) = mipmap.find_nearest(target, bound) {
            bound = Some(difference);
            best = Some((image, difference, levels_above));
            if difference == 0 {
                break;
            }
        }
    }

    let (source, difference, levels_above) = best?;
    let ancestor = coord.ancestor(levels_above)?;
    let region = ancestor_region(&coord, levels_above, tile_size)?;

    let size = tile_size << lod;
    let mut surface = Surface::square(size);
    surface.draw_region(
        &source,
        region.source_rect(source.width(), source.height()),
        surface.bounds(),
    );

    trace!(
        tile = %coord,
        lod,
        ancestor = %ancestor,
        levels_above,
        difference,
        "Resolved tile from ancestor"
    );

    Some(LargerTile {
        image: Arc::new(surface.into_image()),
        difference,
        ancestor,
        levels_above,
        region,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileKey;
    use image::{Rgba, RgbaImage};

    const TILE: u32 = 4;
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn solid(lod: u8, color: Rgba<u8>) -> TileImage {
        let size = TILE << lod;
        Arc::new(RgbaImage::from_pixel(size, size, color))
    }

    /// Image split into a 2×2 grid of colours: red, green / blue, white.
    fn quartered(lod: u8) -> TileImage {
        let size = TILE << lod;
        let half = size / 2;
        let image = RgbaImage::from_fn(size, size, |x, y| match (x < half, y < half) {
            (true, true) => RED,
            (false, true) => GREEN,
            (true, false) => BLUE,
            (false, false) => Rgba([255, 255, 255, 255]),
        });
        Arc::new(image)
    }

    #[test]
    fn test_region_offsets_inside_extent() {
        let target = TileCoord::new(1, 1, 4);
        let region = ancestor_region(&target, 2, 256).unwrap();

        assert_eq!(region.x, 256);
        assert_eq!(region.y, 256);
        assert_eq!(region.size, 256);
        assert_eq!(region.extent, 1024);
    }

    #[test]
    fn test_region_always_within_extent() {
        for zoom in 0..8u8 {
            let side = 1u32 << zoom;
            for row in [0, side / 2, side - 1] {
                for col in [0, side / 3, side - 1] {
                    let target = TileCoord::new(row, col, zoom);
                    for levels_above in 0..=zoom {
                        let region = ancestor_region(&target, levels_above, 256).unwrap();
                        assert!(region.x + region.size <= region.extent);
                        assert!(region.y + region.size <= region.extent);
                    }
                }
            }
        }
    }

    #[test]
    fn test_region_above_root_is_none() {
        assert!(ancestor_region(&TileCoord::new(0, 0, 1), 2, 256).is_none());
    }

    #[test]
    fn test_source_rect_tiny_ancestor_keeps_one_pixel() {
        let region = ancestor_region(&TileCoord::new(7, 7, 3), 3, 1).unwrap();
        let src = region.source_rect(1, 1);
        assert_eq!(src, Rect::new(0, 0, 1, 1));
    }

    #[test]
    fn test_no_data_returns_none() {
        let store = TileStore::new();
        assert!(resolve_from_larger(&store, TileCoord::new(1, 1, 4), 0, TILE).is_none());
    }

    #[test]
    fn test_exact_equivalent_from_ancestor() {
        let store = TileStore::new();
        store.insert(TileKey::new(TileCoord::new(0, 0, 2), 2), solid(2, RED));

        let larger = resolve_from_larger(&store, TileCoord::new(1, 1, 4), 0, TILE).unwrap();

        assert_eq!(larger.difference, 0);
        assert_eq!(larger.levels_above, 2);
        assert_eq!(larger.ancestor, TileCoord::new(0, 0, 2));
        assert_eq!(larger.image.dimensions(), (TILE, TILE));
        assert!(larger.image.pixels().all(|p| *p == RED));
    }

    #[test]
    fn test_crop_selects_target_quadrant() {
        let store = TileStore::new();
        store.insert(TileKey::new(TileCoord::new(0, 0, 0), 1), quartered(1));

        let top_right = resolve_from_larger(&store, TileCoord::new(0, 1, 1), 0, TILE).unwrap();
        let bottom_left = resolve_from_larger(&store, TileCoord::new(1, 0, 1), 0, TILE).unwrap();

        assert_eq!(top_right.difference, 0);
        assert!(top_right.image.pixels().all(|p| *p == GREEN));
        assert!(bottom_left.image.pixels().all(|p| *p == BLUE));
    }

    #[test]
    fn test_closer_level_wins_tie() {
        let store = TileStore::new();
        // One level up, LOD 0 against target 1: difference 1.
        store.insert(TileKey::new(TileCoord::new(0, 0, 3), 0), solid(0, GREEN));
        // Two levels up, LOD 1 against target 2: also difference 1.
        store.insert(TileKey::new(TileCoord::new(0, 0, 2), 1), solid(1, RED));

        let larger = resolve_from_larger(&store, TileCoord::new(0, 0, 4), 0, TILE).unwrap();

        assert_eq!(larger.difference, 1);
        assert_eq!(larger.levels_above, 1);
        assert!(larger.image.pixels().all(|p| *p == GREEN));
    }

    #[test]
    fn test_farther_level_wins_when_strictly_better() {
        let store = TileStore::new();
        store.insert(TileKey::new(TileCoord::new(0, 0, 3), 0), solid(0, GREEN));
        store.insert(TileKey::new(TileCoord::new(0, 0, 2), 2), solid(2, RED));

        let larger = resolve_from_larger(&store, TileCoord::new(0, 0, 4), 0, TILE).unwrap();

        assert_eq!(larger.difference, 0);
        assert_eq!(larger.levels_above, 2);
    }

    #[test]
    fn test_same_cell_other_lod_is_proxy() {
        let store = TileStore::new();
        store.insert(TileKey::new(TileCoord::new(3, 7, 5), 0), solid(0, BLUE));

        let larger = resolve_from_larger(&store, TileCoord::new(3, 7, 5), 2, TILE).unwrap();

        assert_eq!(larger.levels_above, 0);
        assert_eq!(larger.difference, 2);
        assert_eq!(larger.image.dimensions(), (TILE << 2, TILE << 2));
    }

    #[test]
    fn test_never_returns_finer_zoom() {
        let store = TileStore::new();
        store.insert(TileKey::new(TileCoord::new(2, 2, 5), 0), solid(0, RED));

        let result = resolve_from_larger(&store, TileCoord::new(1, 1, 4), 0, TILE);

        assert!(result.is_none());
    }

    #[test]
    fn test_outside_pyramid_returns_none() {
        let store = TileStore::new();
        store.insert(TileKey::new(TileCoord::new(0, 0, 0), 5), solid(5, RED));

        assert!(resolve_from_larger(&store, TileCoord::new(u32::MAX, 0, 5), 0, TILE).is_none());
        assert!(resolve_from_larger(&store, TileCoord::new(0, 0, 40), 0, TILE).is_none());
    }
}
