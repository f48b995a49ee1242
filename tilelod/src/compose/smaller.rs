//! Child composition: assemble a tile from cached finer-zoom tiles.
//!
//! Each of the four children at `zoom + 1` is drawn into its quadrant of the
//! destination. A child tile at one LOD lower has exactly the pixel density
//! the quadrant needs, so exact hits are drawn as-is. Where a child is
//! missing, the nearest cached LOD for that cell is painted as a placeholder
//! and the search recurses one zoom deeper to cover it with better data.
//!
//! A quadrant counts as complete only when exact data covers it, either
//! directly or through its own children.

use std::sync::Arc;

use tracing::trace;

use crate::cache::{TileImage, TileStore};
use crate::compose::surface::{Rect, Surface};
use crate::coord::TileCoord;

/// A tile assembled from finer-zoom data.
#[derive(Debug, Clone)]
pub struct SmallerTile {
    /// Composite at `tile_size << lod` pixels per side.
    pub image: TileImage,
    /// Every pixel is backed by exact cached data.
    pub complete: bool,
    /// At least one child or proxy was painted.
    pub drawn: bool,
}

/// Assemble `coord` at `lod` from its descendants.
///
/// `proxy_better_than` bounds which placeholder LODs are accepted; a proxy
/// must be strictly closer to the wanted LOD than this. A coordinate outside
/// the pyramid has no children and gives a blank, incomplete tile.
pub fn resolve_from_smaller(
    store: &TileStore,
    coord: TileCoord,
    lod: u8,
    proxy_better_than: u32,
    tile_size: u32,
) -> SmallerTile {
    let mut surface = Surface::square(tile_size << lod);
    let dest = surface.bounds();
    let complete = composite_from_smaller(
        store,
        &mut surface,
        coord,
        dest,
        i32::from(lod) - 1,
        proxy_better_than,
    );

    trace!(
        tile = %coord,
        lod,
        complete,
        drawn = surface.is_drawn(),
        "Composited tile from children"
    );

    SmallerTile {
        complete,
        drawn: surface.is_drawn(),
        image: Arc::new(surface.into_image()),
    }
}

/// Paint the children of `coord` into `dest`, looking for them at `lod`.
///
/// Returns true if exact child data covered all of `dest`.
pub fn composite_from_smaller(
    store: &TileStore,
    surface: &mut Surface,
    coord: TileCoord,
    dest: Rect,
    lod: i32,
    proxy_better_than: u32,
) -> bool {
    // No stored LOD can be closer than the bound this deep.
    if i64::from(lod) + i64::from(proxy_better_than) < 0 {
        return false;
    }
    let Some(children) = coord.children() else {
        return false;
    };

    let mut complete = true;
    for (child, i, j) in children {
        // Nothing cached at or below this child: no proxy, no exact hit.
        if !store.has_data_within(&child) {
            complete = false;
            continue;
        }
        let quadrant = dest.quadrant(i, j);
        let mipmap = store.mipmap(&child);

        if let Some(exact) = mipmap.as_ref().and_then(|m| m.exact(lod)) {
            surface.draw(exact, quadrant);
            continue;
        }

        let (proxy, bound) = match &mipmap {
            Some(mipmap) => mipmap.find_nearest(lod, Some(proxy_better_than)),
            None => (None, Some(proxy_better_than)),
        };
        let next_bound = match proxy {
            Some(proxy) => {
                surface.draw(&proxy, quadrant);
                bound.unwrap_or(proxy_better_than)
            }
            None => proxy_better_than,
        };

        if !composite_from_smaller(store, surface, child, quadrant, lod - 1, next_bound) {
            complete = false;
        }
    }
    complete
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
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn solid(lod: u8, color: Rgba<u8>) -> TileImage {
        let size = TILE << lod;
        Arc::new(RgbaImage::from_pixel(size, size, color))
    }

    fn insert(store: &TileStore, row: u32, col: u32, zoom: u8, lod: u8, color: Rgba<u8>) {
        store.insert(TileKey::new(TileCoord::new(row, col, zoom), lod), solid(lod, color));
    }

    #[test]
    fn test_empty_store_is_incomplete_and_blank() {
        let store = TileStore::new();

        let tile = resolve_from_smaller(&store, TileCoord::new(0, 0, 0), 0, 3, TILE);

        assert!(!tile.complete);
        assert!(!tile.drawn);
        assert!(tile.image.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_outside_pyramid_is_blank() {
        let store = TileStore::new();
        insert(&store, 0, 0, 6, 0, RED);

        let tile = resolve_from_smaller(&store, TileCoord::new(u32::MAX, 0, 5), 0, 3, TILE);

        assert!(!tile.complete);
        assert!(!tile.drawn);
    }

    #[test]
    fn test_four_exact_children_complete() {
        let store = TileStore::new();
        insert(&store, 0, 0, 1, 0, RED);
        insert(&store, 0, 1, 1, 0, GREEN);
        insert(&store, 1, 0, 1, 0, BLUE);
        insert(&store, 1, 1, 1, 0, WHITE);

        let tile = resolve_from_smaller(&store, TileCoord::new(0, 0, 0), 1, 3, TILE);

        assert!(tile.complete);
        assert_eq!(tile.image.dimensions(), (8, 8));
        assert_eq!(*tile.image.get_pixel(1, 1), RED);
        assert_eq!(*tile.image.get_pixel(6, 1), GREEN);
        assert_eq!(*tile.image.get_pixel(1, 6), BLUE);
        assert_eq!(*tile.image.get_pixel(6, 6), WHITE);
    }

    #[test]
    fn test_missing_child_is_incomplete() {
        let store = TileStore::new();
        insert(&store, 0, 0, 1, 0, RED);
        insert(&store, 0, 1, 1, 0, GREEN);
        insert(&store, 1, 0, 1, 0, BLUE);

        let tile = resolve_from_smaller(&store, TileCoord::new(0, 0, 0), 1, 3, TILE);

        assert!(!tile.complete);
        assert!(tile.drawn);
        assert_eq!(tile.image.get_pixel(6, 6)[3], 0);
    }

    #[test]
    fn test_proxy_only_is_never_complete() {
        let store = TileStore::new();
        // Children hold LOD 1 while LOD 0 is wanted.
        for (row, col) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            insert(&store, row, col, 1, 1, RED);
        }

        let tile = resolve_from_smaller(&store, TileCoord::new(0, 0, 0), 1, 3, TILE);

        assert!(!tile.complete);
        assert!(tile.drawn);
        assert!(tile.image.pixels().all(|p| *p == RED));
    }

    #[test]
    fn test_proxy_outside_bound_is_ignored() {
        let store = TileStore::new();
        insert(&store, 0, 0, 1, 2, RED);

        // Wanted child LOD is 0, proxy difference 2 is not below bound 2.
        let tile = resolve_from_smaller(&store, TileCoord::new(0, 0, 0), 1, 2, TILE);

        assert!(!tile.drawn);
    }

    #[test]
    fn test_grandchildren_complete_missing_child() {
        let store = TileStore::new();
        insert(&store, 0, 0, 1, 1, RED);
        insert(&store, 0, 1, 1, 1, RED);
        insert(&store, 1, 0, 1, 1, RED);
        // Bottom-right child missing, but all four of its children exist.
        for (row, col) in [(2, 2), (2, 3), (3, 2), (3, 3)] {
            insert(&store, row, col, 2, 0, BLUE);
        }

        let tile = resolve_from_smaller(&store, TileCoord::new(0, 0, 0), 2, 3, TILE);

        assert!(tile.complete);
        assert_eq!(*tile.image.get_pixel(0, 0), RED);
        assert_eq!(*tile.image.get_pixel(15, 15), BLUE);
    }

    #[test]
    fn test_proxy_then_deeper_exact_overpaints() {
        let store = TileStore::new();
        // Child at LOD 2 is a proxy for wanted LOD 1; its children are exact at LOD 0.
        insert(&store, 0, 0, 1, 2, RED);
        for (row, col) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            insert(&store, row, col, 2, 0, GREEN);
        }

        let mut surface = Surface::square(16);
        let dest = surface.bounds();
        let complete =
            composite_from_smaller(&store, &mut surface, TileCoord::new(0, 0, 0), dest, 1, 3);

        assert!(!complete, "Three children have nothing at all");
        assert_eq!(*surface.image().get_pixel(1, 1), GREEN);
        assert_eq!(*surface.image().get_pixel(7, 7), GREEN);
        assert_eq!(surface.image().get_pixel(12, 12)[3], 0);
    }

    #[test]
    fn test_recursion_stops_below_bound() {
        let store = TileStore::new();
        let mut surface = Surface::square(8);
        let dest = surface.bounds();

        assert!(!composite_from_smaller(
            &store,
            &mut surface,
            TileCoord::new(0, 0, 0),
            dest,
            -2,
            1
        ));
    }

    #[test]
    fn test_odd_tile_size_fills_every_pixel() {
        let store = TileStore::new();
        for (row, col) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            store.insert(
                TileKey::new(TileCoord::new(row, col, 1), 0),
                Arc::new(RgbaImage::from_pixel(3, 3, RED)),
            );
        }

        let tile = resolve_from_smaller(&store, TileCoord::new(0, 0, 0), 0, 2, 5);

        assert!(!tile.complete, "Children are one LOD too fine");
        assert!(tile.image.pixels().all(|p| *p == RED));
    }
}
