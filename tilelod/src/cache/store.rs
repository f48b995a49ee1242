//! Sparse `(zoom, row, col, lod)` image table.
//!
//! The store is keyed per cell: each `TileCoord` maps to a [`Mipmap`]. Cells
//! are created on first insert and never removed, so the table only grows.
//! Inserts go through the cell's shard lock and are insert-if-absent, which
//! keeps the first successful write for a key even when fetch tasks finish
//! on different worker threads.

use std::fmt;

use dashmap::{DashMap, DashSet};

use crate::cache::mipmap::{Mipmap, TileImage};
use crate::coord::{TileCoord, TileKey};

/// Snapshot of store occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of cells with at least one image.
    pub cells: usize,
    /// Number of images across all cells.
    pub images: usize,
    /// Approximate pixel memory in bytes.
    pub bytes: u64,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} images in {} cells ({} bytes)",
            self.images, self.cells, self.bytes
        )
    }
}

/// Append-only cache of tile images.
#[derive(Debug, Default)]
pub struct TileStore {
    cells: DashMap<TileCoord, Mipmap>,
    /// Cells holding an image themselves or in any descendant.
    occupied: DashSet<TileCoord>,
}

impl TileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Image stored under exactly `key`.
    pub fn get(&self, key: &TileKey) -> Option<TileImage> {
        self.cells
            .get(&key.coord)
            .and_then(|mipmap| mipmap.get(key.lod).cloned())
    }

    /// True if an image is stored under `key`.
    pub fn contains(&self, key: &TileKey) -> bool {
        self.cells
            .get(&key.coord)
            .is_some_and(|mipmap| mipmap.get(key.lod).is_some())
    }

    /// Snapshot of the mipmap for a cell.
    ///
    /// The returned copy shares image data with the store; holding it does
    /// not block concurrent inserts.
    pub fn mipmap(&self, coord: &TileCoord) -> Option<Mipmap> {
        self.cells.get(coord).map(|mipmap| mipmap.clone())
    }

    /// Store an image unless one already exists for `key`.
    ///
    /// Returns the image that is stored after the call.
    pub fn insert(&self, key: TileKey, image: TileImage) -> TileImage {
        let stored = self
            .cells
            .entry(key.coord)
            .or_default()
            .insert(key.lod, image);

        // Ancestors above an already marked cell are marked too.
        for levels_above in 0..=key.coord.zoom {
            let Some(ancestor) = key.coord.ancestor(levels_above) else {
                break;
            };
            if !self.occupied.insert(ancestor) {
                break;
            }
        }
        stored
    }

    /// True if `coord` or any tile inside its footprint holds an image.
    pub fn has_data_within(&self, coord: &TileCoord) -> bool {
        self.occupied.contains(coord)
    }

    /// Number of populated cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Occupancy statistics.
    pub fn stats(&self) -> StoreStats {
        self.cells
            .iter()
            .fold(StoreStats::default(), |mut stats, entry| {
                stats.cells += 1;
                stats.images += entry.len();
                stats.bytes += entry.size_bytes();
                stats
            })
    }
}
