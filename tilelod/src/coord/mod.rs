//! Tile pyramid coordinates
//!
//! Provides the `(zoom, row, col)` cell addressing used by the cache and the
//! parent/child relations the compositor walks.

mod types;

pub use types::{CoordError, TileCoord, TileKey, MAX_ZOOM};
