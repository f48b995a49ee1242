//! Fallback composition for tiles missing from the cache.
//!
//! - [`larger`]: crop the nearest cached ancestor down to the target
//! - [`smaller`]: assemble the target from cached descendants
//! - [`surface`]: the scaled-draw primitive both rely on
//!
//! Both work directly against a [`TileStore`](crate::cache::TileStore) and
//! render at `tile_size << lod` pixels per side.

pub mod larger;
pub mod smaller;
pub mod surface;

pub use larger::{ancestor_region, resolve_from_larger, AncestorRegion, LargerTile};
pub use smaller::{composite_from_smaller, resolve_from_smaller, SmallerTile};
pub use surface::{Rect, Surface};
