//! Multi-resolution tile cache.
//!
//! # Architecture
//!
//! ```text
//! TileStore: DashMap<TileCoord, Mipmap>
//!                          │
//!                          ▼
//!            Mipmap: BTreeMap<lod, Arc<RgbaImage>>
//! ```
//!
//! The store owns every cached image. Nothing is evicted; the host bounds
//! growth through the zoom range it requests.

mod mipmap;
mod store;

pub use mipmap::{Mipmap, TileImage};
pub use store::{StoreStats, TileStore};
