//! TileLOD - multi-resolution tile cache and level-of-detail compositing
//!
//! This library answers map tile requests immediately with the best image it
//! can build from cached data at other zoom levels and resolutions, while
//! fetching the exact tile in the background.
//!
//! # High-Level API
//!
//! ```ignore
//! use std::sync::Arc;
//! use tilelod::config::LodConfig;
//! use tilelod::coord::TileCoord;
//! use tilelod::engine::LodEngine;
//! use tilelod::provider::{ReqwestClient, TemplateUrlBuilder};
//! use tilelod::registry::TileRegistry;
//!
//! let urls = Arc::new(TemplateUrlBuilder::new("https://tiles.example.com/{z}/{x}/{y}.png", 256));
//! let engine = Arc::new(LodEngine::new(LodConfig::default(), urls, Arc::new(ReqwestClient::new()?))?);
//!
//! let mut registry = TileRegistry::new(Arc::clone(&engine));
//! let handle = registry.display_tile(TileCoord::new(3, 7, 5));
//!
//! let mut loaded = engine.subscribe();
//! while let Ok(event) = loaded.recv().await {
//!     registry.refresh_loaded(event.key);
//! }
//! ```

pub mod cache;
pub mod compose;
pub mod config;
pub mod coord;
pub mod engine;
pub mod logging;
pub mod provider;
pub mod registry;

pub use engine::{LodEngine, TileContent};
pub use registry::TileRegistry;

/// Version of the TileLOD library and CLI.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
