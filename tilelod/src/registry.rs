//! Active tile registry.
//!
//! Tracks the tiles a display host currently shows so their content can be
//! rebuilt in place: after a configuration change ([`TileRegistry::refresh_tiles`])
//! or when a fetch lands ([`TileRegistry::refresh_loaded`]).
//!
//! Each entry keeps the last [`TileContent`] built for it. That layer list is
//! what a display host binds its tile container to, so the registry holds the
//! container's contents rather than a bare coordinate.
//!
//! Releasing a tile only forgets it. The store keeps every image, and any
//! fetch the tile started still runs to completion.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::coord::{TileCoord, TileKey};
use crate::engine::{LodEngine, TileContent};

/// Opaque identifier for one displayed tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayHandle(u64);

impl fmt::Display for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A displayed tile and the content last bound to it.
#[derive(Debug, Clone)]
pub struct ActiveTile {
    pub coord: TileCoord,
    pub content: TileContent,
}

/// Displayed tiles, keyed by handle.
pub struct TileRegistry {
    engine: Arc<LodEngine>,
    tiles: HashMap<DisplayHandle, ActiveTile>,
    next_handle: u64,
}

impl TileRegistry {
    pub fn new(engine: Arc<LodEngine>) -> Self {
        Self {
            engine,
            tiles: HashMap::new(),
            next_handle: 0,
        }
    }

    pub fn engine(&self) -> &Arc<LodEngine> {
        &self.engine
    }

    /// Start displaying `coord`. Each call creates a new handle, even for a
    /// coordinate that is already shown.
    pub fn display_tile(&mut self, coord: TileCoord) -> DisplayHandle {
        let handle = DisplayHandle(self.next_handle);
        self.next_handle += 1;

        let content = self.engine.get_tile_content(coord);
        debug!(
            handle = %handle,
            tile = %coord,
            source = %content.source,
            layers = content.layers.len(),
            "Tile displayed"
        );
        self.tiles.insert(handle, ActiveTile { coord, content });
        handle
    }

    /// Stop tracking `handle`. Returns false if it was not registered.
    pub fn release_tile(&mut self, handle: DisplayHandle) -> bool {
        let released = self.tiles.remove(&handle);
        if let Some(tile) = &released {
            debug!(handle = %handle, tile = %tile.coord, "Tile released");
        }
        released.is_some()
    }

    /// Rebuild the content of every displayed tile.
    pub fn refresh_tiles(&mut self) {
        for tile in self.tiles.values_mut() {
            tile.content = self.engine.get_tile_content(tile.coord);
        }
        debug!(tiles = self.tiles.len(), "Refreshed displayed tiles");
    }

    /// Rebuild the displayed tiles whose footprint overlaps `key`'s cell.
    ///
    /// Returns how many tiles were refreshed.
    pub fn refresh_loaded(&mut self, key: TileKey) -> usize {
        let mut refreshed = 0;
        for tile in self.tiles.values_mut() {
            if tile.coord.overlaps(&key.coord) {
                tile.content = self.engine.get_tile_content(tile.coord);
                refreshed += 1;
            }
        }
        if refreshed > 0 {
            debug!(loaded = %key, refreshed, "Refreshed tiles after fetch");
        }
        refreshed
    }

    pub fn get(&self, handle: DisplayHandle) -> Option<&ActiveTile> {
        self.tiles.get(&handle)
    }

    /// Content currently bound to `handle`.
    pub fn content(&self, handle: DisplayHandle) -> Option<&TileContent> {
        self.tiles.get(&handle).map(|tile| &tile.content)
    }

    pub fn handles(&self) -> impl Iterator<Item = DisplayHandle> + '_ {
        self.tiles.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LodConfig;
    use crate::engine::{ContentSource, LayerKind};
    use crate::provider::{MockAsyncHttpClient, ProviderError, TemplateUrlBuilder};
    use image::{Rgba, RgbaImage};

    const TILE: u32 = 4;

    fn registry() -> TileRegistry {
        let client = Arc::new(MockAsyncHttpClient::new(Err(ProviderError::HttpError(
            "offline".into(),
        ))));
        let urls = Arc::new(TemplateUrlBuilder::new("mock://{z}/{x}/{y}", TILE));
        let config = LodConfig::default().with_tile_size(TILE);
        TileRegistry::new(Arc::new(LodEngine::new(config, urls, client).unwrap()))
    }

    fn insert(registry: &TileRegistry, coord: TileCoord, lod: u8) {
        let image = RgbaImage::from_pixel(TILE << lod, TILE << lod, Rgba([0, 0, 255, 255]));
        registry
            .engine()
            .store()
            .insert(TileKey::new(coord, lod), Arc::new(image));
    }

    #[tokio::test]
    async fn test_display_and_release() {
        let mut registry = registry();
        let a = registry.display_tile(TileCoord::new(0, 0, 1));
        let b = registry.display_tile(TileCoord::new(0, 0, 1));

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert!(registry.release_tile(a));
        assert!(!registry.release_tile(a));
        assert_eq!(registry.len(), 1);
        assert!(registry.content(a).is_none());
        assert!(registry.content(b).is_some());
    }

    #[tokio::test]
    async fn test_release_keeps_cached_images() {
        let mut registry = registry();
        let coord = TileCoord::new(1, 1, 2);
        insert(&registry, coord, 0);

        let handle = registry.display_tile(coord);
        registry.release_tile(handle);

        assert!(registry.engine().store().contains(&TileKey::new(coord, 0)));
    }

    #[tokio::test]
    async fn test_refresh_tiles_picks_up_new_data() {
        let mut registry = registry();
        let coord = TileCoord::new(2, 3, 3);
        let handle = registry.display_tile(coord);
        assert_eq!(registry.content(handle).unwrap().source, ContentSource::Fetching);

        insert(&registry, coord, 0);
        registry.refresh_tiles();

        let content = registry.content(handle).unwrap();
        assert_eq!(content.source, ContentSource::Exact);
        assert!(content.complete);
    }

    #[tokio::test]
    async fn test_refresh_tiles_after_lod_change() {
        let mut registry = registry();
        let coord = TileCoord::new(0, 0, 1);
        let handle = registry.display_tile(coord);
        assert_eq!(registry.content(handle).unwrap().key.lod, 0);

        registry.engine().set_level_of_detail(2);
        assert_eq!(registry.content(handle).unwrap().key.lod, 0);

        registry.refresh_tiles();
        assert_eq!(registry.content(handle).unwrap().key.lod, 1);
        assert_eq!(registry.content(handle).unwrap().size, TILE << 1);
    }

    #[tokio::test]
    async fn test_refresh_loaded_only_touches_overlapping_tiles() {
        let mut registry = registry();
        let inside = registry.display_tile(TileCoord::new(0, 0, 2));
        let outside = registry.display_tile(TileCoord::new(3, 3, 2));

        let parent = TileCoord::new(0, 0, 1);
        insert(&registry, parent, 0);
        let refreshed = registry.refresh_loaded(TileKey::new(parent, 0));

        assert_eq!(refreshed, 1);
        assert_eq!(
            registry.content(inside).unwrap().layers[0].kind(),
            LayerKind::Ancestor
        );
        assert_eq!(registry.content(outside).unwrap().source, ContentSource::Fetching);
        assert_eq!(registry.content(outside).unwrap().layers.len(), 1);
    }
}
