//! Tile content assembly.
//!
//! [`LodEngine::get_tile_content`] always answers immediately with something
//! drawable, choosing the first of these that applies:
//!
//! 1. **Exact**: the store holds the tile at the wanted LOD.
//! 2. **Ancestor**: a coarser tile exists at exactly the needed resolution.
//! 3. **Composite**: finer tiles cover the whole footprint.
//! 4. **Fetching**: placeholders from the two fallbacks, with the exact tile
//!    requested and layered on top.
//!
//! ```text
//!   ┌─────────────┐  miss  ┌──────────────┐ diff > 0 ┌───────────────┐
//!   │ exact (lod) │ ─────► │ larger tiles │ ───────► │ smaller tiles │
//!   └─────────────┘        └──────────────┘          └───────────────┘
//!                                                           │ incomplete
//!                                                           ▼
//!                                   [ancestor, composite, pending fetch]
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tilelod::config::LodConfig;
//! use tilelod::engine::LodEngine;
//! use tilelod::provider::{ReqwestClient, TemplateUrlBuilder};
//!
//! let urls = Arc::new(TemplateUrlBuilder::new("https://tiles.example.com/{z}/{x}/{y}.png", 256));
//! let engine = LodEngine::new(LodConfig::default(), urls, Arc::new(ReqwestClient::new()?))?;
//!
//! let content = engine.get_tile_content(TileCoord::new(3, 7, 5));
//! if let Some(pending) = content.pending() {
//!     pending.loaded().await;
//! }
//! ```

mod content;
mod error;
mod fetch;

pub use content::{ContentSource, ContentSummary, Layer, LayerKind, TileContent};
pub use error::EngineError;
pub use fetch::{FetchState, FetchStats, PendingTile, TileLoaded};

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::cache::TileStore;
use crate::compose::{resolve_from_larger, resolve_from_smaller};
use crate::config::LodConfig;
use crate::coord::{TileCoord, TileKey};
use crate::provider::{AsyncHttpClient, TileUrlBuilder};

use fetch::TileFetcher;

/// Multi-resolution tile engine.
///
/// Shared as `Arc<LodEngine>`; every method takes `&self`.
pub struct LodEngine {
    config: RwLock<LodConfig>,
    store: Arc<TileStore>,
    fetcher: TileFetcher,
}

impl LodEngine {
    /// Create an engine with an empty store on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails if called outside a runtime or if `config` does not validate.
    pub fn new(
        config: LodConfig,
        urls: Arc<dyn TileUrlBuilder>,
        client: Arc<dyn AsyncHttpClient>,
    ) -> Result<Self, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        Self::with_runtime(config, Arc::new(TileStore::new()), urls, client, runtime)
    }

    /// Create an engine over an existing store, spawning fetches on `runtime`.
    pub fn with_runtime(
        config: LodConfig,
        store: Arc<TileStore>,
        urls: Arc<dyn TileUrlBuilder>,
        client: Arc<dyn AsyncHttpClient>,
        runtime: Handle,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        info!(
            tile_size = config.tile_size,
            level_of_detail = config.level_of_detail,
            max_oversample = config.max_oversample,
            "Tile engine created"
        );

        let fetcher = TileFetcher::new(Arc::clone(&store), urls, client, runtime);
        Ok(Self {
            config: RwLock::new(config),
            store,
            fetcher,
        })
    }

    /// Current configuration.
    pub fn config(&self) -> LodConfig {
        *self.config.read()
    }

    /// The shared image store.
    pub fn store(&self) -> &Arc<TileStore> {
        &self.store
    }

    /// Change the zoom level below which tiles are oversampled.
    ///
    /// Already displayed tiles keep their content until refreshed.
    pub fn set_level_of_detail(&self, level_of_detail: u8) {
        self.config.write().level_of_detail = level_of_detail;
        debug!(level_of_detail, "Level of detail changed");
    }

    /// Change the LOD cap.
    ///
    /// # Errors
    ///
    /// Rejects values whose largest surface would exceed the size limit; the
    /// previous value stays in effect.
    pub fn set_max_oversample(&self, max_oversample: u8) -> Result<(), EngineError> {
        let mut config = self.config.write();
        let updated = config.with_max_oversample(max_oversample);
        updated.validate()?;
        *config = updated;
        debug!(max_oversample, "Max oversample changed");
        Ok(())
    }

    /// Receive an event for every image a fetch adds to the store.
    pub fn subscribe(&self) -> broadcast::Receiver<TileLoaded> {
        self.fetcher.subscribe()
    }

    pub fn fetch_stats(&self) -> FetchStats {
        self.fetcher.stats()
    }

    /// Cancel in-flight fetches. Later misses get a failed pending layer.
    pub fn shutdown(&self) {
        info!("Tile engine shutting down");
        self.fetcher.shutdown();
    }

    /// Produce drawable content for `coord` at the configured LOD.
    ///
    /// Never fails: missing data degrades to placeholders under a pending
    /// fetch, and coordinates outside the pyramid give empty content.
    pub fn get_tile_content(&self, coord: TileCoord) -> TileContent {
        let config = self.config();
        let lod = config.target_lod(coord.zoom);
        let key = TileKey::new(coord, lod);
        let size = config.surface_size(lod);

        if !coord.is_valid() {
            debug!(tile = %coord, "Tile outside the pyramid, nothing to draw");
            return TileContent::empty(key, size);
        }

        if let Some(image) = self.store.get(&key) {
            trace!(zoom = coord.zoom, row = coord.row, col = coord.col, lod, "Exact cache hit");
            return TileContent::single(key, size, Layer::Exact(image), ContentSource::Exact);
        }

        let larger = resolve_from_larger(&self.store, coord, lod, config.tile_size);
        if let Some(larger) = &larger {
            if larger.difference == 0 {
                debug!(
                    tile = %coord,
                    lod,
                    ancestor = %larger.ancestor,
                    "Exact resolution available from ancestor"
                );
                let layer = Layer::Ancestor(Arc::clone(&larger.image));
                return TileContent::single(key, size, layer, ContentSource::Ancestor);
            }
        }

        let bound = larger
            .as_ref()
            .map_or_else(|| config.unreachable_bound(), |larger| larger.difference);
        let smaller = resolve_from_smaller(&self.store, coord, lod, bound, config.tile_size);
        if smaller.complete {
            debug!(tile = %coord, lod, "Children cover the tile");
            return TileContent::single(
                key,
                size,
                Layer::Composite(smaller.image),
                ContentSource::Composite,
            );
        }

        let pending = self.fetcher.request(key, config.tile_size);

        let mut layers = Vec::with_capacity(3);
        if let Some(larger) = larger {
            layers.push(Layer::Ancestor(larger.image));
        }
        if smaller.drawn {
            layers.push(Layer::Composite(smaller.image));
        }
        layers.push(Layer::Pending(pending));

        debug!(
            zoom = coord.zoom,
            row = coord.row,
            col = coord.col,
            lod,
            difference = bound,
            layers = layers.len(),
            "Serving placeholders while fetching"
        );

        TileContent {
            key,
            size,
            layers,
            complete: false,
            source: ContentSource::Fetching,
        }
    }
}
