//! Asynchronous fetch-and-promote.
//!
//! A miss on the exact tile starts a download task that decodes the response
//! and inserts it into the shared [`TileStore`]. Requests are coalesced per
//! [`TileKey`]: while a fetch is in flight every caller gets a
//! [`PendingTile`] observing the same task.
//!
//! # Lifecycle
//!
//! ```text
//! request(key) ──► in_flight[key] = rx ──► spawn task
//!                                              │
//!                      download ─► decode (blocking pool) ─► resize if needed
//!                                              │
//!                           store.insert(key) ─► in_flight.remove(key)
//!                                              │
//!                           watch: Ready(image) ─► broadcast: TileLoaded
//! ```
//!
//! The in-flight entry is removed only after the store holds the image, so a
//! concurrent request either joins the running fetch or hits the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::cache::{TileImage, TileStore};
use crate::coord::TileKey;
use crate::provider::{AsyncHttpClient, ProviderError, TileUrlBuilder};

/// Capacity of the load-event channel. Slow subscribers see `Lagged`.
const EVENT_CAPACITY: usize = 256;

/// Progress of one tile fetch.
#[derive(Debug, Clone)]
pub enum FetchState {
    /// Download or decode still running.
    Loading,
    /// Image decoded and published to the store.
    Ready(TileImage),
    /// Download failed, could not be decoded, or was cancelled.
    Failed,
}

impl FetchState {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }
}

/// Notification that an image was added to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLoaded {
    pub key: TileKey,
}

/// The top layer of an incomplete tile: an image that is still on its way.
#[derive(Debug, Clone)]
pub struct PendingTile {
    key: TileKey,
    state: watch::Receiver<FetchState>,
}

impl PendingTile {
    fn settled(key: TileKey, state: FetchState) -> Self {
        let (_, rx) = watch::channel(state);
        Self { key, state: rx }
    }

    /// The tile and LOD being fetched.
    pub fn key(&self) -> TileKey {
        self.key
    }

    /// Current fetch state.
    pub fn state(&self) -> FetchState {
        self.state.borrow().clone()
    }

    /// The decoded image, if the fetch has already finished.
    pub fn image(&self) -> Option<TileImage> {
        match &*self.state.borrow() {
            FetchState::Ready(image) => Some(Arc::clone(image)),
            _ => None,
        }
    }

    /// Whether the fetch has finished, successfully or not.
    pub fn is_settled(&self) -> bool {
        !self.state.borrow().is_loading()
    }

    /// Wait for the fetch to finish.
    ///
    /// Returns `None` if it failed or the engine shut down first.
    pub async fn loaded(&self) -> Option<TileImage> {
        let mut state = self.state.clone();
        let result = match state.wait_for(|s| !s.is_loading()).await {
            Ok(current) => match &*current {
                FetchState::Ready(image) => Some(Arc::clone(image)),
                _ => None,
            },
            Err(_) => None,
        };
        result
    }
}

/// Counters describing fetch activity since the engine started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Requests received, including coalesced ones.
    pub requests: u64,
    /// Requests that joined an already running fetch.
    pub coalesced: u64,
    /// Fetches that published an image.
    pub completed: u64,
    /// Fetches that failed to download or decode.
    pub failed: u64,
    /// Fetches currently running.
    pub in_flight: usize,
}

#[derive(Debug, Error)]
enum FetchError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("failed to decode tile: {0}")]
    Decode(#[from] image::ImageError),

    #[error("decode task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("cancelled by shutdown")]
    Cancelled,
}

struct FetcherShared {
    store: Arc<TileStore>,
    urls: Arc<dyn TileUrlBuilder>,
    client: Arc<dyn AsyncHttpClient>,
    in_flight: DashMap<TileKey, watch::Receiver<FetchState>>,
    events: broadcast::Sender<TileLoaded>,
    shutdown: CancellationToken,
    requests: AtomicU64,
    coalesced: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Starts and deduplicates tile downloads.
pub(crate) struct TileFetcher {
    shared: Arc<FetcherShared>,
    runtime: Handle,
}

impl TileFetcher {
    pub(crate) fn new(
        store: Arc<TileStore>,
        urls: Arc<dyn TileUrlBuilder>,
        client: Arc<dyn AsyncHttpClient>,
        runtime: Handle,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(FetcherShared {
                store,
                urls,
                client,
                in_flight: DashMap::new(),
                events,
                shutdown: CancellationToken::new(),
                requests: AtomicU64::new(0),
                coalesced: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
            runtime,
        }
    }

    /// Fetch `key`, or join the fetch already running for it.
    ///
    /// `tile_size` is the LOD 0 edge length; the decoded image is normalised
    /// to `tile_size << key.lod` pixels.
    pub(crate) fn request(&self, key: TileKey, tile_size: u32) -> PendingTile {
        let shared = &self.shared;
        shared.requests.fetch_add(1, Ordering::Relaxed);

        if shared.shutdown.is_cancelled() {
            return PendingTile::settled(key, FetchState::Failed);
        }

        let (tx, rx) = match shared.in_flight.entry(key) {
            Entry::Occupied(entry) => {
                shared.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(
                    zoom = key.coord.zoom,
                    row = key.coord.row,
                    col = key.coord.col,
                    lod = key.lod,
                    "Coalescing tile request with in-flight fetch"
                );
                return PendingTile {
                    key,
                    state: entry.get().clone(),
                };
            }
            Entry::Vacant(entry) => {
                // A fetch may have landed since the caller checked the store.
                if let Some(image) = shared.store.get(&key) {
                    return PendingTile::settled(key, FetchState::Ready(image));
                }
                let (tx, rx) = watch::channel(FetchState::Loading);
                entry.insert(rx.clone());
                (tx, rx)
            }
        };

        let task = Arc::clone(shared);
        self.runtime.spawn(async move { task.run(key, tile_size, tx).await });

        PendingTile { key, state: rx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<TileLoaded> {
        self.shared.events.subscribe()
    }

    pub(crate) fn stats(&self) -> FetchStats {
        let shared = &self.shared;
        FetchStats {
            requests: shared.requests.load(Ordering::Relaxed),
            coalesced: shared.coalesced.load(Ordering::Relaxed),
            completed: shared.completed.load(Ordering::Relaxed),
            failed: shared.failed.load(Ordering::Relaxed),
            in_flight: shared.in_flight.len(),
        }
    }

    /// Cancel every running fetch and refuse new ones.
    pub(crate) fn shutdown(&self) {
        self.shared.shutdown.cancel();
    }
}

impl FetcherShared {
    async fn run(&self, key: TileKey, tile_size: u32, tx: watch::Sender<FetchState>) {
        let url = self.urls.build_url(&key.coord, key.lod);
        trace!(tile = %key.coord, lod = key.lod, url = %url, "Fetching tile");

        let outcome = tokio::select! {
            _ = self.shutdown.cancelled() => Err(FetchError::Cancelled),
            result = self.download(&url, tile_size << key.lod) => result,
        };

        match outcome {
            Ok(image) => {
                let image = self.store.insert(key, image);
                self.in_flight.remove(&key);
                self.completed.fetch_add(1, Ordering::Relaxed);
                tx.send_replace(FetchState::Ready(image));
                debug!(tile = %key.coord, lod = key.lod, "Tile fetched and cached");
                // No subscribers is fine.
                let _ = self.events.send(TileLoaded { key });
            }
            Err(FetchError::Cancelled) => {
                self.in_flight.remove(&key);
                tx.send_replace(FetchState::Failed);
                debug!(tile = %key.coord, lod = key.lod, "Tile fetch cancelled");
            }
            Err(e) => {
                self.in_flight.remove(&key);
                self.failed.fetch_add(1, Ordering::Relaxed);
                tx.send_replace(FetchState::Failed);
                let transient = matches!(&e, FetchError::Provider(p) if p.is_transient());
                warn!(
                    tile = %key.coord,
                    lod = key.lod,
                    url = %url,
                    transient,
                    error = %e,
                    "Tile fetch failed"
                );
            }
        }
    }

    async fn download(&self, url: &str, size: u32) -> Result<TileImage, FetchError> {
        let bytes = self.client.get(url).await?;
        let image = tokio::task::spawn_blocking(move || decode_tile(&bytes, size)).await??;
        Ok(Arc::new(image))
    }
}

/// Decode `bytes` and bring the result to `size` × `size` pixels.
fn decode_tile(bytes: &[u8], size: u32) -> Result<RgbaImage, image::ImageError> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    if image.width() == size && image.height() == size {
        return Ok(image);
    }

    warn!(
        width = image.width(),
        height = image.height(),
        expected = size,
        "Decoded tile has unexpected size, resizing"
    );
    Ok(imageops::resize(&image, size, size, FilterType::Triangle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;
    use crate::provider::{MockAsyncHttpClient, TemplateUrlBuilder};
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png(size: u32, color: Rgba<u8>) -> Vec<u8> {
        let image = RgbaImage::from_pixel(size, size, color);
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn fetcher(client: Arc<MockAsyncHttpClient>) -> (TileFetcher, Arc<TileStore>) {
        let store = Arc::new(TileStore::new());
        let urls = Arc::new(TemplateUrlBuilder::new("mock://{z}/{x}/{y}/{lod}", 4));
        let fetcher = TileFetcher::new(Arc::clone(&store), urls, client, Handle::current());
        (fetcher, store)
    }

    #[test]
    fn test_decode_keeps_matching_size() {
        let image = decode_tile(&png(8, Rgba([0, 255, 0, 255])), 8).unwrap();
        assert_eq!(image.dimensions(), (8, 8));
    }

    #[test]
    fn test_decode_resizes_mismatched_size() {
        let image = decode_tile(&png(3, Rgba([0, 0, 255, 255])), 16).unwrap();
        assert_eq!(image.dimensions(), (16, 16));
        assert_eq!(*image.get_pixel(8, 8), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_tile(b"not an image", 4).is_err());
    }

    #[tokio::test]
    async fn test_fetch_promotes_into_store() {
        let client = Arc::new(MockAsyncHttpClient::new(Ok(png(8, Rgba([255, 0, 0, 255])))));
        let (fetcher, store) = fetcher(Arc::clone(&client));
        let mut events = fetcher.subscribe();
        let key = TileKey::new(TileCoord::new(1, 2, 3), 1);

        let pending = fetcher.request(key, 4);
        let image = pending.loaded().await.unwrap();

        assert_eq!(image.dimensions(), (8, 8));
        assert!(store.contains(&key));
        assert_eq!(events.recv().await.unwrap(), TileLoaded { key });
        assert_eq!(client.urls.lock().unwrap()[0], "mock://3/2/1/1");
        assert_eq!(fetcher.stats().completed, 1);
        assert_eq!(fetcher.stats().in_flight, 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_store_empty() {
        let client = Arc::new(MockAsyncHttpClient::new(Err(ProviderError::Status {
            status: 404,
            url: String::new(),
        })));
        let (fetcher, store) = fetcher(Arc::clone(&client));
        let key = TileKey::new(TileCoord::new(0, 0, 0), 0);

        let pending = fetcher.request(key, 4);
        assert!(pending.loaded().await.is_none());
        assert!(matches!(pending.state(), FetchState::Failed));
        assert!(!store.contains(&key));
        assert_eq!(fetcher.stats().failed, 1);

        // Nothing stays in flight, so a later request fetches again.
        let again = fetcher.request(key, 4);
        assert!(again.loaded().await.is_none());
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_undecodable_body_fails() {
        let client = Arc::new(MockAsyncHttpClient::new(Ok(b"<html>".to_vec())));
        let (fetcher, store) = fetcher(client);
        let key = TileKey::new(TileCoord::new(0, 0, 0), 0);

        assert!(fetcher.request(key, 4).loaded().await.is_none());
        assert_eq!(store.stats().images, 0);
    }

    #[tokio::test]
    async fn test_request_for_cached_key_is_ready() {
        let client = Arc::new(MockAsyncHttpClient::new(Ok(png(4, Rgba([0, 0, 0, 255])))));
        let (fetcher, store) = fetcher(Arc::clone(&client));
        let key = TileKey::new(TileCoord::new(0, 0, 0), 0);
        store.insert(key, Arc::new(RgbaImage::new(4, 4)));

        let pending = fetcher.request(key, 4);
        assert!(pending.is_settled());
        assert!(pending.image().is_some());
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_requests() {
        let client = Arc::new(MockAsyncHttpClient::new(Ok(png(4, Rgba([0, 0, 0, 255])))));
        let (fetcher, _store) = fetcher(Arc::clone(&client));
        fetcher.shutdown();

        let pending = fetcher.request(TileKey::new(TileCoord::new(0, 0, 0), 0), 4);
        assert!(pending.is_settled());
        assert!(pending.loaded().await.is_none());
        assert_eq!(client.call_count(), 0);
    }
}
