//! Tile imagery collaborators.
//!
//! The engine consumes two things from the outside world: a URL for each
//! `(coord, lod)` and a way to download bytes from it.
//!
//! ```ignore
//! use tilelod::provider::{ReqwestClient, TemplateUrlBuilder};
//!
//! let urls = TemplateUrlBuilder::new("https://tiles.example.com/{z}/{x}/{y}.png", 256);
//! let client = ReqwestClient::new()?;
//! ```

mod http;
mod types;
mod url;

pub use http::{AsyncHttpClient, ReqwestClient, DEFAULT_TIMEOUT_SECS};
pub use types::ProviderError;
pub use url::{TemplateUrlBuilder, TileUrlBuilder};

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;
