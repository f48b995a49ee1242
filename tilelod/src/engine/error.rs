//! Engine construction errors.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while building or reconfiguring a [`LodEngine`](super::LodEngine).
///
/// Tile requests themselves never fail; see
/// [`LodEngine::get_tile_content`](super::LodEngine::get_tile_content).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine spawns fetch tasks and needs a Tokio runtime to do so.
    #[error("no Tokio runtime is running; create the engine inside a runtime or pass a handle")]
    NoRuntime,

    /// The requested configuration would produce unusable surfaces.
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}
