//! Configuration.
//!
//! [`LodConfig`] is what an engine runs with; [`ConfigFile`] is the on-disk
//! INI form the CLI reads it from.

mod file;
mod lod;

pub use file::{
    config_directory, config_file_path, ConfigFile, ConfigFileError, FetchSettings, LodSettings,
    LoggingSettings, TilesSettings,
};
pub use lod::{
    ConfigError, LodConfig, DEFAULT_LEVEL_OF_DETAIL, DEFAULT_MAX_OVERSAMPLE, DEFAULT_TILE_SIZE,
    MAX_SURFACE_SIZE, MAX_TILE_SIZE,
};
