//! INI configuration file.
//!
//! ```ini
//! [tiles]
//! size = 256
//! url_template = https://tiles.example.com/{z}/{x}/{y}.png
//!
//! [lod]
//! level_of_detail = 0
//! max_oversample = 2
//!
//! [fetch]
//! timeout = 30
//!
//! [logging]
//! directory = ~/.cache/tilelod/logs
//! file = tilelod.log
//! ```
//!
//! Missing sections and keys keep their defaults.

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::lod::{
    ConfigError, LodConfig, DEFAULT_LEVEL_OF_DETAIL, DEFAULT_MAX_OVERSAMPLE, DEFAULT_TILE_SIZE,
};
use crate::logging::DEFAULT_LOG_FILE;
use crate::provider::DEFAULT_TIMEOUT_SECS;

/// Errors from loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Values parse but do not form a usable engine configuration
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ConfigError),

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

/// `[tiles]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilesSettings {
    pub size: u32,
    pub url_template: Option<String>,
}

/// `[lod]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LodSettings {
    pub level_of_detail: u8,
    pub max_oversample: u8,
}

/// `[fetch]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Request timeout in seconds.
    pub timeout: u64,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

/// Settings read from `config.ini`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub tiles: TilesSettings,
    pub lod: LodSettings,
    pub fetch: FetchSettings,
    pub logging: LoggingSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            tiles: TilesSettings {
                size: DEFAULT_TILE_SIZE,
                url_template: None,
            },
            lod: LodSettings {
                level_of_detail: DEFAULT_LEVEL_OF_DETAIL,
                max_oversample: DEFAULT_MAX_OVERSAMPLE,
            },
            fetch: FetchSettings {
                timeout: DEFAULT_TIMEOUT_SECS,
            },
            logging: LoggingSettings {
                directory: default_log_directory(),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}

impl ConfigFile {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        std::fs::write(path, self.to_ini_string())
            .map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Render the commented INI text written by [`save_to`](Self::save_to).
    pub fn to_ini_string(&self) -> String {
        to_config_string(self)
    }

    /// The engine settings this file describes.
    pub fn lod_config(&self) -> LodConfig {
        LodConfig::default()
            .with_tile_size(self.tiles.size)
            .with_level_of_detail(self.lod.level_of_detail)
            .with_max_oversample(self.lod.max_oversample)
    }
}

/// Get the path to the config directory.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tilelod")
}

/// Get the path to the config file.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

fn default_log_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tilelod")
        .join("logs")
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("tiles")) {
        if let Some(v) = section.get("size") {
            config.tiles.size = v.trim().parse().map_err(|_| {
                invalid("tiles", "size", v, "must be a positive integer (pixels)")
            })?;
        }
        if let Some(v) = section.get("url_template") {
            let v = v.trim();
            if !v.is_empty() {
                config.tiles.url_template = Some(v.to_string());
            }
        }
    }

    if let Some(section) = ini.section(Some("lod")) {
        if let Some(v) = section.get("level_of_detail") {
            config.lod.level_of_detail = v.trim().parse().map_err(|_| {
                invalid("lod", "level_of_detail", v, "must be a zoom level (0-255)")
            })?;
        }
        if let Some(v) = section.get("max_oversample") {
            config.lod.max_oversample = v.trim().parse().map_err(|_| {
                invalid("lod", "max_oversample", v, "must be a small non-negative integer")
            })?;
        }
    }

    if let Some(section) = ini.section(Some("fetch")) {
        if let Some(v) = section.get("timeout") {
            config.fetch.timeout = match v.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(invalid(
                        "fetch",
                        "timeout",
                        v,
                        "must be a positive integer (seconds)",
                    ))
                }
            };
        }
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    config.lod_config().validate()?;
    Ok(config)
}

fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[tiles]
; Tile edge length in pixels at LOD 0
size = {}
; Request URL. Placeholders: {{z}} {{x}} {{y}} {{lod}} {{scale}} {{size}}
url_template = {}

[lod]
; Zoom level below which tiles are fetched oversampled
level_of_detail = {}
; Largest LOD boost (a tile at LOD n is size << n pixels wide)
max_oversample = {}

[fetch]
; Request timeout in seconds
timeout = {}

[logging]
directory = {}
file = {}
"#,
        config.tiles.size,
        config.tiles.url_template.as_deref().unwrap_or(""),
        config.lod.level_of_detail,
        config.lod.max_oversample,
        config.fetch.timeout,
        config.logging.directory.display(),
        config.logging.file,
    )
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
