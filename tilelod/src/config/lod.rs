//! Level-of-detail settings for an engine instance.

use thiserror::Error;

/// Default tile edge length in pixels at LOD 0.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default zoom level at which tiles are requested at LOD 0.
pub const DEFAULT_LEVEL_OF_DETAIL: u8 = 0;

/// Default cap on the LOD boost.
pub const DEFAULT_MAX_OVERSAMPLE: u8 = 2;

/// Largest accepted tile size.
pub const MAX_TILE_SIZE: u32 = 4096;

/// Largest surface edge the engine will allocate, in pixels.
pub const MAX_SURFACE_SIZE: u64 = 8192;

/// Invalid level-of-detail settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("tile size {0} must be between 1 and {MAX_TILE_SIZE} pixels")]
    InvalidTileSize(u32),

    #[error(
        "max oversample {max_oversample} with tile size {tile_size} exceeds \
         the {MAX_SURFACE_SIZE}px surface limit"
    )]
    OversampleTooLarge { tile_size: u32, max_oversample: u8 },
}

/// Resolution settings shared by every request an engine serves.
///
/// A tile at `zoom` is wanted at LOD `level_of_detail - zoom`, clamped to
/// `[0, max_oversample]`. Zoom levels below the target get rendered at a
/// higher pixel density so coarse tiles stay sharp when stretched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LodConfig {
    /// Edge length of a tile at LOD 0, in pixels.
    pub tile_size: u32,
    /// Target minimum zoom for full-resolution data.
    pub level_of_detail: u8,
    /// Upper bound on the LOD boost.
    pub max_oversample: u8,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            level_of_detail: DEFAULT_LEVEL_OF_DETAIL,
            max_oversample: DEFAULT_MAX_OVERSAMPLE,
        }
    }
}

impl LodConfig {
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_level_of_detail(mut self, level_of_detail: u8) -> Self {
        self.level_of_detail = level_of_detail;
        self
    }

    pub fn with_max_oversample(mut self, max_oversample: u8) -> Self {
        self.max_oversample = max_oversample;
        self
    }

    /// LOD wanted for a tile at `zoom`.
    pub fn target_lod(&self, zoom: u8) -> u8 {
        let wanted = i32::from(self.level_of_detail) - i32::from(zoom);
        wanted.clamp(0, i32::from(self.max_oversample)) as u8
    }

    /// Pixel edge length of a tile rendered at `lod`.
    pub fn surface_size(&self, lod: u8) -> u32 {
        self.tile_size << lod
    }

    /// A proxy bound no mipmap difference can reach.
    pub fn unreachable_bound(&self) -> u32 {
        u32::from(self.max_oversample) + 1
    }

    /// Check that every surface this configuration can ask for is allocatable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size == 0 || self.tile_size > MAX_TILE_SIZE {
            return Err(ConfigError::InvalidTileSize(self.tile_size));
        }
        let fits = self.max_oversample < 32
            && u64::from(self.tile_size) << self.max_oversample <= MAX_SURFACE_SIZE;
        if !fits {
            return Err(ConfigError::OversampleTooLarge {
                tile_size: self.tile_size,
                max_oversample: self.max_oversample,
            });
        }
        Ok(())
    }
}
