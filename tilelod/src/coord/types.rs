//! Coordinate type definitions

use std::fmt;

use thiserror::Error;

/// Deepest zoom level the tile pyramid supports.
///
/// Child coordinates at `MAX_ZOOM + 1` would overflow `u32`.
pub const MAX_ZOOM: u8 = 30;

/// Tile coordinates in the standard tile pyramid.
///
/// Zoom level `z` has `2^z × 2^z` tiles; `row` grows southward and `col`
/// grows eastward, both starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Y coordinate (north-south), 0 at north
    pub row: u32,
    /// X coordinate (east-west), 0 at west
    pub col: u32,
    /// Zoom level (0-30)
    pub zoom: u8,
}

impl TileCoord {
    /// Create a tile coordinate without range validation.
    pub const fn new(row: u32, col: u32, zoom: u8) -> Self {
        Self { row, col, zoom }
    }

    /// Create a tile coordinate, rejecting zoom levels and indices outside the pyramid.
    pub fn try_new(row: u32, col: u32, zoom: u8) -> Result<Self, CoordError> {
        let coord = Self { row, col, zoom };
        if zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(zoom));
        }
        if !coord.is_valid() {
            return Err(CoordError::OutOfRange { row, col, zoom });
        }
        Ok(coord)
    }

    /// Number of tiles along one axis at this zoom level.
    #[inline]
    pub fn tiles_per_side(&self) -> u64 {
        1u64 << self.zoom.min(MAX_ZOOM)
    }

    /// True if row and column lie within `[0, 2^zoom)`.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.zoom <= MAX_ZOOM
            && (self.row as u64) < self.tiles_per_side()
            && (self.col as u64) < self.tiles_per_side()
    }

    /// The tile `levels_above` zoom levels coarser that contains this tile.
    ///
    /// Returns `None` if that would go above zoom 0.
    #[inline]
    pub fn ancestor(&self, levels_above: u8) -> Option<TileCoord> {
        if levels_above > self.zoom {
            return None;
        }
        let shift = u32::from(levels_above);
        Some(TileCoord {
            row: self.row.checked_shr(shift).unwrap_or(0),
            col: self.col.checked_shr(shift).unwrap_or(0),
            zoom: self.zoom - levels_above,
        })
    }

    /// The four tiles one zoom level finer that make up this tile.
    ///
    /// Children are ordered `(i, j) = (0,0), (1,0), (0,1), (1,1)` where the
    /// child is at column `2·col + i` and row `2·row + j`. Returns `None` at
    /// [`MAX_ZOOM`] and for tiles outside the pyramid.
    pub fn children(&self) -> Option<[(TileCoord, u8, u8); 4]> {
        if self.zoom >= MAX_ZOOM || !self.is_valid() {
            return None;
        }
        let zoom = self.zoom + 1;
        let child = |i: u8, j: u8| {
            (
                TileCoord {
                    row: self.row * 2 + j as u32,
                    col: self.col * 2 + i as u32,
                    zoom,
                },
                i,
                j,
            )
        };
        Some([child(0, 0), child(1, 0), child(0, 1), child(1, 1)])
    }

    /// True if `other` lies inside this tile's footprint (including itself).
    pub fn covers(&self, other: &TileCoord) -> bool {
        other.zoom >= self.zoom && other.ancestor(other.zoom - self.zoom) == Some(*self)
    }

    /// True if the two footprints intersect: one tile covers the other.
    #[inline]
    pub fn overlaps(&self, other: &TileCoord) -> bool {
        self.covers(other) || other.covers(self)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.col, self.row)
    }
}

/// Key of a single cached image: a tile cell plus its level of detail.
///
/// An image stored under `lod` has a natural size of `tile_size << lod`
/// pixels per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    /// The tile cell
    pub coord: TileCoord,
    /// Oversampling exponent
    pub lod: u8,
}

impl TileKey {
    /// Create a new tile key.
    pub const fn new(coord: TileCoord, lod: u8) -> Self {
        Self { coord, lod }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.coord, self.lod)
    }
}

/// Errors that can occur when constructing coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    /// Zoom level is outside valid range (0 to 30)
    #[error("Invalid zoom level: {0} (must be between 0 and {max})", max = MAX_ZOOM)]
    InvalidZoom(u8),

    /// Row or column falls outside the `2^zoom` grid
    #[error("Tile {col}/{row} is outside the grid at zoom {zoom}")]
    OutOfRange { row: u32, col: u32, zoom: u8 },
}
