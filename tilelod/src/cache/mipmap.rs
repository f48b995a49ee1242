//! Per-cell collection of cached images indexed by level of detail.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use image::RgbaImage;

/// A decoded tile image shared between the store and the layers handed out.
pub type TileImage = Arc<RgbaImage>;

/// Cached images for one `(zoom, row, col)` cell, keyed by LOD.
///
/// Holds at most one image per LOD. Entries are never overwritten once set:
/// the first successful insert wins.
#[derive(Clone, Default)]
pub struct Mipmap {
    levels: BTreeMap<u8, TileImage>,
}

impl Mipmap {
    /// Create an empty mipmap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Image stored at exactly `lod`.
    #[inline]
    pub fn get(&self, lod: u8) -> Option<&TileImage> {
        self.levels.get(&lod)
    }

    /// Image stored at exactly `lod`, where `lod` may be out of the storable range.
    ///
    /// Negative LODs appear while the compositor descends below LOD 0 and
    /// never match an entry.
    #[inline]
    pub fn exact(&self, lod: i32) -> Option<&TileImage> {
        u8::try_from(lod).ok().and_then(|lod| self.get(lod))
    }

    /// Store `image` at `lod` unless an entry already exists.
    ///
    /// Returns the image that ends up stored, which is the existing one if
    /// the slot was taken.
    pub fn insert(&mut self, lod: u8, image: TileImage) -> TileImage {
        self.levels.entry(lod).or_insert(image).clone()
    }

    /// Number of populated LODs.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// True if no LOD is populated.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Populated LODs in ascending order.
    pub fn lods(&self) -> impl Iterator<Item = u8> + '_ {
        self.levels.keys().copied()
    }

    /// Approximate pixel memory held by this cell.
    pub fn size_bytes(&self) -> u64 {
        self.levels
            .values()
            .map(|image| image.as_raw().len() as u64)
            .sum()
    }

    /// Find the image whose LOD is nearest `target`.
    ///
    /// With `better_than` set, only entries whose difference is strictly
    /// below it qualify. Ties go to the lowest LOD.
    ///
    /// Returns the chosen image and its difference. When nothing qualifies
    /// the image is `None` and the bound is handed back unchanged, so callers
    /// can keep using it.
    pub fn find_nearest(
        &self,
        target: i32,
        better_than: Option<u32>,
    ) -> (Option<TileImage>, Option<u32>) {
        let mut best: Option<(&TileImage, u32)> = None;

        for (&lod, image) in &self.levels {
            let difference = (i32::from(lod) - target).unsigned_abs();
            if better_than.is_some_and(|bound| difference >= bound) {
                continue;
            }
            if best.map_or(true, |(_, d)| difference < d) {
                best = Some((image, difference));
            }
        }

        match best {
            Some((image, difference)) => (Some(Arc::clone(image)), Some(difference)),
            None => (None, better_than),
        }
    }
}

impl fmt::Debug for Mipmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mipmap")
            .field("lods", &self.levels.keys().collect::<Vec<_>>())
            .finish()
    }
}
