//! Drawing surface for tile compositing.
//!
//! A [`Surface`] is an RGBA canvas that images are painted into with
//! scaling. Painting uses source-over blending, so opaque tiles replace what
//! is underneath and transparent regions let earlier layers show through.

use image::imageops::{self, FilterType};
use image::RgbaImage;

/// Filter used whenever an image is scaled into a destination rectangle.
const SCALE_FILTER: FilterType = FilterType::Triangle;

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Square rectangle anchored at the origin.
    pub const fn square(size: u32) -> Self {
        Self::new(0, 0, size, size)
    }

    /// True if the rectangle covers no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    #[inline]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// True if the two rectangles share at least one pixel.
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && u64::from(self.x) < u64::from(other.x) + u64::from(other.width)
            && u64::from(other.x) < u64::from(self.x) + u64::from(self.width)
            && u64::from(self.y) < u64::from(other.y) + u64::from(other.height)
            && u64::from(other.y) < u64::from(self.y) + u64::from(self.height)
    }

    /// One quarter of the rectangle.
    ///
    /// `i` selects the column (0 = left, 1 = right) and `j` the row
    /// (0 = top, 1 = bottom). The left/top half gets `floor(n / 2)` pixels and
    /// the right/bottom half takes the remainder, so the four quadrants tile
    /// the rectangle exactly for odd sizes too.
    pub fn quadrant(&self, i: u8, j: u8) -> Rect {
        let left = self.width / 2;
        let top = self.height / 2;

        let (x, width) = if i == 0 {
            (self.x, left)
        } else {
            (self.x + left, self.width - left)
        };
        let (y, height) = if j == 0 {
            (self.y, top)
        } else {
            (self.y + top, self.height - top)
        };

        Rect::new(x, y, width, height)
    }
}

/// RGBA canvas that records whether anything has been painted.
#[derive(Debug, Clone)]
pub struct Surface {
    pixels: RgbaImage,
    drawn: bool,
}

impl Surface {
    /// Create a transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
            drawn: false,
        }
    }

    /// Create a transparent square surface.
    pub fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    /// The full extent of the surface.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.pixels.width(), self.pixels.height())
    }

    /// True once any image has been painted.
    pub fn is_drawn(&self) -> bool {
        self.drawn
    }

    /// Borrow the pixels.
    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Consume the surface, returning its pixels.
    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    /// Paint the whole of `image` into `dest`, scaling to fit.
    pub fn draw(&mut self, image: &RgbaImage, dest: Rect) {
        if dest.is_empty() || image.width() == 0 || image.height() == 0 {
            return;
        }

        if image.dimensions() == (dest.width, dest.height) {
            imageops::overlay(&mut self.pixels, image, i64::from(dest.x), i64::from(dest.y));
        } else {
            let scaled = imageops::resize(image, dest.width, dest.height, SCALE_FILTER);
            imageops::overlay(&mut self.pixels, &scaled, i64::from(dest.x), i64::from(dest.y));
        }
        self.drawn = true;
    }

    /// Paint the `src` region of `image` into `dest`, scaling to fit.
    ///
    /// `src` is clamped to the image bounds.
    pub fn draw_region(&mut self, image: &RgbaImage, src: Rect, dest: Rect) {
        if src.is_empty() {
            return;
        }
        let region = imageops::crop_imm(image, src.x, src.y, src.width, src.height).to_image();
        self.draw(&region, dest);
    }
}
