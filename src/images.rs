//! Image scaling geometry

/// Largest width a scaled image may take
pub const DEVICE_WIDTH_LIMIT: u32 = 2048;

/// Largest height a scaled image may take
pub const DEVICE_HEIGHT_LIMIT: u32 = 2048;

/// Pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Size {
    /// Create a size
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either side is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Target size for showing `bitmap` on `display`.
///
/// The width is `width_scale_factor` of the usable display width, the height follows
/// the bitmap's aspect ratio, and the result never exceeds the display or
/// [`DEVICE_WIDTH_LIMIT`] x [`DEVICE_HEIGHT_LIMIT`]. Sides are truncated to whole pixels.
pub fn scale_to_display(display: Size, bitmap: Size, width_scale_factor: f64) -> Size {
    if bitmap.is_empty() {
        return Size::default();
    }

    let max_width = u64::from(display.width.min(DEVICE_WIDTH_LIMIT));
    let max_height = u64::from(display.height.min(DEVICE_HEIGHT_LIMIT));
    let (bitmap_width, bitmap_height) = (u64::from(bitmap.width), u64::from(bitmap.height));

    // `as` saturates: negative or NaN factors give 0
    let mut width = ((width_scale_factor * max_width as f64).round() as u64).min(max_width);
    let mut height = width * bitmap_height / bitmap_width;

    if height > max_height {
        height = max_height;
        width = height * bitmap_width / bitmap_height;
    }

    // both sides are bounded by the 2048 limits here
    Size::new(width as u32, height as u32)
}
