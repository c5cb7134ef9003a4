use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use std::fmt;
use std::sync::Arc;

/// Byte layout of one pixel. Any layout works for change detection as long as
/// consecutive frames use the same one; only the colour channels are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
    /// Common camera/screen capture layout.
    Bgra8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
        }
    }

    /// Offsets of the red, green and blue samples within one pixel.
    fn rgb_offsets(self) -> (usize, usize, usize) {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => (0, 1, 2),
            PixelFormat::Bgra8 => (2, 1, 0),
        }
    }
}

/// An immutable decoded video frame.
///
/// The pixel buffer is shared behind an `Arc`, so cloning a frame is cheap and
/// a retained clone can never observe changes to the buffer the caller
/// captured into. Constructing from a borrowed slice copies it.
#[derive(Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Arc<[u8]>,
}

impl Frame {
    /// Take ownership of a tightly packed pixel buffer (no row padding).
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self, FrameError> {
        let expected = expected_len(width, height, format)?;
        if data.len() != expected {
            return Err(FrameError::LengthMismatch {
                width,
                height,
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data: data.into(),
        })
    }

    /// Copy a caller-owned buffer, e.g. one the capture pipeline reuses.
    pub fn from_slice(width: u32, height: u32, format: PixelFormat, data: &[u8]) -> Result<Self, FrameError> {
        Self::new(width, height, format, data.to_vec())
    }

    /// A frame filled with a single colour.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::from(RgbImage::from_pixel(width, height, Rgb(rgb)))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Red, green and blue samples of the pixel at `(x, y)`.
    ///
    /// Panics if the coordinate is outside the frame.
    #[inline]
    pub fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        let bpp = self.format.bytes_per_pixel();
        let base = (y as usize * self.width as usize + x as usize) * bpp;
        let (r, g, b) = self.format.rgb_offsets();
        [self.data[base + r], self.data[base + g], self.data[base + b]]
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| Rgb(self.rgb(x, y)))
    }
}

fn expected_len(width: u32, height: u32, format: PixelFormat) -> Result<usize, FrameError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(format.bytes_per_pixel()))
        .ok_or(FrameError::TooLarge { width, height })
}

impl From<RgbImage> for Frame {
    fn from(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            format: PixelFormat::Rgb8,
            data: img.into_raw().into(),
        }
    }
}

impl From<RgbaImage> for Frame {
    fn from(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            format: PixelFormat::Rgba8,
            data: img.into_raw().into(),
        }
    }
}

impl From<DynamicImage> for Frame {
    fn from(img: DynamicImage) -> Self {
        match img {
            DynamicImage::ImageRgb8(rgb) => rgb.into(),
            DynamicImage::ImageRgba8(rgba) => rgba.into(),
            other => other.to_rgb8().into(),
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("size", &self.data.len())
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("pixel buffer for {width}x{height} frame has {got} bytes, expected {expected}")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },
    #[error("frame dimensions {width}x{height} overflow the address space")]
    TooLarge { width: u32, height: u32 },
}
