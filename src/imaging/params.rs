//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how* to do it. The
//! [`operations`](super::operations) registry builds them from step names and
//! JSON arguments; an [`ImageEngine`](super::ImageEngine) executes them. The
//! split lets tests swap in a mock engine and assert on the exact operation
//! list a step sequence produced.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 80). Clamped on construction.
//! - [`OutputFormat`]: Encodable output formats and their names/MIME types.
//! - [`ResizeParams`]: Target box, fit mode, resampling kernel, letterbox background.
//! - [`Region`]: Rectangle for `extract`.
//! - [`Operation`]: One typed pipeline operation.

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Output formats the engine can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
    Tiff,
    Avif,
}

impl OutputFormat {
    /// Parse a format name as accepted by `toFormat` (`"jpg"` is an alias of `"jpeg"`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "tiff" | "tif" => Some(Self::Tiff),
            "avif" => Some(Self::Avif),
            _ => None,
        }
    }

    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_name)
    }

    /// Map a decoded input format onto an encodable output format.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::WebP => Some(Self::Webp),
            ImageFormat::Tiff => Some(Self::Tiff),
            ImageFormat::Avif => Some(Self::Avif),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Tiff => "tiff",
            Self::Avif => "avif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Tiff => "image/tiff",
            Self::Avif => "image/avif",
        }
    }
}

/// Encoder choice plus its options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatParams {
    pub format: OutputFormat,
    pub quality: Quality,
    /// PNG zlib level, 0 (fastest) to 9 (smallest).
    pub compression_level: u8,
}

impl FormatParams {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            quality: Quality::default(),
            compression_level: 6,
        }
    }
}

/// How the image should fit the requested box when both edges are given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fit {
    /// Fill the box, cropping the overflow from the centre.
    #[default]
    Cover,
    /// Fit inside the box and letterbox with the background colour.
    Contain,
    /// Stretch to the exact box, ignoring aspect ratio.
    Fill,
    /// Fit inside the box, preserving aspect ratio.
    Inside,
    /// Cover the box, preserving aspect ratio, without cropping.
    Outside,
}

impl Fit {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cover" => Some(Self::Cover),
            "contain" => Some(Self::Contain),
            "fill" => Some(Self::Fill),
            "inside" => Some(Self::Inside),
            "outside" => Some(Self::Outside),
            _ => None,
        }
    }
}

/// Resampling kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Kernel {
    Nearest,
    Linear,
    Cubic,
    Gaussian,
    #[default]
    Lanczos3,
}

impl Kernel {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "nearest" => Some(Self::Nearest),
            "linear" => Some(Self::Linear),
            "cubic" | "mitchell" => Some(Self::Cubic),
            "gaussian" => Some(Self::Gaussian),
            "lanczos2" | "lanczos3" => Some(Self::Lanczos3),
            _ => None,
        }
    }
}

/// RGBA colour with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Background(pub [u8; 4]);

impl Default for Background {
    fn default() -> Self {
        Self([0, 0, 0, 255])
    }
}

/// Parameters for a resize operation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResizeParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Fit,
    pub kernel: Kernel,
    pub background: Background,
    pub without_enlargement: bool,
}

/// Rectangle in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// One typed pipeline operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Resize(ResizeParams),
    /// Clockwise rotation in degrees; `None` auto-orients using the EXIF
    /// orientation tag. Oblique angles expand the canvas and fill the
    /// uncovered corners with `background`.
    Rotate {
        angle: Option<i64>,
        background: Background,
    },
    /// Mirror vertically (about the x axis).
    Flip,
    /// Mirror horizontally (about the y axis).
    Flop,
    Greyscale,
    Negate,
    /// `None` is a fast 3x3 box blur.
    Blur(Option<f32>),
    Sharpen { sigma: f32 },
    Extract(Region),
    Format(FormatParams),
}

/// The format selected by the last format operation, if any.
pub fn requested_format(operations: &[Operation]) -> Option<FormatParams> {
    operations.iter().rev().find_map(|op| match op {
        Operation::Format(params) => Some(*params),
        _ => None,
    })
}
