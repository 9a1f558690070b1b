//! Pure Rust transformation engine on top of the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Metadata | `ImageReader::with_guessed_format` + `ImageDecoder` header accessors |
//! | Decode (JPEG, PNG, TIFF, WebP, GIF) | `image` crate decoders |
//! | Resize | `resize_exact` / `resize_to_fill`, kernel from the request (default `Lanczos3`) |
//! | Letterbox | `imageops::overlay` onto a background canvas |
//! | Rotate / flip / flop | `rotate90`/`rotate180`/`rotate270`, `flipv`, `fliph`, `apply_orientation` |
//! | Oblique rotate | `imageproc::geometric_transformations::rotate_about_center` on an expanded canvas |
//! | Blur / sharpen | `filter3x3` box kernel, `blur`, `unsharpen` |
//! | Encode | `JpegEncoder`, `PngEncoder`, `WebPEncoder` (lossless), `TiffEncoder`, `AvifEncoder` |

use super::backend::{EngineError, ImageEngine, ImageMetadata, ImageStats, OutputInfo};
use super::calculations::{
    ResizePlan, channel_stats, dominant_color, entropy, plan_resize, rotated_bounds,
};
use super::params::{
    Background, FormatParams, Kernel, Operation, OutputFormat, Region, ResizeParams,
    requested_format,
};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{ColorType, DynamicImage, ImageDecoder, ImageFormat, ImageReader, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use std::io::Cursor;
use std::path::Path;

/// AVIF encoder speed (1 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 6;

/// Transformation engine using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustEngine;

impl RustEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Short lowercase name of a decoded format.
fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::Avif => "avif".to_string(),
        other => format!("{other:?}").to_lowercase(),
    }
}

fn depth_name(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => "uchar",
        ColorType::Rgb32F | ColorType::Rgba32F => "float",
        _ => "ushort",
    }
}

fn space_name(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16 => "b-w",
        _ => "srgb",
    }
}

fn reader(input: &[u8]) -> Result<(ImageReader<Cursor<&[u8]>>, ImageFormat), EngineError> {
    let reader = ImageReader::new(Cursor::new(input)).with_guessed_format()?;
    let format = reader
        .format()
        .ok_or_else(|| EngineError::UnsupportedFormat("unrecognised input".to_string()))?;
    Ok((reader, format))
}

/// A decoded image plus the facts about its source needed later.
struct Decoded {
    image: DynamicImage,
    format: ImageFormat,
    orientation: Orientation,
}

fn decode(input: &[u8]) -> Result<Decoded, EngineError> {
    let (reader, format) = reader(input)?;
    let mut decoder = reader.into_decoder()?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let image = DynamicImage::from_decoder(decoder)?;
    Ok(Decoded {
        image,
        format,
        orientation,
    })
}

fn filter(kernel: Kernel) -> FilterType {
    match kernel {
        Kernel::Nearest => FilterType::Nearest,
        Kernel::Linear => FilterType::Triangle,
        Kernel::Cubic => FilterType::CatmullRom,
        Kernel::Gaussian => FilterType::Gaussian,
        Kernel::Lanczos3 => FilterType::Lanczos3,
    }
}

fn resize(image: DynamicImage, params: &ResizeParams) -> DynamicImage {
    let filter = filter(params.kernel);
    match plan_resize((image.width(), image.height()), params) {
        ResizePlan::Keep => image,
        ResizePlan::Exact { width, height } => image.resize_exact(width, height, filter),
        ResizePlan::CoverCrop { width, height } => image.resize_to_fill(width, height, filter),
        ResizePlan::Letterbox {
            width,
            height,
            inner,
        } => {
            let scaled = image.resize_exact(inner.0, inner.1, filter).to_rgba8();
            let mut canvas = RgbaImage::from_pixel(width, height, Rgba(params.background.0));
            let x = (width - inner.0) / 2;
            let y = (height - inner.1) / 2;
            image::imageops::overlay(&mut canvas, &scaled, x as i64, y as i64);
            DynamicImage::ImageRgba8(canvas)
        }
    }
}

fn rotate(
    mut image: DynamicImage,
    angle: Option<i64>,
    background: Background,
    orientation: Orientation,
) -> DynamicImage {
    let Some(angle) = angle else {
        image.apply_orientation(orientation);
        return image;
    };
    match angle.rem_euclid(360) {
        0 => image,
        90 => image.rotate90(),
        180 => image.rotate180(),
        270 => image.rotate270(),
        degrees => rotate_oblique(&image, degrees, background),
    }
}

/// Rotate onto a canvas large enough for the whole image, corners filled
/// with `background`.
fn rotate_oblique(image: &DynamicImage, degrees: i64, background: Background) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let (out_width, out_height) = rotated_bounds((width, height), degrees);
    // square work canvas so the source is never clipped before rotating
    let side = out_width.max(out_height).max(width).max(height);
    let fill = Rgba(background.0);
    let mut canvas = RgbaImage::from_pixel(side, side, fill);
    image::imageops::overlay(
        &mut canvas,
        &image.to_rgba8(),
        ((side - width) / 2) as i64,
        ((side - height) / 2) as i64,
    );
    let rotated = rotate_about_center(
        &canvas,
        (degrees as f32).to_radians(),
        Interpolation::Bilinear,
        fill,
    );
    let cropped = image::imageops::crop_imm(
        &rotated,
        (side - out_width) / 2,
        (side - out_height) / 2,
        out_width,
        out_height,
    )
    .to_image();
    DynamicImage::ImageRgba8(cropped)
}

fn extract(image: &DynamicImage, region: &Region) -> Result<DynamicImage, EngineError> {
    let fits = region.left.checked_add(region.width).is_some_and(|r| r <= image.width())
        && region.top.checked_add(region.height).is_some_and(|b| b <= image.height());
    if !fits {
        return Err(EngineError::InvalidArguments {
            operation: "extract".to_string(),
            reason: format!(
                "region {}x{}+{}+{} lies outside the {}x{} image",
                region.width,
                region.height,
                region.left,
                region.top,
                image.width(),
                image.height()
            ),
        });
    }
    Ok(image.crop_imm(region.left, region.top, region.width, region.height))
}

/// Apply every non-format operation in list order.
fn apply(decoded: Decoded, operations: &[Operation]) -> Result<Decoded, EngineError> {
    let Decoded {
        mut image,
        format,
        orientation,
    } = decoded;

    for operation in operations {
        image = match operation {
            Operation::Resize(params) => resize(image, params),
            Operation::Rotate { angle, background } => {
                rotate(image, *angle, *background, orientation)
            }
            Operation::Flip => image.flipv(),
            Operation::Flop => image.fliph(),
            Operation::Greyscale => image.grayscale(),
            Operation::Negate => {
                image.invert();
                image
            }
            Operation::Blur(None) => image.filter3x3(&[1.0 / 9.0; 9]),
            Operation::Blur(Some(sigma)) => image.blur(*sigma),
            Operation::Sharpen { sigma } => image.unsharpen(*sigma, 0),
            Operation::Extract(region) => extract(&image, region)?,
            Operation::Format(_) => image,
        };
    }

    Ok(Decoded {
        image,
        format,
        orientation,
    })
}

/// Convert to a colour type the target encoder accepts.
fn encodable(image: DynamicImage, format: OutputFormat) -> DynamicImage {
    let alpha = image.color().has_alpha();
    match format {
        OutputFormat::Jpeg => match image {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image,
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        },
        OutputFormat::Webp | OutputFormat::Avif => match image {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image,
            other if alpha => DynamicImage::ImageRgba8(other.to_rgba8()),
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        },
        OutputFormat::Png | OutputFormat::Tiff => match image {
            DynamicImage::ImageRgb32F(_) => DynamicImage::ImageRgb16(image.to_rgb16()),
            DynamicImage::ImageRgba32F(_) => DynamicImage::ImageRgba16(image.to_rgba16()),
            other => other,
        },
    }
}

fn encode_image(image: &DynamicImage, params: &FormatParams) -> Result<Vec<u8>, EngineError> {
    let mut buffer = Cursor::new(Vec::new());
    match params.format {
        OutputFormat::Jpeg => {
            image.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, params.quality.value()))?
        }
        OutputFormat::Png => {
            let compression = match params.compression_level {
                0..=3 => CompressionType::Fast,
                4..=6 => CompressionType::Default,
                _ => CompressionType::Best,
            };
            image.write_with_encoder(PngEncoder::new_with_quality(
                &mut buffer,
                compression,
                PngFilter::Adaptive,
            ))?
        }
        OutputFormat::Webp => image.write_with_encoder(WebPEncoder::new_lossless(&mut buffer))?,
        OutputFormat::Tiff => image.write_with_encoder(TiffEncoder::new(&mut buffer))?,
        OutputFormat::Avif => image.write_with_encoder(AvifEncoder::new_with_speed_quality(
            &mut buffer,
            AVIF_SPEED,
            params.quality.value(),
        ))?,
    }
    Ok(buffer.into_inner())
}

fn input_format(format: ImageFormat) -> Result<OutputFormat, EngineError> {
    OutputFormat::from_image_format(format)
        .ok_or_else(|| EngineError::UnsupportedFormat(format!("cannot encode {}", format_name(format))))
}

/// Run the pipeline. `fallback` picks the format when no format operation was given.
fn transform(
    input: &[u8],
    operations: &[Operation],
    fallback: Option<OutputFormat>,
) -> Result<(DynamicImage, FormatParams, Vec<u8>), EngineError> {
    let decoded = apply(decode(input)?, operations)?;
    let params = match (requested_format(operations), fallback) {
        (Some(params), _) => params,
        (None, Some(format)) => FormatParams::new(format),
        (None, None) => FormatParams::new(input_format(decoded.format)?),
    };
    let image = encodable(decoded.image, params.format);
    let bytes = encode_image(&image, &params)?;
    Ok((image, params, bytes))
}

impl ImageEngine for RustEngine {
    fn metadata(&self, input: &[u8]) -> Result<ImageMetadata, EngineError> {
        let (reader, format) = reader(input)?;
        let mut decoder = reader.into_decoder()?;
        let (width, height) = decoder.dimensions();
        let color = decoder.color_type();
        let orientation = decoder
            .orientation()
            .ok()
            .filter(|o| *o != Orientation::NoTransforms)
            .map(Orientation::to_exif);
        let has_profile = decoder.icc_profile().ok().flatten().is_some();

        Ok(ImageMetadata {
            format: format_name(format),
            width,
            height,
            space: space_name(color).to_string(),
            channels: color.channel_count(),
            depth: depth_name(color).to_string(),
            has_alpha: color.has_alpha(),
            orientation,
            has_profile,
            size: input.len() as u64,
        })
    }

    fn stats(&self, input: &[u8]) -> Result<ImageStats, EngineError> {
        let image = decode(input)?.image;
        let width = image.width();
        let (channels, samples) = match image.color().channel_count() {
            1 => (1, image.to_luma8().into_raw()),
            2 => (2, image.to_luma_alpha8().into_raw()),
            3 => (3, image.to_rgb8().into_raw()),
            _ => (4, image.to_rgba8().into_raw()),
        };
        let channel_stats = channel_stats(&samples, width, channels);
        let is_opaque = match channels {
            2 | 4 => samples.chunks_exact(channels).all(|p| p[channels - 1] == u8::MAX),
            _ => true,
        };

        Ok(ImageStats {
            channels: channel_stats,
            is_opaque,
            entropy: entropy(image.to_luma8().as_raw()),
            dominant: dominant_color(image.to_rgb8().as_raw()),
        })
    }

    fn encode(&self, input: &[u8], operations: &[Operation]) -> Result<Vec<u8>, EngineError> {
        transform(input, operations, None).map(|(_, _, bytes)| bytes)
    }

    fn write_file(
        &self,
        input: &[u8],
        operations: &[Operation],
        path: &Path,
    ) -> Result<OutputInfo, EngineError> {
        // an explicit format operation beats the extension
        let extension = path.extension().and_then(|e| e.to_str());
        let fallback = match extension {
            Some(ext) if requested_format(operations).is_none() => Some(
                OutputFormat::from_name(ext)
                    .ok_or_else(|| EngineError::UnsupportedFormat(ext.to_string()))?,
            ),
            _ => None,
        };

        let (image, params, bytes) = transform(input, operations, fallback)?;
        std::fs::write(path, &bytes)?;

        Ok(OutputInfo {
            format: params.format.name().to_string(),
            size: bytes.len() as u64,
            width: image.width(),
            height: image.height(),
            channels: image.color().channel_count(),
        })
    }
}
