//! Shared test utilities for the pixelpipe test suite.
//!
//! Provides synthetic image fixtures and byte streams with controlled chunking
//! or failures, so tests can exercise acquisition and processing without
//! shipping binary fixtures.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let png = create_test_png(32, 16);
//! let stream = chunked_stream(&png, 7);
//! let bytes = drain(stream).await.unwrap();
//! assert_eq!(bytes.as_ref(), png.as_slice());
//! ```

use bytes::Bytes;
use futures_util::stream;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::{self, Cursor};

use crate::source::ByteStream;

// =========================================================================
// Synthetic images
// =========================================================================

fn gradient(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    DynamicImage::ImageRgb8(img)
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}

/// RGB gradient PNG of the given size.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Png)
}

/// RGB gradient JPEG of the given size.
pub fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Jpeg)
}

// =========================================================================
// Byte streams
// =========================================================================

/// Stream `data` in chunks of at most `chunk_size` bytes.
pub fn chunked_stream(data: &[u8], chunk_size: usize) -> ByteStream {
    let chunks: Vec<io::Result<Bytes>> = data
        .chunks(chunk_size.max(1))
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    Box::pin(stream::iter(chunks))
}

/// Stream `prefix` as one chunk, then fail with `kind`.
pub fn failing_stream(prefix: &[u8], kind: io::ErrorKind, message: &str) -> ByteStream {
    let items = vec![
        Ok(Bytes::copy_from_slice(prefix)),
        Err(io::Error::new(kind, message.to_string())),
    ];
    Box::pin(stream::iter(items))
}
