//! Image processing on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Metadata** | `ImageReader` header decode |
//! | **Stats** | full decode + histogram math |
//! | **Transform** | `imageops` resize, rotate, flip, blur, sharpen, crop |
//! | **Encode** | JPEG, PNG, WebP, TIFF, AVIF encoders |
//!
//! The module is split into:
//! - **Parameters**: Data structures describing image operations
//! - **Operations**: Name → constructor registry turning steps into [`Operation`]s
//! - **Calculations**: Pure functions for resize geometry and statistics (unit testable)
//! - **Backend**: [`ImageEngine`] trait + [`RustEngine`]

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{
    ChannelStats, Dominant, EngineError, ImageEngine, ImageMetadata, ImageStats, OutputInfo,
};
pub use operations::{OperationRegistry, TO_FILE};
pub use params::{
    Background, Fit, FormatParams, Kernel, Operation, OutputFormat, Quality, Region, ResizeParams,
    requested_format,
};
pub use rust_backend::RustEngine;
