//! Transformation engine trait and shared result types.
//!
//! The [`ImageEngine`] trait defines the four capabilities the service
//! consumes: metadata, stats, encode-to-buffer, and write-to-file. Engines are
//! synchronous: the service runs them on tokio's blocking pool so no engine
//! call stalls the async scheduler.
//!
//! The production implementation is
//! [`RustEngine`](super::rust_backend::RustEngine), built on the `image` crate.

use super::params::Operation;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
    #[error("Invalid arguments for {operation}: {reason}")]
    InvalidArguments { operation: String, reason: String },
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Header-level facts about an image, read without decoding pixel data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub format: String,
    pub width: u32,
    pub height: u32,
    /// Colour space interpretation: `"srgb"` or `"b-w"`.
    pub space: String,
    pub channels: u8,
    /// Pixel depth: `"uchar"`, `"ushort"` or `"float"`.
    pub depth: String,
    pub has_alpha: bool,
    /// EXIF orientation tag (1–8), when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<u8>,
    pub has_profile: bool,
    /// Input size in bytes.
    pub size: u64,
}

/// Statistics of one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub min: u8,
    pub max: u8,
    pub sum: f64,
    pub squares_sum: f64,
    pub mean: f64,
    pub stdev: f64,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

/// Dominant colour, from a 4096-bin RGB histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dominant {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Pixel statistics of a decoded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStats {
    pub channels: Vec<ChannelStats>,
    pub is_opaque: bool,
    /// Shannon entropy of the greyscale histogram, in bits.
    pub entropy: f64,
    pub dominant: Dominant,
}

/// Result of writing a processed image to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputInfo {
    pub format: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

/// Trait for transformation engines.
///
/// Operation lists are applied strictly in order. Output format is the last
/// [`Operation::Format`] in the list; `encode` falls back to the input format
/// and `write_file` to the path extension, then the input format.
pub trait ImageEngine: Send + Sync + 'static {
    /// Inspect the image header.
    fn metadata(&self, input: &[u8]) -> Result<ImageMetadata, EngineError>;

    /// Decode and compute per-channel statistics.
    fn stats(&self, input: &[u8]) -> Result<ImageStats, EngineError>;

    /// Apply `operations` and return the encoded output bytes.
    fn encode(&self, input: &[u8], operations: &[Operation]) -> Result<Vec<u8>, EngineError>;

    /// Apply `operations` and write the encoded output to `path`.
    fn write_file(
        &self,
        input: &[u8],
        operations: &[Operation],
        path: &Path,
    ) -> Result<OutputInfo, EngineError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Mock engine that records calls without touching pixels or disk.
    #[derive(Default)]
    pub struct MockEngine {
        pub metadata_result: Mutex<Option<ImageMetadata>>,
        pub stats_result: Mutex<Option<ImageStats>>,
        pub encoded: Mutex<Vec<u8>>,
        pub file_info: Mutex<Option<OutputInfo>>,
        pub calls: Mutex<Vec<RecordedCall>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedCall {
        Metadata(Vec<u8>),
        Stats(Vec<u8>),
        Encode {
            input: Vec<u8>,
            operations: Vec<Operation>,
        },
        WriteFile {
            input: Vec<u8>,
            operations: Vec<Operation>,
            path: PathBuf,
        },
    }

    impl MockEngine {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_metadata(metadata: ImageMetadata) -> Self {
            let engine = Self::new();
            *engine.metadata_result.lock().unwrap() = Some(metadata);
            engine
        }

        pub fn with_stats(stats: ImageStats) -> Self {
            let engine = Self::new();
            *engine.stats_result.lock().unwrap() = Some(stats);
            engine
        }

        pub fn with_encoded(bytes: &[u8]) -> Self {
            let engine = Self::new();
            *engine.encoded.lock().unwrap() = bytes.to_vec();
            engine
        }

        pub fn with_file_info(info: OutputInfo) -> Self {
            let engine = Self::new();
            *engine.file_info.lock().unwrap() = Some(info);
            engine
        }

        pub fn get_calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ImageEngine for MockEngine {
        fn metadata(&self, input: &[u8]) -> Result<ImageMetadata, EngineError> {
            self.calls
                .lock()
                .unwrap()
                .push(RecordedCall::Metadata(input.to_vec()));
            self.metadata_result
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| EngineError::ProcessingFailed("No mock metadata".to_string()))
        }

        fn stats(&self, input: &[u8]) -> Result<ImageStats, EngineError> {
            self.calls
                .lock()
                .unwrap()
                .push(RecordedCall::Stats(input.to_vec()));
            self.stats_result
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| EngineError::ProcessingFailed("No mock stats".to_string()))
        }

        fn encode(&self, input: &[u8], operations: &[Operation]) -> Result<Vec<u8>, EngineError> {
            self.calls.lock().unwrap().push(RecordedCall::Encode {
                input: input.to_vec(),
                operations: operations.to_vec(),
            });
            Ok(self.encoded.lock().unwrap().clone())
        }

        fn write_file(
            &self,
            input: &[u8],
            operations: &[Operation],
            path: &Path,
        ) -> Result<OutputInfo, EngineError> {
            self.calls.lock().unwrap().push(RecordedCall::WriteFile {
                input: input.to_vec(),
                operations: operations.to_vec(),
                path: path.to_path_buf(),
            });
            self.file_info
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| EngineError::ProcessingFailed("No mock file info".to_string()))
        }
    }

    pub fn sample_metadata() -> ImageMetadata {
        ImageMetadata {
            format: "png".to_string(),
            width: 640,
            height: 480,
            space: "srgb".to_string(),
            channels: 3,
            depth: "uchar".to_string(),
            has_alpha: false,
            orientation: None,
            has_profile: false,
            size: 1234,
        }
    }

    #[test]
    fn mock_records_metadata_input() {
        let engine = MockEngine::with_metadata(sample_metadata());
        let meta = engine.metadata(b"abc").unwrap();
        assert_eq!(meta.width, 640);
        assert_eq!(engine.get_calls(), vec![RecordedCall::Metadata(b"abc".to_vec())]);
    }

    #[test]
    fn mock_without_metadata_errors() {
        let engine = MockEngine::new();
        assert!(matches!(
            engine.metadata(b""),
            Err(EngineError::ProcessingFailed(_))
        ));
    }

    #[test]
    fn mock_records_write_file() {
        let info = OutputInfo {
            format: "png".into(),
            size: 10,
            width: 1,
            height: 1,
            channels: 4,
        };
        let engine = MockEngine::with_file_info(info.clone());
        let result = engine
            .write_file(b"xyz", &[Operation::Flip], Path::new("/some/where"))
            .unwrap();
        assert_eq!(result, info);
        assert!(matches!(
            &engine.get_calls()[0],
            RecordedCall::WriteFile { path, operations, .. }
                if path == Path::new("/some/where") && operations == &[Operation::Flip]
        ));
    }

    #[test]
    fn metadata_serializes_camel_case() {
        let json = serde_json::to_value(sample_metadata()).unwrap();
        assert_eq!(json["hasAlpha"], false);
        assert_eq!(json["hasProfile"], false);
        assert!(json.get("orientation").is_none());
    }
}
