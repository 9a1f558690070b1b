//! Error types shared by the resolver, the pipeline and the action layer.
//!
//! Errors from the stream, fetch and engine subsystems are carried verbatim;
//! [`ServiceError`] only tags which stage produced them. The one error this
//! crate originates itself is [`AcquisitionError`], raised when a source
//! descriptor cannot yield a readable stream.

use crate::fetch::FetchError;
use crate::imaging::EngineError;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Default message of an [`AcquisitionError`].
pub const ACQUISITION_MESSAGE: &str = "Stream could not be acquired";

/// Default kind tag of an [`AcquisitionError`].
pub const ACQUISITION_KIND: &str = "STREAM_ACQUISITION_ERROR";

/// A source descriptor never satisfied the readable-stream contract.
///
/// Non-retryable: the same descriptor will fail the same way.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{message}")]
pub struct AcquisitionError {
    pub message: String,
    pub code: u16,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Map<String, Value>,
}

impl AcquisitionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }
}

impl Default for AcquisitionError {
    fn default() -> Self {
        Self {
            message: ACQUISITION_MESSAGE.to_string(),
            code: 500,
            kind: ACQUISITION_KIND.to_string(),
            data: Map::new(),
        }
    }
}

/// Failure of a single action invocation.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("Image engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Invalid parameters: {0}")]
    Validation(String),
}

impl ServiceError {
    /// Numeric severity code, HTTP-flavoured.
    pub fn code(&self) -> u16 {
        match self {
            ServiceError::Acquisition(e) => e.code,
            ServiceError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => 404,
            ServiceError::Io(_) => 500,
            ServiceError::Fetch(_) => 502,
            ServiceError::Engine(_) => 422,
            ServiceError::Validation(_) => 422,
        }
    }

    /// Machine-readable kind tag.
    pub fn kind(&self) -> &str {
        match self {
            ServiceError::Acquisition(e) => &e.kind,
            ServiceError::Io(_) => "IO_ERROR",
            ServiceError::Fetch(_) => "FETCH_ERROR",
            ServiceError::Engine(_) => "ENGINE_ERROR",
            ServiceError::Validation(_) => "VALIDATION_ERROR",
        }
    }

    /// Class-style name of the error, as reported to gateway clients.
    pub fn name(&self) -> &'static str {
        match self {
            ServiceError::Acquisition(_) => "AcquisitionError",
            ServiceError::Io(_) => "IOError",
            ServiceError::Fetch(_) => "FetchError",
            ServiceError::Engine(_) => "EngineError",
            ServiceError::Validation(_) => "ValidationError",
        }
    }

    /// Classify an error read off a processed output stream.
    ///
    /// Engine failures travel inside `io::Error` on the stream; they come back
    /// out as [`ServiceError::Engine`]. Everything else stays an IO error.
    pub fn from_stream_error(error: std::io::Error) -> Self {
        let kind = error.kind();
        match error.into_inner() {
            None => ServiceError::Io(kind.into()),
            Some(inner) => match inner.downcast::<EngineError>() {
                Ok(engine) => ServiceError::Engine(*engine),
                Err(inner) => ServiceError::Io(std::io::Error::new(kind, inner)),
            },
        }
    }

    /// Auxiliary data attached to the error (empty for pass-through errors).
    pub fn data(&self) -> Map<String, Value> {
        match self {
            ServiceError::Acquisition(e) => e.data.clone(),
            _ => Map::new(),
        }
    }
}
