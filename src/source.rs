//! Source descriptors and their resolution into byte streams.
//!
//! A descriptor is classified once, when it crosses from JSON into the
//! service ([`SourceDescriptor::try_from`]). Anything that cannot describe a
//! path, a live stream or a remote resource is rejected there with an
//! [`AcquisitionError`]; [`resolve`] then always yields exactly one stream or
//! one error.

use bytes::Bytes;
use futures_util::Stream;
use serde_json::{Map, Value};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{AcquisitionError, ServiceError};
use crate::fetch::Fetch;

/// Readable byte stream. Dropping it releases the underlying file or connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// A remote resource plus the fetch options to request it with.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSource {
    pub url: String,
    /// Every key of the descriptor object except `url`.
    pub options: Map<String, Value>,
}

/// Where the input bytes come from.
pub enum SourceDescriptor {
    Path(PathBuf),
    Stream(ByteStream),
    Remote(RemoteSource),
}

impl fmt::Debug for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescriptor::Path(path) => f.debug_tuple("Path").field(path).finish(),
            SourceDescriptor::Stream(_) => f.write_str("Stream(..)"),
            SourceDescriptor::Remote(remote) => f.debug_tuple("Remote").field(remote).finish(),
        }
    }
}

impl From<PathBuf> for SourceDescriptor {
    fn from(path: PathBuf) -> Self {
        SourceDescriptor::Path(path)
    }
}

impl From<ByteStream> for SourceDescriptor {
    fn from(stream: ByteStream) -> Self {
        SourceDescriptor::Stream(stream)
    }
}

impl TryFrom<Value> for SourceDescriptor {
    type Error = AcquisitionError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(path) => Ok(SourceDescriptor::Path(PathBuf::from(path))),
            Value::Object(mut options) => match options.remove("url") {
                Some(Value::String(url)) => Ok(SourceDescriptor::Remote(RemoteSource { url, options })),
                _ => Err(AcquisitionError::default()),
            },
            _ => Err(AcquisitionError::default()),
        }
    }
}

/// Turn a descriptor into a readable stream.
///
/// Remote sources cost exactly one fetch. Path open failures surface as
/// [`ServiceError::Io`] unchanged; an existing stream is handed back as is.
pub async fn resolve<F: Fetch>(
    source: SourceDescriptor,
    fetcher: &F,
) -> Result<ByteStream, ServiceError> {
    match source {
        SourceDescriptor::Remote(RemoteSource { url, options }) => {
            debug!(url = %url, "resolving remote source");
            Ok(fetcher.fetch(&url, &options).await?)
        }
        SourceDescriptor::Path(path) => {
            debug!(path = %path.display(), "resolving path source");
            let file = tokio::fs::File::open(&path).await?;
            Ok(Box::pin(ReaderStream::new(file)))
        }
        SourceDescriptor::Stream(stream) => Ok(stream),
    }
}
