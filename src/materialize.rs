//! Stream materialization: collect a byte stream into one contiguous buffer.

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use std::io;
use tracing::debug;

use crate::source::ByteStream;

/// Concatenate every chunk of `stream` in emission order.
///
/// The first error aborts the drain and is returned verbatim; any bytes
/// collected so far are dropped with the stream.
pub async fn drain(mut stream: ByteStream) -> io::Result<Bytes> {
    let mut buffer = BytesMut::new();
    let mut chunks = 0usize;
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
        chunks += 1;
    }
    debug!(chunks, bytes = buffer.len(), "stream drained");
    Ok(buffer.freeze())
}
