//! The transfer API for the [`dmrpp`](https://docs.rs/dmrpp/latest/dmrpp/index.html) crate.
//!
//! Chunked array variables are stored as independently addressable byte ranges inside (possibly remote) objects.
//! This crate provides the pieces needed to read one such byte range:
//! - [`ChunkSource`]: the object a chunk lives in (an `http`, `https` or `file` URL, or a filesystem path),
//! - [`ByteRange`](byte_range::ByteRange): the location of a chunk within its source,
//! - [`TransportTraits`] and [`TransferHandleTraits`]: a transport creates reusable transfer handles that issue range requests,
//! - [`HandlePool`]: a bounded pool of transfer handles with scoped acquisition ([`PooledHandle`]),
//! - [`fetch_range`]: a single byte range read into a caller supplied buffer with an exact byte count check.
//!
//! This crate includes an in-memory transport ([`transport::MemoryTransport`]) and a transport adapter recording performance metrics ([`transport_adapter::performance_metrics`]).
//! See `dmrpp_filesystem` and `dmrpp_http` for local file and HTTP transports.
//!
//! ## Licence
//! `dmrpp_storage` is licensed under either of
//! - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//! - the MIT license <http://opensource.org/licenses/MIT>, at your option.
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod byte_range;
mod chunk_source;
mod handle_pool;
mod range_fetcher;
mod transfer;
pub mod transport;
pub mod transport_adapter;

use std::sync::Arc;

use thiserror::Error;

use byte_range::InvalidByteRangeError;

pub use chunk_source::{ChunkSource, InvalidChunkSourceError};
pub use handle_pool::{HandlePool, PooledHandle};
pub use range_fetcher::fetch_range;
pub use transfer::{RangeBody, TransferHandle, TransferHandleTraits, Transport, TransportTraits};

/// The type for bytes held by in-memory transports.
///
/// An alias for [`bytes::Bytes`].
pub type Bytes = bytes::Bytes;

/// A storage error.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The handle pool cannot supply a transfer handle.
    #[error("transfer handle pool exhausted: {0}")]
    ResourceExhausted(String),
    /// A connection or protocol failure, including timeouts.
    #[error("transport error: {0}")]
    TransportError(String),
    /// Fewer bytes were received than requested.
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead {
        /// The requested number of bytes.
        expected: u64,
        /// The number of bytes received.
        received: u64,
    },
    /// More bytes were received than requested.
    #[error("over read: received more than the expected {expected} bytes")]
    OverRead {
        /// The requested number of bytes.
        expected: u64,
    },
    /// The source object or the requested range is unavailable.
    #[error("not found: {0}")]
    NotFound(String),
    /// The transport cannot read from this kind of source.
    #[error("source {0} is not supported by this transport")]
    UnsupportedSource(ChunkSource),
    /// The output buffer is not sized to the requested byte range.
    #[error("output buffer has length {actual}, expected {expected}")]
    BufferSizeMismatch {
        /// The length of the byte range.
        expected: u64,
        /// The length of the output buffer.
        actual: usize,
    },
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] Arc<std::io::Error>),
    /// An invalid chunk source.
    #[error(transparent)]
    InvalidChunkSource(#[from] InvalidChunkSourceError),
    /// An invalid byte range.
    #[error(transparent)]
    InvalidByteRange(#[from] InvalidByteRangeError),
}

impl StorageError {
    /// Returns true if repeating the same request may succeed.
    ///
    /// Transport failures (including timeouts), short reads and IO errors are transient.
    /// Missing objects, over reads and invalid requests are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransportError(_) | Self::ShortRead { .. } | Self::IOError(_)
        )
    }

    /// Convert an error raised while reading a response body.
    ///
    /// All body read failures are transport failures, a timeout is labelled as such.
    #[must_use]
    pub fn from_body_error(err: &std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::TimedOut {
            Self::TransportError(format!("timed out: {err}"))
        } else {
            Self::TransportError(err.to_string())
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::IOError(Arc::new(err))
    }
}
