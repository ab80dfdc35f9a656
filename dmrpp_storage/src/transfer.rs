use std::io::Read;
use std::sync::Arc;

use auto_impl::auto_impl;

use crate::{byte_range::ByteRange, ChunkSource, StorageError};

/// The body of a range request.
///
/// Bytes are streamed from the body by the reader, see [`fetch_range`](crate::fetch_range).
pub type RangeBody<'a> = Box<dyn Read + 'a>;

/// Transfer handle traits.
///
/// A transfer handle is one reusable connection or session.
/// It is not shared between threads: a handle is exclusively owned by whichever task holds it.
pub trait TransferHandleTraits: Send {
    /// Issue a request for `byte_range` of `source` and return the response body.
    ///
    /// The body should hold exactly `byte_range.length()` bytes.
    /// Implementations report what they receive and leave byte count verification to the reader.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the request fails.
    /// A missing object or unavailable range is [`StorageError::NotFound`].
    fn open_range(
        &mut self,
        source: &ChunkSource,
        byte_range: ByteRange,
    ) -> Result<RangeBody<'_>, StorageError>;
}

/// Transport traits.
///
/// A transport creates [`TransferHandle`]s for a kind of [`ChunkSource`].
#[auto_impl(&, Arc)]
pub trait TransportTraits: Send + Sync {
    /// Create a new transfer handle.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the handle cannot be created.
    fn create_handle(&self) -> Result<TransferHandle, StorageError>;
}

/// A boxed transfer handle.
pub type TransferHandle = Box<dyn TransferHandleTraits>;

/// [`Arc`] wrapped transport.
pub type Transport = Arc<dyn TransportTraits>;
