use thiserror::Error;

use crate::codec::DecodeError;
use crate::storage::{byte_range::ByteRange, ChunkSource, StorageError};
use crate::{AssemblyError, ChunkDescriptor, HyperslabError, ManifestError};

/// The cause of a [`ChunkReadError`].
#[derive(Clone, Debug, Error)]
pub enum ChunkReadErrorKind {
    /// Fetching the chunk failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Decoding the chunk failed.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Placing the chunk failed.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

/// A failed chunk read, tagged with the offending chunk.
#[derive(Clone, Debug, Error)]
#[error("failed to read chunk {position_in_array:?} from {chunk_source} [{byte_range}]: {kind}")]
pub struct ChunkReadError {
    chunk_source: ChunkSource,
    byte_range: ByteRange,
    position_in_array: Vec<u64>,
    #[source]
    kind: ChunkReadErrorKind,
}

impl ChunkReadError {
    /// Create a new chunk read error for `descriptor`.
    #[must_use]
    pub fn new(descriptor: &ChunkDescriptor, kind: impl Into<ChunkReadErrorKind>) -> Self {
        Self {
            chunk_source: descriptor.source().clone(),
            byte_range: descriptor.byte_range(),
            position_in_array: descriptor.position_in_array().to_vec(),
            kind: kind.into(),
        }
    }

    /// Replace the byte range, e.g. with the byte range of a coalesced request.
    #[must_use]
    pub(crate) fn with_byte_range(mut self, byte_range: ByteRange) -> Self {
        self.byte_range = byte_range;
        self
    }

    /// Return the source of the chunk.
    #[must_use]
    pub fn chunk_source(&self) -> &ChunkSource {
        &self.chunk_source
    }

    /// Return the byte range of the chunk.
    #[must_use]
    pub fn byte_range(&self) -> ByteRange {
        self.byte_range
    }

    /// Return the position of the chunk in the array.
    #[must_use]
    pub fn position_in_array(&self) -> &[u64] {
        &self.position_in_array
    }

    /// Return the cause of the failure.
    #[must_use]
    pub fn kind(&self) -> &ChunkReadErrorKind {
        &self.kind
    }

    /// Returns true if retrying the read may succeed.
    ///
    /// Only transient storage failures are retryable, see [`StorageError::is_transient`].
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(&self.kind, ChunkReadErrorKind::Storage(err) if err.is_transient())
    }
}

/// One or more chunk reads of a scheduler run failed.
///
/// Holds every failure, ordered by the dispatch order of the failed tasks.
#[derive(Clone, Debug, Error)]
#[error("{} of {dispatched} chunk reads failed, first: {}", .failures.len(), DisplayFirst(.failures))]
pub struct AggregateFailure {
    failures: Vec<ChunkReadError>,
    dispatched: usize,
}

struct DisplayFirst<'a>(&'a [ChunkReadError]);

impl std::fmt::Display for DisplayFirst<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.first() {
            Some(failure) => std::fmt::Display::fmt(failure, f),
            None => f.write_str("none"),
        }
    }
}

impl AggregateFailure {
    /// Create a new aggregate failure from the failures of a run that dispatched `dispatched` tasks.
    #[must_use]
    pub fn new(failures: Vec<ChunkReadError>, dispatched: usize) -> Self {
        Self {
            failures,
            dispatched,
        }
    }

    /// Return the individual failures.
    #[must_use]
    pub fn failures(&self) -> &[ChunkReadError] {
        &self.failures
    }

    /// Return the first failure.
    #[must_use]
    pub fn first(&self) -> Option<&ChunkReadError> {
        self.failures.first()
    }

    /// Return the number of tasks dispatched by the run.
    #[must_use]
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }
}

/// A read error.
#[derive(Clone, Debug, Error)]
pub enum ReadError {
    /// The manifest is invalid.
    #[error(transparent)]
    InvalidManifest(#[from] ManifestError),
    /// The selection is invalid.
    #[error(transparent)]
    InvalidSelection(#[from] HyperslabError),
    /// The chunk geometry of the manifest is inconsistent.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    /// A storage error outside of a chunk read.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// One or more chunk reads failed.
    #[error(transparent)]
    AggregateFailure(#[from] AggregateFailure),
    /// The read was cancelled before every chunk was read.
    #[error("read cancelled after dispatching {dispatched} chunk reads, {skipped} skipped")]
    Cancelled {
        /// The number of dispatched tasks.
        dispatched: usize,
        /// The number of tasks never dispatched.
        skipped: usize,
    },
    /// The output buffer is not sized to the selection.
    #[error("output has length {actual}, expected {expected}")]
    InvalidOutputLength {
        /// The expected length in bytes.
        expected: u64,
        /// The actual length in bytes.
        actual: usize,
    },
    /// The requested element type does not match the element size of the variable.
    #[error("element size {actual} is incompatible with the variable element size {expected}")]
    IncompatibleElementSize {
        /// The element size of the variable.
        expected: usize,
        /// The size of the requested element type.
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(offset: u64, kind: impl Into<ChunkReadErrorKind>) -> ChunkReadError {
        let source = ChunkSource::new("https://example.com/granule.h5").unwrap();
        let descriptor = ChunkDescriptor::new(source, offset, 16, vec![0, 2]).unwrap();
        ChunkReadError::new(&descriptor, kind)
    }

    #[test]
    fn chunk_read_error_display() {
        let err = failure(32, StorageError::TransportError("reset".to_string()));
        assert_eq!(
            err.to_string(),
            "failed to read chunk [0, 2] from https://example.com/granule.h5 [32..48]: transport error: reset"
        );
        assert!(err.is_transient());
        assert!(!failure(32, StorageError::NotFound("gone".to_string())).is_transient());
        assert!(!failure(
            32,
            DecodeError::SizeMismatch {
                expected: 16,
                actual: 15
            }
        )
        .is_transient());
    }

    #[test]
    fn aggregate_failure_display() {
        let aggregate = AggregateFailure::new(
            vec![
                failure(0, StorageError::NotFound("gone".to_string())),
                failure(16, StorageError::NotFound("gone".to_string())),
            ],
            4,
        );
        assert_eq!(aggregate.failures().len(), 2);
        assert_eq!(aggregate.dispatched(), 4);
        let message = ReadError::from(aggregate).to_string();
        assert!(message.starts_with("2 of 4 chunk reads failed"));
        assert!(message.contains("https://example.com/granule.h5 [0..16]"));
    }
}
