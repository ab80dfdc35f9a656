use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::byte_range::ByteRange;
use crate::storage::{fetch_range, ChunkSource, StorageError, TransferHandleTraits};

/// The location, size and position of one chunk of a variable.
///
/// A chunk descriptor is immutable after creation.
/// Fetching the same descriptor repeatedly is idempotent.
///
/// The `position_in_array` is the origin of the chunk in the array, in units of elements.
/// In a manifest it may be written as a list of integers or in the string form `"[0,512]"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ChunkDescriptorMetadata")]
pub struct ChunkDescriptor {
    source: ChunkSource,
    byte_offset: u64,
    byte_length: u64,
    position_in_array: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identity: Option<String>,
}

/// An invalid chunk descriptor.
#[derive(Clone, Debug, Error)]
pub enum ChunkDescriptorError {
    /// The chunk has a byte length of zero.
    #[error("chunk byte length must be greater than zero")]
    ZeroByteLength,
    /// The end of the chunk byte range overflows.
    #[error("chunk byte range at offset {byte_offset} with length {byte_length} overflows")]
    ByteRangeOverflow {
        /// The byte offset.
        byte_offset: u64,
        /// The byte length.
        byte_length: u64,
    },
    /// The position in array cannot be parsed.
    #[error("invalid chunk position in array `{0}`")]
    InvalidPosition(String),
}

impl ChunkDescriptor {
    /// Create a new chunk descriptor.
    ///
    /// # Errors
    /// Returns a [`ChunkDescriptorError`] if `byte_length` is zero or the byte range overflows.
    pub fn new(
        source: ChunkSource,
        byte_offset: u64,
        byte_length: u64,
        position_in_array: Vec<u64>,
    ) -> Result<Self, ChunkDescriptorError> {
        if byte_length == 0 {
            return Err(ChunkDescriptorError::ZeroByteLength);
        }
        if byte_offset.checked_add(byte_length).is_none() {
            return Err(ChunkDescriptorError::ByteRangeOverflow {
                byte_offset,
                byte_length,
            });
        }
        Ok(Self {
            source,
            byte_offset,
            byte_length,
            position_in_array,
            checksum: None,
            identity: None,
        })
    }

    /// Set the checksum string.
    #[must_use]
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Set the identity string.
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Return the source holding the chunk.
    #[must_use]
    pub fn source(&self) -> &ChunkSource {
        &self.source
    }

    /// Return the byte offset of the chunk in its source.
    #[must_use]
    pub fn byte_offset(&self) -> u64 {
        self.byte_offset
    }

    /// Return the byte length of the chunk.
    #[must_use]
    pub fn byte_length(&self) -> u64 {
        self.byte_length
    }

    /// Return the byte range of the chunk in its source.
    #[must_use]
    pub fn byte_range(&self) -> ByteRange {
        ByteRange::new(self.byte_offset, self.byte_length)
    }

    /// Return the origin of the chunk in the array.
    #[must_use]
    pub fn position_in_array(&self) -> &[u64] {
        &self.position_in_array
    }

    /// Return the dimensionality of the chunk position.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.position_in_array.len()
    }

    /// Return the checksum string, if any.
    #[must_use]
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    /// Return the identity string, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Fetch the raw bytes of the chunk into `out` with a borrowed transfer handle.
    ///
    /// `out` must be exactly [`byte_length`](Self::byte_length) bytes long.
    ///
    /// # Errors
    /// See [`fetch_range`].
    pub fn fetch(
        &self,
        handle: &mut dyn TransferHandleTraits,
        out: &mut [u8],
    ) -> Result<(), StorageError> {
        fetch_range(handle, &self.source, self.byte_range(), out)
    }
}

/// Parse a chunk position in the manifest string form, e.g. `"[0,512, 1024]"`.
///
/// The brackets are optional and whitespace is ignored.
/// An empty list denotes the position of a scalar.
///
/// # Errors
/// Returns [`ChunkDescriptorError::InvalidPosition`] if an index is not a non-negative integer.
pub fn parse_position_in_array(position: &str) -> Result<Vec<u64>, ChunkDescriptorError> {
    let invalid = || ChunkDescriptorError::InvalidPosition(position.to_string());
    let trimmed = position.trim();
    let inner = match (trimmed.strip_prefix('['), trimmed.strip_suffix(']')) {
        (Some(_), Some(_)) if trimmed.len() >= 2 => &trimmed[1..trimmed.len() - 1],
        (None, None) => trimmed,
        _ => return Err(invalid()),
    };
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|index| index.trim().parse::<u64>().map_err(|_| invalid()))
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PositionMetadata {
    Indices(Vec<u64>),
    String(String),
}

#[derive(Deserialize)]
struct ChunkDescriptorMetadata {
    source: ChunkSource,
    byte_offset: u64,
    byte_length: u64,
    position_in_array: PositionMetadata,
    #[serde(default)]
    checksum: Option<String>,
    #[serde(default)]
    identity: Option<String>,
}

impl TryFrom<ChunkDescriptorMetadata> for ChunkDescriptor {
    type Error = ChunkDescriptorError;

    fn try_from(metadata: ChunkDescriptorMetadata) -> Result<Self, Self::Error> {
        let position_in_array = match metadata.position_in_array {
            PositionMetadata::Indices(indices) => indices,
            PositionMetadata::String(position) => parse_position_in_array(&position)?,
        };
        let mut descriptor = Self::new(
            metadata.source,
            metadata.byte_offset,
            metadata.byte_length,
            position_in_array,
        )?;
        descriptor.checksum = metadata.checksum;
        descriptor.identity = metadata.identity;
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::transport::MemoryTransport;
    use crate::storage::TransportTraits;

    use super::*;

    fn source() -> ChunkSource {
        ChunkSource::new("https://example.com/granule.h5").unwrap()
    }

    #[test]
    fn chunk_descriptor() {
        let descriptor = ChunkDescriptor::new(source(), 100, 20, vec![0, 4])
            .unwrap()
            .with_checksum("1234")
            .with_identity("chunk-0");
        assert_eq!(descriptor.byte_range(), ByteRange::new(100, 20));
        assert_eq!(descriptor.position_in_array(), &[0, 4]);
        assert_eq!(descriptor.rank(), 2);
        assert_eq!(descriptor.checksum(), Some("1234"));
        assert_eq!(descriptor.identity(), Some("chunk-0"));
    }

    #[test]
    fn chunk_descriptor_invalid() {
        assert!(matches!(
            ChunkDescriptor::new(source(), 100, 0, vec![0]),
            Err(ChunkDescriptorError::ZeroByteLength)
        ));
        assert!(matches!(
            ChunkDescriptor::new(source(), u64::MAX, 2, vec![0]),
            Err(ChunkDescriptorError::ByteRangeOverflow { .. })
        ));
    }

    #[test]
    fn position_in_array_parse() {
        assert_eq!(parse_position_in_array("[0,512]").unwrap(), [0, 512]);
        assert_eq!(parse_position_in_array(" [ 1, 2 ,3 ] ").unwrap(), [1, 2, 3]);
        assert_eq!(parse_position_in_array("7").unwrap(), [7]);
        assert!(parse_position_in_array("[]").unwrap().is_empty());
        assert!(parse_position_in_array("[1,-2]").is_err());
        assert!(parse_position_in_array("[1,2").is_err());
        assert!(parse_position_in_array("[1,,2]").is_err());
    }

    #[test]
    fn chunk_descriptor_serde() {
        let descriptor: ChunkDescriptor = serde_json::from_str(
            r#"{"source":"https://example.com/granule.h5","byte_offset":8,"byte_length":16,"position_in_array":"[2,0]"}"#,
        )
        .unwrap();
        assert_eq!(descriptor.position_in_array(), &[2, 0]);
        let json = serde_json::to_string(&descriptor).unwrap();
        assert_eq!(
            json,
            r#"{"source":"https://example.com/granule.h5","byte_offset":8,"byte_length":16,"position_in_array":[2,0]}"#
        );
        assert_eq!(
            serde_json::from_str::<ChunkDescriptor>(&json).unwrap(),
            descriptor
        );
        assert!(serde_json::from_str::<ChunkDescriptor>(
            r#"{"source":"https://example.com/granule.h5","byte_offset":8,"byte_length":0,"position_in_array":[0]}"#,
        )
        .is_err());
    }

    #[test]
    fn chunk_descriptor_fetch() {
        let transport = MemoryTransport::new();
        let source = ChunkSource::new("memory://granule").unwrap();
        transport.set(&source, (0u8..32).collect::<Vec<_>>());
        let descriptor = ChunkDescriptor::new(source, 8, 4, vec![0]).unwrap();
        let mut handle = transport.create_handle().unwrap();
        let mut out = [0u8; 4];
        descriptor.fetch(&mut *handle, &mut out).unwrap();
        assert_eq!(out, [8, 9, 10, 11]);
    }
}
