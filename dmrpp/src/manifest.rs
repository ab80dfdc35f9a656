use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::CompressionPipelineSpec;
use crate::{ByteOrder, ChunkDescriptor};

/// The chunk layout of one array variable.
///
/// A manifest holds everything needed to read a variable: the array and chunk shapes, the element size and byte order, the compression pipeline and the chunk descriptors.
/// It is produced by a manifest parser and is immutable thereafter.
///
/// The chunk shape applies to every chunk, including chunks at the array boundary that extend past the end of the array.
///
/// ### Example
/// ```rust
/// # use dmrpp::VariableManifest;
/// let manifest = VariableManifest::from_json(r#"{
///     "array_shape": [10],
///     "chunk_shape": [4],
///     "element_size": 2,
///     "byte_order": "big_endian",
///     "compression": {"filters": [{"name": "shuffle", "element_size": 2}, {"name": "deflate"}], "order": "declared"},
///     "chunks": [
///         {"source": "https://example.com/granule.h5", "byte_offset": 4016, "byte_length": 12, "position_in_array": "[0]"},
///         {"source": "https://example.com/granule.h5", "byte_offset": 4028, "byte_length": 11, "position_in_array": "[4]"},
///         {"source": "https://example.com/granule.h5", "byte_offset": 4039, "byte_length": 10, "position_in_array": "[8]"}
///     ]
/// }"#)?;
/// assert_eq!(manifest.chunk_size_bytes(), 8);
/// assert_eq!(manifest.chunks().len(), 3);
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "VariableManifestMetadata")]
pub struct VariableManifest {
    array_shape: Vec<u64>,
    chunk_shape: Vec<u64>,
    element_size: usize,
    byte_order: ByteOrder,
    compression: CompressionPipelineSpec,
    chunks: Vec<ChunkDescriptor>,
    #[serde(skip)]
    chunk_size_bytes: usize,
}

/// An invalid variable manifest.
#[derive(Clone, Debug, Error)]
pub enum ManifestError {
    /// The array and chunk shapes have different dimensionality.
    #[error("chunk shape {chunk_shape:?} is incompatible with array shape {array_shape:?}")]
    IncompatibleDimensionality {
        /// The array shape.
        array_shape: Vec<u64>,
        /// The chunk shape.
        chunk_shape: Vec<u64>,
    },
    /// A chunk dimension is zero.
    #[error("chunk shape {0:?} has a zero dimension")]
    ZeroChunkDimension(Vec<u64>),
    /// The element size is zero.
    #[error("element size must be greater than zero")]
    ZeroElementSize,
    /// A decoded chunk would not fit in memory.
    #[error("chunk shape {0:?} is too large")]
    ChunkTooLarge(Vec<u64>),
    /// The manifest could not be deserialized.
    #[error("invalid manifest: {0}")]
    InvalidMetadata(String),
}

impl VariableManifest {
    /// Create a new variable manifest.
    ///
    /// The byte order defaults to [`ByteOrder::LittleEndian`], see [`with_byte_order`](Self::with_byte_order).
    ///
    /// Chunk positions are not validated here, they are checked against the chunk grid when a read is planned.
    ///
    /// # Errors
    /// Returns a [`ManifestError`] if the array and chunk shapes are inconsistent, a chunk dimension is zero, or the element size is zero.
    pub fn new(
        array_shape: Vec<u64>,
        chunk_shape: Vec<u64>,
        element_size: usize,
        compression: CompressionPipelineSpec,
        chunks: Vec<ChunkDescriptor>,
    ) -> Result<Self, ManifestError> {
        if array_shape.len() != chunk_shape.len() {
            return Err(ManifestError::IncompatibleDimensionality {
                array_shape,
                chunk_shape,
            });
        }
        if chunk_shape.contains(&0) {
            return Err(ManifestError::ZeroChunkDimension(chunk_shape));
        }
        if element_size == 0 {
            return Err(ManifestError::ZeroElementSize);
        }
        let Some(chunk_size_bytes) = chunk_shape.iter().try_fold(element_size, |size, &dim| {
            usize::try_from(dim).ok().and_then(|dim| size.checked_mul(dim))
        }) else {
            return Err(ManifestError::ChunkTooLarge(chunk_shape));
        };
        Ok(Self {
            array_shape,
            chunk_shape,
            element_size,
            byte_order: ByteOrder::default(),
            compression,
            chunks,
            chunk_size_bytes,
        })
    }

    /// Parse a variable manifest from JSON.
    ///
    /// # Errors
    /// Returns a [`ManifestError`] if the JSON is malformed or describes an invalid manifest.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json).map_err(|err| ManifestError::InvalidMetadata(err.to_string()))
    }

    /// Set the byte order of the elements.
    #[must_use]
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Return the array shape.
    #[must_use]
    pub fn array_shape(&self) -> &[u64] {
        &self.array_shape
    }

    /// Return the chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> &[u64] {
        &self.chunk_shape
    }

    /// Return the dimensionality of the array.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.array_shape.len()
    }

    /// Return the size of an element in bytes.
    #[must_use]
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Return the byte order of the elements.
    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Return the compression pipeline.
    #[must_use]
    pub fn compression(&self) -> &CompressionPipelineSpec {
        &self.compression
    }

    /// Return the chunk descriptors.
    #[must_use]
    pub fn chunks(&self) -> &[ChunkDescriptor] {
        &self.chunks
    }

    /// Return the number of elements in the array, or [`None`] if it overflows a [`u64`].
    #[must_use]
    pub fn num_elements(&self) -> Option<u64> {
        self.array_shape
            .iter()
            .try_fold(1u64, |num_elements, &dim| num_elements.checked_mul(dim))
    }

    /// Return the size of a decoded chunk in bytes.
    #[must_use]
    pub fn chunk_size_bytes(&self) -> usize {
        self.chunk_size_bytes
    }
}

#[derive(Deserialize)]
struct VariableManifestMetadata {
    array_shape: Vec<u64>,
    chunk_shape: Vec<u64>,
    element_size: usize,
    #[serde(default)]
    byte_order: ByteOrder,
    #[serde(default = "CompressionPipelineSpec::uncompressed")]
    compression: CompressionPipelineSpec,
    chunks: Vec<ChunkDescriptor>,
}

impl TryFrom<VariableManifestMetadata> for VariableManifest {
    type Error = ManifestError;

    fn try_from(metadata: VariableManifestMetadata) -> Result<Self, Self::Error> {
        Ok(Self::new(
            metadata.array_shape,
            metadata.chunk_shape,
            metadata.element_size,
            metadata.compression,
            metadata.chunks,
        )?
        .with_byte_order(metadata.byte_order))
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::{Filter, FilterOrder};
    use crate::storage::ChunkSource;

    use super::*;

    fn chunk(offset: u64, position: Vec<u64>) -> ChunkDescriptor {
        let source = ChunkSource::new("https://example.com/granule.h5").unwrap();
        ChunkDescriptor::new(source, offset, 16, position).unwrap()
    }

    #[test]
    fn manifest() {
        let manifest = VariableManifest::new(
            vec![4, 4],
            vec![2, 2],
            4,
            CompressionPipelineSpec::uncompressed(),
            vec![chunk(0, vec![0, 0]), chunk(16, vec![0, 2])],
        )
        .unwrap()
        .with_byte_order(ByteOrder::BigEndian);
        assert_eq!(manifest.rank(), 2);
        assert_eq!(manifest.num_elements(), Some(16));
        assert_eq!(manifest.chunk_size_bytes(), 16);
        assert_eq!(manifest.byte_order(), ByteOrder::BigEndian);
    }

    #[test]
    fn manifest_invalid() {
        let uncompressed = CompressionPipelineSpec::uncompressed;
        assert!(matches!(
            VariableManifest::new(vec![4, 4], vec![2], 4, uncompressed(), vec![]),
            Err(ManifestError::IncompatibleDimensionality { .. })
        ));
        assert!(matches!(
            VariableManifest::new(vec![4, 4], vec![2, 0], 4, uncompressed(), vec![]),
            Err(ManifestError::ZeroChunkDimension(_))
        ));
        assert!(matches!(
            VariableManifest::new(vec![4], vec![2], 0, uncompressed(), vec![]),
            Err(ManifestError::ZeroElementSize)
        ));
        assert!(matches!(
            VariableManifest::new(vec![u64::MAX], vec![u64::MAX], 8, uncompressed(), vec![]),
            Err(ManifestError::ChunkTooLarge(_))
        ));
    }

    #[test]
    fn manifest_from_json() {
        let manifest = VariableManifest::from_json(
            r#"{
                "array_shape": [4, 4],
                "chunk_shape": [2, 2],
                "element_size": 4,
                "compression": {"filters": [{"name": "shuffle", "element_size": 4}, {"name": "deflate"}], "order": "legacy"},
                "chunks": [
                    {"source": "https://example.com/granule.h5", "byte_offset": 0, "byte_length": 16, "position_in_array": "[0,0]"},
                    {"source": "https://example.com/granule.h5", "byte_offset": 16, "byte_length": 16, "position_in_array": [0,2]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.byte_order(), ByteOrder::LittleEndian);
        assert_eq!(manifest.compression().order(), FilterOrder::Legacy);
        assert_eq!(
            manifest.compression().filters(),
            &[Filter::Shuffle { element_size: 4 }, Filter::Deflate]
        );
        assert_eq!(manifest.chunks()[1], chunk(16, vec![0, 2]));

        let json = serde_json::to_string(&manifest).unwrap();
        assert_eq!(VariableManifest::from_json(&json).unwrap(), manifest);

        assert!(matches!(
            VariableManifest::from_json(r#"{"array_shape": [4], "chunk_shape": [2, 2], "element_size": 4, "chunks": []}"#),
            Err(ManifestError::InvalidMetadata(_))
        ));
    }
}
