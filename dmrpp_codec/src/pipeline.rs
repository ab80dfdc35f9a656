use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::{deflate, fletcher32, shuffle, DecodeError, Filter, FilterOrder};

/// The filters applied to the chunks of a variable, and how to interpret their order.
///
/// ### Example
/// ```rust
/// # use dmrpp_codec::{CompressionPipelineSpec, Filter, FilterOrder};
/// let spec = CompressionPipelineSpec::from_compression_type("shuffle deflate", 4, FilterOrder::Declared);
/// assert_eq!(spec.filters(), &[Filter::Shuffle { element_size: 4 }, Filter::Deflate]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompressionPipelineSpec {
    filters: Vec<Filter>,
    order: FilterOrder,
}

impl CompressionPipelineSpec {
    /// Create a new compression pipeline.
    #[must_use]
    pub fn new(filters: Vec<Filter>, order: FilterOrder) -> Self {
        Self { filters, order }
    }

    /// Create a compression pipeline with no filters.
    #[must_use]
    pub fn uncompressed() -> Self {
        Self::new(Vec::new(), FilterOrder::Declared)
    }

    /// Create a compression pipeline from a space separated list of filter names, e.g. `"shuffle deflate"`.
    ///
    /// `element_size` parameterises the shuffle filter.
    /// Unrecognised names produce [`Filter::Unsupported`] so that decoding reports them.
    #[must_use]
    pub fn from_compression_type(
        compression_type: &str,
        element_size: usize,
        order: FilterOrder,
    ) -> Self {
        let filters = compression_type
            .split_whitespace()
            .map(|name| Filter::from_name(name, element_size))
            .collect();
        Self::new(filters, order)
    }

    /// Return the filters as listed.
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Return the filter order.
    #[must_use]
    pub fn order(&self) -> FilterOrder {
        self.order
    }

    /// Returns true if the pipeline has no filters.
    #[must_use]
    pub fn is_uncompressed(&self) -> bool {
        self.filters.is_empty()
    }

    /// Return the filters in the order they are applied when decoding.
    ///
    /// # Errors
    /// Returns [`DecodeError::UnsupportedFilter`] if a filter is not implemented, or not supported by the filter order.
    pub fn decode_steps(&self) -> Result<Vec<Filter>, DecodeError> {
        match self.order {
            FilterOrder::Legacy => {
                let mut deflate = false;
                let mut shuffle = None;
                for filter in &self.filters {
                    match filter {
                        Filter::Deflate => deflate = true,
                        Filter::Shuffle { .. } => shuffle = Some(filter.clone()),
                        filter => return Err(DecodeError::UnsupportedFilter(filter.to_string())),
                    }
                }
                Ok(deflate.then_some(Filter::Deflate).into_iter().chain(shuffle).collect())
            }
            FilterOrder::Declared => self
                .filters
                .iter()
                .rev()
                .map(|filter| match filter {
                    Filter::Unsupported(name) => Err(DecodeError::UnsupportedFilter(name.clone())),
                    filter => Ok(filter.clone()),
                })
                .collect(),
        }
    }

    /// Decode a chunk. See [`decode`].
    ///
    /// # Errors
    /// See [`decode`].
    pub fn decode(&self, raw: &[u8], expected_len: usize) -> Result<Vec<u8>, DecodeError> {
        decode(self, raw, expected_len)
    }
}

/// Decode the raw bytes of a chunk into exactly `expected_len` bytes.
///
/// The decode steps are determined by [`CompressionPipelineSpec::decode_steps`].
/// A chunk with no filters is copied, and must already be `expected_len` bytes long.
///
/// # Errors
/// Returns a [`DecodeError`] if
/// - a filter is unsupported ([`DecodeError::UnsupportedFilter`]) or misconfigured ([`DecodeError::InvalidFilterConfiguration`]),
/// - the compressed stream is corrupt ([`DecodeError::CorruptStream`]),
/// - a checksum does not match ([`DecodeError::ChecksumMismatch`]), or
/// - the decoded length is not `expected_len` ([`DecodeError::SizeMismatch`]).
pub fn decode(
    spec: &CompressionPipelineSpec,
    raw: &[u8],
    expected_len: usize,
) -> Result<Vec<u8>, DecodeError> {
    let steps = spec.decode_steps()?;
    log::trace!("decoding {} bytes with {steps:?}", raw.len());

    let mut bytes = Cow::Borrowed(raw);
    for (index, step) in steps.iter().enumerate() {
        bytes = match step {
            Filter::Deflate => {
                // checksums decoded after inflating are part of the inflated stream
                let checksums = steps[index + 1..]
                    .iter()
                    .filter(|step| **step == Filter::Fletcher32)
                    .count();
                let inflated_len = expected_len + checksums * fletcher32::CHECKSUM_SIZE;
                Cow::Owned(deflate::inflate(&bytes, inflated_len)?)
            }
            Filter::Shuffle { element_size } => {
                Cow::Owned(shuffle::unshuffle(&bytes, *element_size)?)
            }
            Filter::Fletcher32 => {
                let len = fletcher32::verify(&bytes)?;
                match bytes {
                    Cow::Borrowed(bytes) => Cow::Borrowed(&bytes[..len]),
                    Cow::Owned(mut bytes) => {
                        bytes.truncate(len);
                        Cow::Owned(bytes)
                    }
                }
            }
            Filter::Unsupported(name) => return Err(DecodeError::UnsupportedFilter(name.clone())),
        };
    }

    if bytes.len() != expected_len {
        return Err(DecodeError::SizeMismatch {
            expected: expected_len,
            actual: bytes.len(),
        });
    }
    Ok(bytes.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elements() -> Vec<u8> {
        (0u32..100).flat_map(u32::to_le_bytes).collect()
    }

    #[test]
    fn decode_uncompressed() {
        let spec = CompressionPipelineSpec::uncompressed();
        assert!(spec.is_uncompressed());
        assert_eq!(spec.decode(&[1, 2, 3, 4], 4).unwrap(), [1, 2, 3, 4]);
        assert!(matches!(
            spec.decode(&[1, 2, 3, 4], 5),
            Err(DecodeError::SizeMismatch {
                expected: 5,
                actual: 4
            })
        ));
    }

    #[test]
    fn decode_declared_shuffle_deflate() {
        let decoded = elements();
        let encoded = deflate::deflate(&shuffle::shuffle(&decoded, 4).unwrap(), 6).unwrap();
        let spec = CompressionPipelineSpec::from_compression_type(
            "shuffle deflate",
            4,
            FilterOrder::Declared,
        );
        assert_eq!(
            spec.decode_steps().unwrap(),
            [Filter::Deflate, Filter::Shuffle { element_size: 4 }]
        );
        assert_eq!(spec.decode(&encoded, decoded.len()).unwrap(), decoded);
    }

    #[test]
    fn decode_legacy_ignores_listing_order() {
        let decoded = elements();
        let encoded = deflate::deflate(&shuffle::shuffle(&decoded, 4).unwrap(), 6).unwrap();
        for compression_type in ["deflate shuffle", "shuffle deflate"] {
            let spec = CompressionPipelineSpec::from_compression_type(
                compression_type,
                4,
                FilterOrder::Legacy,
            );
            assert_eq!(spec.decode(&encoded, decoded.len()).unwrap(), decoded);
        }

        // The declared order decodes the listing literally
        let spec = CompressionPipelineSpec::from_compression_type(
            "deflate shuffle",
            4,
            FilterOrder::Declared,
        );
        assert_ne!(spec.decode(&encoded, decoded.len()).ok(), Some(decoded));
    }

    #[test]
    fn decode_fletcher32() {
        let decoded = elements();
        let mut encoded = deflate::deflate(&shuffle::shuffle(&decoded, 4).unwrap(), 6).unwrap();
        fletcher32::append_checksum(&mut encoded);
        let spec = CompressionPipelineSpec::from_compression_type(
            "shuffle deflate fletcher32",
            4,
            FilterOrder::Declared,
        );
        assert_eq!(spec.decode(&encoded, decoded.len()).unwrap(), decoded);

        let last = encoded.len() - 1;
        encoded[last] ^= 0xff;
        assert!(matches!(
            spec.decode(&encoded, decoded.len()),
            Err(DecodeError::ChecksumMismatch { .. })
        ));

        let spec = CompressionPipelineSpec::from_compression_type(
            "shuffle deflate fletcher32",
            4,
            FilterOrder::Legacy,
        );
        assert!(matches!(
            spec.decode(&encoded, decoded.len()),
            Err(DecodeError::UnsupportedFilter(_))
        ));
    }

    #[test]
    fn decode_checksum_inside_deflate() {
        let decoded = elements();
        let mut checksummed = decoded.clone();
        fletcher32::append_checksum(&mut checksummed);
        let encoded = deflate::deflate(&checksummed, 6).unwrap();
        let spec = CompressionPipelineSpec::new(
            vec![Filter::Fletcher32, Filter::Deflate],
            FilterOrder::Declared,
        );
        assert_eq!(spec.decode(&encoded, decoded.len()).unwrap(), decoded);
    }

    #[test]
    fn decode_size_mismatch() {
        let encoded = deflate::deflate(&[7u8; 400], 6).unwrap();
        let spec = CompressionPipelineSpec::from_compression_type("deflate", 1, FilterOrder::Legacy);
        for expected_len in [399, 401] {
            assert!(matches!(
                spec.decode(&encoded, expected_len),
                Err(DecodeError::SizeMismatch { actual: 400, .. })
            ));
        }
    }

    #[test]
    fn decode_size_mismatch_incompressible() {
        // 89 bytes that do not compress, stored as a chunk of 100 bytes
        let decoded: Vec<u8> = (0u32..89)
            .map(|i| i.wrapping_mul(2_654_435_761).to_be_bytes()[0])
            .collect();
        let encoded = deflate::deflate(&decoded, 0).unwrap();
        assert!((100..=110).contains(&encoded.len()));
        let spec = CompressionPipelineSpec::from_compression_type("deflate", 1, FilterOrder::Legacy);
        assert_eq!(spec.decode(&encoded, 89).unwrap(), decoded);
        for expected_len in [88, 90, 400] {
            let err = spec.decode(&encoded, expected_len).unwrap_err();
            assert!(
                matches!(err, DecodeError::SizeMismatch { expected, actual: 89 } if expected == expected_len),
                "{err}"
            );
        }
    }

    #[test]
    fn decode_unsupported_filter() {
        let spec = CompressionPipelineSpec::from_compression_type(
            "shuffle szip",
            4,
            FilterOrder::Declared,
        );
        assert!(matches!(
            spec.decode(&[0; 8], 8),
            Err(DecodeError::UnsupportedFilter(name)) if name == "szip"
        ));
    }

    #[test]
    fn decode_zero_element_size() {
        let spec = CompressionPipelineSpec::new(
            vec![Filter::Shuffle { element_size: 0 }],
            FilterOrder::Declared,
        );
        assert!(matches!(
            spec.decode(&[0; 8], 8),
            Err(DecodeError::InvalidFilterConfiguration(_))
        ));
    }

    #[test]
    fn compression_pipeline_spec_serde() {
        let spec: CompressionPipelineSpec = serde_json::from_str(
            r#"{"filters":[{"name":"shuffle","element_size":8},{"name":"deflate"}],"order":"legacy"}"#,
        )
        .unwrap();
        assert_eq!(
            spec,
            CompressionPipelineSpec::from_compression_type("shuffle deflate", 8, FilterOrder::Legacy)
        );
    }
}
