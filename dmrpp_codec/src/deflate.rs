//! The `deflate` filter.
//!
//! HDF5 stores deflated chunks in the zlib format (a zlib header, a deflate stream and an adler32 trailer).

use std::io::{Cursor, Read};

use crate::DecodeError;

/// Inflate a zlib stream that decodes to exactly `expected_len` bytes.
///
/// Decompression stops one byte past `expected_len`; any remaining output is counted but not stored.
///
/// # Errors
/// Returns [`DecodeError::CorruptStream`] if the stream is invalid, or [`DecodeError::SizeMismatch`] if it does not decode to `expected_len` bytes.
pub fn inflate(encoded: &[u8], expected_len: usize) -> Result<Vec<u8>, DecodeError> {
    let corrupt = |err: std::io::Error| DecodeError::CorruptStream(err.to_string());

    let mut decoder = flate2::read::ZlibDecoder::new(Cursor::new(encoded));
    let mut decoded = Vec::with_capacity(expected_len);
    decoder
        .by_ref()
        .take(expected_len as u64 + 1)
        .read_to_end(&mut decoded)
        .map_err(corrupt)?;

    if decoded.len() > expected_len {
        let excess = std::io::copy(&mut decoder, &mut std::io::sink()).map_err(corrupt)?;
        return Err(DecodeError::SizeMismatch {
            expected: expected_len,
            actual: decoded.len() + usize::try_from(excess).unwrap_or(usize::MAX),
        });
    }
    if decoded.len() < expected_len {
        return Err(DecodeError::SizeMismatch {
            expected: expected_len,
            actual: decoded.len(),
        });
    }
    Ok(decoded)
}

/// Deflate `decoded` into a zlib stream at the given compression `level` (0-9).
///
/// # Errors
/// Returns [`DecodeError::IOError`] if the encoder fails.
pub fn deflate(decoded: &[u8], level: u32) -> Result<Vec<u8>, DecodeError> {
    let mut encoder =
        flate2::read::ZlibEncoder::new(Cursor::new(decoded), flate2::Compression::new(level));
    let mut encoded = Vec::new();
    encoder.read_to_end(&mut encoded)?;
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deflate_inflate() {
        let decoded: Vec<u8> = (0..=255).cycle().take(1000).collect();
        let encoded = deflate(&decoded, 6).unwrap();
        assert!(encoded.len() < decoded.len());
        assert_eq!(inflate(&encoded, decoded.len()).unwrap(), decoded);
    }

    #[test]
    fn inflate_size_mismatch() {
        let decoded = vec![42u8; 400];
        let encoded = deflate(&decoded, 9).unwrap();
        assert!(matches!(
            inflate(&encoded, 300),
            Err(DecodeError::SizeMismatch {
                expected: 300,
                actual: 400
            })
        ));
        assert!(matches!(
            inflate(&encoded, 500),
            Err(DecodeError::SizeMismatch {
                expected: 500,
                actual: 400
            })
        ));
    }

    #[test]
    fn inflate_corrupt() {
        assert!(matches!(
            inflate(&[0xff; 16], 16),
            Err(DecodeError::CorruptStream(_))
        ));
    }
}
