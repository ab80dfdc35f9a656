//! The HDF5 `shuffle` filter.
//!
//! The shuffle filter stores the first byte of every element, then the second byte of every element, and so on.
//! Trailing bytes that do not form a whole element are stored unchanged after the shuffled bytes.

use crate::DecodeError;

fn check_element_size(element_size: usize) -> Result<(), DecodeError> {
    if element_size == 0 {
        Err(DecodeError::InvalidFilterConfiguration(
            "the shuffle element size must be greater than zero".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Shuffle the bytes of `decoded` with elements of `element_size` bytes.
///
/// # Errors
/// Returns [`DecodeError::InvalidFilterConfiguration`] if `element_size` is zero.
pub fn shuffle(decoded: &[u8], element_size: usize) -> Result<Vec<u8>, DecodeError> {
    check_element_size(element_size)?;
    let mut encoded = decoded.to_vec();
    let count = decoded.len() / element_size;
    for i in 0..count {
        let offset = i * element_size;
        for byte_index in 0..element_size {
            encoded[byte_index * count + i] = decoded[offset + byte_index];
        }
    }
    Ok(encoded)
}

/// Reverse [`shuffle`].
///
/// # Errors
/// Returns [`DecodeError::InvalidFilterConfiguration`] if `element_size` is zero.
pub fn unshuffle(encoded: &[u8], element_size: usize) -> Result<Vec<u8>, DecodeError> {
    check_element_size(element_size)?;
    let mut decoded = encoded.to_vec();
    let count = encoded.len() / element_size;
    if count > 1 && element_size > 1 {
        for i in 0..element_size {
            let offset = i * count;
            for byte_index in 0..count {
                decoded[byte_index * element_size + i] = encoded[offset + byte_index];
            }
        }
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuffle_unshuffle() {
        let decoded: Vec<u8> = (0..12).collect();
        let encoded = shuffle(&decoded, 4).unwrap();
        assert_eq!(encoded, [0, 4, 8, 1, 5, 9, 2, 6, 10, 3, 7, 11]);
        assert_eq!(unshuffle(&encoded, 4).unwrap(), decoded);
    }

    #[test]
    fn unshuffle_remainder() {
        // two 4 byte elements and three trailing bytes
        let encoded = [0, 4, 1, 5, 2, 6, 3, 7, 100, 101, 102];
        assert_eq!(
            unshuffle(&encoded, 4).unwrap(),
            [0, 1, 2, 3, 4, 5, 6, 7, 100, 101, 102]
        );
        assert_eq!(shuffle(&unshuffle(&encoded, 4).unwrap(), 4).unwrap(), encoded);
    }

    #[test]
    fn unshuffle_short() {
        assert_eq!(unshuffle(&[1, 2, 3], 4).unwrap(), [1, 2, 3]);
        assert_eq!(unshuffle(&[1, 2, 3], 1).unwrap(), [1, 2, 3]);
    }

    #[test]
    fn unshuffle_zero_element_size() {
        assert!(matches!(
            unshuffle(&[1, 2, 3], 0),
            Err(DecodeError::InvalidFilterConfiguration(_))
        ));
    }
}
