//! The HDF5 `fletcher32` checksum filter.
//!
//! The checksum is computed over 16-bit big-endian words and stored little-endian in the 4 bytes following the chunk data.

use crate::DecodeError;

/// The size of the stored checksum in bytes.
pub const CHECKSUM_SIZE: usize = size_of::<u32>();

fn fold(sum: u32) -> u32 {
    (sum & 0xffff) + (sum >> 16)
}

/// Compute the HDF5 fletcher32 checksum of `data`.
#[must_use]
pub fn checksum(data: &[u8]) -> u32 {
    let mut sum1: u32 = 0;
    let mut sum2: u32 = 0;
    let (words, tail) = data.split_at(data.len() & !1);
    // 360 words is the longest run without overflowing the sums
    for block in words.chunks(720) {
        for word in block.chunks_exact(2) {
            sum1 = sum1.wrapping_add(u32::from(u16::from_be_bytes([word[0], word[1]])));
            sum2 = sum2.wrapping_add(sum1);
        }
        sum1 = fold(sum1);
        sum2 = fold(sum2);
    }
    if let [last] = tail {
        sum1 = sum1.wrapping_add(u32::from(*last) << 8);
        sum2 = sum2.wrapping_add(sum1);
        sum1 = fold(sum1);
        sum2 = fold(sum2);
    }
    sum1 = fold(sum1);
    sum2 = fold(sum2);
    (sum2 << 16) | sum1
}

/// Append the checksum of `data` to `data`.
pub fn append_checksum(data: &mut Vec<u8>) {
    let checksum = checksum(data);
    data.extend_from_slice(&checksum.to_le_bytes());
}

/// Verify the checksum stored at the end of `encoded`.
///
/// Returns the length of the data preceding the checksum.
///
/// # Errors
/// Returns [`DecodeError::SizeMismatch`] if `encoded` is too short to hold a checksum, or [`DecodeError::ChecksumMismatch`] if the checksum does not match.
pub fn verify(encoded: &[u8]) -> Result<usize, DecodeError> {
    let Some(len) = encoded.len().checked_sub(CHECKSUM_SIZE) else {
        return Err(DecodeError::SizeMismatch {
            expected: CHECKSUM_SIZE,
            actual: encoded.len(),
        });
    };
    let (data, stored) = encoded.split_at(len);
    let stored = u32::from_le_bytes([stored[0], stored[1], stored[2], stored[3]]);
    let computed = checksum(data);
    if stored == computed {
        Ok(len)
    } else {
        Err(DecodeError::ChecksumMismatch { stored, computed })
    }
}
