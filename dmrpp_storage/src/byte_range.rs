//! Byte ranges.
//!
//! A [`ByteRange`] locates a chunk within its source: a byte offset and a non-zero byte length.

use std::ops::Range;

use thiserror::Error;

/// A byte offset.
pub type ByteOffset = u64;

/// A byte length.
pub type ByteLength = u64;

/// A byte range.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ByteRange {
    offset: ByteOffset,
    length: ByteLength,
}

impl From<Range<u64>> for ByteRange {
    fn from(range: Range<u64>) -> Self {
        Self::new(range.start, range.end.saturating_sub(range.start))
    }
}

impl ByteRange {
    /// Create a new byte range.
    #[must_use]
    pub const fn new(offset: ByteOffset, length: ByteLength) -> Self {
        Self { offset, length }
    }

    /// Create a new byte range, checking that it is non-empty and that its end is representable.
    ///
    /// # Errors
    /// Returns [`InvalidByteRangeError`] if `length` is zero or `offset + length` overflows.
    pub fn try_new(offset: ByteOffset, length: ByteLength) -> Result<Self, InvalidByteRangeError> {
        let byte_range = Self::new(offset, length);
        if length == 0 || offset.checked_add(length).is_none() {
            Err(InvalidByteRangeError::new(byte_range))
        } else {
            Ok(byte_range)
        }
    }

    /// Return the offset of the first byte.
    #[must_use]
    pub const fn offset(&self) -> ByteOffset {
        self.offset
    }

    /// Return the number of bytes.
    #[must_use]
    pub const fn length(&self) -> ByteLength {
        self.length
    }

    /// Return the exclusive end of the byte range.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    /// Convert the byte range to a [`Range<u64>`].
    #[must_use]
    pub const fn to_range(&self) -> Range<u64> {
        self.offset..self.end()
    }

    /// Return the value of an HTTP `Range` header requesting this byte range.
    ///
    /// HTTP byte ranges are inclusive, so `0..16` is requested as `bytes=0-15`.
    #[must_use]
    pub fn to_http_range(&self) -> String {
        format!(
            "bytes={}-{}",
            self.offset,
            self.end().saturating_sub(1).max(self.offset)
        )
    }

    /// Returns true if `other` starts exactly where this byte range ends.
    #[must_use]
    pub const fn is_followed_by(&self, other: &Self) -> bool {
        self.end() == other.offset
    }

    /// Returns true if `other` lies entirely within this byte range.
    #[must_use]
    pub const fn contains(&self, other: &Self) -> bool {
        other.offset >= self.offset && other.end() <= self.end()
    }

    /// Return the byte range that spans this byte range and a byte range that immediately follows it.
    ///
    /// # Errors
    /// Returns [`InvalidByteRangeError`] if `other` does not start where this byte range ends.
    pub fn merge_following(&self, other: &Self) -> Result<Self, InvalidByteRangeError> {
        if self.is_followed_by(other) {
            Ok(Self::new(self.offset, self.length.saturating_add(other.length)))
        } else {
            Err(InvalidByteRangeError::new(*other))
        }
    }

    /// Return the position of this byte range within the bytes of `outer` as a [`Range<usize>`].
    ///
    /// # Errors
    /// Returns [`InvalidByteRangeError`] if this byte range is not within `outer`, or the position exceeds [`usize::MAX`].
    pub fn relative_to(&self, outer: &Self) -> Result<Range<usize>, InvalidByteRangeError> {
        if !outer.contains(self) {
            return Err(InvalidByteRangeError::new(*self));
        }
        let start = usize::try_from(self.offset - outer.offset)
            .map_err(|_| InvalidByteRangeError::new(*self))?;
        let length =
            usize::try_from(self.length).map_err(|_| InvalidByteRangeError::new(*self))?;
        Ok(start..start + length)
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}..{}", self.offset, self.end())
    }
}

/// An invalid byte range error.
#[derive(Copy, Clone, Debug, Error)]
#[error("invalid byte range {0}")]
pub struct InvalidByteRangeError(ByteRange);

impl InvalidByteRangeError {
    /// Create a new [`InvalidByteRangeError`].
    #[must_use]
    pub fn new(byte_range: ByteRange) -> Self {
        Self(byte_range)
    }

    /// Return the offending byte range.
    #[must_use]
    pub fn byte_range(&self) -> ByteRange {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_range_bounds() {
        let byte_range = ByteRange::new(4, 12);
        assert_eq!(byte_range.offset(), 4);
        assert_eq!(byte_range.length(), 12);
        assert_eq!(byte_range.end(), 16);
        assert_eq!(byte_range.to_range(), 4..16);
        assert_eq!(byte_range.to_string(), "4..16");
        assert_eq!(ByteRange::from(4..16), byte_range);
    }

    #[test]
    fn byte_range_try_new() {
        assert!(ByteRange::try_new(0, 1).is_ok());
        assert!(ByteRange::try_new(0, 0).is_err());
        assert!(ByteRange::try_new(u64::MAX, 1).is_err());
    }

    #[test]
    fn byte_range_http_header() {
        assert_eq!(ByteRange::new(0, 16).to_http_range(), "bytes=0-15");
        assert_eq!(ByteRange::new(100, 1).to_http_range(), "bytes=100-100");
    }

    #[test]
    fn byte_range_merge() {
        let a = ByteRange::new(0, 8);
        let b = ByteRange::new(8, 4);
        let c = ByteRange::new(13, 4);
        assert!(a.is_followed_by(&b));
        assert!(!b.is_followed_by(&c));
        let ab = a.merge_following(&b).unwrap();
        assert_eq!(ab, ByteRange::new(0, 12));
        assert!(ab.merge_following(&c).is_err());
        assert!(ab.contains(&b));
        assert!(!ab.contains(&c));
    }

    #[test]
    fn byte_range_relative_to() {
        let outer = ByteRange::new(100, 20);
        assert_eq!(ByteRange::new(104, 8).relative_to(&outer).unwrap(), 4..12);
        assert_eq!(ByteRange::new(100, 20).relative_to(&outer).unwrap(), 0..20);
        assert!(ByteRange::new(96, 8).relative_to(&outer).is_err());
        assert!(ByteRange::new(110, 11).relative_to(&outer).is_err());
    }
}
