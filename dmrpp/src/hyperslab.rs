use std::ops::Range;

use thiserror::Error;

/// A strided rectangular selection of an array.
///
/// Along each dimension, the selection holds the `count` indices `start + k * stride` for `k` in `0..count`.
/// The selected elements are read into a dense buffer of shape `count` in row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hyperslab {
    start: Vec<u64>,
    stride: Vec<u64>,
    count: Vec<u64>,
}

/// An invalid hyperslab.
#[derive(Clone, Debug, Error)]
pub enum HyperslabError {
    /// The start, stride and count have different dimensionality.
    #[error("start {start:?}, stride {stride:?} and count {count:?} have different dimensionality")]
    InconsistentDimensionality {
        /// The start.
        start: Vec<u64>,
        /// The stride.
        stride: Vec<u64>,
        /// The count.
        count: Vec<u64>,
    },
    /// A stride is zero.
    #[error("stride {0:?} has a zero dimension")]
    ZeroStride(Vec<u64>),
    /// The hyperslab and array have different dimensionality.
    #[error("incompatible dimensionality {0}, expected {1}")]
    IncompatibleDimensionality(usize, usize),
    /// The hyperslab extends beyond the array.
    #[error("hyperslab {hyperslab:?} is out of bounds of array shape {array_shape:?}")]
    OutOfBounds {
        /// The hyperslab.
        hyperslab: Hyperslab,
        /// The array shape.
        array_shape: Vec<u64>,
    },
    /// The size of the selection overflows a [`u64`].
    #[error("hyperslab with count {0:?} is too large")]
    TooLarge(Vec<u64>),
}

impl Hyperslab {
    /// Create a new hyperslab.
    ///
    /// # Errors
    /// Returns a [`HyperslabError`] if the dimensionality of `start`, `stride` and `count` differs or a stride is zero.
    pub fn new(start: Vec<u64>, stride: Vec<u64>, count: Vec<u64>) -> Result<Self, HyperslabError> {
        if start.len() != stride.len() || start.len() != count.len() {
            return Err(HyperslabError::InconsistentDimensionality {
                start,
                stride,
                count,
            });
        }
        if stride.contains(&0) {
            return Err(HyperslabError::ZeroStride(stride));
        }
        Ok(Self {
            start,
            stride,
            count,
        })
    }

    /// Create a hyperslab with unit stride.
    ///
    /// # Errors
    /// Returns a [`HyperslabError`] if `start` and `count` have different dimensionality.
    pub fn new_contiguous(start: Vec<u64>, count: Vec<u64>) -> Result<Self, HyperslabError> {
        let stride = vec![1; start.len()];
        Self::new(start, stride, count)
    }

    /// Create a hyperslab selecting every element of an array with `array_shape`.
    #[must_use]
    pub fn full(array_shape: &[u64]) -> Self {
        Self {
            start: vec![0; array_shape.len()],
            stride: vec![1; array_shape.len()],
            count: array_shape.to_vec(),
        }
    }

    /// Return the start.
    #[must_use]
    pub fn start(&self) -> &[u64] {
        &self.start
    }

    /// Return the stride.
    #[must_use]
    pub fn stride(&self) -> &[u64] {
        &self.stride
    }

    /// Return the count, which is also the shape of the selected data.
    #[must_use]
    pub fn count(&self) -> &[u64] {
        &self.count
    }

    /// Return the dimensionality.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.start.len()
    }

    /// Return the number of selected elements.
    ///
    /// # Errors
    /// Returns [`HyperslabError::TooLarge`] if the number of elements overflows a [`u64`].
    pub fn num_elements(&self) -> Result<u64, HyperslabError> {
        if self.is_empty() {
            return Ok(0);
        }
        self.count
            .iter()
            .try_fold(1u64, |num_elements, &count| num_elements.checked_mul(count))
            .ok_or_else(|| HyperslabError::TooLarge(self.count.clone()))
    }

    /// Return the size in bytes of the selected elements with `element_size`.
    ///
    /// # Errors
    /// Returns [`HyperslabError::TooLarge`] if the size overflows a [`u64`].
    pub fn size_bytes(&self, element_size: usize) -> Result<u64, HyperslabError> {
        self.num_elements()?
            .checked_mul(element_size as u64)
            .ok_or_else(|| HyperslabError::TooLarge(self.count.clone()))
    }

    /// Returns true if no elements are selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count.contains(&0)
    }

    /// Check that the hyperslab lies within an array with `array_shape`.
    ///
    /// # Errors
    /// Returns a [`HyperslabError`] if the dimensionality differs or a selected index is out of bounds.
    pub fn validate(&self, array_shape: &[u64]) -> Result<(), HyperslabError> {
        if self.rank() != array_shape.len() {
            return Err(HyperslabError::IncompatibleDimensionality(
                self.rank(),
                array_shape.len(),
            ));
        }
        let in_bounds = (0..self.rank()).all(|dim| {
            let (start, stride, count) = (self.start[dim], self.stride[dim], self.count[dim]);
            if count == 0 {
                start <= array_shape[dim]
            } else {
                (count - 1)
                    .checked_mul(stride)
                    .and_then(|offset| offset.checked_add(start))
                    .is_some_and(|last| last < array_shape[dim])
            }
        });
        if in_bounds {
            Ok(())
        } else {
            Err(HyperslabError::OutOfBounds {
                hyperslab: self.clone(),
                array_shape: array_shape.to_vec(),
            })
        }
    }

    /// Return the selection indices `k` along `dim` whose array index `start + k * stride` lies in `array_range`.
    ///
    /// The returned range is empty if no selected index lies in `array_range`.
    #[must_use]
    pub fn selected_in(&self, dim: usize, array_range: &Range<u64>) -> Range<u64> {
        let (start, stride, count) = (self.start[dim], self.stride[dim], self.count[dim]);
        let first = array_range.start.saturating_sub(start).div_ceil(stride);
        let end = array_range.end.saturating_sub(start).div_ceil(stride).min(count);
        first..end.max(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyperslab() {
        let hyperslab = Hyperslab::new(vec![1, 0], vec![2, 1], vec![3, 4]).unwrap();
        assert_eq!(hyperslab.rank(), 2);
        assert_eq!(hyperslab.num_elements().unwrap(), 12);
        assert_eq!(hyperslab.size_bytes(4).unwrap(), 48);
        assert!(hyperslab.validate(&[6, 4]).is_ok());
        assert!(matches!(
            hyperslab.validate(&[5, 4]),
            Err(HyperslabError::OutOfBounds { .. })
        ));
        assert!(matches!(
            hyperslab.validate(&[6]),
            Err(HyperslabError::IncompatibleDimensionality(2, 1))
        ));
    }

    #[test]
    fn hyperslab_invalid() {
        assert!(matches!(
            Hyperslab::new(vec![0, 0], vec![1], vec![1, 1]),
            Err(HyperslabError::InconsistentDimensionality { .. })
        ));
        assert!(matches!(
            Hyperslab::new(vec![0], vec![0], vec![1]),
            Err(HyperslabError::ZeroStride(_))
        ));
    }

    #[test]
    fn hyperslab_too_large() {
        let hyperslab = Hyperslab::full(&[1 << 33, 1 << 33]);
        assert!(hyperslab.validate(&[1 << 33, 1 << 33]).is_ok());
        assert!(matches!(
            hyperslab.num_elements(),
            Err(HyperslabError::TooLarge(_))
        ));

        let hyperslab = Hyperslab::full(&[1 << 31, 1 << 31]);
        assert_eq!(hyperslab.num_elements().unwrap(), 1 << 62);
        assert!(matches!(
            hyperslab.size_bytes(8),
            Err(HyperslabError::TooLarge(_))
        ));

        // an empty dimension selects nothing regardless of the others
        let hyperslab = Hyperslab::full(&[1 << 40, 1 << 40, 0]);
        assert_eq!(hyperslab.size_bytes(8).unwrap(), 0);
    }

    #[test]
    fn hyperslab_selected_in() {
        // array indices 1, 4, 7, 10
        let hyperslab = Hyperslab::new(vec![1], vec![3], vec![4]).unwrap();
        assert_eq!(hyperslab.selected_in(0, &(0..4)), 0..1);
        assert_eq!(hyperslab.selected_in(0, &(4..8)), 1..3);
        assert_eq!(hyperslab.selected_in(0, &(8..10)), 3..3);
        assert_eq!(hyperslab.selected_in(0, &(8..12)), 3..4);
        assert_eq!(hyperslab.selected_in(0, &(12..16)), 4..4);
        assert_eq!(hyperslab.selected_in(0, &(0..1)), 0..0);

        let full = Hyperslab::full(&[10]);
        assert_eq!(full.selected_in(0, &(8..12)), 8..10);
    }
}
