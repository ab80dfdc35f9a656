use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use unsafe_cell_slice::UnsafeCellSlice;

use crate::{ChunkDescriptor, Hyperslab, HyperslabError};

/// An array assembly error.
///
/// Assembly errors indicate that the chunk geometry of a manifest is inconsistent with its array and chunk shapes.
#[derive(Clone, Debug, Error)]
pub enum AssemblyError {
    /// A chunk position has the wrong dimensionality.
    #[error("chunk position {position:?} has dimensionality {}, expected {rank}", position.len())]
    IncompatibleDimensionality {
        /// The chunk position.
        position: Vec<u64>,
        /// The array dimensionality.
        rank: usize,
    },
    /// The chunk shape is not usable with the array shape.
    #[error("chunk shape {chunk_shape:?} is invalid for array shape {array_shape:?}")]
    InvalidChunkShape {
        /// The chunk shape.
        chunk_shape: Vec<u64>,
        /// The array shape.
        array_shape: Vec<u64>,
    },
    /// A chunk position is not on the chunk grid.
    #[error("chunk position {position:?} is not a multiple of the chunk shape {chunk_shape:?}")]
    UnalignedChunk {
        /// The chunk position.
        position: Vec<u64>,
        /// The chunk shape.
        chunk_shape: Vec<u64>,
    },
    /// A chunk starts outside of the array.
    #[error("chunk position {position:?} is outside of array shape {array_shape:?}")]
    ChunkOutOfBounds {
        /// The chunk position.
        position: Vec<u64>,
        /// The array shape.
        array_shape: Vec<u64>,
    },
    /// Two chunks cover the same region, or a chunk was placed twice.
    #[error("chunk at position {0:?} overlaps another chunk")]
    OverlappingChunk(Vec<u64>),
    /// No chunk covers a region of the selection.
    #[error("no chunk at position {0:?}")]
    MissingChunk(Vec<u64>),
    /// A decoded chunk does not have the size of the chunk shape.
    #[error("decoded chunk at position {position:?} has {actual} bytes, expected {expected}")]
    DecodedSizeMismatch {
        /// The chunk position.
        position: Vec<u64>,
        /// The expected size in bytes.
        expected: usize,
        /// The actual size in bytes.
        actual: usize,
    },
    /// A chunk that is not part of the planned read was placed.
    #[error("chunk at position {0:?} is not part of the read")]
    ChunkNotPlanned(Vec<u64>),
    /// Not every planned chunk was placed.
    #[error("{missing} of {planned} chunks were not placed")]
    Incomplete {
        /// The number of chunks not placed.
        missing: usize,
        /// The number of planned chunks.
        planned: usize,
    },
    /// The destination buffer does not have the size of the selection.
    #[error("destination has {actual} bytes, expected {expected}")]
    DestinationSizeMismatch {
        /// The expected size in bytes.
        expected: u64,
        /// The actual size in bytes.
        actual: usize,
    },
    /// A copy would exceed the bounds of the decoded chunk or the destination.
    #[error("chunk at position {0:?} copies out of bounds")]
    CopyOutOfBounds(Vec<u64>),
    /// An invalid selection.
    #[error(transparent)]
    InvalidSelection(#[from] HyperslabError),
}

/// Copies decoded chunks into the region of a destination buffer holding a [`Hyperslab`] of an array.
///
/// The assembler first [plans](ArrayAssembler::plan) a read: it checks that the chunks lie on the chunk grid without overlapping and that every grid cell intersecting the selection has a chunk, and returns the chunks to read.
/// Each planned chunk is then [placed](ArrayAssembler::place) exactly once.
///
/// Chunks cover disjoint regions of the destination, so chunks can be placed concurrently from multiple threads.
pub struct ArrayAssembler<'a> {
    dest: UnsafeCellSlice<'a, u8>,
    dest_len: usize,
    array_shape: Vec<u64>,
    chunk_shape: Vec<u64>,
    element_size: usize,
    chunk_size_bytes: usize,
    selection: Hyperslab,
    slots: HashMap<Vec<u64>, usize>,
    placed: Vec<AtomicBool>,
}

impl std::fmt::Debug for ArrayAssembler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayAssembler")
            .field("array_shape", &self.array_shape)
            .field("chunk_shape", &self.chunk_shape)
            .field("element_size", &self.element_size)
            .field("selection", &self.selection)
            .field("planned", &self.num_planned())
            .field("placed", &self.num_placed())
            .finish_non_exhaustive()
    }
}

fn check_chunk_shape(array_shape: &[u64], chunk_shape: &[u64]) -> Result<(), AssemblyError> {
    if array_shape.len() != chunk_shape.len() || chunk_shape.contains(&0) {
        Err(AssemblyError::InvalidChunkShape {
            chunk_shape: chunk_shape.to_vec(),
            array_shape: array_shape.to_vec(),
        })
    } else {
        Ok(())
    }
}

fn check_position(position: &[u64], array_shape: &[u64]) -> Result<(), AssemblyError> {
    if position.len() != array_shape.len() {
        return Err(AssemblyError::IncompatibleDimensionality {
            position: position.to_vec(),
            rank: array_shape.len(),
        });
    }
    if std::iter::zip(position, array_shape).any(|(index, shape)| index >= shape) {
        return Err(AssemblyError::ChunkOutOfBounds {
            position: position.to_vec(),
            array_shape: array_shape.to_vec(),
        });
    }
    Ok(())
}

fn chunk_size_bytes(chunk_shape: &[u64], element_size: usize) -> Option<usize> {
    chunk_shape.iter().try_fold(element_size, |size, &dim| {
        usize::try_from(dim).ok().and_then(|dim| size.checked_mul(dim))
    })
}

fn row_major_strides(shape: &[u64]) -> Vec<u64> {
    let mut strides = vec![1; shape.len()];
    for dim in (1..shape.len()).rev() {
        strides[dim - 1] = strides[dim] * shape[dim];
    }
    strides
}

/// Return the selection indices of `selection` covered by the chunk at `origin`, or [`None`] if the chunk holds no selected elements.
fn selected_in_chunk(
    selection: &Hyperslab,
    origin: &[u64],
    chunk_shape: &[u64],
) -> Option<Vec<Range<u64>>> {
    (0..selection.rank())
        .map(|dim| {
            let chunk_range = origin[dim]..origin[dim].saturating_add(chunk_shape[dim]);
            let selected = selection.selected_in(dim, &chunk_range);
            (!selected.is_empty()).then_some(selected)
        })
        .collect()
}

/// Advance `index` through the cartesian product of `ranges` in row-major order.
///
/// Returns false once every index has been visited.
fn next_index(index: &mut [u64], ranges: &[Range<u64>]) -> bool {
    for dim in (0..index.len()).rev() {
        index[dim] += 1;
        if index[dim] < ranges[dim].end {
            return true;
        }
        index[dim] = ranges[dim].start;
    }
    false
}

/// Copy `num_elements` elements from `decoded` into `dest`.
fn copy_elements(
    dest: &UnsafeCellSlice<u8>,
    dest_len: usize,
    decoded: &[u8],
    dest_element: u64,
    decoded_element: u64,
    num_elements: u64,
    element_size: usize,
) -> Option<()> {
    let to_bytes = |elements: u64| usize::try_from(elements).ok()?.checked_mul(element_size);
    let len = to_bytes(num_elements)?;
    let dest_start = to_bytes(dest_element)?;
    let decoded_start = to_bytes(decoded_element)?;
    if dest_start.checked_add(len)? > dest_len || decoded_start.checked_add(len)? > decoded.len() {
        return None;
    }
    // SAFETY: chunks represent disjoint array subsets
    unsafe {
        dest.index_mut(dest_start..dest_start + len)
            .copy_from_slice(&decoded[decoded_start..decoded_start + len]);
    }
    Some(())
}

/// Copy the selected elements of the decoded chunk at `origin` into `dest`, which holds `selection` densely in row-major order.
///
/// Each innermost run of the selection within the chunk is copied with one slice copy when the innermost stride is one.
fn copy_chunk(
    dest: &UnsafeCellSlice<u8>,
    dest_len: usize,
    selection: &Hyperslab,
    origin: &[u64],
    chunk_shape: &[u64],
    decoded: &[u8],
    element_size: usize,
) -> Result<(), AssemblyError> {
    let out_of_bounds = || AssemblyError::CopyOutOfBounds(origin.to_vec());
    let copy = |dest_element, decoded_element, num_elements| {
        copy_elements(
            dest,
            dest_len,
            decoded,
            dest_element,
            decoded_element,
            num_elements,
            element_size,
        )
        .ok_or_else(out_of_bounds)
    };

    let Some(last) = selection.rank().checked_sub(1) else {
        // a scalar
        return copy(0, 0, 1);
    };
    let Some(ranges) = selected_in_chunk(selection, origin, chunk_shape) else {
        return Ok(());
    };

    let (start, stride) = (selection.start(), selection.stride());
    let dest_strides = row_major_strides(selection.count());
    let chunk_strides = row_major_strides(chunk_shape);
    let chunk_index = |dim: usize, k: u64| start[dim] + k * stride[dim] - origin[dim];
    let run = &ranges[last];

    let mut index: Vec<u64> = ranges.iter().map(|range| range.start).collect();
    loop {
        let mut dest_element = 0;
        let mut decoded_element = 0;
        for dim in 0..last {
            dest_element += index[dim] * dest_strides[dim];
            decoded_element += chunk_index(dim, index[dim]) * chunk_strides[dim];
        }
        dest_element += run.start;
        decoded_element += chunk_index(last, run.start);

        if stride[last] == 1 {
            copy(dest_element, decoded_element, run.end - run.start)?;
        } else {
            for k in 0..run.end - run.start {
                copy(dest_element + k, decoded_element + k * stride[last], 1)?;
            }
        }

        if !next_index(&mut index[..last], &ranges[..last]) {
            return Ok(());
        }
    }
}

impl<'a> ArrayAssembler<'a> {
    /// Create a new array assembler writing `selection` of an array into `dest`.
    ///
    /// `dest` holds the selected elements densely in row-major order.
    ///
    /// # Errors
    /// Returns an [`AssemblyError`] if
    /// - the chunk shape is inconsistent with the array shape,
    /// - `selection` is not within the array, or
    /// - `dest` is not sized to the selection.
    pub fn new(
        dest: &'a mut [u8],
        array_shape: &[u64],
        chunk_shape: &[u64],
        element_size: usize,
        selection: Hyperslab,
    ) -> Result<Self, AssemblyError> {
        check_chunk_shape(array_shape, chunk_shape)?;
        selection.validate(array_shape)?;
        let expected = selection.size_bytes(element_size)?;
        if expected != dest.len() as u64 {
            return Err(AssemblyError::DestinationSizeMismatch {
                expected,
                actual: dest.len(),
            });
        }
        let chunk_size_bytes = chunk_size_bytes(chunk_shape, element_size).ok_or_else(|| {
            AssemblyError::InvalidChunkShape {
                chunk_shape: chunk_shape.to_vec(),
                array_shape: array_shape.to_vec(),
            }
        })?;
        let dest_len = dest.len();
        Ok(Self {
            dest: UnsafeCellSlice::new(dest),
            dest_len,
            array_shape: array_shape.to_vec(),
            chunk_shape: chunk_shape.to_vec(),
            element_size,
            chunk_size_bytes,
            selection,
            slots: HashMap::new(),
            placed: Vec::new(),
        })
    }

    /// Return the selection written by the assembler.
    #[must_use]
    pub fn selection(&self) -> &Hyperslab {
        &self.selection
    }

    /// Return the size of a decoded chunk in bytes.
    #[must_use]
    pub fn chunk_size_bytes(&self) -> usize {
        self.chunk_size_bytes
    }

    /// Plan a read of the selection from `chunks`.
    ///
    /// Returns the chunks intersecting the selection, in the order given.
    /// Replaces any previous plan.
    ///
    /// # Errors
    /// Returns an [`AssemblyError`] if
    /// - a chunk position has the wrong dimensionality, is not on the chunk grid, or is outside the array,
    /// - two chunks have the same position, or
    /// - a grid cell intersecting the selection has no chunk.
    pub fn plan<'c>(
        &mut self,
        chunks: &'c [ChunkDescriptor],
    ) -> Result<Vec<&'c ChunkDescriptor>, AssemblyError> {
        let mut grid = HashSet::with_capacity(chunks.len());
        let mut slots = HashMap::new();
        let mut planned = Vec::new();
        for chunk in chunks {
            let position = chunk.position_in_array();
            check_position(position, &self.array_shape)?;
            if std::iter::zip(position, &self.chunk_shape).any(|(index, shape)| index % shape != 0)
            {
                return Err(AssemblyError::UnalignedChunk {
                    position: position.to_vec(),
                    chunk_shape: self.chunk_shape.clone(),
                });
            }
            if !grid.insert(position) {
                return Err(AssemblyError::OverlappingChunk(position.to_vec()));
            }
            if selected_in_chunk(&self.selection, position, &self.chunk_shape).is_some() {
                slots.insert(position.to_vec(), planned.len());
                planned.push(chunk);
            }
        }

        self.check_gaps(&slots)?;
        log::debug!(
            "planned {} of {} chunks for {:?}",
            planned.len(),
            chunks.len(),
            self.selection
        );
        self.placed = (0..planned.len()).map(|_| AtomicBool::new(false)).collect();
        self.slots = slots;
        Ok(planned)
    }

    /// Check that every grid cell intersecting the selection has a planned chunk.
    fn check_gaps(&self, slots: &HashMap<Vec<u64>, usize>) -> Result<(), AssemblyError> {
        if self.selection.is_empty() {
            return Ok(());
        }
        // the grid cells intersecting the selection along each dimension
        let mut cells: Vec<Vec<u64>> = Vec::with_capacity(self.selection.rank());
        for dim in 0..self.selection.rank() {
            let chunk = self.chunk_shape[dim];
            let first = self.selection.start()[dim];
            let last = first + (self.selection.count()[dim] - 1) * self.selection.stride()[dim];
            cells.push(
                (first / chunk..=last / chunk)
                    .map(|cell| cell * chunk)
                    .filter(|&origin| {
                        !self
                            .selection
                            .selected_in(dim, &(origin..origin.saturating_add(chunk)))
                            .is_empty()
                    })
                    .collect(),
            );
        }

        let ranges: Vec<Range<u64>> = cells.iter().map(|cells| 0..cells.len() as u64).collect();
        let mut index = vec![0u64; ranges.len()];
        let mut origin = vec![0u64; ranges.len()];
        loop {
            for (dim, (cells, &i)) in std::iter::zip(&cells, &index).enumerate() {
                origin[dim] = cells[usize::try_from(i).unwrap_or_default()];
            }
            if !slots.contains_key(&origin) {
                return Err(AssemblyError::MissingChunk(origin));
            }
            if !next_index(&mut index, &ranges) {
                return Ok(());
            }
        }
    }

    /// Return the number of planned chunks.
    #[must_use]
    pub fn num_planned(&self) -> usize {
        self.placed.len()
    }

    /// Return the number of chunks placed so far.
    #[must_use]
    pub fn num_placed(&self) -> usize {
        self.placed
            .iter()
            .filter(|placed| placed.load(Ordering::Acquire))
            .count()
    }

    /// Copy the decoded bytes of a planned chunk into the destination.
    ///
    /// Elements of the chunk outside of the array or the selection are skipped.
    ///
    /// # Errors
    /// Returns an [`AssemblyError`] if
    /// - the chunk is not part of the plan,
    /// - `decoded` does not have the size of a chunk, or
    /// - the chunk has already been placed.
    pub fn place(&self, descriptor: &ChunkDescriptor, decoded: &[u8]) -> Result<(), AssemblyError> {
        let position = descriptor.position_in_array();
        let slot = *self
            .slots
            .get(position)
            .ok_or_else(|| AssemblyError::ChunkNotPlanned(position.to_vec()))?;
        if decoded.len() != self.chunk_size_bytes {
            return Err(AssemblyError::DecodedSizeMismatch {
                position: position.to_vec(),
                expected: self.chunk_size_bytes,
                actual: decoded.len(),
            });
        }
        if self.placed[slot].swap(true, Ordering::AcqRel) {
            return Err(AssemblyError::OverlappingChunk(position.to_vec()));
        }
        copy_chunk(
            &self.dest,
            self.dest_len,
            &self.selection,
            position,
            &self.chunk_shape,
            decoded,
            self.element_size,
        )
    }

    /// Finish assembly.
    ///
    /// # Errors
    /// Returns [`AssemblyError::Incomplete`] if a planned chunk has not been placed.
    pub fn finish(self) -> Result<(), AssemblyError> {
        let planned = self.num_planned();
        let missing = planned - self.num_placed();
        if missing == 0 {
            Ok(())
        } else {
            Err(AssemblyError::Incomplete { missing, planned })
        }
    }
}

/// Copy one decoded chunk into `dest`, which holds an entire array with `array_shape` in row-major order.
///
/// The chunk covers the region starting at its position with the extent of `chunk_shape`, clipped to the array.
///
/// # Errors
/// Returns an [`AssemblyError`] if
/// - the chunk shape is inconsistent with the array shape,
/// - the chunk position has the wrong dimensionality or is outside the array,
/// - `dest` is not sized to the array, or
/// - `decoded` does not have the size of a chunk.
pub fn place(
    dest: &mut [u8],
    array_shape: &[u64],
    chunk_shape: &[u64],
    descriptor: &ChunkDescriptor,
    decoded: &[u8],
    element_size: usize,
) -> Result<(), AssemblyError> {
    let position = descriptor.position_in_array();
    check_chunk_shape(array_shape, chunk_shape)?;
    check_position(position, array_shape)?;
    let selection = Hyperslab::full(array_shape);
    let expected = selection.size_bytes(element_size)?;
    if expected != dest.len() as u64 {
        return Err(AssemblyError::DestinationSizeMismatch {
            expected,
            actual: dest.len(),
        });
    }
    let chunk_size_bytes = chunk_size_bytes(chunk_shape, element_size);
    if chunk_size_bytes != Some(decoded.len()) {
        return Err(AssemblyError::DecodedSizeMismatch {
            position: position.to_vec(),
            expected: chunk_size_bytes.unwrap_or(usize::MAX),
            actual: decoded.len(),
        });
    }
    let dest_len = dest.len();
    copy_chunk(
        &UnsafeCellSlice::new(dest),
        dest_len,
        &selection,
        position,
        chunk_shape,
        decoded,
        element_size,
    )
}
