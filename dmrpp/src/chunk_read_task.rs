use rayon::prelude::*;

use crate::codec::CompressionPipelineSpec;
use crate::storage::byte_range::{ByteRange, InvalidByteRangeError};
use crate::storage::{fetch_range, ChunkSource, HandlePool, StorageError};
use crate::{ArrayAssembler, ChunkDescriptor, ChunkReadError};

/// The shared state of the chunk reads of one variable.
#[derive(Debug, Clone, Copy)]
pub struct ChunkReadContext<'a> {
    pool: &'a HandlePool,
    compression: &'a CompressionPipelineSpec,
    assembler: &'a ArrayAssembler<'a>,
    decode_concurrency: usize,
}

impl<'a> ChunkReadContext<'a> {
    /// Create a new chunk read context.
    ///
    /// `decode_concurrency` bounds the concurrency of decoding the chunks of a coalesced request.
    #[must_use]
    pub fn new(
        pool: &'a HandlePool,
        compression: &'a CompressionPipelineSpec,
        assembler: &'a ArrayAssembler<'a>,
        decode_concurrency: usize,
    ) -> Self {
        Self {
            pool,
            compression,
            assembler,
            decode_concurrency,
        }
    }

    /// Return the handle pool.
    #[must_use]
    pub fn pool(&self) -> &'a HandlePool {
        self.pool
    }

    /// Return the array assembler.
    #[must_use]
    pub fn assembler(&self) -> &'a ArrayAssembler<'a> {
        self.assembler
    }
}

/// A unit of concurrent work: fetch one byte range, decode the chunks within it, and place them.
///
/// A task holds one chunk, or several chunks with contiguous byte ranges in the same source if [coalesced](ChunkReadTask::coalesce).
/// A task never retries.
#[derive(Debug, Clone)]
pub struct ChunkReadTask<'a> {
    source: &'a ChunkSource,
    byte_range: ByteRange,
    descriptors: Vec<&'a ChunkDescriptor>,
}

impl<'a> ChunkReadTask<'a> {
    /// Create a task reading one chunk.
    #[must_use]
    pub fn new(descriptor: &'a ChunkDescriptor) -> Self {
        Self {
            source: descriptor.source(),
            byte_range: descriptor.byte_range(),
            descriptors: vec![descriptor],
        }
    }

    /// Create tasks for `descriptors`, merging consecutive chunks in the same source whose byte ranges are contiguous into one task.
    #[must_use]
    pub fn coalesce(descriptors: &[&'a ChunkDescriptor]) -> Vec<Self> {
        let mut tasks: Vec<Self> = Vec::new();
        for &descriptor in descriptors {
            if let Some(task) = tasks.last_mut() {
                if task.source == descriptor.source() {
                    if let Ok(byte_range) = task.byte_range.merge_following(&descriptor.byte_range())
                    {
                        task.byte_range = byte_range;
                        task.descriptors.push(descriptor);
                        continue;
                    }
                }
            }
            tasks.push(Self::new(descriptor));
        }
        log::debug!(
            "coalesced {} chunks into {} requests",
            descriptors.len(),
            tasks.len()
        );
        tasks
    }

    /// Return the source of the task.
    #[must_use]
    pub fn source(&self) -> &'a ChunkSource {
        self.source
    }

    /// Return the byte range fetched by the task.
    #[must_use]
    pub fn byte_range(&self) -> ByteRange {
        self.byte_range
    }

    /// Return the chunks of the task.
    #[must_use]
    pub fn descriptors(&self) -> &[&'a ChunkDescriptor] {
        &self.descriptors
    }

    /// Run the task.
    ///
    /// A transfer handle is acquired from the pool for the fetch and released before decoding, on every exit path.
    /// Each task fetches into its own buffer.
    ///
    /// # Errors
    /// Returns a [`ChunkReadError`] tagged with the offending chunk if acquiring a handle, fetching, decoding or placing fails.
    /// If the fetch of a coalesced task fails, the error is tagged with the first chunk and the whole byte range.
    pub fn run(&self, context: &ChunkReadContext) -> Result<(), ChunkReadError> {
        let Some(&first) = self.descriptors.first() else {
            return Ok(());
        };
        let fetch_error = |err: StorageError| {
            ChunkReadError::new(first, err).with_byte_range(self.byte_range)
        };

        let length = usize::try_from(self.byte_range.length())
            .map_err(|_| fetch_error(InvalidByteRangeError::new(self.byte_range).into()))?;
        let mut raw = vec![0; length];
        {
            let mut handle = context.pool.acquire().map_err(fetch_error)?;
            match self.descriptors.as_slice() {
                [descriptor] => descriptor.fetch(&mut *handle, &mut raw),
                _ => fetch_range(&mut *handle, self.source, self.byte_range, &mut raw),
            }
            .map_err(fetch_error)?;
        }

        if let [descriptor] = self.descriptors.as_slice() {
            decode_and_place(descriptor, &raw, context)
        } else {
            let decode_chunk = |index: usize| {
                let descriptor = self.descriptors[index];
                let range = descriptor
                    .byte_range()
                    .relative_to(&self.byte_range)
                    .map_err(|err| ChunkReadError::new(descriptor, StorageError::from(err)))?;
                decode_and_place(descriptor, &raw[range], context)
            };
            crate::iter_concurrent_limit!(
                context.decode_concurrency.max(1),
                (0..self.descriptors.len()),
                try_for_each,
                decode_chunk
            )
        }
    }
}

fn decode_and_place(
    descriptor: &ChunkDescriptor,
    raw: &[u8],
    context: &ChunkReadContext,
) -> Result<(), ChunkReadError> {
    let decoded = context
        .compression
        .decode(raw, context.assembler.chunk_size_bytes())
        .map_err(|err| ChunkReadError::new(descriptor, err))?;
    context
        .assembler
        .place(descriptor, &decoded)
        .map_err(|err| ChunkReadError::new(descriptor, err))
}
