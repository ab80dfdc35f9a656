use crate::storage::{HandlePool, Transport};
use crate::{
    elements_from_bytes, ArrayAssembler, CancellationToken, ChunkReadContext, ChunkReadTask,
    ConcurrentChunkScheduler, Element, Hyperslab, ReadError, ReaderOptions, SchedulerOutcome,
    VariableManifest,
};

/// A request to read a variable, or a hyperslab of it.
#[derive(Debug, Clone)]
pub struct ReadRequest<'a> {
    manifest: &'a VariableManifest,
    selection: Option<Hyperslab>,
    cancellation: Option<CancellationToken>,
}

impl<'a> ReadRequest<'a> {
    /// Create a request to read the entire variable described by `manifest`.
    #[must_use]
    pub fn new(manifest: &'a VariableManifest) -> Self {
        Self {
            manifest,
            selection: None,
            cancellation: None,
        }
    }

    /// Read only `selection` of the variable.
    #[must_use]
    pub fn with_selection(mut self, selection: Hyperslab) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Stop dispatching chunk reads once `cancellation` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    /// Return the manifest of the variable.
    #[must_use]
    pub fn manifest(&self) -> &'a VariableManifest {
        self.manifest
    }

    /// Return the selection, or the entire array if no selection is set.
    #[must_use]
    pub fn selection(&self) -> Hyperslab {
        self.selection
            .clone()
            .unwrap_or_else(|| Hyperslab::full(self.manifest.array_shape()))
    }

    /// Return the size of the selection in bytes.
    ///
    /// # Errors
    /// Returns [`ReadError::InvalidSelection`] if the selection is not within the array or its size overflows a [`u64`].
    pub fn size_bytes(&self) -> Result<u64, ReadError> {
        let selection = self.selection();
        selection.validate(self.manifest.array_shape())?;
        Ok(selection.size_bytes(self.manifest.element_size())?)
    }
}

/// A reading session.
///
/// A session owns the [`HandlePool`] of transfer handles shared by all of its reads.
/// The pool and its handles are torn down when the session is dropped.
///
/// ### Example
/// ```rust
/// # use std::sync::Arc;
/// # use dmrpp::{ReadRequest, ReadSession, ReaderOptions, VariableManifest};
/// # use dmrpp::codec::CompressionPipelineSpec;
/// # use dmrpp::storage::ChunkSource;
/// # use dmrpp::storage::transport::MemoryTransport;
/// let transport = Arc::new(MemoryTransport::new());
/// let source = ChunkSource::new("memory://granule")?;
/// transport.set(&source, vec![0u8, 1, 2, 3, 4, 5]);
///
/// let manifest = VariableManifest::from_json(r#"{
///     "array_shape": [6],
///     "chunk_shape": [4],
///     "element_size": 1,
///     "chunks": [
///         {"source": "memory://granule", "byte_offset": 0, "byte_length": 4, "position_in_array": "[0]"},
///         {"source": "memory://granule", "byte_offset": 2, "byte_length": 4, "position_in_array": "[4]"}
///     ]
/// }"#)?;
///
/// let session = ReadSession::new(transport, ReaderOptions::default());
/// let bytes = session.read(&ReadRequest::new(&manifest))?;
/// assert_eq!(bytes, [0, 1, 2, 3, 2, 3]);
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct ReadSession {
    pool: HandlePool,
    options: ReaderOptions,
}

impl ReadSession {
    /// Create a new reading session with `transport`.
    ///
    /// The pool creates up to [`ReaderOptions::max_pool_size`] transfer handles.
    #[must_use]
    pub fn new(transport: Transport, options: ReaderOptions) -> Self {
        log::debug!(
            "created read session with up to {} transfer handles",
            options.max_pool_size()
        );
        Self {
            pool: HandlePool::new(transport, options.max_pool_size()),
            options,
        }
    }

    /// Create a new reading session with an HTTP transport using the [request timeout](ReaderOptions::request_timeout) of `options`.
    #[cfg(feature = "http")]
    #[must_use]
    pub fn new_http(options: ReaderOptions) -> Self {
        let transport = crate::http::HttpTransport::new().with_timeout(options.request_timeout());
        Self::new(std::sync::Arc::new(transport), options)
    }

    /// Create a new reading session with a filesystem transport.
    #[cfg(feature = "filesystem")]
    #[must_use]
    pub fn new_filesystem(options: ReaderOptions) -> Self {
        let transport = crate::filesystem::FilesystemTransport::new();
        Self::new(std::sync::Arc::new(transport), options)
    }

    /// Return the handle pool.
    #[must_use]
    pub fn pool(&self) -> &HandlePool {
        &self.pool
    }

    /// Return the reader options.
    #[must_use]
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Read the selection of a variable into a new buffer.
    ///
    /// The buffer holds the selected elements in row-major order, in the byte order of the variable.
    ///
    /// # Errors
    /// See [`read_into`](Self::read_into).
    pub fn read(&self, request: &ReadRequest) -> Result<Vec<u8>, ReadError> {
        let size = request.size_bytes()?;
        let size = usize::try_from(size).map_err(|_| ReadError::InvalidOutputLength {
            expected: size,
            actual: usize::MAX,
        })?;
        let mut bytes = vec![0; size];
        self.read_into(request, &mut bytes)?;
        Ok(bytes)
    }

    /// Read the selection of a variable into `out`.
    ///
    /// Only the chunks intersecting the selection are read.
    /// `out` is fully populated on success; on failure its contents are unspecified.
    ///
    /// # Errors
    /// Returns a [`ReadError`] if
    /// - the selection is not within the array,
    /// - `out` is not sized to the selection,
    /// - the chunk geometry of the manifest is inconsistent,
    /// - one or more chunk reads failed, or
    /// - the read was cancelled.
    pub fn read_into(
        &self,
        request: &ReadRequest,
        out: &mut [u8],
    ) -> Result<SchedulerOutcome, ReadError> {
        let manifest = request.manifest();
        let expected = request.size_bytes()?;
        if out.len() as u64 != expected {
            return Err(ReadError::InvalidOutputLength {
                expected,
                actual: out.len(),
            });
        }

        let mut assembler = ArrayAssembler::new(
            out,
            manifest.array_shape(),
            manifest.chunk_shape(),
            manifest.element_size(),
            request.selection(),
        )?;
        let planned = assembler.plan(manifest.chunks())?;
        let tasks = if self.options.coalesce_contiguous_chunks() {
            ChunkReadTask::coalesce(&planned)
        } else {
            planned.into_iter().map(ChunkReadTask::new).collect()
        };

        let mut scheduler = ConcurrentChunkScheduler::new(&self.options);
        if let Some(cancellation) = &request.cancellation {
            scheduler = scheduler.with_cancellation(cancellation.clone());
        }
        let outcome = {
            let context = ChunkReadContext::new(
                &self.pool,
                manifest.compression(),
                &assembler,
                self.options.decode_concurrency(),
            );
            scheduler.run(tasks, &context)?
        };
        assembler.finish()?;
        Ok(outcome)
    }

    /// Read the selection of a variable as elements of type `T`.
    ///
    /// Elements are converted from the byte order of the variable.
    ///
    /// # Errors
    /// Returns [`ReadError::IncompatibleElementSize`] if the size of `T` is not the element size of the variable.
    /// See [`read_into`](Self::read_into) for other errors.
    pub fn read_elements<T: Element>(&self, request: &ReadRequest) -> Result<Vec<T>, ReadError> {
        let manifest = request.manifest();
        if T::SIZE != manifest.element_size() {
            return Err(ReadError::IncompatibleElementSize {
                expected: manifest.element_size(),
                actual: T::SIZE,
            });
        }
        let bytes = self.read(request)?;
        elements_from_bytes(&bytes, manifest.byte_order()).ok_or(ReadError::InvalidOutputLength {
            expected: bytes.len() as u64,
            actual: bytes.len(),
        })
    }
}
