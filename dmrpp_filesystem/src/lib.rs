//! A local file transport for the [`dmrpp`](https://docs.rs/dmrpp/latest/dmrpp/index.html) crate.
//!
//! [`FilesystemTransport`] reads byte ranges of `file://` chunk sources.
//! Each transfer handle keeps the most recently used file open, so consecutive chunks of the same file reuse one file descriptor.
//!
//! ## Licence
//! `dmrpp_filesystem` is licensed under either of
//! - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//! - the MIT license <http://opensource.org/licenses/MIT>, at your option.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use dmrpp_storage::byte_range::ByteRange;
use dmrpp_storage::{
    ChunkSource, RangeBody, StorageError, TransferHandle, TransferHandleTraits, TransportTraits,
};
use thiserror::Error;

/// A local file transport.
///
/// A transport created with [`FilesystemTransport::new_with_root`] only reads files below its root directory.
#[derive(Debug, Clone, Default)]
pub struct FilesystemTransport {
    root: Option<PathBuf>,
}

/// A filesystem transport creation error.
#[derive(Debug, Error)]
pub enum FilesystemTransportCreateError {
    /// The root path is not a directory.
    #[error("root path {0} is not a directory")]
    InvalidRootPath(PathBuf),
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

impl FilesystemTransport {
    /// Create a new filesystem transport that may read any file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new filesystem transport restricted to files below `root`.
    ///
    /// # Errors
    /// Returns a [`FilesystemTransportCreateError`] if `root` is not an existing directory.
    pub fn new_with_root<P: AsRef<Path>>(root: P) -> Result<Self, FilesystemTransportCreateError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(FilesystemTransportCreateError::InvalidRootPath(
                root.to_path_buf(),
            ));
        }
        Ok(Self {
            root: Some(root.canonicalize()?),
        })
    }

    /// Return the root directory, if the transport is restricted to one.
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}

impl TransportTraits for FilesystemTransport {
    fn create_handle(&self) -> Result<TransferHandle, StorageError> {
        Ok(Box::new(FilesystemTransferHandle {
            root: self.root.clone(),
            open_file: None,
        }))
    }
}

struct FilesystemTransferHandle {
    root: Option<PathBuf>,
    open_file: Option<(PathBuf, File)>,
}

fn map_open_error(source: &ChunkSource, err: std::io::Error) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::NotFound(source.to_string())
    } else {
        err.into()
    }
}

impl FilesystemTransferHandle {
    fn open(&self, source: &ChunkSource, path: &Path) -> Result<File, StorageError> {
        let path = path
            .canonicalize()
            .map_err(|err| map_open_error(source, err))?;
        if let Some(root) = &self.root {
            if !path.starts_with(root) {
                return Err(StorageError::UnsupportedSource(source.clone()));
            }
        }
        let file = File::open(&path).map_err(|err| map_open_error(source, err))?;
        log::trace!("opened {}", path.display());
        Ok(file)
    }

    fn file(&mut self, source: &ChunkSource) -> Result<&mut File, StorageError> {
        let path = source
            .to_file_path()
            .ok_or_else(|| StorageError::UnsupportedSource(source.clone()))?;
        let reuse = matches!(&self.open_file, Some((open_path, _)) if *open_path == path);
        if !reuse {
            let file = self.open(source, &path)?;
            self.open_file = Some((path, file));
        }
        match &mut self.open_file {
            Some((_, file)) => Ok(file),
            None => Err(StorageError::NotFound(source.to_string())),
        }
    }
}

impl TransferHandleTraits for FilesystemTransferHandle {
    fn open_range(
        &mut self,
        source: &ChunkSource,
        byte_range: ByteRange,
    ) -> Result<RangeBody<'_>, StorageError> {
        let file = self.file(source)?;
        let size = file.metadata()?.len();
        if byte_range.offset() >= size {
            return Err(StorageError::NotFound(format!("{source} [{byte_range}]")));
        }
        file.seek(SeekFrom::Start(byte_range.offset()))?;
        Ok(Box::new(file.take(byte_range.length())))
    }
}
