//! The chunk decode pipeline for the [`dmrpp`](https://docs.rs/dmrpp/latest/dmrpp/index.html) crate.
//!
//! A chunk of an HDF5 variable is stored with zero or more filters applied, e.g. byte shuffling followed by deflate compression.
//! A [`CompressionPipelineSpec`] lists the [`Filter`]s of a variable together with a [`FilterOrder`] flag selecting how that list is interpreted.
//! [`decode`] reverses the pipeline and checks that the decoded chunk has exactly the expected length.
//!
//! The individual filters are available in the [`deflate`], [`shuffle`] and [`fletcher32`] modules.
//!
//! ## Licence
//! `dmrpp_codec` is licensed under either of
//! - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//! - the MIT license <http://opensource.org/licenses/MIT>, at your option.

pub mod deflate;
mod filter;
pub mod fletcher32;
mod pipeline;
pub mod shuffle;

use std::sync::Arc;

use thiserror::Error;

pub use filter::{Filter, FilterOrder};
pub use pipeline::{decode, CompressionPipelineSpec};

/// A chunk decode error.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The decompressor rejected the stream.
    #[error("corrupt compressed stream: {0}")]
    CorruptStream(String),
    /// The decoded chunk does not have the expected length.
    #[error("decoded size is {actual} bytes, expected {expected}")]
    SizeMismatch {
        /// The expected length in bytes.
        expected: usize,
        /// The actual length in bytes.
        actual: usize,
    },
    /// The filter is not implemented, or not valid for the filter order.
    #[error("unsupported filter `{0}`")]
    UnsupportedFilter(String),
    /// A filter parameter is invalid, e.g. a zero shuffle element size.
    #[error("invalid filter configuration: {0}")]
    InvalidFilterConfiguration(String),
    /// A stored checksum does not match the checksum of the chunk.
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// The checksum stored with the chunk.
        stored: u32,
        /// The checksum computed from the chunk.
        computed: u32,
    },
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] Arc<std::io::Error>),
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        Self::IOError(Arc::new(err))
    }
}
