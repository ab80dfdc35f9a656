//! `dmrpp` is a concurrent reader for chunked array variables stored in HDF5 and netCDF-4 files.
//!
//! A variable is described by a manifest ([`VariableManifest`]) in the style of a DMR++ document: the array and chunk shapes, the element size and byte order, the compression pipeline, and the location of every chunk as a byte range in a (possibly remote) object.
//! `dmrpp` reads such a variable, or a [`Hyperslab`] of it, without an HDF5 library:
//! - chunks intersecting the selection are fetched with range requests through a bounded pool of reusable transfer handles ([`storage::HandlePool`]),
//! - each chunk is decoded by its compression pipeline ([`codec::decode`]: deflate, shuffle and fletcher32 in the legacy or declared filter order), and
//! - decoded chunks are copied into their disjoint regions of the destination buffer ([`ArrayAssembler`]).
//!
//! Chunk reads run concurrently under a [`ConcurrentChunkScheduler`] with bounded parallelism.
//! Every dispatched chunk read is joined before a read returns, and failures are reported together as an [`AggregateFailure`] naming the failing chunks.
//!
//! ## Example
//! ```rust
//! # use std::sync::Arc;
//! # use dmrpp::{Hyperslab, ReadRequest, ReadSession, ReaderOptions, VariableManifest};
//! # use dmrpp::storage::ChunkSource;
//! # use dmrpp::storage::transport::MemoryTransport;
//! let source = ChunkSource::new("memory://granule")?;
//! let transport = Arc::new(MemoryTransport::new());
//! transport.set(&source, (0u8..16).collect::<Vec<_>>());
//!
//! // a [4, 4] u8 array stored as four [2, 2] chunks
//! let manifest = VariableManifest::from_json(r#"{
//!     "array_shape": [4, 4],
//!     "chunk_shape": [2, 2],
//!     "element_size": 1,
//!     "compression": {"filters": [], "order": "declared"},
//!     "chunks": [
//!         {"source": "memory://granule", "byte_offset": 0, "byte_length": 4, "position_in_array": "[0,0]"},
//!         {"source": "memory://granule", "byte_offset": 4, "byte_length": 4, "position_in_array": "[0,2]"},
//!         {"source": "memory://granule", "byte_offset": 8, "byte_length": 4, "position_in_array": "[2,0]"},
//!         {"source": "memory://granule", "byte_offset": 12, "byte_length": 4, "position_in_array": "[2,2]"}
//!     ]
//! }"#)?;
//!
//! let options = ReaderOptions::default().with_max_parallel_transfers(2);
//! let session = ReadSession::new(transport, options);
//! let bytes = session.read(&ReadRequest::new(&manifest))?;
//! assert_eq!(bytes, [0, 1, 4, 5, 2, 3, 6, 7, 8, 9, 12, 13, 10, 11, 14, 15]);
//!
//! // the first column
//! let selection = Hyperslab::new_contiguous(vec![0, 0], vec![4, 1])?;
//! let column: Vec<u8> = session.read_elements(&ReadRequest::new(&manifest).with_selection(selection))?;
//! assert_eq!(column, [0, 2, 8, 10]);
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - `filesystem`: Re-export [`dmrpp_filesystem`] as [`dmrpp::filesystem`](crate::filesystem).
//!
//! #### Non-Default
//!  - `http`: Re-export `dmrpp_http` as `dmrpp::http`, a blocking HTTP range request transport.
//!
//! ## Licence
//! `dmrpp` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted for inclusion in the work by you, as defined in the Apache-2.0 license, shall be dual licensed as above, without any additional terms or conditions.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod array_assembler;
mod cancellation;
mod chunk_descriptor;
mod chunk_read_task;
mod element;
mod error;
mod hyperslab;
mod manifest;
pub mod options;
mod scheduler;
mod session;

pub use array_assembler::{place, ArrayAssembler, AssemblyError};
pub use cancellation::CancellationToken;
pub use chunk_descriptor::{parse_position_in_array, ChunkDescriptor, ChunkDescriptorError};
pub use chunk_read_task::{ChunkReadContext, ChunkReadTask};
pub use element::{elements_from_bytes, ByteOrder, Element};
pub use error::{AggregateFailure, ChunkReadError, ChunkReadErrorKind, ReadError};
pub use hyperslab::{Hyperslab, HyperslabError};
pub use manifest::{ManifestError, VariableManifest};
pub use options::{ReaderOptions, RetryPolicy};
pub use scheduler::{ConcurrentChunkScheduler, SchedulerOutcome, SchedulerState};
pub use session::{ReadRequest, ReadSession};

pub use dmrpp_codec as codec;
#[cfg(feature = "filesystem")]
pub use dmrpp_filesystem as filesystem;
#[cfg(feature = "http")]
pub use dmrpp_http as http;
pub use dmrpp_storage as storage;

use rayon_iter_concurrent_limit::iter_concurrent_limit;
