//! Transports.
//!
//! This module includes an in-memory transport.
//! See `dmrpp_filesystem` and `dmrpp_http` for local file and HTTP transports.

mod memory_transport;

pub use memory_transport::MemoryTransport;
