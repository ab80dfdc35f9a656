//! A transport adapter which records performance metrics.

use std::io::Read;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crate::byte_range::ByteRange;
use crate::{
    ChunkSource, RangeBody, StorageError, TransferHandle, TransferHandleTraits, TransportTraits,
};

#[derive(Debug, Default)]
struct TransferMetrics {
    handles_created: AtomicUsize,
    range_requests: AtomicUsize,
    bytes_received: AtomicUsize,
}

/// The performance metrics transport adapter. Accumulates metrics, such as handles created and bytes received.
///
/// It is intended to aid in testing by allowing the application to validate that metrics (e.g., range requests, bytes received) match expected values for specific operations.
///
/// ### Example
/// ```rust
/// # use std::sync::Arc;
/// # use dmrpp_storage::transport::MemoryTransport;
/// # use dmrpp_storage::transport_adapter::performance_metrics::PerformanceMetricsTransportAdapter;
/// let transport = Arc::new(MemoryTransport::new());
/// let transport = Arc::new(PerformanceMetricsTransportAdapter::new(transport));
/// // do some reads...
/// // assert_eq!(transport.handles_created(), ...);
/// // assert_eq!(transport.range_requests(), ...);
/// // assert_eq!(transport.bytes_received(), ...);
/// ```
#[derive(Debug)]
pub struct PerformanceMetricsTransportAdapter<TTransport: ?Sized> {
    transport: Arc<TTransport>,
    metrics: Arc<TransferMetrics>,
}

impl<TTransport: ?Sized> PerformanceMetricsTransportAdapter<TTransport> {
    /// Create a new performance metrics transport adapter.
    #[must_use]
    pub fn new(transport: Arc<TTransport>) -> Self {
        Self {
            transport,
            metrics: Arc::default(),
        }
    }

    /// Reset the performance metrics.
    pub fn reset(&self) {
        self.metrics.handles_created.store(0, Ordering::Relaxed);
        self.metrics.range_requests.store(0, Ordering::Relaxed);
        self.metrics.bytes_received.store(0, Ordering::Relaxed);
    }

    /// Returns the number of transfer handles created.
    pub fn handles_created(&self) -> usize {
        self.metrics.handles_created.load(Ordering::Relaxed)
    }

    /// Returns the number of range requests issued.
    ///
    /// Includes requests that failed.
    pub fn range_requests(&self) -> usize {
        self.metrics.range_requests.load(Ordering::Relaxed)
    }

    /// Returns the number of bytes read from response bodies.
    pub fn bytes_received(&self) -> usize {
        self.metrics.bytes_received.load(Ordering::Relaxed)
    }
}

impl<TTransport: ?Sized + TransportTraits> TransportTraits
    for PerformanceMetricsTransportAdapter<TTransport>
{
    fn create_handle(&self) -> Result<TransferHandle, StorageError> {
        let handle = self.transport.create_handle()?;
        self.metrics.handles_created.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(PerformanceMetricsTransferHandle {
            handle,
            metrics: self.metrics.clone(),
        }))
    }
}

struct PerformanceMetricsTransferHandle {
    handle: TransferHandle,
    metrics: Arc<TransferMetrics>,
}

impl TransferHandleTraits for PerformanceMetricsTransferHandle {
    fn open_range(
        &mut self,
        source: &ChunkSource,
        byte_range: ByteRange,
    ) -> Result<RangeBody<'_>, StorageError> {
        self.metrics.range_requests.fetch_add(1, Ordering::Relaxed);
        let body = self.handle.open_range(source, byte_range)?;
        Ok(Box::new(CountingBody {
            body,
            metrics: &self.metrics,
        }))
    }
}

struct CountingBody<'a> {
    body: RangeBody<'a>,
    metrics: &'a TransferMetrics,
}

impl Read for CountingBody<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read = self.body.read(buf)?;
        self.metrics.bytes_received.fetch_add(read, Ordering::Relaxed);
        Ok(read)
    }
}
