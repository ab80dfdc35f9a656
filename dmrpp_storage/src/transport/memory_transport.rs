//! An in-memory transport.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::byte_range::ByteRange;
use crate::{
    Bytes, ChunkSource, RangeBody, StorageError, TransferHandle, TransferHandleTraits,
    TransportTraits,
};

type MemoryObjects = Arc<RwLock<BTreeMap<ChunkSource, Bytes>>>;

/// An in-memory transport.
///
/// Objects are held in memory and keyed by [`ChunkSource`].
/// Transfer handles created by the transport share the objects, so objects set after a handle is created are visible to it.
///
/// A range extending past the end of an object yields the available bytes (a short read).
/// A range starting past the end of an object is [`StorageError::NotFound`].
#[derive(Debug, Default)]
pub struct MemoryTransport {
    objects: MemoryObjects,
}

impl MemoryTransport {
    /// Create a new, empty, memory transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the object at `source`.
    pub fn set(&self, source: &ChunkSource, value: impl Into<Bytes>) {
        self.objects.write().insert(source.clone(), value.into());
    }

    /// Return the object at `source`.
    #[must_use]
    pub fn get(&self, source: &ChunkSource) -> Option<Bytes> {
        self.objects.read().get(source).cloned()
    }

    /// Remove the object at `source`.
    pub fn erase(&self, source: &ChunkSource) {
        self.objects.write().remove(source);
    }
}

impl TransportTraits for MemoryTransport {
    fn create_handle(&self) -> Result<TransferHandle, StorageError> {
        Ok(Box::new(MemoryTransferHandle {
            objects: self.objects.clone(),
        }))
    }
}

struct MemoryTransferHandle {
    objects: MemoryObjects,
}

impl TransferHandleTraits for MemoryTransferHandle {
    fn open_range(
        &mut self,
        source: &ChunkSource,
        byte_range: ByteRange,
    ) -> Result<RangeBody<'_>, StorageError> {
        let object = self
            .objects
            .read()
            .get(source)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(source.to_string()))?;
        let unavailable = || StorageError::NotFound(format!("{source} [{byte_range}]"));
        let start = usize::try_from(byte_range.offset()).map_err(|_| unavailable())?;
        if start >= object.len() {
            return Err(unavailable());
        }
        let end = usize::try_from(byte_range.end())
            .unwrap_or(usize::MAX)
            .min(object.len());
        Ok(Box::new(Cursor::new(object.slice(start..end))))
    }
}

#[cfg(test)]
mod tests {
    use crate::fetch_range;

    use super::*;

    #[test]
    fn memory_transport_read() {
        let transport = MemoryTransport::new();
        let source = ChunkSource::new("memory://a").unwrap();
        transport.set(&source, vec![0u8, 1, 2, 3, 4, 5]);
        assert_eq!(transport.get(&source).unwrap().len(), 6);

        let mut handle = transport.create_handle().unwrap();
        let mut out = vec![0u8; 3];
        fetch_range(&mut *handle, &source, ByteRange::new(2, 3), &mut out).unwrap();
        assert_eq!(out, [2, 3, 4]);

        let mut out = vec![0u8; 4];
        assert!(matches!(
            fetch_range(&mut *handle, &source, ByteRange::new(4, 4), &mut out),
            Err(StorageError::ShortRead {
                expected: 4,
                received: 2
            })
        ));
        assert!(matches!(
            fetch_range(&mut *handle, &source, ByteRange::new(6, 4), &mut out),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn memory_transport_missing() {
        let transport = MemoryTransport::new();
        let source = ChunkSource::new("memory://a").unwrap();
        let mut handle = transport.create_handle().unwrap();
        transport.set(&source, vec![0u8; 4]);
        transport.erase(&source);
        let mut out = vec![0u8; 4];
        assert!(matches!(
            fetch_range(&mut *handle, &source, ByteRange::new(0, 4), &mut out),
            Err(StorageError::NotFound(_))
        ));
    }
}
