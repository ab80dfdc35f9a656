use std::io::{ErrorKind, Read};

use crate::{byte_range::ByteRange, ChunkSource, StorageError, TransferHandleTraits};

/// Read exactly `byte_range` of `source` into `out` using a borrowed transfer handle.
///
/// `out` must have the length of `byte_range`.
/// Received bytes are streamed directly into `out`.
/// After `out` is full, the body is probed for one more byte to detect an over read.
///
/// This function never retries.
///
/// # Errors
/// Returns a [`StorageError`] if
/// - `out` is not sized to `byte_range` ([`StorageError::BufferSizeMismatch`]),
/// - the request or reading the body fails ([`StorageError::TransportError`], [`StorageError::NotFound`]),
/// - the body holds fewer bytes than requested ([`StorageError::ShortRead`]), or
/// - the body holds more bytes than requested ([`StorageError::OverRead`]).
pub fn fetch_range(
    handle: &mut dyn TransferHandleTraits,
    source: &ChunkSource,
    byte_range: ByteRange,
    out: &mut [u8],
) -> Result<(), StorageError> {
    let expected = byte_range.length();
    if out.len() as u64 != expected {
        return Err(StorageError::BufferSizeMismatch {
            expected,
            actual: out.len(),
        });
    }

    log::trace!("range request {source} [{byte_range}]");
    let mut body = handle.open_range(source, byte_range)?;

    let mut received = 0;
    while received < out.len() {
        match body.read(&mut out[received..]) {
            Ok(0) => break,
            Ok(read) => received += read,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(StorageError::from_body_error(&err)),
        }
    }
    if received < out.len() {
        return Err(StorageError::ShortRead {
            expected,
            received: received as u64,
        });
    }

    let mut probe = [0u8; 1];
    loop {
        match body.read(&mut probe) {
            Ok(0) => return Ok(()),
            Ok(_) => return Err(StorageError::OverRead { expected }),
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(StorageError::from_body_error(&err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::RangeBody;

    use super::*;

    /// Responds with a fixed body regardless of the requested range.
    struct FixedBodyHandle(Vec<u8>);

    impl TransferHandleTraits for FixedBodyHandle {
        fn open_range(
            &mut self,
            _source: &ChunkSource,
            _byte_range: ByteRange,
        ) -> Result<RangeBody<'_>, StorageError> {
            Ok(Box::new(Cursor::new(self.0.as_slice())))
        }
    }

    /// Yields one byte per read and then fails with a timeout.
    struct StallingBody {
        remaining: usize,
    }

    impl Read for StallingBody {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.remaining == 0 {
                Err(std::io::Error::new(ErrorKind::TimedOut, "operation timed out"))
            } else {
                self.remaining -= 1;
                buf[0] = 7;
                Ok(1)
            }
        }
    }

    struct StallingHandle;

    impl TransferHandleTraits for StallingHandle {
        fn open_range(
            &mut self,
            _source: &ChunkSource,
            _byte_range: ByteRange,
        ) -> Result<RangeBody<'_>, StorageError> {
            Ok(Box::new(StallingBody { remaining: 2 }))
        }
    }

    fn source() -> ChunkSource {
        ChunkSource::new("memory://object").unwrap()
    }

    #[test]
    fn fetch_exact() {
        let mut handle = FixedBodyHandle(vec![1, 2, 3, 4]);
        let mut out = vec![0; 4];
        fetch_range(&mut handle, &source(), ByteRange::new(0, 4), &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn fetch_short_read() {
        let mut handle = FixedBodyHandle(vec![1, 2, 3]);
        let mut out = vec![0; 4];
        let err = fetch_range(&mut handle, &source(), ByteRange::new(0, 4), &mut out).unwrap_err();
        assert!(matches!(
            err,
            StorageError::ShortRead {
                expected: 4,
                received: 3
            }
        ));
        assert!(err.is_transient());
    }

    #[test]
    fn fetch_over_read() {
        let mut handle = FixedBodyHandle(vec![1, 2, 3, 4, 5]);
        let mut out = vec![0; 4];
        let err = fetch_range(&mut handle, &source(), ByteRange::new(0, 4), &mut out).unwrap_err();
        assert!(matches!(err, StorageError::OverRead { expected: 4 }));
        assert!(!err.is_transient());
    }

    #[test]
    fn fetch_buffer_size_mismatch() {
        let mut handle = FixedBodyHandle(vec![1, 2, 3, 4]);
        let mut out = vec![0; 3];
        assert!(matches!(
            fetch_range(&mut handle, &source(), ByteRange::new(0, 4), &mut out),
            Err(StorageError::BufferSizeMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn fetch_timeout_is_transport_error() {
        let mut out = vec![0; 4];
        let err =
            fetch_range(&mut StallingHandle, &source(), ByteRange::new(0, 4), &mut out).unwrap_err();
        match err {
            StorageError::TransportError(message) => assert!(message.starts_with("timed out")),
            err => panic!("unexpected error {err}"),
        }
    }
}
