#![allow(missing_docs)]

use std::error::Error;
use std::sync::Arc;

use dmrpp_filesystem::FilesystemTransport;
use dmrpp_storage::byte_range::ByteRange;
use dmrpp_storage::{fetch_range, ChunkSource, HandlePool, StorageError};

#[test]
#[cfg_attr(miri, ignore)]
fn filesystem() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("granule.h5");
    std::fs::write(&path, (0u8..64).collect::<Vec<_>>())?;
    let source = ChunkSource::from_path(&path)?;

    let pool = HandlePool::new(Arc::new(FilesystemTransport::new_with_root(dir.path())?), 2);
    let mut handle = pool.acquire()?;

    let mut out = vec![0u8; 8];
    fetch_range(&mut *handle, &source, ByteRange::new(16, 8), &mut out)?;
    assert_eq!(out, (16u8..24).collect::<Vec<_>>());

    // The file ends before the range does
    assert!(matches!(
        fetch_range(&mut *handle, &source, ByteRange::new(60, 8), &mut out),
        Err(StorageError::ShortRead {
            expected: 8,
            received: 4
        })
    ));

    // The range starts past the end of the file
    assert!(matches!(
        fetch_range(&mut *handle, &source, ByteRange::new(64, 8), &mut out),
        Err(StorageError::NotFound(_))
    ));

    let missing = ChunkSource::from_path(dir.path().join("missing.h5"))?;
    assert!(matches!(
        fetch_range(&mut *handle, &missing, ByteRange::new(0, 8), &mut out),
        Err(StorageError::NotFound(_))
    ));

    let http = ChunkSource::new("http://localhost/granule.h5")?;
    assert!(matches!(
        fetch_range(&mut *handle, &http, ByteRange::new(0, 8), &mut out),
        Err(StorageError::UnsupportedSource(_))
    ));

    drop(handle);
    assert_eq!(pool.outstanding(), 0);
    Ok(())
}

#[test]
#[cfg_attr(miri, ignore)]
fn filesystem_root_restriction() -> Result<(), Box<dyn Error>> {
    let root = tempfile::TempDir::new()?;
    let outside = tempfile::TempDir::new()?;
    let path = outside.path().join("granule.h5");
    std::fs::write(&path, [0u8; 16])?;
    let source = ChunkSource::from_path(&path)?;

    let transport = FilesystemTransport::new_with_root(root.path())?;
    assert!(transport.root().is_some());
    let pool = HandlePool::new(Arc::new(transport), 1);
    let mut handle = pool.acquire()?;
    let mut out = vec![0u8; 8];
    assert!(matches!(
        fetch_range(&mut *handle, &source, ByteRange::new(0, 8), &mut out),
        Err(StorageError::UnsupportedSource(_))
    ));
    Ok(())
}
