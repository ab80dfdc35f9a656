use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};

use parking_lot::{Condvar, Mutex};

use crate::{StorageError, TransferHandle, TransferHandleTraits, Transport};

#[derive(Default)]
struct HandlePoolState {
    idle: Vec<TransferHandle>,
    created: usize,
    outstanding: usize,
    peak_outstanding: usize,
}

impl HandlePoolState {
    fn check_out(&mut self) {
        self.outstanding += 1;
        self.peak_outstanding = self.peak_outstanding.max(self.outstanding);
    }
}

/// A bounded pool of reusable transfer handles.
///
/// Handles are created lazily by the pool's [`Transport`] up to `max_handles`, and are returned to the pool when a [`PooledHandle`] is dropped.
/// Idle handles are kept until the pool itself is dropped.
///
/// The number of handles outstanding at any time never exceeds `max_handles`.
/// [`acquire`](HandlePool::acquire) blocks while every handle is outstanding.
///
/// ### Example
/// ```rust
/// # use std::sync::Arc;
/// # use dmrpp_storage::{fetch_range, ChunkSource, HandlePool};
/// # use dmrpp_storage::byte_range::ByteRange;
/// # use dmrpp_storage::transport::MemoryTransport;
/// let transport = Arc::new(MemoryTransport::new());
/// let source = ChunkSource::new("memory://granule")?;
/// transport.set(&source, vec![0u8, 1, 2, 3, 4, 5, 6, 7]);
///
/// let pool = HandlePool::new(transport, 2);
/// let mut out = vec![0u8; 4];
/// {
///     let mut handle = pool.acquire()?;
///     fetch_range(&mut *handle, &source, ByteRange::new(4, 4), &mut out)?;
/// } // the handle is returned to the pool here
/// assert_eq!(out, [4, 5, 6, 7]);
/// assert_eq!(pool.outstanding(), 0);
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// ```
pub struct HandlePool {
    transport: Transport,
    max_handles: usize,
    state: Mutex<HandlePoolState>,
    handle_returned: Condvar,
}

impl std::fmt::Debug for HandlePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("HandlePool")
            .field("max_handles", &self.max_handles)
            .field("created", &state.created)
            .field("outstanding", &state.outstanding)
            .field("idle", &state.idle.len())
            .finish_non_exhaustive()
    }
}

impl HandlePool {
    /// Create a new handle pool that creates up to `max_handles` handles with `transport`.
    ///
    /// No handles are created until they are first acquired.
    #[must_use]
    pub fn new(transport: Transport, max_handles: usize) -> Self {
        Self {
            transport,
            max_handles,
            state: Mutex::default(),
            handle_returned: Condvar::new(),
        }
    }

    /// Return the transport of the pool.
    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Return the maximum number of handles the pool will create.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max_handles
    }

    /// Return the number of handles created so far.
    #[must_use]
    pub fn created(&self) -> usize {
        self.state.lock().created
    }

    /// Return the number of handles currently acquired.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    /// Return the number of created handles waiting in the pool.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Return the largest number of handles that have been acquired at the same time.
    #[must_use]
    pub fn peak_outstanding(&self) -> usize {
        self.state.lock().peak_outstanding
    }

    /// Acquire a transfer handle, blocking until one is available.
    ///
    /// An idle handle is reused if one exists, otherwise a new handle is created if the pool is below capacity.
    /// The handle is returned to the pool when the [`PooledHandle`] is dropped, on every exit path.
    ///
    /// # Errors
    /// Returns [`StorageError::ResourceExhausted`] if the pool has a capacity of zero or a new handle cannot be created.
    pub fn acquire(&self) -> Result<PooledHandle<'_>, StorageError> {
        if self.max_handles == 0 {
            return Err(StorageError::ResourceExhausted(
                "the handle pool has a capacity of zero".to_string(),
            ));
        }
        let mut state = self.state.lock();
        loop {
            if let Some(handle) = state.idle.pop() {
                state.check_out();
                return Ok(PooledHandle::new(self, handle));
            }
            if state.created < self.max_handles {
                state.created += 1;
                state.check_out();
                drop(state);
                return self.create_handle();
            }
            self.handle_returned.wait(&mut state);
        }
    }

    /// Acquire a transfer handle if one is available without blocking.
    ///
    /// Returns [`None`] if every handle is outstanding.
    ///
    /// # Errors
    /// Returns [`StorageError::ResourceExhausted`] if the pool has a capacity of zero or a new handle cannot be created.
    pub fn try_acquire(&self) -> Result<Option<PooledHandle<'_>>, StorageError> {
        if self.max_handles == 0 {
            return Err(StorageError::ResourceExhausted(
                "the handle pool has a capacity of zero".to_string(),
            ));
        }
        let mut state = self.state.lock();
        if let Some(handle) = state.idle.pop() {
            state.check_out();
            Ok(Some(PooledHandle::new(self, handle)))
        } else if state.created < self.max_handles {
            state.created += 1;
            state.check_out();
            drop(state);
            self.create_handle().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Create a handle for a slot already reserved in the pool state.
    fn create_handle(&self) -> Result<PooledHandle<'_>, StorageError> {
        match self.transport.create_handle() {
            Ok(handle) => {
                log::debug!(
                    "created transfer handle ({} of at most {})",
                    self.created(),
                    self.max_handles
                );
                Ok(PooledHandle::new(self, handle))
            }
            Err(err) => {
                {
                    let mut state = self.state.lock();
                    state.created -= 1;
                    state.outstanding -= 1;
                }
                self.handle_returned.notify_one();
                Err(StorageError::ResourceExhausted(format!(
                    "failed to create a transfer handle: {err}"
                )))
            }
        }
    }

    fn release(&self, handle: TransferHandle) {
        {
            let mut state = self.state.lock();
            state.outstanding -= 1;
            state.idle.push(handle);
        }
        self.handle_returned.notify_one();
    }
}

impl Drop for HandlePool {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        log::debug!(
            "tearing down handle pool with {} transfer handles",
            state.idle.len()
        );
        state.idle.clear();
    }
}

/// A transfer handle acquired from a [`HandlePool`].
///
/// The handle is returned to the pool when this guard is dropped.
pub struct PooledHandle<'a> {
    pool: &'a HandlePool,
    handle: ManuallyDrop<TransferHandle>,
}

impl<'a> PooledHandle<'a> {
    fn new(pool: &'a HandlePool, handle: TransferHandle) -> Self {
        Self {
            pool,
            handle: ManuallyDrop::new(handle),
        }
    }

    /// Return the handle to the pool.
    ///
    /// Equivalent to dropping the guard.
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for PooledHandle<'_> {
    type Target = dyn TransferHandleTraits;

    fn deref(&self) -> &Self::Target {
        &**self.handle
    }
}

impl DerefMut for PooledHandle<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut **self.handle
    }
}

impl Drop for PooledHandle<'_> {
    fn drop(&mut self) {
        // SAFETY: the handle is never accessed after being taken
        let handle = unsafe { ManuallyDrop::take(&mut self.handle) };
        self.pool.release(handle);
    }
}
