//! Options for reading variables.

use std::time::Duration;

/// A whole-task retry policy.
///
/// A failed chunk read is retried only if the failure is a transient storage failure (see [`StorageError::is_transient`](crate::storage::StorageError::is_transient)).
/// Decode and assembly failures are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// Create a retry policy that makes up to `max_attempts` attempts per task with no delay between attempts.
    ///
    /// A `max_attempts` of zero behaves as one.
    #[must_use]
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::ZERO,
        }
    }

    /// Create a retry policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Set the delay before each retry.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Return the maximum number of attempts per task, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Return the delay before each retry.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Options for reading variables.
///
/// The default values are:
/// - `parallel_transfers_enabled`: `true`
/// - `max_parallel_transfers`: `8`
/// - `max_pool_size`: `8`
/// - `request_timeout`: 60 seconds
/// - `retry_policy`: [`RetryPolicy::none`]
/// - `coalesce_contiguous_chunks`: `false`
/// - `decode_concurrency`: number of threads available to Rayon
#[derive(Debug, Clone, Copy)]
pub struct ReaderOptions {
    parallel_transfers_enabled: bool,
    max_parallel_transfers: usize,
    max_pool_size: usize,
    request_timeout: Option<Duration>,
    retry_policy: RetryPolicy,
    coalesce_contiguous_chunks: bool,
    decode_concurrency: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            parallel_transfers_enabled: true,
            max_parallel_transfers: 8,
            max_pool_size: 8,
            request_timeout: Some(Duration::from_secs(60)),
            retry_policy: RetryPolicy::none(),
            coalesce_contiguous_chunks: false,
            decode_concurrency: rayon::current_num_threads(),
        }
    }
}

impl ReaderOptions {
    /// Return the parallel transfers enabled setting.
    #[must_use]
    pub fn parallel_transfers_enabled(&self) -> bool {
        self.parallel_transfers_enabled
    }

    /// Set whether chunks are transferred in parallel.
    ///
    /// If disabled, chunks are read one at a time on the calling thread with identical results.
    pub fn set_parallel_transfers_enabled(&mut self, enabled: bool) -> &mut Self {
        self.parallel_transfers_enabled = enabled;
        self
    }

    /// Set whether chunks are transferred in parallel.
    #[must_use]
    pub fn with_parallel_transfers_enabled(mut self, enabled: bool) -> Self {
        self.parallel_transfers_enabled = enabled;
        self
    }

    /// Return the maximum number of parallel transfers.
    #[must_use]
    pub fn max_parallel_transfers(&self) -> usize {
        self.max_parallel_transfers
    }

    /// Set the maximum number of parallel transfers.
    ///
    /// Values less than one behave as one.
    pub fn set_max_parallel_transfers(&mut self, max_parallel_transfers: usize) -> &mut Self {
        self.max_parallel_transfers = max_parallel_transfers;
        self
    }

    /// Set the maximum number of parallel transfers.
    #[must_use]
    pub fn with_max_parallel_transfers(mut self, max_parallel_transfers: usize) -> Self {
        self.max_parallel_transfers = max_parallel_transfers;
        self
    }

    /// Return the maximum number of transfer handles.
    #[must_use]
    pub fn max_pool_size(&self) -> usize {
        self.max_pool_size
    }

    /// Set the maximum number of transfer handles.
    ///
    /// A pool size of zero makes every read fail with [`StorageError::ResourceExhausted`](crate::storage::StorageError::ResourceExhausted).
    pub fn set_max_pool_size(&mut self, max_pool_size: usize) -> &mut Self {
        self.max_pool_size = max_pool_size;
        self
    }

    /// Set the maximum number of transfer handles.
    #[must_use]
    pub fn with_max_pool_size(mut self, max_pool_size: usize) -> Self {
        self.max_pool_size = max_pool_size;
        self
    }

    /// Return the per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Set the per-request timeout of transports created from these options.
    pub fn set_request_timeout(&mut self, request_timeout: Option<Duration>) -> &mut Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Set the per-request timeout of transports created from these options.
    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Option<Duration>) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Return the retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Set the retry policy.
    pub fn set_retry_policy(&mut self, retry_policy: RetryPolicy) -> &mut Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Return the coalesce contiguous chunks setting.
    #[must_use]
    pub fn coalesce_contiguous_chunks(&self) -> bool {
        self.coalesce_contiguous_chunks
    }

    /// Set whether consecutive chunks with contiguous byte ranges in the same source are fetched with one request.
    pub fn set_coalesce_contiguous_chunks(&mut self, coalesce: bool) -> &mut Self {
        self.coalesce_contiguous_chunks = coalesce;
        self
    }

    /// Set whether consecutive chunks with contiguous byte ranges in the same source are fetched with one request.
    #[must_use]
    pub fn with_coalesce_contiguous_chunks(mut self, coalesce: bool) -> Self {
        self.coalesce_contiguous_chunks = coalesce;
        self
    }

    /// Return the decode concurrency.
    #[must_use]
    pub fn decode_concurrency(&self) -> usize {
        self.decode_concurrency
    }

    /// Set the concurrency for decoding the chunks of a coalesced request.
    pub fn set_decode_concurrency(&mut self, decode_concurrency: usize) -> &mut Self {
        self.decode_concurrency = decode_concurrency;
        self
    }

    /// Set the concurrency for decoding the chunks of a coalesced request.
    #[must_use]
    pub fn with_decode_concurrency(mut self, decode_concurrency: usize) -> Self {
        self.decode_concurrency = decode_concurrency;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_options_default() {
        let options = ReaderOptions::default();
        assert!(options.parallel_transfers_enabled());
        assert_eq!(options.max_parallel_transfers(), 8);
        assert_eq!(options.max_pool_size(), 8);
        assert_eq!(options.request_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(options.retry_policy(), RetryPolicy::none());
        assert!(!options.coalesce_contiguous_chunks());
    }

    #[test]
    fn reader_options_builder() {
        let mut options = ReaderOptions::default()
            .with_max_parallel_transfers(2)
            .with_retry_policy(RetryPolicy::new(3).with_delay(Duration::from_millis(5)));
        options
            .set_parallel_transfers_enabled(false)
            .set_max_pool_size(4)
            .set_request_timeout(None);
        assert_eq!(options.max_parallel_transfers(), 2);
        assert_eq!(options.max_pool_size(), 4);
        assert!(!options.parallel_transfers_enabled());
        assert_eq!(options.request_timeout(), None);
        assert_eq!(options.retry_policy().max_attempts(), 3);
        assert_eq!(options.retry_policy().delay(), Duration::from_millis(5));
        assert_eq!(RetryPolicy::new(0).max_attempts(), 1);
    }
}
