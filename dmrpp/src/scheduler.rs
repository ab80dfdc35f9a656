use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use derive_more::Display;
use parking_lot::Mutex;

use crate::storage::StorageError;
use crate::{
    AggregateFailure, CancellationToken, ChunkReadContext, ChunkReadError, ChunkReadTask,
    ReadError, ReaderOptions, RetryPolicy,
};

/// The state of a scheduler run.
///
/// A run moves from `Idle` to `Dispatching`, then to `AllSucceeded` or `OneOrMoreFailed` once every dispatched task has been joined, and finally to `Drained`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SchedulerState {
    /// No task has been dispatched.
    Idle,
    /// Tasks are being dispatched and joined.
    Dispatching,
    /// Every dispatched task succeeded.
    AllSucceeded,
    /// At least one dispatched task failed.
    OneOrMoreFailed,
    /// Every dispatched task has been joined.
    Drained,
}

/// The outcome of a successful scheduler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOutcome {
    state: SchedulerState,
    parallelism: usize,
    dispatched: usize,
    attempts: usize,
    succeeded: usize,
}

impl SchedulerOutcome {
    /// Return the final state, which is always [`SchedulerState::Drained`].
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Return the number of tasks run concurrently.
    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Return the number of dispatched tasks.
    #[must_use]
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Return the number of task attempts, including retries.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Return the number of tasks that succeeded.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }
}

#[derive(Default)]
struct RunState {
    dispatched: AtomicUsize,
    attempts: AtomicUsize,
    succeeded: AtomicUsize,
    failures: Mutex<Vec<(usize, ChunkReadError)>>,
}

/// Runs chunk read tasks with bounded parallelism.
///
/// Up to the target parallelism, the smaller of the maximum parallel transfers, the handle pool capacity and the number of tasks, tasks run at once.
/// Whenever a task completes, the next queued task is started in its place.
///
/// Every dispatched task is joined, including tasks dispatched after a failure, before the run returns.
/// The failures of a run are reported once as an [`AggregateFailure`].
///
/// The scheduler runs tasks on scoped threads, with the calling thread as one of the workers.
/// If parallel transfers are disabled, tasks run one at a time on the calling thread.
#[derive(Debug, Clone)]
pub struct ConcurrentChunkScheduler {
    parallel_transfers_enabled: bool,
    max_parallel_transfers: usize,
    retry_policy: RetryPolicy,
    cancellation: Option<CancellationToken>,
}

impl ConcurrentChunkScheduler {
    /// Create a new scheduler configured by `options`.
    #[must_use]
    pub fn new(options: &ReaderOptions) -> Self {
        Self {
            parallel_transfers_enabled: options.parallel_transfers_enabled(),
            max_parallel_transfers: options.max_parallel_transfers(),
            retry_policy: options.retry_policy(),
            cancellation: None,
        }
    }

    /// Stop dispatching tasks once `cancellation` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    /// Return the number of tasks to run at once for `num_tasks` tasks with a handle pool of `pool_capacity`.
    #[must_use]
    pub fn target_parallelism(&self, pool_capacity: usize, num_tasks: usize) -> usize {
        if self.parallel_transfers_enabled {
            self.max_parallel_transfers
                .max(1)
                .min(pool_capacity)
                .min(num_tasks)
        } else {
            num_tasks.min(1)
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Run `tasks` to completion.
    ///
    /// # Errors
    /// Returns a [`ReadError`] if
    /// - the handle pool has a capacity of zero ([`StorageError::ResourceExhausted`]),
    /// - one or more tasks failed ([`ReadError::AggregateFailure`]), or
    /// - the run was cancelled before every task was dispatched ([`ReadError::Cancelled`]).
    pub fn run(
        &self,
        tasks: Vec<ChunkReadTask<'_>>,
        context: &ChunkReadContext,
    ) -> Result<SchedulerOutcome, ReadError> {
        let num_tasks = tasks.len();
        let pool_capacity = context.pool().capacity();
        if pool_capacity == 0 {
            return Err(StorageError::ResourceExhausted(
                "the handle pool has a capacity of zero".to_string(),
            )
            .into());
        }

        let parallelism = self.target_parallelism(pool_capacity, num_tasks);
        log::debug!(
            "dispatching {num_tasks} chunk reads with parallelism {parallelism} ({})",
            if parallelism > 1 { "parallel" } else { "serial" }
        );
        log::trace!(
            "scheduler {} -> {}",
            SchedulerState::Idle,
            SchedulerState::Dispatching
        );

        let queue = Mutex::new(tasks.into_iter().enumerate().collect::<VecDeque<_>>());
        let state = RunState::default();
        let worker = || {
            while !self.is_cancelled() {
                let Some((index, task)) = queue.lock().pop_front() else {
                    break;
                };
                state.dispatched.fetch_add(1, Ordering::Relaxed);
                match self.run_task(&task, context, &state.attempts) {
                    Ok(()) => {
                        state.succeeded.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(err) => state.failures.lock().push((index, err)),
                }
            }
        };

        if parallelism > 1 {
            thread::scope(|scope| {
                for i in 1..parallelism {
                    if let Err(err) = thread::Builder::new()
                        .name(format!("dmrpp-chunk-read-{i}"))
                        .spawn_scoped(scope, &worker)
                    {
                        log::warn!("failed to spawn chunk read worker: {err}");
                    }
                }
                worker();
            });
        } else {
            worker();
        }

        let RunState {
            dispatched,
            attempts,
            succeeded,
            failures,
        } = state;
        let dispatched = dispatched.into_inner();
        let mut failures = failures.into_inner();
        failures.sort_by_key(|(index, _)| *index);

        let joined = if failures.is_empty() {
            SchedulerState::AllSucceeded
        } else {
            SchedulerState::OneOrMoreFailed
        };
        log::trace!("scheduler {} -> {joined}", SchedulerState::Dispatching);
        log::trace!("scheduler {joined} -> {}", SchedulerState::Drained);

        if !failures.is_empty() {
            let failures = failures.into_iter().map(|(_, err)| err).collect();
            return Err(AggregateFailure::new(failures, dispatched).into());
        }
        let skipped = num_tasks - dispatched;
        if skipped > 0 {
            log::warn!("read cancelled, skipped {skipped} of {num_tasks} chunk reads");
            return Err(ReadError::Cancelled {
                dispatched,
                skipped,
            });
        }
        Ok(SchedulerOutcome {
            state: SchedulerState::Drained,
            parallelism,
            dispatched,
            attempts: attempts.into_inner(),
            succeeded: succeeded.into_inner(),
        })
    }

    /// Run one task, retrying transient failures under the retry policy.
    fn run_task(
        &self,
        task: &ChunkReadTask,
        context: &ChunkReadContext,
        attempts: &AtomicUsize,
    ) -> Result<(), ChunkReadError> {
        let max_attempts = self.retry_policy.max_attempts();
        let mut attempt = 1;
        loop {
            attempts.fetch_add(1, Ordering::Relaxed);
            match task.run(context) {
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    log::warn!("retrying chunk read (attempt {attempt} of {max_attempts} failed): {err}");
                    if !self.retry_policy.delay().is_zero() {
                        thread::sleep(self.retry_policy.delay());
                    }
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
