//! A single job that runs once and then reschedules itself
//!
//! The [`Scheduler`] does not loop on its own. It runs its job immediately on
//! [`start()`][Scheduler::start()], and afterwards only when someone calls
//! [`schedule_after()`][Scheduler::schedule_after()]. A job that wants to run
//! periodically reschedules itself once it has finished, which guarantees
//! that two runs of the same job never overlap.

use crate::pool::WorkerPool;
use async_trait::async_trait;
use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio_util::sync::CancellationToken;

/// A unit of work run by a [`Scheduler`]
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Runs the job once
    async fn run(&self);
}

/// Runs a [`Job`] on a worker pool until shut down
///
/// Checking whether the scheduler is still live and submitting work happen
/// under one lock, so `start()`, `schedule_after()` and `shutdown()` may be
/// called concurrently from any thread. The job itself runs outside the lock.
///
/// After [`shutdown()`][Self::shutdown()] every scheduling request is a
/// silent no-op. Dropping the scheduler shuts it down.
pub struct Scheduler {
    job: Arc<dyn Job>,
    state: Mutex<State>,
    cancel_pending: CancellationToken,
}

struct State {
    pool: Option<WorkerPool>,
    started: bool,
}

impl Scheduler {
    /// Constructs a scheduler that will run `job` on `pool`
    ///
    /// Nothing runs until [`start()`][Self::start()] is called.
    pub fn new<J: Job>(pool: WorkerPool, job: J) -> Self {
        Self {
            job: Arc::new(job),
            state: Mutex::new(State {
                pool: Some(pool),
                started: false,
            }),
            cancel_pending: CancellationToken::new(),
        }
    }

    /// Submits the job for immediate execution
    ///
    /// Only the first call has an effect. Does nothing once shut down.
    pub fn start(&self) {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.started {
            tracing::debug!("scheduler already started, ignoring");
            return;
        }

        if let Some(pool) = &state.pool {
            let job = Arc::clone(&self.job);
            pool.handle().spawn(async move { job.run().await });
            state.started = true;
            tracing::trace!(pool = %pool.thread_name_prefix(), "job submitted");
        } else {
            tracing::trace!("scheduler shut down, ignoring start");
        }
    }

    /// Submits the job to run once `delay` has elapsed
    ///
    /// Does nothing once shut down. A run still waiting for its delay when
    /// the scheduler shuts down is dropped without running.
    pub fn schedule_after(&self, delay: Duration) {
        let state = self.lock();
        if let Some(pool) = &state.pool {
            let job = Arc::clone(&self.job);
            let cancelled = self.cancel_pending.clone();
            pool.handle().spawn(async move {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => {
                        tracing::trace!("pending run dropped by shutdown");
                    }
                    _ = tokio::time::sleep(delay) => job.run().await,
                }
            });
            tracing::trace!(
                pool = %pool.thread_name_prefix(),
                delay_ms = delay.as_millis() as u64,
                "job scheduled"
            );
        } else {
            tracing::trace!("scheduler shut down, ignoring schedule request");
        }
    }

    /// Releases the worker pool and prevents any further runs
    ///
    /// A run that is already executing is allowed to finish; its attempt to
    /// reschedule itself will be ignored. Returns `true` only for the call
    /// that actually shut the scheduler down.
    pub fn shutdown(&self) -> bool {
        let pool = self.lock().pool.take();
        match pool {
            Some(pool) => {
                self.cancel_pending.cancel();
                tracing::debug!(pool = %pool.thread_name_prefix(), "scheduler shut down");
                true
            }
            None => false,
        }
    }

    /// Whether [`shutdown()`][Self::shutdown()] has been called
    pub fn is_shut_down(&self) -> bool {
        self.lock().pool.is_none()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Scheduler")
            .field("pool", &state.pool.as_ref().map(|p| p.thread_name_prefix()))
            .field("started", &state.started)
            .finish_non_exhaustive()
    }
}
