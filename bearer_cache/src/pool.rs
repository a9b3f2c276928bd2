//! Named single-worker runtimes, shared by identity
//!
//! Every background refresh job runs on a dedicated tokio runtime with exactly
//! one worker thread. Runtimes are keyed by their name prefix and background
//! flag so that constructing many caches with the same identity reuses one
//! worker instead of starting a thread per cache.
//!
//! Worker threads are named `<prefix>-thread-<n>`, or
//! `<prefix>-daemon-thread-<n>` for background pools, with `n` counting up
//! from 1 within each pool.

use crate::Error;
use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, OnceLock, PoisonError,
    },
    time::Duration,
};
use tokio::runtime::{Builder, Handle, Runtime};

/// How long dropping a foreground pool waits for in-flight work
const FOREGROUND_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A registry of worker pools keyed by identity
///
/// Pools are created lazily on first request and are never evicted; the
/// number of distinct identities used by an application is expected to be
/// small and fixed. Pass a registry to each [`TokenCache`][crate::TokenCache]
/// that should share workers, or use [`WorkerPools::shared()`] for a single
/// process-wide registry.
#[derive(Debug, Default)]
pub struct WorkerPools {
    pools: Mutex<HashMap<String, WorkerPool>>,
}

impl WorkerPools {
    /// Constructs an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-scoped registry
    pub fn shared() -> &'static WorkerPools {
        static SHARED: OnceLock<WorkerPools> = OnceLock::new();
        SHARED.get_or_init(WorkerPools::new)
    }

    /// Gets the pool for the given identity, starting it if necessary
    ///
    /// Fails with [`Error::InvalidArgument`] if `name_prefix` is empty.
    pub fn get(&self, name_prefix: &str, background: bool) -> Result<WorkerPool, Error> {
        if name_prefix.is_empty() {
            return Err(Error::InvalidArgument("worker pool name prefix cannot be empty"));
        }

        let key = thread_name_prefix(name_prefix, background);
        let mut pools = self.pools.lock().unwrap_or_else(PoisonError::into_inner);
        match pools.entry(key) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let pool = WorkerPool::start(name_prefix, entry.key().clone(), background)?;
                tracing::debug!(
                    pool = %entry.key(),
                    background,
                    "started worker pool"
                );
                Ok(entry.insert(pool).clone())
            }
        }
    }

    /// The number of distinct pools started by this registry
    pub fn len(&self) -> usize {
        self.pools
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether this registry has not started any pool yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn thread_name_prefix(name_prefix: &str, background: bool) -> String {
    let mut amended = String::with_capacity(name_prefix.len() + 15);
    amended.push_str(name_prefix);
    if background {
        amended.push_str("-daemon");
    }
    amended.push_str("-thread-");
    amended
}

/// A handle to a shared single-worker runtime
///
/// Cloning is cheap. The runtime is shut down once the registry and every
/// clone have been dropped.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    name_prefix: String,
    thread_name_prefix: String,
    background: bool,
    handle: Handle,
    runtime: Option<Runtime>,
}

impl WorkerPool {
    fn start(
        name_prefix: &str,
        thread_name_prefix: String,
        background: bool,
    ) -> Result<Self, Error> {
        let next_thread = AtomicUsize::new(1);
        let names = thread_name_prefix.clone();
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name_fn(move || {
                format!("{}{}", names, next_thread.fetch_add(1, Ordering::Relaxed))
            })
            .enable_all()
            .build()
            .map_err(|source| Error::PoolStart {
                name: thread_name_prefix.clone(),
                source,
            })?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                name_prefix: name_prefix.to_owned(),
                thread_name_prefix,
                background,
                handle: runtime.handle().clone(),
                runtime: Some(runtime),
            }),
        })
    }

    /// The name prefix this pool was requested with
    #[inline]
    pub fn name_prefix(&self) -> &str {
        &self.inner.name_prefix
    }

    /// The prefix shared by the names of this pool's threads
    #[inline]
    pub fn thread_name_prefix(&self) -> &str {
        &self.inner.thread_name_prefix
    }

    /// Whether this is a background pool
    #[inline]
    pub fn is_background(&self) -> bool {
        self.inner.background
    }

    /// A handle for spawning work onto this pool
    #[inline]
    pub fn handle(&self) -> &Handle {
        &self.inner.handle
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            tracing::debug!(pool = %self.thread_name_prefix, "shutting down worker pool");
            // Blocking on shutdown is not allowed from within a runtime.
            if self.background || Handle::try_current().is_ok() {
                runtime.shutdown_background();
            } else {
                runtime.shutdown_timeout(FOREGROUND_SHUTDOWN_GRACE);
            }
        }
    }
}
