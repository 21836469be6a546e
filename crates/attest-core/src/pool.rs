//! Background worker pool for asynchronous verification.
//!
//! A fixed set of named worker threads pulls jobs from a bounded FIFO
//! queue. `submit_with_callback` pairs a unit of work with a completion
//! callback that always runs on the worker, with either the work's result
//! or the panic payload that aborted it.
//!
//! A rejected job (queue full, pool shut down) is handed back to the caller
//! inside `Rejected` so it can decide to run it inline instead.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::error;

/// Workers in the process-wide shared pool.
pub const DEFAULT_WORKERS: usize = 2;

/// Queue capacity of the process-wide shared pool.
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// A boxed unit of background work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A job the pool refused. Run it with `Rejected::run_inline` or drop it.
pub struct Rejected {
    job: Job,
    reason: RejectReason,
}

/// Why the pool refused a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    QueueFull,
    ShutDown,
}

impl Rejected {
    pub fn reason(&self) -> RejectReason {
        self.reason
    }

    /// Execute the refused job on the current thread.
    pub fn run_inline(self) {
        (self.job)()
    }
}

impl std::fmt::Debug for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rejected").field("reason", &self.reason).finish()
    }
}

/// Pool metrics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Jobs waiting in the queue.
    pub queue_depth: usize,
    /// Jobs currently running on a worker.
    pub active_jobs: usize,
    /// Jobs finished (including panicked ones) since the pool was created.
    pub jobs_completed: u64,
    pub worker_count: usize,
}

struct PoolInner {
    queue: Mutex<VecDeque<Job>>,
    work_ready: Condvar,
    drain_cond: Condvar,
    shutdown: AtomicBool,
    active_jobs: AtomicUsize,
    jobs_completed: AtomicU64,
    max_queue_depth: usize,
}

/// Fixed-size worker pool that runs verification units off the caller's thread.
pub struct VerificationPool {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    num_threads: usize,
}

impl VerificationPool {
    /// Start `num_threads` workers (at least one) named `attest-verify-N`.
    pub fn new(num_threads: usize, max_queue_depth: usize) -> Self {
        let num_threads = num_threads.max(1);
        let inner = Arc::new(PoolInner {
            queue: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            drain_cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
            active_jobs: AtomicUsize::new(0),
            jobs_completed: AtomicU64::new(0),
            max_queue_depth,
        });

        let mut workers = Vec::with_capacity(num_threads);
        for i in 0..num_threads {
            let inner_clone = Arc::clone(&inner);
            let handle = std::thread::Builder::new()
                .name(format!("attest-verify-{}", i))
                .spawn(move || worker_loop(&inner_clone))
                .expect("failed to spawn verification worker thread");
            workers.push(handle);
        }

        Self {
            inner,
            workers: Mutex::new(workers),
            num_threads,
        }
    }

    /// The process-wide pool engines use when none is injected.
    pub fn shared() -> Arc<VerificationPool> {
        static SHARED: OnceLock<Arc<VerificationPool>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| {
            Arc::new(VerificationPool::new(DEFAULT_WORKERS, DEFAULT_QUEUE_DEPTH))
        }))
    }

    /// Queue a job.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<(), Rejected> {
        let job: Job = Box::new(job);

        let mut queue = self.inner.queue.lock();
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(Rejected {
                job,
                reason: RejectReason::ShutDown,
            });
        }
        if queue.len() >= self.inner.max_queue_depth {
            return Err(Rejected {
                job,
                reason: RejectReason::QueueFull,
            });
        }
        queue.push_back(job);
        drop(queue);

        self.inner.work_ready.notify_one();
        Ok(())
    }

    /// Queue `work`; when it finishes, call `on_complete` with its result,
    /// or with the panic payload if it panicked.
    pub fn submit_with_callback<T, W, F>(&self, work: W, on_complete: F) -> Result<(), Rejected>
    where
        T: 'static,
        W: FnOnce() -> T + Send + 'static,
        F: FnOnce(std::thread::Result<T>) + Send + 'static,
    {
        self.submit(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(work));
            on_complete(result);
        })
    }

    /// Block until the queue is empty and no job is running.
    ///
    /// Workers keep running afterwards.
    pub fn drain(&self) {
        let mut queue = self.inner.queue.lock();
        while !queue.is_empty() || self.inner.active_jobs.load(Ordering::Acquire) > 0 {
            self.inner.drain_cond.wait(&mut queue);
        }
    }

    /// Stop accepting jobs, let workers finish the queue, and join them.
    /// Calling it again is a no-op.
    pub fn shutdown(&self) {
        {
            let _queue = self.inner.queue.lock();
            self.inner.shutdown.store(true, Ordering::Release);
            self.inner.work_ready.notify_all();
        }

        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            queue_depth: self.inner.queue.lock().len(),
            active_jobs: self.inner.active_jobs.load(Ordering::Relaxed),
            jobs_completed: self.inner.jobs_completed.load(Ordering::Relaxed),
            worker_count: self.num_threads,
        }
    }
}

impl Drop for VerificationPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Decrements `active_jobs` and wakes drain waiters even if the job panics.
struct ActiveJobGuard<'a> {
    inner: &'a PoolInner,
}

impl Drop for ActiveJobGuard<'_> {
    fn drop(&mut self) {
        self.inner.jobs_completed.fetch_add(1, Ordering::Relaxed);
        // Lock before decrementing so a drain() between its check and wait()
        // cannot miss the notification.
        let _queue = self.inner.queue.lock();
        self.inner.active_jobs.fetch_sub(1, Ordering::Release);
        self.inner.drain_cond.notify_all();
    }
}

fn worker_loop(inner: &PoolInner) {
    loop {
        let job = {
            let mut queue = inner.queue.lock();
            loop {
                if let Some(job) = queue.pop_front() {
                    inner.active_jobs.fetch_add(1, Ordering::Release);
                    break job;
                }
                if inner.shutdown.load(Ordering::Acquire) {
                    return;
                }
                inner.work_ready.wait(&mut queue);
            }
        };

        let _guard = ActiveJobGuard { inner };

        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
            error!(panic = %panic_message(e.as_ref()), "verification job panicked");
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "(non-string panic)".to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::time::Duration;

    #[test]
    fn test_submit_and_drain() {
        let pool = VerificationPool::new(2, 64);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let c = Arc::clone(&counter);
            pool.submit(move || {
                c.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        }

        pool.drain();
        assert_eq!(counter.load(Ordering::Relaxed), 10);
        assert_eq!(pool.stats().jobs_completed, 10);
    }

    #[test]
    fn test_callback_receives_result() {
        let pool = VerificationPool::new(1, 8);
        let seen = Arc::new(Mutex::new(None));

        let s = Arc::clone(&seen);
        pool.submit_with_callback(|| 21 * 2, move |result| {
            *s.lock() = result.ok();
        })
        .unwrap();

        pool.drain();
        assert_eq!(*seen.lock(), Some(42));
    }

    #[test]
    fn test_callback_receives_panic() {
        let pool = VerificationPool::new(1, 8);
        let seen = Arc::new(Mutex::new(String::new()));

        let s = Arc::clone(&seen);
        pool.submit_with_callback(
            || -> u32 { panic!("predicate blew up") },
            move |result| {
                if let Err(payload) = result {
                    *s.lock() = panic_message(payload.as_ref());
                }
            },
        )
        .unwrap();

        pool.drain();
        assert_eq!(seen.lock().as_str(), "predicate blew up");
    }

    #[test]
    fn test_fifo_order_on_single_worker() {
        let pool = VerificationPool::new(1, 64);

        let barrier = Arc::new(Barrier::new(2));
        let b = Arc::clone(&barrier);
        pool.submit(move || {
            b.wait();
        })
        .unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let o = Arc::clone(&order);
            pool.submit(move || o.lock().push(i)).unwrap();
        }

        barrier.wait();
        pool.drain();
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_queue_full_hands_job_back() {
        let pool = VerificationPool::new(1, 1);

        let barrier = Arc::new(Barrier::new(2));
        let b = Arc::clone(&barrier);
        pool.submit(move || {
            b.wait();
        })
        .unwrap();
        // Let the worker take the blocking job off the queue.
        std::thread::sleep(Duration::from_millis(50));

        pool.submit(|| {}).unwrap();

        let ran_inline = Arc::new(AtomicBool::new(false));
        let r = Arc::clone(&ran_inline);
        let rejected = pool
            .submit(move || r.store(true, Ordering::Relaxed))
            .unwrap_err();
        assert_eq!(rejected.reason(), RejectReason::QueueFull);

        rejected.run_inline();
        assert!(ran_inline.load(Ordering::Relaxed));

        barrier.wait();
        pool.drain();
    }

    #[test]
    fn test_submit_after_shutdown_rejected() {
        let pool = VerificationPool::new(2, 64);
        pool.shutdown();

        let rejected = pool.submit(|| {}).unwrap_err();
        assert_eq!(rejected.reason(), RejectReason::ShutDown);

        // Idempotent.
        pool.shutdown();
    }

    #[test]
    fn test_panicking_job_does_not_hang_drain() {
        let pool = VerificationPool::new(2, 64);
        let counter = Arc::new(AtomicUsize::new(0));

        pool.submit(|| panic!("intentional test panic")).unwrap();
        for _ in 0..3 {
            let c = Arc::clone(&counter);
            pool.submit(move || {
                c.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        }

        pool.drain();
        assert_eq!(counter.load(Ordering::Relaxed), 3);
        assert_eq!(pool.stats().jobs_completed, 4);
    }

    #[test]
    fn test_shutdown_runs_queued_jobs() {
        let pool = VerificationPool::new(1, 64);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let c = Arc::clone(&counter);
            pool.submit(move || {
                c.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        }

        pool.shutdown();
        assert_eq!(counter.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_shared_pool_is_a_singleton() {
        assert!(Arc::ptr_eq(
            &VerificationPool::shared(),
            &VerificationPool::shared()
        ));
    }
}
