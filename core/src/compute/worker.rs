use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

/// Type-erased work closure handed to a worker.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// A source of worker threads that dispatched jobs run on.
///
/// The baker never sizes or creates its own pool; the application shell
/// supplies an implementation and the registry only dispatches onto it.
pub trait WorkerSource: Send + Sync {
    /// Run `work` on some worker.
    fn dispatch(&self, work: Work);
}

/// Runs work immediately on the calling thread.
///
/// Useful for tools and tests where asynchrony is not needed. Results still
/// flow through whatever channel the work closure posts to.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineWorker;

impl WorkerSource for InlineWorker {
    fn dispatch(&self, work: Work) {
        work();
    }
}

struct WorkerThread {
    sender: mpsc::Sender<Work>,
    handle: Option<JoinHandle<()>>,
}

/// A fixed set of persistent worker threads, handed out round-robin.
///
/// Each thread drains its own queue in order. Dropping the pool closes the
/// queues and joins the threads after pending work has run.
pub struct WorkerThreads {
    threads: Mutex<Vec<WorkerThread>>,
    next: AtomicUsize,
}

impl WorkerThreads {
    /// Spawn `count` worker threads (at least one).
    ///
    /// # Errors
    ///
    /// Returns the OS error if a thread cannot be spawned.
    pub fn new(count: usize) -> std::io::Result<Self> {
        let count = count.max(1);
        let mut threads = Vec::with_capacity(count);
        for index in 0..count {
            let (sender, receiver) = mpsc::channel::<Work>();
            let handle = std::thread::Builder::new()
                .name(format!("oven-worker-{index}"))
                .spawn(move || {
                    crate::set_thread_name!("Oven Worker");
                    while let Ok(work) = receiver.recv() {
                        // Keep the thread alive for the rest of its queue.
                        if std::panic::catch_unwind(AssertUnwindSafe(work)).is_err() {
                            log::error!("Job panicked on worker thread {index}");
                        }
                    }
                })?;
            threads.push(WorkerThread {
                sender,
                handle: Some(handle),
            });
        }
        log::debug!("Started {count} worker threads");
        Ok(Self {
            threads: Mutex::new(threads),
            next: AtomicUsize::new(0),
        })
    }

    /// Spawn one worker per available CPU.
    ///
    /// # Errors
    ///
    /// Returns the OS error if a thread cannot be spawned.
    pub fn with_available_parallelism() -> std::io::Result<Self> {
        let count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(count)
    }

    /// Number of worker threads.
    pub fn len(&self) -> usize {
        self.threads.lock().len()
    }

    /// Whether the pool has no threads (never true for a live pool).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WorkerSource for WorkerThreads {
    fn dispatch(&self, work: Work) {
        let threads = self.threads.lock();
        if threads.is_empty() {
            drop(threads);
            work();
            return;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % threads.len();
        let sent = threads[index].sender.send(work);
        drop(threads);
        if let Err(mpsc::SendError(work)) = sent {
            // The worker died; run on the caller rather than dropping the job.
            log::warn!("Worker thread {index} is gone, running job inline");
            work();
        }
    }
}

impl Drop for WorkerThreads {
    fn drop(&mut self) {
        let threads = std::mem::take(&mut *self.threads.lock());
        let mut handles = Vec::with_capacity(threads.len());
        for thread in threads {
            drop(thread.sender);
            handles.extend(thread.handle);
        }
        for handle in handles {
            if handle.join().is_err() {
                log::error!("Worker thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn inline_runs_immediately() {
        let hit = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hit);
        InlineWorker.dispatch(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hit.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn round_robin_uses_every_thread() {
        let pool = WorkerThreads::new(3).unwrap();
        assert_eq!(pool.len(), 3);
        let (tx, rx) = mpsc::channel();
        for _ in 0..6 {
            let tx = tx.clone();
            pool.dispatch(Box::new(move || {
                let name = std::thread::current().name().map(str::to_owned);
                let _ = tx.send(name);
            }));
        }
        drop(tx);
        let names: HashSet<_> = rx.iter().flatten().collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains("oven-worker-0"));
    }

    #[test]
    fn panicking_job_keeps_worker_alive() {
        let pool = WorkerThreads::new(1).unwrap();
        let (tx, rx) = mpsc::channel();
        pool.dispatch(Box::new(|| panic!("job failed")));
        pool.dispatch(Box::new(move || {
            let _ = tx.send(42);
        }));
        let value = rx.recv_timeout(std::time::Duration::from_secs(5));
        assert_eq!(value, Ok(42));
    }

    #[test]
    fn drop_runs_pending_work() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerThreads::new(2).unwrap();
            for _ in 0..10 {
                let c = Arc::clone(&counter);
                pool.dispatch(Box::new(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                }));
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }
}
