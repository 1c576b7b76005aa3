//! Bounded worker pool for chunk generation.
//!
//! Jobs run on a fixed rayon thread pool. Admission is gated by a FIFO
//! semaphore holding `size + queue_capacity` permits, so at most
//! `queue_capacity` jobs wait for a free worker and further submitters wait
//! in `submit`. Each job gets a task id and a oneshot channel registered in
//! the pending map; the worker removes its own entry and answers on it, so a
//! result can only reach the caller that submitted the job.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{Notify, Semaphore, oneshot};

use crate::error::PoolError;

type Reply<T> = oneshot::Sender<Result<T, PoolError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub workers: usize,
    /// Submitted and not yet answered.
    pub in_flight: usize,
    /// Currently executing on a worker.
    pub running: usize,
    /// Admitted but waiting for a worker.
    pub queued: usize,
}

pub struct WorkerPool<T> {
    threads: Mutex<Option<rayon::ThreadPool>>,
    size: usize,
    permits: Arc<Semaphore>,
    pending: Arc<Mutex<HashMap<u64, Reply<T>>>>,
    next_task_id: AtomicU64,
    running: Arc<AtomicUsize>,
    drained: Arc<Notify>,
    closed: AtomicBool,
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new(size: usize, queue_capacity: usize) -> Result<Self> {
        let size = size.max(1);
        let threads = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("worldgen-{}", i))
            .build()
            .context("Failed to build generation thread pool")?;

        log::info!("Started generation pool: {} workers, queue capacity {}", size, queue_capacity);

        Ok(Self {
            threads: Mutex::new(Some(threads)),
            size,
            permits: Arc::new(Semaphore::new(size + queue_capacity)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_task_id: AtomicU64::new(1),
            running: Arc::new(AtomicUsize::new(0)),
            drained: Arc::new(Notify::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Runs `job` on a worker and waits for its result.
    ///
    /// An `Err` returned by the job becomes `TaskFailed`, a panic becomes
    /// `TaskPanicked`; either way only this caller sees it.
    pub async fn submit<F>(&self, job: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let permit = self.permits.clone().acquire_owned().await.map_err(|_| PoolError::Closed)?;

        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(task_id, tx);

        let pending = self.pending.clone();
        let running = self.running.clone();
        let drained = self.drained.clone();

        let spawned = {
            let threads = self.threads.lock();
            match threads.as_ref() {
                Some(pool) => {
                    pool.spawn(move || {
                        let _permit = permit;
                        running.fetch_add(1, Ordering::SeqCst);
                        let outcome = match catch_unwind(AssertUnwindSafe(job)) {
                            Ok(Ok(value)) => Ok(value),
                            Ok(Err(e)) => Err(PoolError::TaskFailed { task_id, message: format!("{:#}", e) }),
                            Err(panic) => Err(PoolError::TaskPanicked { task_id, message: panic_message(&*panic) }),
                        };
                        running.fetch_sub(1, Ordering::SeqCst);

                        let (reply, now_empty) = {
                            let mut pending = pending.lock();
                            let reply = pending.remove(&task_id);
                            (reply, pending.is_empty())
                        };
                        if let Some(reply) = reply {
                            // Receiver gone means the caller stopped waiting
                            let _ = reply.send(outcome);
                        }
                        if now_empty {
                            drained.notify_waiters();
                        }
                    });
                    true
                }
                None => false,
            }
        };

        if !spawned {
            self.pending.lock().remove(&task_id);
            return Err(PoolError::Closed);
        }

        rx.await.map_err(|_| PoolError::Cancelled)?
    }

    pub fn stats(&self) -> PoolStats {
        let in_flight = self.pending.lock().len();
        let running = self.running.load(Ordering::SeqCst).min(in_flight);
        PoolStats {
            workers: self.size,
            in_flight,
            running,
            queued: in_flight - running,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending.lock().is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Stops admitting work, waits up to `timeout` for in-flight tasks, then
    /// fails whatever is left with `ShutdownTimeout` and releases the workers.
    /// Later calls return immediately.
    pub async fn shutdown(&self, timeout: Duration) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.permits.close();

        if tokio::time::timeout(timeout, self.wait_drained()).await.is_err() {
            let abandoned: Vec<(u64, Reply<T>)> = self.pending.lock().drain().collect();
            log::warn!("Generation pool shutdown timed out; abandoning {} tasks", abandoned.len());
            for (_, reply) in abandoned {
                let _ = reply.send(Err(PoolError::ShutdownTimeout));
            }
        }

        // Dropping the rayon pool lets idle threads exit; a stuck job keeps
        // only its own thread alive.
        self.threads.lock().take();
        log::info!("Generation pool shut down");
    }
}
