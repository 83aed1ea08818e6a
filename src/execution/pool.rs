//! Worker Pool
//!
//! A fixed set of named threads pulling jobs from a shared channel. The pool
//! counts in-flight jobs so callers can block until every submitted job has
//! finished.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, info};

use crate::error::EngineError;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn begin(&self) {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn finish(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn current(&self) -> usize {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = self.idle.wait(count).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Decrements the in-flight count when the job finishes, panics, or is
/// dropped unsent.
struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    in_flight: Arc<InFlight>,
}

impl WorkerPool {
    /// Starts `size` workers (at least one) named `{name}-{index}`.
    pub fn new(name: &str, size: usize) -> io::Result<Self> {
        let size = size.max(1);
        let (sender, receiver) = channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("{}-{}", name, index))
                .spawn(move || worker_loop(receiver))?;
            workers.push(handle);
        }

        info!("Started {} workers", size);
        Ok(Self {
            sender: Some(sender),
            workers,
            in_flight: Arc::default(),
        })
    }

    /// Queues a job for the next free worker.
    pub fn submit<F>(&self, job: F) -> Result<(), EngineError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(EngineError::WorkersNotRunning)?;

        self.in_flight.begin();
        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        let job: Job = Box::new(move || {
            let _guard = guard;
            job();
        });

        // A failed send drops the job, and with it the guard
        sender.send(job).map_err(|_| EngineError::WorkersNotRunning)
    }

    /// Number of jobs submitted but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.current()
    }

    /// Blocks until every submitted job has finished.
    pub fn wait_idle(&self) {
        self.in_flight.wait_idle();
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Lets queued jobs finish, then joins every worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Closing the channel ends each worker loop once the queue is empty
        self.sender.take();
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!("Worker '{}' exited abnormally", name);
            }
        }
        debug!("Worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(receiver: Arc<Mutex<Receiver<Job>>>) {
    loop {
        let job = {
            let receiver = receiver.lock().unwrap_or_else(PoisonError::into_inner);
            receiver.recv()
        };

        match job {
            Ok(job) => {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!(
                        "Job panicked on worker '{}'",
                        thread::current().name().unwrap_or("worker")
                    );
                }
            }
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_runs_all_jobs_and_drains() {
        let pool = WorkerPool::new("test", 3).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(2));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.wait_idle();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert_eq!(pool.in_flight(), 0);
        pool.shutdown();
    }

    #[test]
    fn test_minimum_one_worker() {
        let pool = WorkerPool::new("test", 0).unwrap();
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn test_panicking_job_still_drains() {
        let pool = WorkerPool::new("test", 1).unwrap();
        pool.submit(|| panic!("job failure")).unwrap();

        let done = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&done);
        pool.submit(move || {
            flag.store(1, Ordering::SeqCst);
        })
        .unwrap();

        pool.wait_idle();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wait_idle_without_jobs_returns() {
        let pool = WorkerPool::new("test", 2).unwrap();
        pool.wait_idle();
        assert_eq!(pool.in_flight(), 0);
    }
}
