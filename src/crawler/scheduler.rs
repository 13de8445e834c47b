//! Bounded-concurrency task scheduler
//!
//! This module handles:
//! - An unbounded FIFO of submitted task futures
//! - A fixed pool of workers that bounds how many task bodies run at once
//! - Panic capture, so a crashing task surfaces as an error
//! - Fail-fast draining: the first error abandons all queued work

use crate::{HarvestError, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// A unit of work accepted by the scheduler
pub type Task = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// State shared between the scheduler handle and its workers
#[derive(Default)]
struct Shared {
    aborted: AtomicBool,
    first_error: Mutex<Option<HarvestError>>,
    running: AtomicUsize,
    completed: AtomicUsize,
    abandoned: AtomicUsize,
}

impl Shared {
    fn record_failure(&self, error: HarvestError) {
        let mut slot = self
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            tracing::error!("Task failed, abandoning queued work: {}", error);
            *slot = Some(error);
        } else {
            tracing::debug!("Discarding error from task after abort: {}", error);
        }
        self.aborted.store(true, Ordering::SeqCst);
    }

    fn take_error(&self) -> Option<HarvestError> {
        self.first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Channel-backed worker pool
///
/// Tasks are started in submission order and at most `max_concurrent` task
/// bodies run at any instant. [`drain`](Self::drain) is the completion
/// signal.
///
/// Must be created inside a tokio runtime.
pub struct TaskScheduler {
    sender: UnboundedSender<Task>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
    max_concurrent: usize,
}

impl TaskScheduler {
    /// Creates a scheduler with `max_concurrent` workers (at least one)
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let (sender, receiver) = mpsc::unbounded_channel::<Task>();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let shared = Arc::new(Shared::default());

        let workers = (0..max_concurrent)
            .map(|id| tokio::spawn(worker_loop(id, receiver.clone(), shared.clone())))
            .collect();

        Self {
            sender,
            workers,
            shared,
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Queues a task; never blocks
    ///
    /// After a task has failed, new submissions are dropped.
    pub fn submit<F>(&self, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        if self.is_aborted() {
            self.shared.abandoned.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Scheduler aborted, dropping submitted task");
            return;
        }

        if self.sender.send(Box::pin(task)).is_err() {
            self.shared.abandoned.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("All scheduler workers have exited, dropping submitted task");
        }
    }

    /// Returns true once any task has failed
    pub fn is_aborted(&self) -> bool {
        self.shared.aborted.load(Ordering::SeqCst)
    }

    /// Number of task bodies running right now
    pub fn running(&self) -> usize {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Number of tasks that have settled, successfully or not
    pub fn completed(&self) -> usize {
        self.shared.completed.load(Ordering::SeqCst)
    }

    /// Stops accepting work and waits for every queued and running task
    ///
    /// Returns the first error raised by any task. Tasks still queued when
    /// that error happened are dropped without running.
    pub async fn drain(self) -> Result<()> {
        let Self {
            sender,
            workers,
            shared,
            ..
        } = self;
        drop(sender);

        for worker in workers {
            if let Err(e) = worker.await {
                shared.record_failure(HarvestError::TaskFailed(format!(
                    "scheduler worker crashed: {}",
                    e
                )));
            }
        }

        let abandoned = shared.abandoned.load(Ordering::Relaxed);
        if abandoned > 0 {
            tracing::warn!("{} queued tasks were abandoned", abandoned);
        }

        match shared.take_error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

async fn worker_loop(
    id: usize,
    receiver: Arc<tokio::sync::Mutex<UnboundedReceiver<Task>>>,
    shared: Arc<Shared>,
) {
    tracing::trace!("Scheduler worker {} started", id);

    loop {
        let next = receiver.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };

        if shared.aborted.load(Ordering::SeqCst) {
            shared.abandoned.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        shared.running.fetch_add(1, Ordering::SeqCst);
        // Spawned so a panic inside the task is reported instead of killing the worker
        let outcome = tokio::spawn(task).await;
        shared.running.fetch_sub(1, Ordering::SeqCst);
        shared.completed.fetch_add(1, Ordering::SeqCst);

        let result = match outcome {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(HarvestError::TaskFailed(format!("task panicked: {}", e))),
            Err(e) => Err(HarvestError::TaskFailed(e.to_string())),
        };

        if let Err(error) = result {
            shared.record_failure(error);
        }
    }

    tracing::trace!("Scheduler worker {} stopped", id);
}
