//! Bounded background work queue.
//!
//! Decouples slow store side-effects (recording an event, refreshing an
//! expiry) from the hot decision path. Jobs run after the admission decision
//! has been returned and can never change it; a job that fails is expected to
//! log and swallow its own error.
//!
//! Queue-full policy: drop-newest. The hot path never blocks on the queue; a
//! dropped job is logged and counts against accuracy, not availability.

use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::mpsc;
use tracing::warn;

type Job = BoxFuture<'static, ()>;

/// Producer half: enqueue fire-and-forget jobs.
#[derive(Debug, Clone)]
pub struct BackgroundQueue {
    tx: mpsc::Sender<Job>,
}

/// Consumer half: drains jobs one at a time.
#[derive(Debug)]
pub struct BackgroundWorker {
    rx: mpsc::Receiver<Job>,
}

impl BackgroundQueue {
    /// Create a queue holding at most `capacity` pending jobs, paired with
    /// the worker that drains it.
    pub fn bounded(capacity: usize) -> (BackgroundQueue, BackgroundWorker) {
        let (tx, rx) = mpsc::channel(capacity);
        (BackgroundQueue { tx }, BackgroundWorker { rx })
    }

    /// Enqueue a job. Returns `false` when the job was dropped (queue full or
    /// worker gone).
    pub fn enqueue<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.tx.try_send(Box::pin(job)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(target: "turnstile::queue", "background queue full, dropping job");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(target: "turnstile::queue", "background worker stopped, dropping job");
                false
            }
        }
    }
}

impl BackgroundWorker {
    /// Drain jobs until every producer is dropped.
    pub async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            job.await;
        }
    }

    /// Run the worker on its own task.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
