//! Fixed-size pool of tokio worker tasks.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use svcnet_api::BoxFut;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::AbortHandle;

pub(crate) type Job = BoxFut<'static, ()>;

/// A fixed number of worker tasks draining a shared job queue.
///
/// Jobs are run to completion one at a time per worker. A panicking job is
/// logged and the worker moves on to the next one.
#[derive(Debug)]
pub struct TaskPool {
    name: &'static str,
    job_tx: UnboundedSender<Job>,
    workers: Vec<AbortHandle>,
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        for worker in self.workers.iter() {
            worker.abort();
        }
    }
}

impl TaskPool {
    /// Spawn the workers. Must be called from within a tokio runtime.
    pub fn new(name: &'static str, worker_count: usize) -> Self {
        let (job_tx, job_rx) = unbounded_channel();
        let job_rx = Arc::new(tokio::sync::Mutex::new(job_rx));

        let workers = (0..worker_count.max(1))
            .map(|worker_idx| {
                tokio::task::spawn(Self::worker(
                    name,
                    worker_idx,
                    job_rx.clone(),
                ))
                .abort_handle()
            })
            .collect();

        Self {
            name,
            job_tx,
            workers,
        }
    }

    /// Number of worker tasks.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job. Jobs submitted after shutdown are dropped.
    pub fn submit<F>(&self, job: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        if self.job_tx.send(Box::pin(job)).is_err() {
            tracing::warn!(pool = self.name, "task pool closed, dropping job");
        }
    }

    async fn worker(
        name: &'static str,
        worker_idx: usize,
        job_rx: Arc<tokio::sync::Mutex<UnboundedReceiver<Job>>>,
    ) {
        loop {
            // the receiver lock is released before the job runs
            let job = job_rx.lock().await.recv().await;
            let Some(job) = job else {
                break;
            };

            if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                tracing::error!(pool = name, worker_idx, "job panicked");
            }
        }

        tracing::trace!(pool = name, worker_idx, "worker exiting");
    }
}
