//! Worker pool (§4.10, C10) — N long-lived workers pulling job ids off a
//! bounded queue. `submit` never suspends: a full queue is backpressure, not
//! a wait, rejected immediately by checking queue capacity before pushing
//! rather than blocking the caller.

use crate::error::CoreError;
use futures::future::join_all;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

type Handler = dyn Fn(Uuid) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync;

pub struct WorkerPool {
    job_tx: Mutex<Option<mpsc::Sender<Uuid>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Start `workers` long-lived tasks sharing a queue of capacity
    /// `queue_capacity`. `handler` is invoked once per dequeued job id; it
    /// is responsible for its own error handling (the pipeline driver, C11,
    /// never lets an error escape as a panic).
    pub fn start<F, Fut>(workers: usize, queue_capacity: usize, handler: F) -> Self
    where
        F: Fn(Uuid) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let handler: Arc<Handler> = Arc::new(move |id| Box::pin(handler(id)));

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let rx = rx.clone();
            let handler = handler.clone();
            handles.push(tokio::spawn(async move {
                worker_loop(worker_id, rx, handler).await;
            }));
        }

        Self {
            job_tx: Mutex::new(Some(tx)),
            handles: Mutex::new(handles),
        }
    }

    /// Enqueue `job_id`. Never suspends: a full queue or a stopped pool is
    /// reported immediately rather than waited on.
    pub fn submit(&self, job_id: Uuid) -> Result<(), CoreError> {
        let guard = self.job_tx.lock().expect("job_tx mutex poisoned");
        match guard.as_ref() {
            Some(tx) => match tx.try_send(job_id) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => Err(CoreError::Overloaded),
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    Err(CoreError::Internal("worker pool stopped".to_string()))
                }
            },
            None => Err(CoreError::Internal("worker pool stopped".to_string())),
        }
    }

    /// Stop accepting new jobs, let workers drain whatever is already
    /// queued, and wait up to `budget` for every worker to exit.
    pub async fn stop(&self, budget: Duration) -> Result<(), CoreError> {
        {
            let mut guard = self.job_tx.lock().expect("job_tx mutex poisoned");
            guard.take();
        }
        let handles = {
            let mut handles = self.handles.lock().expect("handles mutex poisoned");
            std::mem::take(&mut *handles)
        };

        match tokio::time::timeout(budget, join_all(handles)).await {
            Ok(_) => Ok(()),
            Err(_) => {
                warn!("worker pool did not drain within the stop budget");
                Err(CoreError::Internal(
                    "worker pool did not stop within budget".to_string(),
                ))
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Uuid>>>,
    handler: Arc<Handler>,
) {
    loop {
        let job_id = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        match job_id {
            Some(job_id) => {
                debug!(worker_id, %job_id, "worker picked up job");
                handler(job_id).await;
            }
            None => break,
        }
    }
    debug!(worker_id, "worker exiting");
}
