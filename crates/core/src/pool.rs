//! Bounded worker pool over a pre-populated FIFO queue.

use crate::aggregator::ResultAggregator;
use crate::detector::Detector;
use crate::models::FileTask;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Cooperative stop request, checked by workers between tasks.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub dispatched: usize,
    /// Tasks left in the queue because of cancellation.
    pub cancelled: usize,
}

pub struct WorkerPool {
    workers: usize,
    queue: Arc<Mutex<VecDeque<FileTask>>>,
}

impl WorkerPool {
    /// The queue is filled once, before any worker starts.
    pub fn new(workers: usize, tasks: impl IntoIterator<Item = FileTask>) -> Self {
        Self {
            workers: workers.max(1),
            queue: Arc::new(Mutex::new(tasks.into_iter().collect())),
        }
    }

    /// Runs workers until the queue is empty (or cancellation is requested)
    /// and every worker has been joined.
    pub async fn run(
        self,
        detector: Arc<dyn Detector>,
        aggregator: Arc<ResultAggregator>,
        cancel: CancelFlag,
    ) -> PoolReport {
        let dispatched = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(self.workers);
        info!("Starting {} workers", self.workers);

        for id in 0..self.workers {
            let queue = self.queue.clone();
            let detector = detector.clone();
            let aggregator = aggregator.clone();
            let cancel = cancel.clone();
            let dispatched = dispatched.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        debug!("Worker {} stopping on cancel", id);
                        break;
                    }
                    let next = queue.lock().await.pop_front();
                    let Some(task) = next else {
                        break;
                    };
                    dispatched.fetch_add(1, Ordering::SeqCst);
                    debug!("Worker {} processing {}", id, task.path.display());
                    let result = detector.classify(&task).await;
                    aggregator.record(&task, result).await;
                }
                debug!("Worker {} exiting", id);
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker task failed: {}", e);
            }
        }

        let cancelled = self.queue.lock().await.len();
        PoolReport {
            dispatched: dispatched.load(Ordering::SeqCst),
            cancelled,
        }
    }
}
