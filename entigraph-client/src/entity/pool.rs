use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinError;
use tracing::{debug, error};

/// Runs `task` over `items` on `workers` concurrent tasks and collects one
/// result per item, in completion order.
///
/// Each item runs in its own spawned task, so a panicking item comes back as
/// `Err(JoinError)` and the worker moves on to the next one. The work queue
/// is filled and closed before any worker starts. Returning from this
/// function means every worker has exited, so callers can treat it as a
/// barrier.
pub async fn run_pool<T, R, F, Fut>(
    items: Vec<T>,
    workers: usize,
    task: F,
) -> Vec<Result<R, JoinError>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    if items.is_empty() {
        return Vec::new();
    }
    let total = items.len();
    let workers = workers.clamp(1, total);

    let (work_tx, work_rx) = mpsc::unbounded_channel::<T>();
    for item in items {
        // the receiver is owned by this scope, sending cannot fail
        if work_tx.send(item).is_err() {
            break;
        }
    }
    drop(work_tx);

    let work_rx = Arc::new(Mutex::new(work_rx));
    let task = Arc::new(task);
    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<Result<R, JoinError>>();

    debug!("starting {} workers for {} items", workers, total);
    for _ in 0..workers {
        let work_rx = Arc::clone(&work_rx);
        let task = Arc::clone(&task);
        let result_tx = result_tx.clone();
        tokio::spawn(async move {
            loop {
                let next = work_rx.lock().await.recv().await;
                let Some(item) = next else { break };
                let task = Arc::clone(&task);
                let outcome = tokio::spawn(async move { (*task)(item).await }).await;
                if let Err(e) = &outcome {
                    error!("pool task failed: {e}");
                }
                if result_tx.send(outcome).is_err() {
                    break;
                }
            }
        });
    }
    drop(result_tx);

    let mut results = Vec::with_capacity(total);
    while let Some(result) = result_rx.recv().await {
        results.push(result);
    }
    results
}
